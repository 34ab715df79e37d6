use std::{collections::BTreeMap, net::SocketAddr};

use axum::http::{HeaderMap, Method};
use serde_json::Value;

use chatgate_auth::Principal;
use chatgate_core::WorkspaceId;

use crate::workspace::extract_workspace_id;

pub const UNKNOWN_IP: &str = "unknown";

/// Bearer credential of the current caller, forwarded to backend services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerToken(pub String);

/// Everything the guard and the audit interceptor need to know about a request.
///
/// Built once per request before the guard runs and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct RequestContext {
    principal: Option<Principal>,
    bearer: Option<String>,
    method: Method,
    path: String,
    path_params: BTreeMap<String, String>,
    query: BTreeMap<String, String>,
    body: Option<Value>,
    headers: HeaderMap,
    workspace_id: Option<WorkspaceId>,
    client_ip: String,
}

impl RequestContext {
    pub fn builder(method: Method, path: impl Into<String>) -> RequestContextBuilder {
        RequestContextBuilder {
            principal: None,
            bearer: None,
            method,
            path: path.into(),
            path_params: BTreeMap::new(),
            query: BTreeMap::new(),
            body: None,
            headers: HeaderMap::new(),
            peer: None,
        }
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    pub fn bearer(&self) -> Option<&str> {
        self.bearer.as_deref()
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn path_params(&self) -> &BTreeMap<String, String> {
        &self.path_params
    }

    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name).map(String::as_str)
    }

    pub fn query(&self) -> &BTreeMap<String, String> {
        &self.query
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn workspace_id(&self) -> Option<&WorkspaceId> {
        self.workspace_id.as_ref()
    }

    pub fn client_ip(&self) -> &str {
        &self.client_ip
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.header("user-agent")
    }
}

pub struct RequestContextBuilder {
    principal: Option<Principal>,
    bearer: Option<String>,
    method: Method,
    path: String,
    path_params: BTreeMap<String, String>,
    query: BTreeMap<String, String>,
    body: Option<Value>,
    headers: HeaderMap,
    peer: Option<SocketAddr>,
}

impl RequestContextBuilder {
    pub fn principal(mut self, principal: Option<Principal>) -> Self {
        self.principal = principal;
        self
    }

    pub fn bearer(mut self, bearer: Option<String>) -> Self {
        self.bearer = bearer;
        self
    }

    pub fn path_params(mut self, params: BTreeMap<String, String>) -> Self {
        self.path_params = params;
        self
    }

    pub fn query(mut self, query: BTreeMap<String, String>) -> Self {
        self.query = query;
        self
    }

    pub fn body(mut self, body: Option<Value>) -> Self {
        self.body = body;
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn peer(mut self, peer: Option<SocketAddr>) -> Self {
        self.peer = peer;
        self
    }

    /// Freeze the context, resolving the workspace id and client address.
    pub fn build(self) -> RequestContext {
        let workspace_id = extract_workspace_id(
            &self.path_params,
            &self.query,
            self.body.as_ref(),
            &self.headers,
        );
        let client_ip = client_ip(&self.headers, self.peer);

        RequestContext {
            principal: self.principal,
            bearer: self.bearer,
            method: self.method,
            path: self.path,
            path_params: self.path_params,
            query: self.query,
            body: self.body,
            headers: self.headers,
            workspace_id,
            client_ip,
        }
    }
}

/// `x-forwarded-for` (first hop), then `x-real-ip`, then the socket peer.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(first) = header("x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return first.to_string();
    }
    if let Some(real) = header("x-real-ip") {
        return real.to_string();
    }
    peer.map(|p| p.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_IP.to_string())
}

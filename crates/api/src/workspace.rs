//! Workspace id lookup shared by the permission guard and the audit interceptor.

use std::collections::BTreeMap;

use axum::http::HeaderMap;
use serde_json::Value;

use chatgate_core::WorkspaceId;

pub const WORKSPACE_ID_KEY: &str = "workspaceId";
pub const WORKSPACE_ID_HEADER: &str = "x-workspace-id";

/// First non-empty workspace id from path params, query, JSON body, then header.
pub fn extract_workspace_id(
    path_params: &BTreeMap<String, String>,
    query: &BTreeMap<String, String>,
    body: Option<&Value>,
    headers: &HeaderMap,
) -> Option<WorkspaceId> {
    let from_body = body
        .and_then(|b| b.get(WORKSPACE_ID_KEY))
        .and_then(Value::as_str);
    let from_header = headers
        .get(WORKSPACE_ID_HEADER)
        .and_then(|v| v.to_str().ok());

    [
        path_params.get(WORKSPACE_ID_KEY).map(String::as_str),
        query.get(WORKSPACE_ID_KEY).map(String::as_str),
        from_body,
        from_header,
    ]
    .into_iter()
    .flatten()
    .find_map(|candidate| WorkspaceId::parse(candidate).ok())
}

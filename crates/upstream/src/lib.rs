//! `chatgate-upstream`: the single chokepoint for calls to backend services.
//!
//! - `client.rs`: timeout + bounded retry + status→kind mapping
//! - `retry.rs`: retry policy (per-method budgets, fixed or exponential delay)
//! - `mapping.rs`: error-response translation
//! - `services.rs`: typed user/permission/audit/admin operations and the
//!   seams the guard and audit dispatcher depend on

pub mod client;
pub mod config;
pub mod dto;
pub mod envelope;
pub mod mapping;
pub mod retry;
pub mod services;

pub use client::{UpstreamClient, UpstreamResponse};
pub use config::{ServiceUrls, UpstreamConfig};
pub use dto::{
    ActorType, AuditDetails, AuditLogResponse, AuditRecord, PermissionCheckRequest,
    PermissionCheckResponse, ServicesHealth, SystemHealthResponse, UserPermissionsResponse,
    UserResponse,
};
pub use envelope::{ApiEnvelope, PagedResponse};
pub use retry::{BackoffStrategy, RetryPolicy};
pub use services::{AuditLogSink, BackendServices, PermissionChecker};

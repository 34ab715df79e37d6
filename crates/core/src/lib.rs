//! `chatgate-core` — identifiers and the error taxonomy shared by every
//! stage of the gateway pipeline.
//!
//! This crate has no HTTP or storage dependencies.

pub mod error;
pub mod id;

pub use error::{GatewayError, GatewayResult, UpstreamCallError, UpstreamErrorKind};
pub use id::{SubjectId, WorkspaceId};

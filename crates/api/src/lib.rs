//! `chatgate-api` — the gateway's HTTP surface.
//!
//! Request flow for a guarded route:
//! auth middleware → [`pipeline`] (context → guard → handler → audit).

pub mod app;
pub mod audit;
pub mod config;
pub mod context;
pub mod error;
pub mod guard;
pub mod middleware;
pub mod pipeline;
pub mod workspace;

pub use app::{AppServices, build_app};
pub use config::GatewayConfig;

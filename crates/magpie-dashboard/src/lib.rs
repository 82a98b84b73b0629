//! Operator dashboard: axum HTTP surface over the bot's state.
//!
//! Serves the embedded single-page shell, a JSON control API (status,
//! messaging, custom commands, slash registry, event history), a live
//! SSE feed of recorder events, and the ed25519-verified interactions
//! webhook. Credentials are checked per request in one of three modes;
//! see [`DashboardAuthMode`].

pub mod auth;
mod page;
pub mod server;
pub mod types;

pub use auth::{AuthStatusReport, DashboardAuthMode};
pub use server::{build_dashboard_router, run_dashboard_server, DashboardConfig, DashboardState};
pub use types::DashboardApiError;

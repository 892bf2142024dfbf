//! Gateway: the HTTP surface in front of the dispatch engine.
//!
//! Send endpoints only admit work (bearer auth, body validation, readiness
//! check); delivery happens later on the engine's worker and is observed
//! through the queue status routes.

pub mod auth_middleware;
pub mod error;
#[cfg(feature = "metrics")]
pub mod metrics_middleware;
#[cfg(feature = "prometheus")]
pub mod metrics_routes;
pub mod queue_routes;
pub mod send_routes;
pub mod server;
pub mod state;

pub use {
    error::ApiError,
    server::{AppState, build_gateway_app, serve, start_gateway},
    state::GatewayState,
};

//! API module
//!
//! HTTP API endpoints and middleware.

pub mod middleware;
pub mod routes;

use std::sync::Arc;

use axum::{middleware as axum_middleware, routing::get, Router};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::handlers::{PurchaseHandler, TransferHandler};
use crate::identity::AuthService;
use crate::projection::SummaryService;

pub use routes::{create_router, public_router};

/// Shared state of every request handler
#[derive(Clone)]
pub struct AppState {
    pub transfers: Arc<TransferHandler>,
    pub purchases: Arc<PurchaseHandler>,
    pub summaries: Arc<SummaryService>,
    pub auth: Arc<AuthService>,
    /// Cancelled once the shutdown grace period is over
    pub shutdown: CancellationToken,
}

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // Note: Axum layers are applied in reverse order (last added = first executed)
    // Order: logging -> auth -> handler
    let protected_routes = create_router().layer(axum_middleware::from_fn_with_state(
        state.clone(),
        middleware::auth_middleware,
    ));

    let api_routes = public_router()
        .merge(protected_routes)
        .layer(axum_middleware::from_fn(middleware::logging_middleware));

    Router::new()
        // Health check (no auth)
        .route("/health", get(health_check))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

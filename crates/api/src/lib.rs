//! HTTP API layer with Axum routes.
//!
//! This crate provides:
//! - `POST /deploy` multipart upload forwarding
//! - `GET /health`
//! - JSON error responses

pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use tgrelay_core::deploy::DeployService;
use tgrelay_core::remote::MessagingClient;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use error::ApiError;

/// Application state shared across handlers.
pub struct AppState<C: MessagingClient> {
    /// Upload orchestrator.
    pub deploy: Arc<DeployService<C>>,
}

impl<C: MessagingClient> AppState<C> {
    /// Create state around an orchestrator.
    #[must_use]
    pub fn new(deploy: Arc<DeployService<C>>) -> Self {
        Self { deploy }
    }
}

impl<C: MessagingClient> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            deploy: Arc::clone(&self.deploy),
        }
    }
}

/// Creates the main application router.
pub fn create_router<C: MessagingClient + 'static>(state: AppState<C>) -> Router {
    Router::new()
        .merge(routes::api_routes::<C>())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

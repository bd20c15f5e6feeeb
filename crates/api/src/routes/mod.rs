//! API route definitions.

use axum::Router;
use tgrelay_core::remote::MessagingClient;

use crate::AppState;

pub mod deploy;
pub mod health;

/// Creates the API router with all routes.
pub fn api_routes<C: MessagingClient + 'static>() -> Router<AppState<C>> {
    Router::new()
        .merge(health::routes())
        .merge(deploy::routes())
}

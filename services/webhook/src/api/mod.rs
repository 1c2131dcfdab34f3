//! HTTP API handlers and routing.

mod health;
mod webhook;

use axum::{http::HeaderName, Router};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::state::AppState;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Create the main router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        // Health endpoints
        .merge(health::routes())
        // Webhook receiver
        .merge(webhook::routes())
        // Middleware
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        // Application state
        .with_state(state)
}

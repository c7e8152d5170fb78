//! Configured REST routes. Every method reaches the handler; the service rejects
//! methods a route does not declare.

use crate::handlers::rest::{collection, single};
use crate::state::AppState;
use axum::{routing::any, Router};

pub fn rest_routes(state: AppState) -> Router {
    Router::new()
        .route("/:route_id", any(collection))
        .route("/:route_id/:id", any(single))
        .with_state(state)
}

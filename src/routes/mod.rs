//! Router assembly.

pub mod common;
pub mod rest;

pub use common::common_routes;
pub use rest::rest_routes;

use crate::state::AppState;
use axum::Router;

/// Common routes merged with the configured REST routes.
pub fn router(state: AppState) -> Router {
    common_routes(state.clone()).merge(rest_routes(state))
}

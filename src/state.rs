//! Shared application state for the REST routes.

use crate::service::RestService;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<RestService>,
}

impl AppState {
    pub fn new(service: RestService) -> Self {
        AppState {
            service: Arc::new(service),
        }
    }
}

//! Entity REST: configuration-driven REST resources over an entity store.

pub mod cache;
pub mod config;
pub mod error;
pub mod filter;
pub mod formatter;
pub mod handlers;
pub mod query;
pub mod registry;
pub mod request;
pub mod response;
pub mod routes;
pub mod service;
pub mod settings;
pub mod sorter;
pub mod sql;
pub mod state;
pub mod store;

#[cfg(test)]
mod test_support;

pub use cache::{CacheLayer, CacheStore, MemoryCacheStore};
pub use config::{load_from_dirs, load_schema_from_dirs, resolve, ResolvedConfig, ServiceConfig};
pub use error::{AppError, CacheError, ConfigError, StoreError};
pub use registry::Registry;
pub use request::{RequestContext, Variables};
pub use response::RestResponse;
pub use routes::{common_routes, rest_routes, router};
pub use service::RestService;
pub use settings::{CacheSettings, ServiceSettings};
pub use state::AppState;
pub use store::{EntityStore, MemoryEntityStore, PgEntityStore, StoreSchema};

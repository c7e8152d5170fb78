//! Example consumer: serves configured REST routes over a PostgreSQL entity store.
//!
//! Run from repo root: `CONFIG_PATH=example_consumer/config cargo run -p example-consumer`

use entity_rest::config::config_dirs_from_env;
use entity_rest::{
    load_from_dirs, load_schema_from_dirs, resolve, router, AppState, MemoryCacheStore, PgEntityStore, Registry,
    RestService, ServiceSettings,
};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("entity_rest=info")),
        )
        .init();

    let mut dirs = config_dirs_from_env("CONFIG_PATH");
    if dirs.is_empty() {
        dirs.push("example_consumer/config".into());
    }
    let schema = load_schema_from_dirs(&dirs)?;
    let registry = Registry::builtin();
    let config = resolve(load_from_dirs(&dirs)?, &registry, &schema)?;
    let settings = ServiceSettings::from_env()?;

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/content".into());
    let store = PgEntityStore::connect(&database_url, schema).await?;

    let service = RestService::new(config, Arc::new(store), registry, Arc::new(MemoryCacheStore::new()), settings);
    let app = router(AppState::new(service));
    let listener = TcpListener::bind("127.0.0.1:3000").await?;
    let port = listener.local_addr()?.port();
    tracing::info!("Example consumer listening on http://127.0.0.1:{}", port);
    axum::serve(listener, app).await?;
    Ok(())
}

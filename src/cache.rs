//! Three independently toggled cache tiers over a namespaced key-value store.

use crate::error::CacheError;
use crate::query::IdentifierSet;
use crate::settings::CacheSettings;
use crate::store::EntityId;
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub const NS_IDENTIFIERS: &str = "rest_identifiers";
pub const NS_CONTENT: &str = "rest_content";
pub const NS_HEADERS: &str = "rest_headers";

/// Response headers in emission order.
pub type Headers = IndexMap<String, String>;

/// Process-wide cache storage. Expiry, if any, belongs to the implementation.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>, CacheError>;
    async fn set(&self, namespace: &str, key: &str, value: Value) -> Result<(), CacheError>;
}

#[derive(Clone, Default)]
pub struct MemoryCacheStore {
    entries: Arc<RwLock<HashMap<(String, String), Value>>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>, CacheError> {
        let entries = self.entries.read().await;
        Ok(entries.get(&(namespace.to_string(), key.to_string())).cloned())
    }

    async fn set(&self, namespace: &str, key: &str, value: Value) -> Result<(), CacheError> {
        let mut entries = self.entries.write().await;
        entries.insert((namespace.to_string(), key.to_string()), value);
        Ok(())
    }
}

/// Components of a content-cache key. Any change to one of them selects a new entry.
#[derive(Clone, Copy, Debug)]
pub struct ContentKey<'a> {
    pub entity_type: &'a str,
    pub bundle: Option<&'a str>,
    pub id: EntityId,
    pub region: Option<&'a str>,
    pub mapper: &'a str,
}

impl ContentKey<'_> {
    pub fn render(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}",
            self.entity_type,
            self.bundle.unwrap_or_default(),
            self.id,
            self.region.unwrap_or("default"),
            self.mapper
        )
    }
}

#[derive(Clone)]
pub struct CacheLayer {
    store: Arc<dyn CacheStore>,
    settings: CacheSettings,
}

impl CacheLayer {
    pub fn new(store: Arc<dyn CacheStore>, settings: CacheSettings) -> Self {
        CacheLayer { store, settings }
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    async fn read<T: DeserializeOwned>(&self, enabled: bool, ns: &str, key: &str) -> Result<Option<T>, CacheError> {
        if !enabled {
            return Ok(None);
        }
        let hit = match self.store.get(ns, key).await? {
            Some(v) => Some(serde_json::from_value(v)?),
            None => None,
        };
        tracing::debug!(namespace = ns, key, hit = hit.is_some(), "cache lookup");
        Ok(hit)
    }

    /// Returns whether the entry was written.
    async fn write<T: Serialize>(&self, enabled: bool, ns: &str, key: &str, value: &T) -> Result<bool, CacheError> {
        if !enabled {
            return Ok(false);
        }
        self.store.set(ns, key, serde_json::to_value(value)?).await?;
        Ok(true)
    }

    pub async fn identifiers(&self, path: &str) -> Result<Option<IdentifierSet>, CacheError> {
        self.read(self.settings.identifiers, NS_IDENTIFIERS, path).await
    }

    pub async fn store_identifiers(&self, path: &str, ids: &IdentifierSet) -> Result<bool, CacheError> {
        self.write(self.settings.identifiers, NS_IDENTIFIERS, path, ids).await
    }

    pub async fn content(&self, key: &ContentKey<'_>) -> Result<Option<Value>, CacheError> {
        self.read(self.settings.content, NS_CONTENT, &key.render()).await
    }

    pub async fn store_content(&self, key: &ContentKey<'_>, record: &Value) -> Result<bool, CacheError> {
        self.write(self.settings.content, NS_CONTENT, &key.render(), record).await
    }

    pub async fn headers(&self, path: &str) -> Result<Option<Headers>, CacheError> {
        self.read(self.settings.headers, NS_HEADERS, path).await
    }

    pub async fn store_headers(&self, path: &str, headers: &Headers) -> Result<bool, CacheError> {
        self.write(self.settings.headers, NS_HEADERS, path, headers).await
    }
}

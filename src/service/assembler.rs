//! Response assembly: formatted records shaped by route cardinality, plus headers.

use crate::cache::{CacheLayer, ContentKey, Headers};
use crate::config::{Mapping, RouteCardinality, RouteConfig};
use crate::error::{AppError, CacheError, ConfigError};
use crate::formatter::FormatContext;
use crate::query::IdentifierSet;
use crate::registry::Registry;
use crate::request::RequestContext;
use crate::store::{EntityId, EntityStore, Record};
use chrono::{Duration, Utc};
use hex::ToHex;
use serde_json::{Map, Value};
use sha2::Digest;
use std::collections::HashMap;

pub const HEADER_TOTAL_COUNT: &str = "X-Total-Count";
pub const HEADER_ETAG: &str = "ETag";
pub const HEADER_CACHE_CONTROL: &str = "Cache-Control";
pub const HEADER_LAST_MODIFIED: &str = "Last-Modified";
pub const HEADER_EXPIRES: &str = "Expires";

const HTTP_DATE: &str = "%a, %d %b %Y %H:%M:%S GMT";
/// Ten years; `Expires` is clamped to this horizon.
const MAX_FRESHNESS_SECS: u64 = 315_360_000;

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = sha2::Sha256::new();
    hasher.update(bytes);
    hasher.finalize().encode_hex::<String>()
}

fn content_key<'k>(route: &'k RouteConfig, ctx: &'k RequestContext, id: EntityId, mapper: &'k str) -> ContentKey<'k> {
    ContentKey {
        entity_type: &route.requirements.entity_type,
        bundle: route.requirements.bundle.as_deref(),
        id,
        region: ctx.variables().region.as_deref(),
        mapper,
    }
}

/// Mapping selected for a request, with the name used in content-cache keys.
#[derive(Clone, Copy, Debug)]
pub struct SelectedMapping<'a> {
    pub name: &'a str,
    pub mapping: &'a Mapping,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Assembly {
    pub body: Value,
    pub headers: Headers,
    /// Records actually emitted.
    pub count: usize,
}

pub struct ResponseAssembler<'a> {
    store: &'a dyn EntityStore,
    registry: &'a Registry,
    cache: &'a CacheLayer,
}

impl<'a> ResponseAssembler<'a> {
    pub fn new(store: &'a dyn EntityStore, registry: &'a Registry, cache: &'a CacheLayer) -> Self {
        ResponseAssembler { store, registry, cache }
    }

    /// Format every identifier, shape the body and compute headers. `fresh` is set when
    /// the identifier cache wrote a new entry for this request.
    pub async fn assemble(
        &self,
        route_id: &str,
        route: &RouteConfig,
        ids: &IdentifierSet,
        mapping: Option<SelectedMapping<'_>>,
        ctx: &RequestContext,
        fresh: bool,
    ) -> Result<Assembly, AppError> {
        if route.cardinality == RouteCardinality::Singleton && ids.ids.len() > 1 {
            return Err(ConfigError::AmbiguousSingleton {
                route: route_id.to_string(),
                count: ids.ids.len(),
            }
            .into());
        }
        let records = self.format_all(route, &ids.ids, mapping, ctx).await?;
        let count = records.len();
        let body = match route.cardinality {
            RouteCardinality::Collection => Value::Array(records),
            RouteCardinality::Singleton => records.into_iter().last().unwrap_or(Value::Null),
        };
        let headers = self.headers(&body, ids.total, ctx, fresh).await?;
        Ok(Assembly { body, headers, count })
    }

    async fn format_all(
        &self,
        route: &RouteConfig,
        ids: &[EntityId],
        mapping: Option<SelectedMapping<'_>>,
        ctx: &RequestContext,
    ) -> Result<Vec<Value>, AppError> {
        let requirements = &route.requirements;

        let mut cached: HashMap<EntityId, Value> = HashMap::new();
        if let Some(selected) = mapping {
            for id in ids {
                if let Some(hit) = self.cache.content(&content_key(route, ctx, *id, selected.name)).await? {
                    cached.insert(*id, hit);
                }
            }
        }
        let misses: Vec<EntityId> = ids.iter().copied().filter(|id| !cached.contains_key(id)).collect();
        let mut loaded = if misses.is_empty() {
            Default::default()
        } else {
            self.store.load_records(&requirements.entity_type, &misses).await?
        };
        tracing::debug!(ids = ids.len(), cached = cached.len(), loaded = loaded.len(), "assembling records");

        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(hit) = cached.remove(id) {
                out.push(hit);
                continue;
            }
            let Some(record) = loaded.shift_remove(id) else {
                tracing::warn!(id, entity_type = %requirements.entity_type, "matched identifier did not load");
                continue;
            };
            match mapping {
                Some(selected) => {
                    let formatted = self.format_record(&record, selected.mapping, ctx).await?;
                    self.cache.store_content(&content_key(route, ctx, *id, selected.name), &formatted).await?;
                    out.push(formatted);
                }
                None => out.push(record.to_value()),
            }
        }
        Ok(out)
    }

    /// Apply each mapping entry's formatter in mapping order.
    pub async fn format_record(&self, record: &Record, mapping: &Mapping, ctx: &RequestContext) -> Result<Value, AppError> {
        let mut out = Map::new();
        for (key, entry) in mapping {
            let formatter = self.registry.formatter(entry.formatter.as_deref())?;
            let fctx = FormatContext {
                record,
                key,
                store: self.store,
                variables: ctx.variables(),
            };
            out.insert(entry.label.clone(), formatter.format(&fctx).await?);
        }
        Ok(Value::Object(out))
    }

    /// ETag and total count always; freshness headers only for a fresh identifier entry.
    /// Headers cached for this path win over the computed ones.
    async fn headers(&self, body: &Value, total: u64, ctx: &RequestContext, fresh: bool) -> Result<Headers, AppError> {
        let path = ctx.cache_path();
        if let Some(cached) = self.cache.headers(&path).await? {
            return Ok(cached);
        }
        let mut headers = Headers::new();
        let bytes = serde_json::to_vec(body).map_err(CacheError::from)?;
        headers.insert(HEADER_ETAG.into(), format!("\"{}\"", sha256_hex(&bytes)));
        headers.insert(HEADER_TOTAL_COUNT.into(), total.to_string());
        if fresh {
            let max_age = self.cache.settings().max_age_secs;
            let now = Utc::now();
            let expires = now + Duration::seconds(max_age.min(MAX_FRESHNESS_SECS) as i64);
            headers.insert(
                HEADER_CACHE_CONTROL.into(),
                format!("public,max-age={},s-maxage={}", max_age, max_age),
            );
            headers.insert(HEADER_LAST_MODIFIED.into(), now.format(HTTP_DATE).to_string());
            headers.insert(HEADER_EXPIRES.into(), expires.format(HTTP_DATE).to_string());
        }
        self.cache.store_headers(&path, &headers).await?;
        Ok(headers)
    }
}

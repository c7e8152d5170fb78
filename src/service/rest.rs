//! RestService: validate, resolve identifiers, assemble, respond.

use super::assembler::{ResponseAssembler, SelectedMapping};
use super::validation::{RequestValidator, ValidationOutcome};
use crate::cache::{CacheLayer, CacheStore};
use crate::config::{ConfigKind, ResolvedConfig, RouteConfig};
use crate::error::{AppError, ConfigError};
use crate::query::{IdentifierSet, QueryBuilder};
use crate::registry::Registry;
use crate::request::{resolve, RequestContext};
use crate::response::RestResponse;
use crate::settings::ServiceSettings;
use crate::store::EntityStore;
use std::sync::Arc;

/// Query-string parameter selecting a mapper for one request.
pub const PARAM_MAPPER: &str = "mapper";

pub struct RestService {
    config: ResolvedConfig,
    store: Arc<dyn EntityStore>,
    registry: Registry,
    cache: CacheLayer,
    settings: ServiceSettings,
}

impl RestService {
    pub fn new(
        config: ResolvedConfig,
        store: Arc<dyn EntityStore>,
        registry: Registry,
        cache_store: Arc<dyn CacheStore>,
        settings: ServiceSettings,
    ) -> Self {
        let cache = CacheLayer::new(cache_store, settings.cache.clone());
        RestService {
            config,
            store,
            registry,
            cache,
            settings,
        }
    }

    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    fn route(&self, route_id: &str) -> Result<&RouteConfig, AppError> {
        self.config
            .route(route_id)
            .ok_or_else(|| AppError::NotFound(format!("route '{}'", route_id)))
    }

    /// Full request lifecycle for one route.
    pub async fn handle(&self, route_id: &str, ctx: &RequestContext) -> Result<RestResponse, AppError> {
        let route = self.route(route_id)?;
        if let ValidationOutcome::Rejected(rejection) = RequestValidator::validate(route, ctx) {
            tracing::info!(route = %route_id, status = rejection.kind.as_str(), "request rejected");
            return Ok(RestResponse::rejected(&rejection));
        }

        let (ids, fresh) = self.resolve_identifiers(route_id, route, ctx).await?;
        if ids.ids.is_empty() {
            tracing::info!(route = %route_id, "no results");
            return Ok(RestResponse::no_results(self.settings.no_results_status));
        }

        let mapping = self.select_mapping(route, ctx)?;
        let assembler = ResponseAssembler::new(self.store.as_ref(), &self.registry, &self.cache);
        let assembly = assembler.assemble(route_id, route, &ids, mapping, ctx, fresh).await?;
        if assembly.count == 0 {
            tracing::info!(route = %route_id, matched = ids.ids.len(), "no matched record loaded");
            return Ok(RestResponse::no_results(self.settings.no_results_status));
        }
        tracing::info!(
            route = %route_id,
            method = %ctx.method(),
            records = assembly.count,
            total = ids.total,
            mapper = mapping.map(|m| m.name).unwrap_or("raw"),
            "handled request"
        );
        Ok(RestResponse::ok(assembly.body, assembly.headers))
    }

    /// Validation and identifier resolution only; nothing is loaded or formatted.
    pub async fn entity_ids(&self, route_id: &str, ctx: &RequestContext) -> Result<IdentifierSet, AppError> {
        let route = self.route(route_id)?;
        if let ValidationOutcome::Rejected(rejection) = RequestValidator::validate(route, ctx) {
            return Err(AppError::Rejected(rejection));
        }
        let (ids, _) = self.resolve_identifiers(route_id, route, ctx).await?;
        Ok(ids)
    }

    /// Identifiers for the request and whether the identifier cache wrote a fresh entry.
    async fn resolve_identifiers(
        &self,
        route_id: &str,
        route: &RouteConfig,
        ctx: &RequestContext,
    ) -> Result<(IdentifierSet, bool), AppError> {
        let builder = QueryBuilder::new(route_id, route, ctx, self.store.as_ref(), &self.registry)
            .filters(self.config.filters_for(route)?)
            .sorters(self.config.sorters_for(route)?)
            .max_limit(self.settings.max_limit);

        if let Some(id) = ctx.identifier() {
            // The hook still runs; the query it returns is not executed.
            builder.base_query()?;
            return Ok((IdentifierSet { ids: vec![id], total: 1 }, false));
        }

        let path = ctx.cache_path();
        if let Some(hit) = self.cache.identifiers(&path).await? {
            tracing::debug!(route = %route_id, path = %path, ids = hit.ids.len(), "identifier cache hit");
            return Ok((hit, false));
        }
        let ids = builder.build().await?.run(self.store.as_ref(), &self.registry).await?;
        let fresh = self.cache.store_identifiers(&path, &ids).await?;
        Ok((ids, fresh))
    }

    /// Query string > caller variable > route default. No name at all means raw records.
    fn select_mapping<'a>(
        &'a self,
        route: &'a RouteConfig,
        ctx: &'a RequestContext,
    ) -> Result<Option<SelectedMapping<'a>>, AppError> {
        let explicit = ctx.param(PARAM_MAPPER);
        let Some(name) = resolve(explicit, ctx.variables().mapper.as_deref(), route.defaults.mapper.as_deref()) else {
            return Ok(None);
        };
        match self.config.mapping(name) {
            Some(mapping) => Ok(Some(SelectedMapping { name, mapping })),
            None if explicit.is_some() => Err(AppError::BadRequest(format!("unknown mapper '{}'", name))),
            None => Err(ConfigError::MissingReference {
                kind: ConfigKind::Mapping.as_str(),
                id: name.to_string(),
            }
            .into()),
        }
    }
}

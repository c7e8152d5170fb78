//! Composes route requirements, filters, sorting and paging into one query.

use super::{Query, Range};
use crate::config::{scalar_to_string, FilterSet, RouteConfig, SorterSet};
use crate::error::{AppError, ConfigError};
use crate::filter::{PostFilterDescriptor, QueryOutcome, ResolvedFilter};
use crate::query::Operator;
use crate::registry::Registry;
use crate::request::{resolve, RequestContext};
use crate::sorter::{apply_sort, resolve_sorter};
use crate::store::{EntityId, EntityStore};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PARAM_ORDERBY: &str = "orderby";
pub const PARAM_SORT: &str = "sort";
pub const PARAM_LIMIT: &str = "limit";
pub const PARAM_START: &str = "start";

/// Largest offset or page size a store can take (a signed 64-bit SQL bigint).
pub const MAX_WINDOW: u64 = i64::MAX as u64;

/// Matched identifiers in response order, with the unranged match count.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierSet {
    pub ids: Vec<EntityId>,
    pub total: u64,
}

pub struct QueryBuilder<'a> {
    route_id: &'a str,
    route: &'a RouteConfig,
    ctx: &'a RequestContext,
    store: &'a dyn EntityStore,
    registry: &'a Registry,
    filters: Option<&'a FilterSet>,
    sorters: Option<&'a SorterSet>,
    max_limit: u64,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(
        route_id: &'a str,
        route: &'a RouteConfig,
        ctx: &'a RequestContext,
        store: &'a dyn EntityStore,
        registry: &'a Registry,
    ) -> Self {
        QueryBuilder {
            route_id,
            route,
            ctx,
            store,
            registry,
            filters: None,
            sorters: None,
            max_limit: MAX_WINDOW,
        }
    }

    pub fn filters(mut self, filters: Option<&'a FilterSet>) -> Self {
        self.filters = filters;
        self
    }

    pub fn sorters(mut self, sorters: Option<&'a SorterSet>) -> Self {
        self.sorters = sorters;
        self
    }

    pub fn max_limit(mut self, max_limit: u64) -> Self {
        self.max_limit = max_limit.min(MAX_WINDOW);
        self
    }

    /// Select over the route's entity type, constrained by bundle, property
    /// requirements and the requirement hook.
    pub fn base_query(&self) -> Result<Query, AppError> {
        let requirements = &self.route.requirements;
        let info = self
            .store
            .entity_info(&requirements.entity_type)
            .ok_or_else(|| ConfigError::MissingReference {
                kind: "entity type",
                id: requirements.entity_type.clone(),
            })?;
        let mut query = Query::select(&info);

        if let Some(bundle) = &requirements.bundle {
            let bundle_key = info.bundle_key.as_deref().ok_or_else(|| ConfigError::InvalidDefinition {
                kind: "route",
                id: self.route_id.to_string(),
                reason: format!("entity type '{}' has no bundles", info.entity_type),
            })?;
            let column = query.base_column(bundle_key);
            query = query.condition(column, Operator::Eq, vec![bundle.clone()]);
        }
        for (property, value) in &requirements.properties {
            let column = query.base_column(property);
            let value_type = self.store.property_type(&requirements.entity_type, property);
            query = match value {
                Value::Array(items) => query.typed_condition(
                    column,
                    Operator::In,
                    items.iter().map(scalar_to_string).collect(),
                    value_type,
                ),
                other => query.typed_condition(column, Operator::Eq, vec![scalar_to_string(other)], value_type),
            };
        }
        if let Some(hook) = &requirements.custom_callback {
            query = self.registry.hook(hook)?.apply(query, self.ctx)?;
        }
        Ok(query)
    }

    /// Declared defaults first, then query-string values for declared filters; a
    /// client value replaces the default of the same name.
    pub fn build_filter_list(&self) -> IndexMap<String, ResolvedFilter> {
        let mut list = IndexMap::new();
        let Some(filters) = self.filters else {
            return list;
        };
        for (name, definition) in filters {
            if let Some(default) = &definition.default {
                list.insert(
                    name.clone(),
                    ResolvedFilter {
                        name: name.clone(),
                        definition: definition.clone(),
                        value: scalar_to_string(default),
                    },
                );
            }
        }
        for (key, value) in self.ctx.query() {
            if let Some(definition) = filters.get(key) {
                list.insert(
                    key.clone(),
                    ResolvedFilter {
                        name: key.clone(),
                        definition: definition.clone(),
                        value: value.clone(),
                    },
                );
            }
        }
        list
    }

    pub async fn apply_filters(
        &self,
        mut query: Query,
        list: &IndexMap<String, ResolvedFilter>,
    ) -> Result<(Query, Vec<PostFilterDescriptor>), AppError> {
        let mut deferred = Vec::new();
        for filter in list.values() {
            let strategy = self.registry.filter(filter.definition.filter.as_deref())?;
            query = match strategy.filter_query(query, filter, self.store).await? {
                QueryOutcome::Conditioned(q) => q,
                QueryOutcome::Deferred(q, descriptor) => {
                    deferred.push(descriptor);
                    q
                }
            };
        }
        Ok((query, deferred))
    }

    /// Effective window: `limit` > route default > the configured maximum, capped at
    /// the maximum; `start` defaults to 0.
    pub fn page(&self) -> Result<Range, AppError> {
        let limit = parse_param(self.ctx, PARAM_LIMIT)?;
        if limit == Some(0) {
            return Err(AppError::BadRequest("limit must be positive".into()));
        }
        let limit = resolve(limit, None, self.route.defaults.limit)
            .unwrap_or(self.max_limit)
            .min(self.max_limit);
        let offset = parse_param(self.ctx, PARAM_START)?.unwrap_or(0);
        Ok(Range { offset, limit })
    }

    pub async fn build(self) -> Result<BuiltQuery, AppError> {
        let query = self.base_query()?;
        let list = self.build_filter_list();
        let (mut query, post_filters) = self.apply_filters(query, &list).await?;

        if let Some(sorters) = self.sorters {
            let sort = resolve_sorter(
                sorters,
                self.ctx.param(PARAM_ORDERBY),
                self.route.defaults.orderby.as_deref(),
                self.ctx.param(PARAM_SORT),
            )?;
            if let Some(sort) = sort {
                query = apply_sort(query, &sort);
            }
        }
        let range = self.page()?;
        tracing::debug!(
            route = %self.route_id,
            filters = list.len(),
            deferred = post_filters.len(),
            offset = range.offset,
            limit = range.limit,
            "built query"
        );
        Ok(BuiltQuery {
            query,
            post_filters,
            range,
        })
    }
}

fn parse_param(ctx: &RequestContext, key: &str) -> Result<Option<u64>, AppError> {
    ctx.param(key)
        .map(|raw| {
            raw.trim()
                .parse::<u64>()
                .ok()
                .filter(|n| *n <= MAX_WINDOW)
                .ok_or_else(|| AppError::BadRequest(format!("invalid {} '{}'", key, raw)))
        })
        .transpose()
}

/// Query ready to run. The range is kept apart so the unranged count can be taken
/// and so post-query filters see every match before the window is applied.
#[derive(Clone, Debug, PartialEq)]
pub struct BuiltQuery {
    pub query: Query,
    pub post_filters: Vec<PostFilterDescriptor>,
    pub range: Range,
}

impl BuiltQuery {
    pub async fn run(&self, store: &dyn EntityStore, registry: &Registry) -> Result<IdentifierSet, AppError> {
        if self.post_filters.is_empty() {
            let total = store.count(&self.query).await?;
            let ranged = self.query.clone().range(self.range.offset, self.range.limit);
            let ids = store.execute(&ranged).await?;
            return Ok(IdentifierSet { ids, total });
        }

        let mut ids = store.execute(&self.query).await?;
        for descriptor in &self.post_filters {
            let strategy = registry.filter(descriptor.strategy.as_deref())?;
            ids = strategy.filter_post_query(descriptor, ids, store).await?;
        }
        let total = ids.len() as u64;
        let ids = ids
            .into_iter()
            .skip(self.range.offset as usize)
            .take(self.range.limit.min(usize::MAX as u64) as usize)
            .collect();
        Ok(IdentifierSet { ids, total })
    }
}

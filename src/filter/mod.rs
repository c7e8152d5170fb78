//! Filter strategies: constrain a query, or defer to a post-query pass when the
//! condition cannot be expressed against the joined rows.

mod default;
mod taxonomy;

pub use default::DefaultFilter;
pub use taxonomy::TaxonomyByNameFilter;

use crate::config::{scalar_to_string, FilterDefinition};
use crate::error::AppError;
use crate::query::Query;
use crate::store::{EntityId, EntityStore, FieldMetadata};
use async_trait::async_trait;

/// A declared filter paired with the value in effect for this request.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedFilter {
    pub name: String,
    pub definition: FilterDefinition,
    pub value: String,
}

/// Comma-separated filter value; a `!` on any item negates the whole filter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilterValues {
    pub values: Vec<String>,
    pub negate: bool,
}

impl FilterValues {
    pub fn parse(raw: &str) -> Self {
        let mut negate = false;
        let values = raw
            .split(',')
            .map(str::trim)
            .map(|v| match v.strip_prefix('!') {
                Some(rest) => {
                    negate = true;
                    rest.trim().to_string()
                }
                None => v.to_string(),
            })
            .filter(|v| !v.is_empty())
            .collect();
        FilterValues { values, negate }
    }
}

/// Exclusion on a multi-valued field, evaluated against materialized identifiers.
#[derive(Clone, Debug, PartialEq)]
pub struct PostFilterDescriptor {
    pub filter: String,
    pub strategy: Option<String>,
    pub field: FieldMetadata,
    pub values: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum QueryOutcome {
    Conditioned(Query),
    /// The query is returned unchanged alongside the deferred exclusion.
    Deferred(Query, PostFilterDescriptor),
}

#[async_trait]
pub trait FilterStrategy: Send + Sync {
    async fn filter_query(
        &self,
        query: Query,
        filter: &ResolvedFilter,
        store: &dyn EntityStore,
    ) -> Result<QueryOutcome, AppError>;

    /// Drop every identifier whose field items contain one of the excluded values.
    async fn filter_post_query(
        &self,
        descriptor: &PostFilterDescriptor,
        ids: Vec<EntityId>,
        store: &dyn EntityStore,
    ) -> Result<Vec<EntityId>, AppError> {
        if ids.is_empty() {
            return Ok(ids);
        }
        let items = store.field_values(&descriptor.field, &ids).await?;
        Ok(ids
            .into_iter()
            .filter(|id| {
                items.get(id).map_or(true, |values| {
                    !values
                        .iter()
                        .map(scalar_to_string)
                        .any(|item| descriptor.values.contains(&item))
                })
            })
            .collect())
    }
}

use super::{DefaultFilter, FilterStrategy, FilterValues, QueryOutcome, ResolvedFilter};
use crate::error::{AppError, ConfigError};
use crate::query::Query;
use crate::store::EntityStore;
use async_trait::async_trait;

/// Resolves term names within the field's vocabulary, then filters like [`DefaultFilter`].
pub struct TaxonomyByNameFilter;

#[async_trait]
impl FilterStrategy for TaxonomyByNameFilter {
    async fn filter_query(
        &self,
        query: Query,
        filter: &ResolvedFilter,
        store: &dyn EntityStore,
    ) -> Result<QueryOutcome, AppError> {
        let parsed = FilterValues::parse(&filter.value);
        let field_name = filter.definition.field.as_deref().ok_or_else(|| ConfigError::InvalidDefinition {
            kind: "filter",
            id: filter.name.clone(),
            reason: "taxonomy_by_name requires a field".into(),
        })?;
        let field = store
            .field_metadata(field_name)
            .ok_or_else(|| ConfigError::MissingFieldStorage(field_name.to_string()))?;
        let vocabulary = field.vocabulary.as_deref().ok_or_else(|| ConfigError::InvalidDefinition {
            kind: "filter",
            id: filter.name.clone(),
            reason: format!("field '{}' has no vocabulary", field.name),
        })?;

        if parsed.values.len() == 1 && !parsed.negate && parsed.values[0].eq_ignore_ascii_case(super::default::WILDCARD) {
            return Ok(QueryOutcome::Conditioned(query));
        }

        let mut tids = Vec::with_capacity(parsed.values.len());
        for name in &parsed.values {
            let terms = store.terms_by_name(name, vocabulary).await?;
            match terms.as_slice() {
                [term] => tids.push(term.tid.to_string()),
                _ => {
                    return Err(AppError::LookupNotFound {
                        field: field.name.clone(),
                        value: name.clone(),
                    })
                }
            }
        }
        DefaultFilter::apply(
            query,
            filter,
            FilterValues {
                values: tids,
                negate: parsed.negate,
            },
            store,
        )
    }
}

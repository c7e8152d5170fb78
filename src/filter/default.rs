use super::{FilterStrategy, FilterValues, PostFilterDescriptor, QueryOutcome, ResolvedFilter};
use crate::error::{AppError, ConfigError};
use crate::query::{ColumnRef, Operator, Query};
use crate::store::EntityStore;
use async_trait::async_trait;

/// Value that leaves a filter unconstrained.
pub const WILDCARD: &str = "all";

/// Membership filter on a base-table property or a joined field table.
pub struct DefaultFilter;

impl DefaultFilter {
    pub(crate) fn apply(
        query: Query,
        filter: &ResolvedFilter,
        parsed: FilterValues,
        store: &dyn EntityStore,
    ) -> Result<QueryOutcome, AppError> {
        let def = &filter.definition;
        if parsed.values.is_empty() || is_wildcard(&parsed) {
            return Ok(QueryOutcome::Conditioned(query));
        }
        let operator = effective_operator(filter, &parsed)?;

        if let Some(property) = &def.property {
            let column = query.base_column(property);
            let value_type = store.property_type(&query.entity_type, property);
            return Ok(QueryOutcome::Conditioned(query.typed_condition(column, operator, parsed.values, value_type)));
        }

        let Some(field_name) = &def.field else {
            return Err(ConfigError::InvalidDefinition {
                kind: "filter",
                id: filter.name.clone(),
                reason: "neither property nor field is set".into(),
            }
            .into());
        };
        let mut field = store
            .field_metadata(field_name)
            .ok_or_else(|| ConfigError::MissingFieldStorage(field_name.clone()))?;
        // An overriding column holds values of unknown type; compare it as text.
        let value_type = match &def.column {
            Some(column) => {
                field.storage_column = column.clone();
                None
            }
            None => Some(field.value_type.clone()),
        };

        if parsed.negate && field.is_multi_valued() {
            tracing::debug!(filter = %filter.name, field = %field.name, "deferring negated multi-valued filter");
            let descriptor = PostFilterDescriptor {
                filter: filter.name.clone(),
                strategy: def.filter.clone(),
                field,
                values: parsed.values,
            };
            return Ok(QueryOutcome::Deferred(query, descriptor));
        }

        let query = query.join_entity_table(&field.storage_table, &field.name);
        let column = ColumnRef::new(field.name.clone(), field.storage_column.clone());
        Ok(QueryOutcome::Conditioned(query.typed_condition(column, operator, parsed.values, value_type)))
    }
}

fn is_wildcard(parsed: &FilterValues) -> bool {
    !parsed.negate && parsed.values.len() == 1 && parsed.values[0].eq_ignore_ascii_case(WILDCARD)
}

/// Declared operator (membership by default), flipped by `!` and widened to a
/// membership test when several values are given for an equality.
fn effective_operator(filter: &ResolvedFilter, parsed: &FilterValues) -> Result<Operator, AppError> {
    let declared = filter.definition.operator.unwrap_or(Operator::In);
    let operator = if parsed.negate {
        declared.negated().ok_or_else(|| {
            AppError::BadRequest(format!("filter '{}' does not support negation", filter.name))
        })?
    } else {
        declared
    };
    Ok(match operator {
        Operator::Eq if parsed.values.len() > 1 => Operator::In,
        Operator::Ne if parsed.values.len() > 1 => Operator::NotIn,
        other => other,
    })
}

#[async_trait]
impl FilterStrategy for DefaultFilter {
    async fn filter_query(
        &self,
        query: Query,
        filter: &ResolvedFilter,
        store: &dyn EntityStore,
    ) -> Result<QueryOutcome, AppError> {
        Self::apply(query, filter, FilterValues::parse(&filter.value), store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FilterDefinition;
    use crate::query::Condition;
    use crate::store::ValueType;
    use crate::test_support;
    use pretty_assertions::assert_eq;

    fn resolved(name: &str, definition: FilterDefinition, value: &str) -> ResolvedFilter {
        ResolvedFilter {
            name: name.into(),
            definition,
            value: value.into(),
        }
    }

    fn base_query(store: &dyn EntityStore) -> Query {
        Query::select(&store.entity_info("node").unwrap())
    }

    #[test]
    fn parse_splits_and_negates() {
        assert_eq!(
            FilterValues::parse("a, !b,c"),
            FilterValues {
                values: vec!["a".into(), "b".into(), "c".into()],
                negate: true
            }
        );
        assert!(!FilterValues::parse("a").negate);
        assert!(FilterValues::parse(" , ").values.is_empty());
    }

    #[tokio::test]
    async fn property_filter_becomes_in_list() {
        let store = test_support::store();
        let def = FilterDefinition {
            property: Some("status".into()),
            ..Default::default()
        };
        let outcome = DefaultFilter
            .filter_query(base_query(&store), &resolved("status", def, "1,0"), &store)
            .await
            .unwrap();
        let QueryOutcome::Conditioned(q) = outcome else { panic!("expected condition") };
        assert_eq!(
            q.conditions,
            vec![Condition {
                column: ColumnRef::new("node", "status"),
                operator: Operator::In,
                values: vec!["1".into(), "0".into()],
                value_type: Some(ValueType::Integer),
            }]
        );
    }

    #[tokio::test]
    async fn negated_single_valued_field_is_not_in_with_one_join() {
        let store = test_support::store();
        let def = FilterDefinition {
            field: Some("field_rating".into()),
            ..Default::default()
        };
        let q = base_query(&store).join_entity_table("field_data_field_rating", "field_rating");
        let QueryOutcome::Conditioned(q) = DefaultFilter
            .filter_query(q, &resolved("rating", def, "!5,3"), &store)
            .await
            .unwrap()
        else {
            panic!("expected condition")
        };
        assert_eq!(q.joins.len(), 1);
        assert_eq!(q.conditions[0].operator, Operator::NotIn);
        assert_eq!(q.conditions[0].column, ColumnRef::new("field_rating", "field_rating_value"));
        assert_eq!(q.conditions[0].values, vec!["5".to_string(), "3".to_string()]);
    }

    #[tokio::test]
    async fn negated_multi_valued_field_is_deferred() {
        let store = test_support::store();
        let def = FilterDefinition {
            field: Some("field_tags".into()),
            ..Default::default()
        };
        let outcome = DefaultFilter
            .filter_query(base_query(&store), &resolved("tags", def, "!sand"), &store)
            .await
            .unwrap();
        let QueryOutcome::Deferred(q, descriptor) = outcome else { panic!("expected deferral") };
        assert!(q.conditions.is_empty());
        assert!(q.joins.is_empty());
        assert_eq!(descriptor.values, vec!["sand".to_string()]);

        let kept = DefaultFilter
            .filter_post_query(&descriptor, vec![1, 2, 3, 4], &store)
            .await
            .unwrap();
        assert_eq!(kept, vec![2, 4]);
    }

    #[tokio::test]
    async fn boolean_property_default_is_typed() {
        let store = test_support::store();
        let def = FilterDefinition {
            property: Some("promoted".into()),
            default: Some(serde_json::json!(true)),
            ..Default::default()
        };
        let value = crate::config::scalar_to_string(def.default.as_ref().unwrap());
        let QueryOutcome::Conditioned(q) = DefaultFilter
            .filter_query(base_query(&store), &resolved("promoted", def, &value), &store)
            .await
            .unwrap()
        else {
            panic!("expected condition")
        };
        assert_eq!(q.conditions[0].value_type, Some(ValueType::Boolean));
        let rendered = crate::sql::count_ids(&q);
        assert!(rendered.sql.ends_with("WHERE \"node\".\"promoted\" IN ($1)"));
        assert_eq!(rendered.params, vec![crate::sql::PgBindValue::Bool(true)]);
        assert_eq!(store.execute(&q).await.unwrap(), vec![2, 4, 6]);
    }

    #[tokio::test]
    async fn column_override_applies_to_both_phases() {
        let store = test_support::store();
        for (entity_id, delta, value, format) in [(1, 0, "sand", "plain"), (2, 0, "dune", "rich"), (3, 0, "spice", "rich")] {
            store.insert_row(
                "field_data_field_tags",
                serde_json::json!({ "entity_id": entity_id, "delta": delta, "field_tags_value": value, "field_tags_format": format }),
            );
        }
        let def = FilterDefinition {
            field: Some("field_tags".into()),
            column: Some("field_tags_format".into()),
            ..Default::default()
        };

        let QueryOutcome::Conditioned(q) = DefaultFilter
            .filter_query(base_query(&store), &resolved("format", def.clone(), "rich"), &store)
            .await
            .unwrap()
        else {
            panic!("expected condition")
        };
        assert_eq!(q.conditions[0].column, ColumnRef::new("field_tags", "field_tags_format"));
        assert_eq!(q.conditions[0].value_type, None);
        assert_eq!(store.execute(&q).await.unwrap(), vec![2, 3]);

        let QueryOutcome::Deferred(_, descriptor) = DefaultFilter
            .filter_query(base_query(&store), &resolved("format", def, "!rich"), &store)
            .await
            .unwrap()
        else {
            panic!("expected deferral")
        };
        assert_eq!(descriptor.field.storage_column, "field_tags_format");
        let kept = DefaultFilter
            .filter_post_query(&descriptor, vec![1, 2, 3, 4], &store)
            .await
            .unwrap();
        assert_eq!(kept, vec![1, 4]);
    }

    #[tokio::test]
    async fn wildcard_and_empty_leave_query_untouched() {
        let store = test_support::store();
        let def = FilterDefinition {
            property: Some("status".into()),
            ..Default::default()
        };
        for value in ["all", "ALL", ""] {
            let QueryOutcome::Conditioned(q) = DefaultFilter
                .filter_query(base_query(&store), &resolved("status", def.clone(), value), &store)
                .await
                .unwrap()
            else {
                panic!("expected condition")
            };
            assert!(q.conditions.is_empty());
        }
    }

    #[tokio::test]
    async fn field_without_storage_is_config_error() {
        let store = test_support::store();
        let def = FilterDefinition {
            field: Some("field_missing".into()),
            ..Default::default()
        };
        let err = DefaultFilter
            .filter_query(base_query(&store), &resolved("missing", def, "x"), &store)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Config(ConfigError::MissingFieldStorage(_))));
    }

    #[tokio::test]
    async fn comparison_operator_rejects_negation() {
        let store = test_support::store();
        let def = FilterDefinition {
            property: Some("created".into()),
            operator: Some(Operator::Ge),
            ..Default::default()
        };
        let err = DefaultFilter
            .filter_query(base_query(&store), &resolved("since", def, "!100"), &store)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}

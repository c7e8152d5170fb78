//! Renders `Query` values and record lookups to parameterized PostgreSQL.

use super::params::PgBindValue;
use crate::query::{ColumnRef, Condition, Operator, Query, SortDirection};
use crate::store::schema::TaxonomySchema;
use crate::store::{EntityId, FieldMetadata, ValueType};

/// Quote identifier for PostgreSQL (safe: only from config).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn column(c: &ColumnRef) -> String {
    format!("{}.{}", quoted(&c.table), quoted(&c.column))
}

#[derive(Debug, Default)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<PgBindValue>,
}

impl QueryBuf {
    fn push_param(&mut self, v: PgBindValue) -> usize {
        self.params.push(v);
        self.params.len()
    }
}

/// FROM with inner joins plus the WHERE clause, binding condition values into `q`.
fn from_where(query: &Query, q: &mut QueryBuf) -> String {
    let mut sql = format!(" FROM {}", quoted(&query.base_table));
    for join in &query.joins {
        sql.push_str(&format!(
            " INNER JOIN {} {} ON {} = {}",
            quoted(&join.table),
            quoted(&join.alias),
            column(&join.left),
            column(&join.right)
        ));
    }
    let parts: Vec<String> = query.conditions.iter().map(|c| condition(c, q)).collect();
    if !parts.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&parts.join(" AND "));
    }
    sql
}

fn condition(c: &Condition, q: &mut QueryBuf) -> String {
    match &c.value_type {
        Some(value_type) if !value_type.is_textual() && c.operator != Operator::Like => {
            typed_condition(c, value_type, q)
        }
        _ => text_condition(c, q),
    }
}

/// Values bound with the column's own type. A value the type cannot hold never
/// matches, so negative operators only require a non-null column.
fn typed_condition(c: &Condition, value_type: &ValueType, q: &mut QueryBuf) -> String {
    let col = column(&c.column);
    let negative = format!("{} IS NOT NULL", col);
    match c.operator {
        Operator::In | Operator::NotIn => {
            let placeholders: Vec<String> = c
                .values
                .iter()
                .filter_map(|v| value_type.parse_scalar(v))
                .map(|v| format!("${}", q.push_param(v.into())))
                .collect();
            match (placeholders.is_empty(), c.operator) {
                (true, Operator::In) => "FALSE".into(),
                (true, _) => negative,
                (false, op) => format!("{} {} ({})", col, op.as_sql(), placeholders.join(", ")),
            }
        }
        op => match c.values.first().and_then(|v| value_type.parse_scalar(v)) {
            Some(v) => format!("{} {} ${}", col, op.as_sql(), q.push_param(v.into())),
            None if op == Operator::Ne => negative,
            None => "FALSE".into(),
        },
    }
}

fn text_condition(c: &Condition, q: &mut QueryBuf) -> String {
    let col = column(&c.column);
    match c.operator {
        Operator::In | Operator::NotIn => {
            if c.values.is_empty() {
                return if c.operator == Operator::In { "FALSE".into() } else { "TRUE".into() };
            }
            let placeholders: Vec<String> = c
                .values
                .iter()
                .map(|v| format!("${}", q.push_param(v.as_str().into())))
                .collect();
            format!("{}::text {} ({})", col, c.operator.as_sql(), placeholders.join(", "))
        }
        op => {
            let value = c.values.first().map(String::as_str).unwrap_or_default();
            let n = q.push_param(value.into());
            let numeric = matches!(op, Operator::Lt | Operator::Le | Operator::Gt | Operator::Ge)
                && value.trim().parse::<f64>().is_ok();
            if numeric {
                format!("{}::numeric {} ${}::numeric", col, op.as_sql(), n)
            } else {
                format!("{}::text {} ${}", col, op.as_sql(), n)
            }
        }
    }
}

/// Distinct identifiers in query order. Rows fanned out by multi-valued joins are
/// grouped per identifier; ascending keys aggregate with MIN, descending with MAX.
pub fn select_ids(query: &Query) -> QueryBuf {
    let mut q = QueryBuf::default();
    let id = column(&query.id_column());
    let from_where = from_where(query, &mut q);
    let mut order: Vec<String> = query
        .order_by
        .iter()
        .map(|o| match o.direction {
            SortDirection::Asc => format!("MIN({}) ASC", column(&o.column)),
            SortDirection::Desc => format!("MAX({}) DESC", column(&o.column)),
        })
        .collect();
    order.push(format!("{} ASC", id));
    q.sql = format!(
        "SELECT {}::bigint AS \"id\"{} GROUP BY {} ORDER BY {}",
        id,
        from_where,
        id,
        order.join(", ")
    );
    if let Some(range) = query.range {
        q.sql.push_str(&format!(" LIMIT {} OFFSET {}", range.limit, range.offset));
    }
    q
}

pub fn count_ids(query: &Query) -> QueryBuf {
    let mut q = QueryBuf::default();
    let from_where = from_where(query, &mut q);
    q.sql = format!(
        "SELECT COUNT(DISTINCT {}) AS \"count\"{}",
        column(&query.id_column()),
        from_where
    );
    q
}

/// Base-table rows as JSON objects, keyed by `id`.
pub fn select_rows(table: &str, id_key: &str, ids: &[EntityId]) -> QueryBuf {
    let mut q = QueryBuf::default();
    let n = q.push_param(ids.into());
    q.sql = format!(
        "SELECT t.{}::bigint AS \"id\", row_to_json(t) AS \"row\" FROM {} t WHERE t.{} = ANY(${})",
        quoted(id_key),
        quoted(table),
        quoted(id_key),
        n
    );
    q
}

pub fn select_field_items(field: &FieldMetadata, ids: &[EntityId]) -> QueryBuf {
    let mut q = QueryBuf::default();
    let n = q.push_param(ids.into());
    q.sql = format!(
        "SELECT \"entity_id\"::bigint AS \"entity_id\", to_jsonb({}) AS \"value\" FROM {} WHERE \"entity_id\" = ANY(${}) ORDER BY \"entity_id\", \"delta\"",
        quoted(&field.storage_column),
        quoted(&field.storage_table),
        n
    );
    q
}

fn term_object(tax: &TaxonomySchema) -> String {
    format!(
        "json_build_object('tid', t.{}, 'vocabulary', t.{}, 'name', t.\"name\", 'description', COALESCE(t.\"description\", ''), 'weight', COALESCE(t.\"weight\", 0)) AS \"term\"",
        quoted(&tax.id_column),
        quoted(&tax.vocabulary_column)
    )
}

pub fn select_terms(tax: &TaxonomySchema, tids: &[EntityId]) -> QueryBuf {
    let mut q = QueryBuf::default();
    let n = q.push_param(tids.into());
    q.sql = format!(
        "SELECT {} FROM {} t WHERE t.{} = ANY(${})",
        term_object(tax),
        quoted(&tax.table),
        quoted(&tax.id_column),
        n
    );
    q
}

/// Case-insensitive name match within one vocabulary.
pub fn select_terms_by_name(tax: &TaxonomySchema, name: &str, vocabulary: &str) -> QueryBuf {
    let mut q = QueryBuf::default();
    let name_param = q.push_param(name.into());
    let vocabulary_param = q.push_param(vocabulary.into());
    q.sql = format!(
        "SELECT {} FROM {} t WHERE LOWER(t.\"name\") = LOWER(${}) AND t.{} = ${}",
        term_object(tax),
        quoted(&tax.table),
        name_param,
        quoted(&tax.vocabulary_column),
        vocabulary_param
    );
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::EntityInfo;
    use pretty_assertions::assert_eq;

    fn node() -> Query {
        Query::select(&EntityInfo {
            entity_type: "node".into(),
            base_table: "node".into(),
            id_key: "nid".into(),
            bundle_key: Some("type".into()),
        })
    }

    #[test]
    fn select_ids_groups_joined_rows() {
        let q = node()
            .condition(ColumnRef::new("node", "type"), Operator::In, vec!["article".into()])
            .join_entity_table("field_data_field_genres", "field_genres")
            .condition(
                ColumnRef::new("field_genres", "field_genres_tid"),
                Operator::NotIn,
                vec!["3".into(), "9".into()],
            )
            .order_by(ColumnRef::new("node", "created"), SortDirection::Desc)
            .range(10, 5);
        let buf = select_ids(&q);
        assert_eq!(
            buf.sql,
            "SELECT \"node\".\"nid\"::bigint AS \"id\" FROM \"node\" \
             INNER JOIN \"field_data_field_genres\" \"field_genres\" ON \"field_genres\".\"entity_id\" = \"node\".\"nid\" \
             WHERE \"node\".\"type\"::text IN ($1) AND \"field_genres\".\"field_genres_tid\"::text NOT IN ($2, $3) \
             GROUP BY \"node\".\"nid\" ORDER BY MAX(\"node\".\"created\") DESC, \"node\".\"nid\" ASC LIMIT 5 OFFSET 10"
        );
        assert_eq!(
            buf.params,
            vec![
                PgBindValue::Text("article".into()),
                PgBindValue::Text("3".into()),
                PgBindValue::Text("9".into())
            ]
        );
    }

    #[test]
    fn count_ignores_order_and_range() {
        let q = node()
            .order_by(ColumnRef::new("node", "created"), SortDirection::Asc)
            .range(0, 5);
        let buf = count_ids(&q.count_query());
        assert_eq!(buf.sql, "SELECT COUNT(DISTINCT \"node\".\"nid\") AS \"count\" FROM \"node\"");
        assert!(buf.params.is_empty());
    }

    #[test]
    fn numeric_comparison_casts_both_sides() {
        let q = node().condition(ColumnRef::new("node", "created"), Operator::Ge, vec!["300".into()]);
        let buf = count_ids(&q);
        assert!(buf.sql.ends_with("WHERE \"node\".\"created\"::numeric >= $1::numeric"));
        let q = node().condition(ColumnRef::new("node", "title"), Operator::Like, vec!["Du%".into()]);
        assert!(count_ids(&q).sql.ends_with("WHERE \"node\".\"title\"::text LIKE $1"));
    }

    #[test]
    fn boolean_and_integer_columns_bind_typed_values() {
        let q = node()
            .typed_condition(ColumnRef::new("node", "promoted"), Operator::In, vec!["1".into()], Some(ValueType::Boolean))
            .typed_condition(ColumnRef::new("node", "status"), Operator::Eq, vec!["1".into()], Some(ValueType::Integer))
            .typed_condition(ColumnRef::new("node", "nid"), Operator::Ge, vec!["3".into()], Some(ValueType::Integer));
        let buf = count_ids(&q);
        assert_eq!(
            buf.sql,
            "SELECT COUNT(DISTINCT \"node\".\"nid\") AS \"count\" FROM \"node\" \
             WHERE \"node\".\"promoted\" IN ($1) AND \"node\".\"status\" = $2 AND \"node\".\"nid\" >= $3"
        );
        assert_eq!(
            buf.params,
            vec![PgBindValue::Bool(true), PgBindValue::BigInt(1), PgBindValue::BigInt(3)]
        );
    }

    #[test]
    fn values_a_typed_column_cannot_hold_never_match() {
        let q = node().typed_condition(
            ColumnRef::new("node", "promoted"),
            Operator::In,
            vec!["maybe".into(), "false".into()],
            Some(ValueType::Boolean),
        );
        let buf = count_ids(&q);
        assert!(buf.sql.ends_with("WHERE \"node\".\"promoted\" IN ($1)"));
        assert_eq!(buf.params, vec![PgBindValue::Bool(false)]);

        let q = node().typed_condition(ColumnRef::new("node", "status"), Operator::In, vec!["x".into()], Some(ValueType::Integer));
        assert!(count_ids(&q).sql.ends_with("WHERE FALSE"));
        let q = node().typed_condition(ColumnRef::new("node", "status"), Operator::NotIn, vec!["x".into()], Some(ValueType::Integer));
        assert!(count_ids(&q).sql.ends_with("WHERE \"node\".\"status\" IS NOT NULL"));
        assert!(count_ids(&q).params.is_empty());
    }

    #[test]
    fn textual_types_keep_text_comparison() {
        let q = node().typed_condition(ColumnRef::new("node", "created"), Operator::Ge, vec!["300".into()], Some(ValueType::Date));
        assert!(count_ids(&q).sql.ends_with("WHERE \"node\".\"created\"::numeric >= $1::numeric"));
    }

    #[test]
    fn identifiers_are_quoted() {
        let buf = select_rows("we\"ird", "id", &[1, 2]);
        assert!(buf.sql.contains("FROM \"we\"\"ird\" t"));
        assert_eq!(buf.params, vec![PgBindValue::BigIntArray(vec![1, 2])]);
    }
}

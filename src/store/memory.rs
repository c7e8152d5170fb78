//! In-process entity store evaluating `Query` values over named row tables.

use super::{value_to_id, EntityId, EntityStore, FieldMetadata, Record, StoreSchema, Term, TypedScalar};
use crate::config::scalar_to_string;
use crate::error::StoreError;
use crate::query::{ColumnRef, Condition, Join, Operator, Query, SortDirection};
use async_trait::async_trait;
use indexmap::IndexMap;
use regex::Regex;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

type Row = Map<String, Value>;

pub struct MemoryEntityStore {
    schema: StoreSchema,
    tables: RwLock<HashMap<String, Vec<Row>>>,
    terms: RwLock<Vec<Term>>,
}

impl MemoryEntityStore {
    pub fn new(schema: StoreSchema) -> Self {
        MemoryEntityStore {
            schema,
            tables: RwLock::new(HashMap::new()),
            terms: RwLock::new(Vec::new()),
        }
    }

    /// Append a row to `table`. Non-object values are ignored.
    pub fn insert_row(&self, table: &str, row: Value) {
        let Value::Object(row) = row else {
            tracing::warn!(table, "ignoring non-object row");
            return;
        };
        self.tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(table.to_string())
            .or_default()
            .push(row);
    }

    /// Store the items of `field` for one entity in its storage table, one row per delta.
    pub fn insert_field_items(&self, field: &str, entity_id: EntityId, items: Vec<Value>) {
        let Some(meta) = self.schema.field_metadata(field) else {
            tracing::warn!(field, "ignoring items for field without storage metadata");
            return;
        };
        for (delta, item) in items.into_iter().enumerate() {
            let mut row = Row::new();
            row.insert("entity_id".into(), Value::from(entity_id));
            row.insert("delta".into(), Value::from(delta));
            row.insert(meta.storage_column.clone(), item);
            self.insert_row(&meta.storage_table, Value::Object(row));
        }
    }

    pub fn insert_term(&self, term: Term) {
        self.terms.write().unwrap_or_else(PoisonError::into_inner).push(term);
    }

    /// Identifiers matching `query` in query order, before ranging.
    fn evaluate(&self, query: &Query) -> Result<Vec<EntityId>, StoreError> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        let empty = Vec::new();
        let base_rows = tables.get(&query.base_table).unwrap_or(&empty);

        let mut tuples: Vec<HashMap<&str, &Row>> = base_rows
            .iter()
            .map(|row| HashMap::from([(query.base_table.as_str(), row)]))
            .collect();
        for join in &query.joins {
            let rows = tables.get(&join.table).unwrap_or(&empty);
            tuples = tuples
                .into_iter()
                .flat_map(|tuple| {
                    rows.iter()
                        .filter(|row| join_matches(join, &tuple, row))
                        .map(|row| {
                            let mut next = tuple.clone();
                            next.insert(join.alias.as_str(), row);
                            next
                        })
                        .collect::<Vec<_>>()
                })
                .collect();
        }

        // Per identifier: first-seen position and the tuples that matched.
        let mut groups: IndexMap<EntityId, Vec<HashMap<&str, &Row>>> = IndexMap::new();
        for tuple in tuples {
            if !query.conditions.iter().all(|c| condition_matches(c, &tuple)) {
                continue;
            }
            let Some(id) = tuple
                .get(query.base_table.as_str())
                .and_then(|row| row.get(&query.id_key))
                .and_then(value_to_id)
            else {
                continue;
            };
            groups.entry(id).or_default().push(tuple);
        }

        // Ascending keys aggregate with MIN, descending with MAX, matching the SQL rendering.
        let mut keyed: Vec<(EntityId, Vec<Value>)> = groups
            .into_iter()
            .map(|(id, tuples)| {
                let keys = query
                    .order_by
                    .iter()
                    .map(|o| {
                        let values = tuples.iter().map(|t| cell(t, &o.column));
                        let pick = match o.direction {
                            SortDirection::Asc => values.min_by(|a, b| compare_values(a, b)),
                            SortDirection::Desc => values.max_by(|a, b| compare_values(a, b)),
                        };
                        pick.unwrap_or(Value::Null)
                    })
                    .collect();
                (id, keys)
            })
            .collect();
        keyed.sort_by(|(a_id, a), (b_id, b)| {
            query
                .order_by
                .iter()
                .zip(a.iter().zip(b.iter()))
                .map(|(o, (x, y))| match o.direction {
                    SortDirection::Asc => compare_values(x, y),
                    SortDirection::Desc => compare_values(y, x),
                })
                .find(|ord| *ord != Ordering::Equal)
                .unwrap_or_else(|| a_id.cmp(b_id))
        });
        Ok(keyed.into_iter().map(|(id, _)| id).collect())
    }

    fn items_for(&self, field: &FieldMetadata, id: EntityId) -> Vec<Value> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        let mut rows: Vec<&Row> = tables
            .get(&field.storage_table)
            .map(|rows| {
                rows.iter()
                    .filter(|r| r.get("entity_id").and_then(value_to_id) == Some(id))
                    .collect()
            })
            .unwrap_or_default();
        rows.sort_by_key(|r| r.get("delta").and_then(Value::as_i64).unwrap_or(0));
        rows.into_iter()
            .filter_map(|r| r.get(&field.storage_column).cloned())
            .collect()
    }
}

fn cell(tuple: &HashMap<&str, &Row>, column: &ColumnRef) -> Value {
    tuple
        .get(column.table.as_str())
        .and_then(|row| row.get(&column.column))
        .cloned()
        .unwrap_or(Value::Null)
}

fn join_matches(join: &Join, tuple: &HashMap<&str, &Row>, row: &Row) -> bool {
    let (own, other) = if join.left.table == join.alias {
        (&join.left, &join.right)
    } else {
        (&join.right, &join.left)
    };
    match (row.get(&own.column), tuple.get(other.table.as_str()).and_then(|r| r.get(&other.column))) {
        (Some(a), Some(b)) if !a.is_null() && !b.is_null() => scalar_eq(a, &scalar_to_string(b)),
        _ => false,
    }
}

fn condition_matches(condition: &Condition, tuple: &HashMap<&str, &Row>) -> bool {
    let value = cell(tuple, &condition.column);
    if value.is_null() {
        return false;
    }
    let wanted = wanted_values(condition);
    let Some(first) = wanted.first() else {
        return matches!(condition.operator, Operator::NotIn | Operator::Ne);
    };
    match condition.operator {
        Operator::In => wanted.iter().any(|v| scalar_eq(&value, v)),
        Operator::NotIn => !wanted.iter().any(|v| scalar_eq(&value, v)),
        Operator::Eq => scalar_eq(&value, first),
        Operator::Ne => !scalar_eq(&value, first),
        Operator::Lt => compare_values(&value, &Value::String(first.clone())) == Ordering::Less,
        Operator::Le => compare_values(&value, &Value::String(first.clone())) != Ordering::Greater,
        Operator::Gt => compare_values(&value, &Value::String(first.clone())) == Ordering::Greater,
        Operator::Ge => compare_values(&value, &Value::String(first.clone())) != Ordering::Less,
        Operator::Like => like_regex(first).is_some_and(|re| re.is_match(&scalar_to_string(&value))),
    }
}

/// Condition values in comparable form. For typed columns a value the type cannot
/// hold is dropped, matching the SQL rendering.
fn wanted_values(condition: &Condition) -> Vec<String> {
    match &condition.value_type {
        Some(t) if !t.is_textual() && condition.operator != Operator::Like => match condition.operator {
            Operator::In | Operator::NotIn => condition
                .values
                .iter()
                .filter_map(|v| t.parse_scalar(v))
                .map(TypedScalar::to_text)
                .collect(),
            _ => condition
                .values
                .first()
                .and_then(|v| t.parse_scalar(v))
                .map(TypedScalar::to_text)
                .into_iter()
                .collect(),
        },
        _ => condition.values.clone(),
    }
}

fn as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn scalar_eq(value: &Value, wanted: &str) -> bool {
    match (as_number(value), wanted.trim().parse::<f64>()) {
        (Some(a), Ok(b)) => a == b,
        _ => scalar_to_string(value) == wanted,
    }
}

/// Numeric when both sides are numeric, textual otherwise; nulls sort last.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        _ => {}
    }
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => scalar_to_string(a).cmp(&scalar_to_string(b)),
    }
}

/// SQL `LIKE` pattern (`%`, `_`) as an anchored regex.
fn like_regex(pattern: &str) -> Option<Regex> {
    let mut re = String::from("^");
    for ch in pattern.chars() {
        match ch {
            '%' => re.push_str(".*"),
            '_' => re.push('.'),
            c => re.push_str(&regex::escape(&c.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).ok()
}

#[async_trait]
impl EntityStore for MemoryEntityStore {
    fn schema(&self) -> &StoreSchema {
        &self.schema
    }

    async fn execute(&self, query: &Query) -> Result<Vec<EntityId>, StoreError> {
        let ids = self.evaluate(query)?;
        Ok(match query.range {
            Some(range) => ids
                .into_iter()
                .skip(range.offset as usize)
                .take(range.limit as usize)
                .collect(),
            None => ids,
        })
    }

    async fn count(&self, query: &Query) -> Result<u64, StoreError> {
        Ok(self.evaluate(&query.count_query())?.len() as u64)
    }

    async fn load_records(
        &self,
        entity_type: &str,
        ids: &[EntityId],
    ) -> Result<IndexMap<EntityId, Record>, StoreError> {
        let info = self
            .entity_info(entity_type)
            .ok_or_else(|| StoreError::UnknownEntityType(entity_type.to_string()))?;
        let fields = self.schema.attached_fields(entity_type);
        let rows: HashMap<EntityId, Row> = {
            let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
            tables
                .get(&info.base_table)
                .map(|rows| {
                    rows.iter()
                        .filter_map(|r| r.get(&info.id_key).and_then(value_to_id).map(|id| (id, r.clone())))
                        .filter(|(id, _)| ids.contains(id))
                        .collect()
                })
                .unwrap_or_default()
        };

        let mut out = IndexMap::with_capacity(ids.len());
        for id in ids {
            let Some(properties) = rows.get(id) else { continue };
            let fields = fields
                .iter()
                .map(|f| (f.name.clone(), self.items_for(f, *id)))
                .collect();
            out.insert(
                *id,
                Record {
                    entity_type: entity_type.to_string(),
                    id: *id,
                    properties: properties.clone(),
                    fields,
                },
            );
        }
        Ok(out)
    }

    async fn field_values(
        &self,
        field: &FieldMetadata,
        ids: &[EntityId],
    ) -> Result<HashMap<EntityId, Vec<Value>>, StoreError> {
        Ok(ids.iter().map(|id| (*id, self.items_for(field, *id))).collect())
    }

    async fn load_terms(&self, tids: &[EntityId]) -> Result<Vec<Term>, StoreError> {
        let terms = self.terms.read().unwrap_or_else(PoisonError::into_inner);
        Ok(terms.iter().filter(|t| tids.contains(&t.tid)).cloned().collect())
    }

    async fn terms_by_name(&self, name: &str, vocabulary: &str) -> Result<Vec<Term>, StoreError> {
        let terms = self.terms.read().unwrap_or_else(PoisonError::into_inner);
        Ok(terms
            .iter()
            .filter(|t| t.vocabulary == vocabulary && t.name.eq_ignore_ascii_case(name))
            .cloned()
            .collect())
    }
}

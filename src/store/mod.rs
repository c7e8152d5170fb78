//! Entity store seam: metadata, query execution and record loading.

mod memory;
mod postgres;
pub mod schema;

pub use memory::MemoryEntityStore;
pub use postgres::PgEntityStore;
pub use schema::StoreSchema;

use crate::error::StoreError;
use crate::query::Query;
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

pub type EntityId = i64;

/// Declared type of a property or field value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Integer,
    Decimal,
    Text,
    Boolean,
    Date,
    TermReference,
    Json,
}

impl ValueType {
    /// Scalar value emitted in place of an empty one so output shape stays stable.
    pub fn empty_value(&self) -> Value {
        match self {
            ValueType::Integer | ValueType::Date | ValueType::TermReference => Value::from(0),
            ValueType::Decimal => Value::from(0.0),
            ValueType::Text => Value::String(String::new()),
            ValueType::Boolean => Value::Bool(false),
            ValueType::Json => Value::Object(Map::new()),
        }
    }

    /// Dates and JSON compare in their textual form.
    pub fn is_textual(&self) -> bool {
        matches!(self, ValueType::Text | ValueType::Date | ValueType::Json)
    }

    /// Condition value parsed for a column of this type. `None` for textual types and
    /// for values the type cannot hold.
    pub fn parse_scalar(&self, raw: &str) -> Option<TypedScalar> {
        let raw = raw.trim();
        match self {
            ValueType::Boolean => parse_bool(raw).map(TypedScalar::Bool),
            ValueType::Integer | ValueType::TermReference => raw.parse().ok().map(TypedScalar::Int),
            ValueType::Decimal => raw.parse::<f64>().ok().filter(|f| f.is_finite()).map(TypedScalar::Float),
            ValueType::Text | ValueType::Date | ValueType::Json => None,
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

/// A condition value typed for a non-textual column.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TypedScalar {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl TypedScalar {
    /// Canonical text form; booleans render as `1`/`0` like configured scalars.
    pub fn to_text(self) -> String {
        match self {
            TypedScalar::Bool(b) => String::from(if b { "1" } else { "0" }),
            TypedScalar::Int(n) => n.to_string(),
            TypedScalar::Float(f) => f.to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldCardinality {
    #[default]
    Single,
    Multiple,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldMetadata {
    pub name: String,
    pub cardinality: FieldCardinality,
    pub value_type: ValueType,
    pub storage_table: String,
    pub storage_column: String,
    pub vocabulary: Option<String>,
}

impl FieldMetadata {
    pub fn is_multi_valued(&self) -> bool {
        self.cardinality == FieldCardinality::Multiple
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct EntityInfo {
    pub entity_type: String,
    pub base_table: String,
    pub id_key: String,
    pub bundle_key: Option<String>,
}

/// One loaded record: base-table properties plus the items of each attached field.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub entity_type: String,
    pub id: EntityId,
    pub properties: Map<String, Value>,
    pub fields: IndexMap<String, Vec<Value>>,
}

impl Record {
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn field_items(&self, key: &str) -> &[Value] {
        self.fields.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Value of a field shaped by its cardinality: a sequence for multi-valued fields,
    /// the first item (or null) otherwise.
    pub fn field_value(&self, field: &FieldMetadata) -> Value {
        let items = self.field_items(&field.name);
        if field.is_multi_valued() {
            Value::Array(items.to_vec())
        } else {
            items.first().cloned().unwrap_or(Value::Null)
        }
    }

    /// Unformatted representation used when no mapping applies.
    pub fn to_value(&self) -> Value {
        let mut out = self.properties.clone();
        for (name, items) in &self.fields {
            out.insert(name.clone(), Value::Array(items.clone()));
        }
        Value::Object(out)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Term {
    pub tid: EntityId,
    pub vocabulary: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub weight: i64,
}

/// Backend holding the records a route exposes.
#[async_trait]
pub trait EntityStore: Send + Sync {
    fn schema(&self) -> &StoreSchema;

    fn entity_info(&self, entity_type: &str) -> Option<EntityInfo> {
        self.schema().entity_info(entity_type)
    }

    fn field_metadata(&self, field: &str) -> Option<FieldMetadata> {
        self.schema().field_metadata(field)
    }

    fn property_type(&self, entity_type: &str, property: &str) -> Option<ValueType> {
        self.schema().property_type(entity_type, property)
    }

    /// Distinct identifiers of the base table matching the query, in query order.
    async fn execute(&self, query: &Query) -> Result<Vec<EntityId>, StoreError>;

    /// Distinct matching identifiers, ignoring ordering and range.
    async fn count(&self, query: &Query) -> Result<u64, StoreError>;

    async fn load_records(
        &self,
        entity_type: &str,
        ids: &[EntityId],
    ) -> Result<IndexMap<EntityId, Record>, StoreError>;

    async fn field_values(
        &self,
        field: &FieldMetadata,
        ids: &[EntityId],
    ) -> Result<HashMap<EntityId, Vec<Value>>, StoreError>;

    async fn load_terms(&self, tids: &[EntityId]) -> Result<Vec<Term>, StoreError>;

    async fn terms_by_name(&self, name: &str, vocabulary: &str) -> Result<Vec<Term>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Loose JSON-to-identifier conversion; ids arrive as numbers or numeric strings.
pub fn value_to_id(v: &Value) -> Option<EntityId> {
    match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

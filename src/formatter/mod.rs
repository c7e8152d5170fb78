//! Formatters turn one property or field of a loaded record into its output value.

mod base;
mod field;
mod property;
mod taxonomy;

pub use base::BaseFormatter;
pub use field::FieldFormatter;
pub use property::PropertyFormatter;
pub use taxonomy::TaxonomyFormatter;

use crate::error::AppError;
use crate::request::Variables;
use crate::store::{EntityStore, Record};
use async_trait::async_trait;
use serde_json::Value;

pub struct FormatContext<'a> {
    pub record: &'a Record,
    pub key: &'a str,
    pub store: &'a dyn EntityStore,
    pub variables: &'a Variables,
}

#[async_trait]
pub trait Formatter: Send + Sync {
    async fn format(&self, ctx: &FormatContext<'_>) -> Result<Value, AppError>;
}

/// Absent data: null, empty string, empty sequence or empty object.
pub fn is_empty_value(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

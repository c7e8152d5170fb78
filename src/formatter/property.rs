use super::{is_empty_value, FormatContext, Formatter};
use crate::error::AppError;
use async_trait::async_trait;
use serde_json::Value;

/// Base-table property passed through verbatim; empty values become the typed empty default.
pub struct PropertyFormatter;

#[async_trait]
impl Formatter for PropertyFormatter {
    async fn format(&self, ctx: &FormatContext<'_>) -> Result<Value, AppError> {
        match ctx.record.property(ctx.key) {
            Some(Value::Array(items)) if items.is_empty() => Ok(Value::Array(Vec::new())),
            Some(v) if !is_empty_value(v) => Ok(v.clone()),
            _ => Ok(ctx
                .store
                .property_type(&ctx.record.entity_type, ctx.key)
                .map(|t| t.empty_value())
                .unwrap_or_else(|| Value::from(0))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatter::tests::{record, run, store};
    use serde_json::json;

    #[tokio::test]
    async fn passes_value_through() {
        let store = store();
        let r = record(json!({ "title": "Dune", "created": 100 }), &[]);
        assert_eq!(run(&PropertyFormatter, &store, &r, "title").await, json!("Dune"));
        assert_eq!(run(&PropertyFormatter, &store, &r, "created").await, json!(100));
    }

    #[tokio::test]
    async fn empty_values_get_typed_defaults() {
        let store = store();
        let r = record(json!({ "title": "", "promoted": null, "legacy": [] }), &[]);
        assert_eq!(run(&PropertyFormatter, &store, &r, "title").await, json!(""));
        assert_eq!(run(&PropertyFormatter, &store, &r, "promoted").await, json!(false));
        assert_eq!(run(&PropertyFormatter, &store, &r, "legacy").await, json!([]));
        assert_eq!(run(&PropertyFormatter, &store, &r, "undeclared").await, json!(0));
    }
}

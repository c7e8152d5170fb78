use super::{is_empty_value, FormatContext, Formatter};
use crate::error::AppError;
use crate::store::ValueType;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

/// Default formatter: resolves value and declared type, coerces dates to epoch seconds
/// and substitutes empty values by cardinality and type.
pub struct BaseFormatter;

#[async_trait]
impl Formatter for BaseFormatter {
    async fn format(&self, ctx: &FormatContext<'_>) -> Result<Value, AppError> {
        let (value, value_type, multi) = match ctx.store.field_metadata(ctx.key) {
            Some(field) => (ctx.record.field_value(&field), Some(field.value_type.clone()), field.is_multi_valued()),
            None => (
                ctx.record.property(ctx.key).cloned().unwrap_or(Value::Null),
                ctx.store.property_type(&ctx.record.entity_type, ctx.key),
                false,
            ),
        };
        if is_empty_value(&value) {
            return Ok(if multi {
                Value::Array(Vec::new())
            } else {
                value_type
                    .map(|t| t.empty_value())
                    .unwrap_or_else(|| Value::String(String::new()))
            });
        }
        Ok(match value_type {
            Some(ValueType::Date) => coerce_dates(value),
            _ => value,
        })
    }
}

fn coerce_dates(value: Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.into_iter().map(coerce_dates).collect()),
        Value::String(s) => match to_epoch(&s) {
            Some(ts) => Value::from(ts),
            None => Value::String(s),
        },
        other => other,
    }
}

/// Epoch seconds from a numeric string, RFC 3339, `Y-m-d H:M:S` or `Y-m-d`.
fn to_epoch(s: &str) -> Option<i64> {
    let s = s.trim();
    if let Ok(n) = s.parse::<i64>() {
        return Some(n);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.and_utc().timestamp());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatter::tests::{record, run, store};
    use serde_json::json;

    #[tokio::test]
    async fn dates_become_epoch_integers() {
        let store = store();
        let r = record(
            json!({ "created": "1970-01-02T00:00:00Z" }),
            &[("field_published", vec![json!("1970-01-01 00:01:00")])],
        );
        assert_eq!(run(&BaseFormatter, &store, &r, "created").await, json!(86_400));
        assert_eq!(run(&BaseFormatter, &store, &r, "field_published").await, json!(60));
    }

    #[tokio::test]
    async fn empty_values_follow_cardinality() {
        let store = store();
        let r = record(json!({ "title": null }), &[]);
        assert_eq!(run(&BaseFormatter, &store, &r, "field_tags").await, json!([]));
        assert_eq!(run(&BaseFormatter, &store, &r, "field_published").await, json!(0));
        assert_eq!(run(&BaseFormatter, &store, &r, "field_subtitle").await, json!(""));
        assert_eq!(run(&BaseFormatter, &store, &r, "title").await, json!(""));
    }

    #[tokio::test]
    async fn other_values_pass_through() {
        let store = store();
        let r = record(json!({ "title": "Dune" }), &[("field_tags", vec![json!("sand")])]);
        assert_eq!(run(&BaseFormatter, &store, &r, "title").await, json!("Dune"));
        assert_eq!(run(&BaseFormatter, &store, &r, "field_tags").await, json!(["sand"]));
    }

    #[test]
    fn epoch_parsing() {
        assert_eq!(to_epoch("1970-01-01"), Some(0));
        assert_eq!(to_epoch("12345"), Some(12345));
        assert_eq!(to_epoch("yesterday"), None);
    }
}

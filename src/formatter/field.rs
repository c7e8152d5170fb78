use super::{FormatContext, Formatter};
use crate::error::AppError;
use async_trait::async_trait;
use serde_json::Value;

/// Field value resolved through entity metadata, without transformation.
pub struct FieldFormatter;

#[async_trait]
impl Formatter for FieldFormatter {
    async fn format(&self, ctx: &FormatContext<'_>) -> Result<Value, AppError> {
        Ok(match ctx.store.field_metadata(ctx.key) {
            Some(field) => ctx.record.field_value(&field),
            None => ctx.record.property(ctx.key).cloned().unwrap_or(Value::Null),
        })
    }
}

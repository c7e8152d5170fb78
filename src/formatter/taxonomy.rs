use super::{FormatContext, Formatter};
use crate::error::AppError;
use crate::store::value_to_id;
use async_trait::async_trait;
use serde_json::{json, Map, Value};

/// Term-reference field expanded to `{ tid: { name, description, order } }`.
pub struct TaxonomyFormatter;

#[async_trait]
impl Formatter for TaxonomyFormatter {
    async fn format(&self, ctx: &FormatContext<'_>) -> Result<Value, AppError> {
        let tids: Vec<_> = ctx
            .record
            .field_items(ctx.key)
            .iter()
            .filter_map(value_to_id)
            .collect();
        let mut out = Map::new();
        if tids.is_empty() {
            return Ok(Value::Object(out));
        }
        let terms = ctx.store.load_terms(&tids).await?;
        for tid in tids {
            if let Some(term) = terms.iter().find(|t| t.tid == tid) {
                out.insert(
                    tid.to_string(),
                    json!({
                        "name": term.name,
                        "description": term.description,
                        "order": term.weight,
                    }),
                );
            }
        }
        Ok(Value::Object(out))
    }
}

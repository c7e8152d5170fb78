//! PostgreSQL entity store (sqlx).

use super::{EntityId, EntityStore, FieldMetadata, Record, StoreSchema, Term};
use crate::error::StoreError;
use crate::query::Query;
use crate::sql::{self, QueryBuf};
use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::collections::HashMap;

pub struct PgEntityStore {
    pool: PgPool,
    schema: StoreSchema,
}

impl PgEntityStore {
    pub fn new(pool: PgPool, schema: StoreSchema) -> Self {
        PgEntityStore { pool, schema }
    }

    pub async fn connect(database_url: &str, schema: StoreSchema) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool, schema))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_all(&self, q: &QueryBuf) -> Result<Vec<PgRow>, StoreError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(p.clone());
        }
        Ok(query.fetch_all(&self.pool).await?)
    }

    async fn fetch_terms(&self, q: &QueryBuf) -> Result<Vec<Term>, StoreError> {
        self.fetch_all(q)
            .await?
            .iter()
            .map(|row| {
                let term: Value = row.try_get("term")?;
                serde_json::from_value(term).map_err(|e| StoreError::Backend(format!("term row: {}", e)))
            })
            .collect()
    }
}

#[async_trait]
impl EntityStore for PgEntityStore {
    fn schema(&self) -> &StoreSchema {
        &self.schema
    }

    async fn execute(&self, query: &Query) -> Result<Vec<EntityId>, StoreError> {
        let rows = self.fetch_all(&sql::select_ids(query)).await?;
        rows.iter()
            .map(|row| row.try_get::<i64, _>("id").map_err(StoreError::from))
            .collect()
    }

    async fn count(&self, query: &Query) -> Result<u64, StoreError> {
        let q = sql::count_ids(&query.count_query());
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query_scalar::<_, i64>(&q.sql);
        for p in &q.params {
            query = query.bind(p.clone());
        }
        let n = query.fetch_one(&self.pool).await?;
        Ok(n.max(0) as u64)
    }

    async fn load_records(
        &self,
        entity_type: &str,
        ids: &[EntityId],
    ) -> Result<IndexMap<EntityId, Record>, StoreError> {
        let info = self
            .entity_info(entity_type)
            .ok_or_else(|| StoreError::UnknownEntityType(entity_type.to_string()))?;
        if ids.is_empty() {
            return Ok(IndexMap::new());
        }
        let mut by_id: HashMap<EntityId, Map<String, Value>> = HashMap::with_capacity(ids.len());
        for row in self.fetch_all(&sql::select_rows(&info.base_table, &info.id_key, ids)).await? {
            let id: i64 = row.try_get("id")?;
            if let Value::Object(properties) = row.try_get::<Value, _>("row")? {
                by_id.insert(id, properties);
            }
        }

        let mut items_by_field = Vec::new();
        for field in self.schema.attached_fields(entity_type) {
            let items = self.field_values(&field, ids).await?;
            items_by_field.push((field.name, items));
        }

        let mut out = IndexMap::with_capacity(by_id.len());
        for id in ids {
            let Some(properties) = by_id.remove(id) else { continue };
            let fields = items_by_field
                .iter()
                .map(|(name, items)| (name.clone(), items.get(id).cloned().unwrap_or_default()))
                .collect();
            out.insert(
                *id,
                Record {
                    entity_type: entity_type.to_string(),
                    id: *id,
                    properties,
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
        let mut out: HashMap<EntityId, Vec<Value>> = HashMap::new();
        if ids.is_empty() {
            return Ok(out);
        }
        for row in self.fetch_all(&sql::select_field_items(field, ids)).await? {
            let id: i64 = row.try_get("entity_id")?;
            let value: Option<Value> = row.try_get("value")?;
            out.entry(id).or_default().push(value.unwrap_or(Value::Null));
        }
        Ok(out)
    }

    async fn load_terms(&self, tids: &[EntityId]) -> Result<Vec<Term>, StoreError> {
        if tids.is_empty() {
            return Ok(Vec::new());
        }
        self.fetch_terms(&sql::select_terms(&self.schema.taxonomy, tids)).await
    }

    async fn terms_by_name(&self, name: &str, vocabulary: &str) -> Result<Vec<Term>, StoreError> {
        self.fetch_terms(&sql::select_terms_by_name(&self.schema.taxonomy, name, vocabulary))
            .await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

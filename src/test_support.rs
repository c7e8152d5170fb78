//! Shared fixtures for unit tests.

use crate::error::StoreError;
use crate::query::Query;
use crate::store::{EntityId, EntityStore, FieldMetadata, MemoryEntityStore, Record, StoreSchema, Term};
use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

pub(crate) const SCHEMA: &str = r#"
entities:
  node:
    base_table: node
    id_key: nid
    bundle_key: type
    properties:
      nid: integer
      type: text
      title: text
      status: integer
      created: date
      promoted: boolean
    fields: [field_genres, field_tags, field_subtitle, field_published, field_rating]
fields:
  field_genres:
    cardinality: multiple
    type: term_reference
    vocabulary: genres
  field_tags:
    cardinality: multiple
    type: text
  field_subtitle:
    type: text
  field_published:
    type: date
  field_rating:
    type: integer
"#;

pub(crate) fn schema() -> StoreSchema {
    StoreSchema::from_yaml_str(SCHEMA).unwrap()
}

/// Six nodes: articles 1 to 5 (5 unpublished) and page 6, created at `nid * 100`.
pub(crate) fn store() -> MemoryEntityStore {
    let store = MemoryEntityStore::new(schema());
    for (tid, name, description, weight) in [(7, "Fiction", "Made up", 2), (3, "Poetry", "", 0), (9, "History", "", 1)] {
        store.insert_term(Term {
            tid,
            vocabulary: "genres".into(),
            name: name.into(),
            description: description.into(),
            weight,
        });
    }
    let nodes = [
        (1, "article", 1, vec![7], vec!["sand"], Some(5)),
        (2, "article", 1, vec![3], vec![], Some(3)),
        (3, "article", 1, vec![7, 3], vec!["spice", "sand"], Some(4)),
        (4, "article", 1, vec![7], vec![], Some(1)),
        (5, "article", 0, vec![7], vec![], None),
        (6, "page", 1, vec![7], vec![], None),
    ];
    for (nid, bundle, status, genres, tags, rating) in nodes {
        store.insert_row(
            "node",
            json!({
                "nid": nid,
                "type": bundle,
                "title": format!("Node {}", nid),
                "status": status,
                "created": nid * 100,
                "promoted": nid % 2 == 0,
            }),
        );
        store.insert_field_items("field_genres", nid, genres.into_iter().map(|t| json!(t)).collect());
        store.insert_field_items("field_tags", nid, tags.into_iter().map(|t| json!(t)).collect());
        if let Some(r) = rating {
            store.insert_field_items("field_rating", nid, vec![json!(r)]);
        }
    }
    store
}

/// Memory store that counts identifier queries and record loads.
pub(crate) struct CountingStore {
    inner: MemoryEntityStore,
    queries: AtomicUsize,
    loads: AtomicUsize,
}

impl CountingStore {
    pub(crate) fn new(inner: MemoryEntityStore) -> Self {
        CountingStore {
            inner,
            queries: AtomicUsize::new(0),
            loads: AtomicUsize::new(0),
        }
    }

    /// Calls to `execute` and `count`.
    pub(crate) fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub(crate) fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EntityStore for CountingStore {
    fn schema(&self) -> &StoreSchema {
        self.inner.schema()
    }

    async fn execute(&self, query: &Query) -> Result<Vec<EntityId>, StoreError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.inner.execute(query).await
    }

    async fn count(&self, query: &Query) -> Result<u64, StoreError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.inner.count(query).await
    }

    async fn load_records(&self, entity_type: &str, ids: &[EntityId]) -> Result<IndexMap<EntityId, Record>, StoreError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.inner.load_records(entity_type, ids).await
    }

    async fn field_values(&self, field: &FieldMetadata, ids: &[EntityId]) -> Result<HashMap<EntityId, Vec<Value>>, StoreError> {
        self.inner.field_values(field, ids).await
    }

    async fn load_terms(&self, tids: &[EntityId]) -> Result<Vec<Term>, StoreError> {
        self.inner.load_terms(tids).await
    }

    async fn terms_by_name(&self, name: &str, vocabulary: &str) -> Result<Vec<Term>, StoreError> {
        self.inner.terms_by_name(name, vocabulary).await
    }
}

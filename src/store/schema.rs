//! Entity-store metadata: entity types, property types, field storage and taxonomy tables.

use crate::error::ConfigError;
use crate::store::{EntityInfo, FieldCardinality, FieldMetadata, ValueType};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntitySchema {
    pub base_table: String,
    #[serde(default = "default_id_key")]
    pub id_key: String,
    /// Column holding the bundle; entity types without bundles leave this unset.
    #[serde(default)]
    pub bundle_key: Option<String>,
    #[serde(default)]
    pub properties: IndexMap<String, ValueType>,
    /// Fields attached to this entity type, loaded with each record.
    #[serde(default)]
    pub fields: Vec<String>,
}

fn default_id_key() -> String {
    "id".into()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldSchema {
    #[serde(default)]
    pub cardinality: FieldCardinality,
    #[serde(rename = "type", default = "default_field_type")]
    pub value_type: ValueType,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default)]
    pub vocabulary: Option<String>,
}

fn default_field_type() -> ValueType {
    ValueType::Text
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaxonomySchema {
    #[serde(default = "default_term_table")]
    pub table: String,
    #[serde(default = "default_tid")]
    pub id_column: String,
    #[serde(default = "default_vocabulary")]
    pub vocabulary_column: String,
}

impl Default for TaxonomySchema {
    fn default() -> Self {
        TaxonomySchema {
            table: default_term_table(),
            id_column: default_tid(),
            vocabulary_column: default_vocabulary(),
        }
    }
}

fn default_term_table() -> String {
    "taxonomy_term_data".into()
}

fn default_tid() -> String {
    "tid".into()
}

fn default_vocabulary() -> String {
    "vocabulary".into()
}

/// Metadata shared by every entity-store backend.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StoreSchema {
    #[serde(default)]
    pub entities: IndexMap<String, EntitySchema>,
    #[serde(default)]
    pub fields: IndexMap<String, FieldSchema>,
    #[serde(default)]
    pub taxonomy: TaxonomySchema,
}

impl StoreSchema {
    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(s)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&raw)
    }

    pub fn entity_info(&self, entity_type: &str) -> Option<EntityInfo> {
        self.entities.get(entity_type).map(|e| EntityInfo {
            entity_type: entity_type.to_string(),
            base_table: e.base_table.clone(),
            id_key: e.id_key.clone(),
            bundle_key: e.bundle_key.clone(),
        })
    }

    /// Storage table defaults to `field_data_<name>`, column to `<name>_tid` for term
    /// references and `<name>_value` otherwise.
    pub fn field_metadata(&self, field: &str) -> Option<FieldMetadata> {
        self.fields.get(field).map(|f| {
            let suffix = if f.value_type == ValueType::TermReference { "tid" } else { "value" };
            FieldMetadata {
                name: field.to_string(),
                cardinality: f.cardinality,
                value_type: f.value_type.clone(),
                storage_table: f.table.clone().unwrap_or_else(|| format!("field_data_{}", field)),
                storage_column: f.column.clone().unwrap_or_else(|| format!("{}_{}", field, suffix)),
                vocabulary: f.vocabulary.clone(),
            }
        })
    }

    pub fn property_type(&self, entity_type: &str, property: &str) -> Option<ValueType> {
        self.entities
            .get(entity_type)
            .and_then(|e| e.properties.get(property))
            .cloned()
    }

    pub fn attached_fields(&self, entity_type: &str) -> Vec<FieldMetadata> {
        self.entities
            .get(entity_type)
            .map(|e| e.fields.iter().filter_map(|f| self.field_metadata(f)).collect())
            .unwrap_or_default()
    }
}

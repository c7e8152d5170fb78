//! Raw config types matching the declarative route, mapper, filter and sorter files.

use crate::query::{Operator, SortDirection};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Whether a route answers with one record or a sequence of records.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteCardinality {
    Singleton,
    #[default]
    Collection,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Requirements {
    #[serde(rename = "type")]
    pub entity_type: String,
    #[serde(default)]
    pub bundle: Option<String>,
    /// Base-table property constraints, each applied as an equality condition.
    #[serde(default)]
    pub properties: IndexMap<String, Value>,
    /// Name of a registered requirement hook.
    #[serde(default)]
    pub custom_callback: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RouteDefaults {
    #[serde(default)]
    pub mapper: Option<String>,
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub sorter: Option<String>,
    #[serde(default)]
    pub orderby: Option<String>,
    #[serde(default)]
    pub limit: Option<u64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RouteConfig {
    #[serde(default = "default_methods")]
    pub methods: Vec<String>,
    #[serde(default = "default_content_types")]
    pub content_types: Vec<String>,
    pub requirements: Requirements,
    #[serde(default)]
    pub cardinality: RouteCardinality,
    #[serde(default)]
    pub defaults: RouteDefaults,
}

fn default_methods() -> Vec<String> {
    vec!["GET".into()]
}

fn default_content_types() -> Vec<String> {
    vec!["application/json".into()]
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub label: String,
    #[serde(default)]
    pub formatter: Option<String>,
}

/// Source key -> output binding. Insertion order is output field order.
pub type Mapping = IndexMap<String, MappingEntry>;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterDefinition {
    #[serde(default)]
    pub property: Option<String>,
    #[serde(default)]
    pub field: Option<String>,
    /// Storage column override for field filters.
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default)]
    pub operator: Option<Operator>,
    /// Value applied when the client does not supply one.
    #[serde(default)]
    pub default: Option<Value>,
    /// Name of a registered filter strategy; the default strategy when unset.
    #[serde(default)]
    pub filter: Option<String>,
}

pub type FilterSet = IndexMap<String, FilterDefinition>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SorterDefinition {
    #[serde(default)]
    pub property: Option<String>,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default = "default_sort")]
    pub sort: SortDirection,
}

fn default_sort() -> SortDirection {
    SortDirection::Asc
}

pub type SorterSet = IndexMap<String, SorterDefinition>;

/// Which kind of definition a config file or lookup refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConfigKind {
    Route,
    Mapping,
    FilterSet,
    SorterSet,
}

impl ConfigKind {
    pub const ALL: [ConfigKind; 4] = [
        ConfigKind::Route,
        ConfigKind::Mapping,
        ConfigKind::FilterSet,
        ConfigKind::SorterSet,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ConfigKind::Route => "route",
            ConfigKind::Mapping => "mapper",
            ConfigKind::FilterSet => "filter set",
            ConfigKind::SorterSet => "sorter set",
        }
    }

    /// File name discovered in each configuration directory.
    pub fn file_name(self) -> &'static str {
        match self {
            ConfigKind::Route => "restapi.routes.yml",
            ConfigKind::Mapping => "restapi.mappers.yml",
            ConfigKind::FilterSet => "restapi.filters.yml",
            ConfigKind::SorterSet => "restapi.sorters.yml",
        }
    }
}

/// All definitions in one struct for in-memory loading.
#[derive(Clone, Debug, Default)]
pub struct ServiceConfig {
    pub routes: IndexMap<String, RouteConfig>,
    pub mappers: IndexMap<String, Mapping>,
    pub filters: IndexMap<String, FilterSet>,
    pub sorters: IndexMap<String, SorterSet>,
}

/// Render a configured scalar the way it is compared against stored values.
/// Sequences become comma-separated lists.
pub fn scalar_to_string(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::Bool(true) => "1".into(),
        Value::Bool(false) => "0".into(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(scalar_to_string).collect::<Vec<_>>().join(","),
        Value::Object(_) => v.to_string(),
    }
}

//! Load declarative configuration from YAML files discovered in an ordered list of
//! directories, or from in-memory YAML.

use crate::config::types::*;
use crate::error::ConfigError;
use crate::store::StoreSchema;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

pub const SCHEMA_FILE: &str = "restapi.schema.yml";

/// Directories from a path-list variable such as `CONFIG_PATH` (`:`-separated on Unix).
pub fn config_dirs_from_env(var: &str) -> Vec<PathBuf> {
    std::env::var_os(var)
        .map(|v| std::env::split_paths(&v).filter(|p| !p.as_os_str().is_empty()).collect())
        .unwrap_or_default()
}

/// Parse one definitions document. An empty document yields no definitions.
fn parse_definitions<T: DeserializeOwned>(raw: &str) -> Result<IndexMap<String, T>, ConfigError> {
    let value: serde_yaml::Value = serde_yaml::from_str(raw)?;
    if value.is_null() {
        return Ok(IndexMap::new());
    }
    Ok(serde_yaml::from_value(value)?)
}

/// Flattened merge: a key defined again replaces the earlier definition.
fn merge<T>(into: &mut IndexMap<String, T>, from: IndexMap<String, T>) {
    for (k, v) in from {
        into.insert(k, v);
    }
}

impl ServiceConfig {
    /// Merge one YAML document of `kind` into this config.
    pub fn merge_yaml(&mut self, kind: ConfigKind, raw: &str) -> Result<(), ConfigError> {
        match kind {
            ConfigKind::Route => merge(&mut self.routes, parse_definitions(raw)?),
            ConfigKind::Mapping => merge(&mut self.mappers, parse_definitions(raw)?),
            ConfigKind::FilterSet => merge(&mut self.filters, parse_definitions(raw)?),
            ConfigKind::SorterSet => merge(&mut self.sorters, parse_definitions(raw)?),
        }
        Ok(())
    }

    pub fn with_yaml(mut self, kind: ConfigKind, raw: &str) -> Result<Self, ConfigError> {
        self.merge_yaml(kind, raw)?;
        Ok(self)
    }
}

/// Read every known config file from each directory in order. Missing files are skipped.
pub fn load_from_dirs<P: AsRef<Path>>(dirs: &[P]) -> Result<ServiceConfig, ConfigError> {
    let mut config = ServiceConfig::default();
    for dir in dirs {
        let dir = dir.as_ref();
        for kind in ConfigKind::ALL {
            let path = dir.join(kind.file_name());
            if !path.is_file() {
                continue;
            }
            let raw = std::fs::read_to_string(&path)?;
            config
                .merge_yaml(kind, &raw)
                .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
            tracing::debug!(path = %path.display(), kind = kind.as_str(), "loaded config file");
        }
    }
    tracing::info!(
        routes = config.routes.len(),
        mappers = config.mappers.len(),
        filters = config.filters.len(),
        sorters = config.sorters.len(),
        "config loaded"
    );
    Ok(config)
}

/// Merge `restapi.schema.yml` from each directory: entity types and fields by key,
/// taxonomy settings from the last file that declares them.
pub fn load_schema_from_dirs<P: AsRef<Path>>(dirs: &[P]) -> Result<StoreSchema, ConfigError> {
    let mut schema = StoreSchema::default();
    for dir in dirs {
        let path = dir.as_ref().join(SCHEMA_FILE);
        if !path.is_file() {
            continue;
        }
        let raw = std::fs::read_to_string(&path)?;
        if raw.trim().is_empty() {
            continue;
        }
        let next = StoreSchema::from_yaml_str(&raw).map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
        merge(&mut schema.entities, next.entities);
        merge(&mut schema.fields, next.fields);
        if raw.lines().any(|l| l.starts_with("taxonomy:")) {
            schema.taxonomy = next.taxonomy;
        }
    }
    tracing::info!(entities = schema.entities.len(), fields = schema.fields.len(), "store schema loaded");
    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    #[test]
    fn later_directories_override_earlier_keys() {
        let base = tempfile::tempdir().unwrap();
        let site = tempfile::tempdir().unwrap();
        fs::write(
            base.path().join("restapi.routes.yml"),
            "articles:\n  requirements:\n    type: node\n    bundle: article\n  defaults:\n    limit: 10\npages:\n  requirements:\n    type: node\n    bundle: page\n",
        )
        .unwrap();
        fs::write(
            base.path().join("restapi.mappers.yml"),
            "teaser:\n  title:\n    label: title\n",
        )
        .unwrap();
        fs::write(
            site.path().join("restapi.routes.yml"),
            "articles:\n  requirements:\n    type: node\n    bundle: article\n  defaults:\n    limit: 2\n",
        )
        .unwrap();
        fs::write(site.path().join("restapi.sorters.yml"), "").unwrap();

        let config = load_from_dirs(&[base.path(), site.path()]).unwrap();
        assert_eq!(config.routes.keys().collect::<Vec<_>>(), vec!["articles", "pages"]);
        assert_eq!(config.routes["articles"].defaults.limit, Some(2));
        assert_eq!(config.mappers["teaser"]["title"].label, "title");
        assert!(config.sorters.is_empty());
    }

    #[test]
    fn malformed_file_names_its_path() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("restapi.filters.yml"), "genre: [unclosed").unwrap();
        let err = load_from_dirs(&[dir.path()]).unwrap_err();
        assert!(matches!(&err, ConfigError::Load(msg) if msg.contains("restapi.filters.yml")));
    }

    #[test]
    fn schema_files_merge_by_key() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        fs::write(
            a.path().join(SCHEMA_FILE),
            "entities:\n  node:\n    base_table: node\n    id_key: nid\nfields:\n  field_tags:\n    cardinality: multiple\n",
        )
        .unwrap();
        fs::write(
            b.path().join(SCHEMA_FILE),
            "fields:\n  field_rating:\n    type: integer\ntaxonomy:\n  table: terms\n",
        )
        .unwrap();
        let schema = load_schema_from_dirs(&[a.path(), b.path()]).unwrap();
        assert!(schema.entity_info("node").is_some());
        assert_eq!(schema.fields.len(), 2);
        assert_eq!(schema.taxonomy.table, "terms");
    }

    #[test]
    fn in_memory_yaml_builds_config() {
        let config = ServiceConfig::default()
            .with_yaml(ConfigKind::FilterSet, "article_filters:\n  genre:\n    field: field_genres\n")
            .unwrap();
        assert_eq!(config.filters["article_filters"]["genre"].field.as_deref(), Some("field_genres"));
    }
}

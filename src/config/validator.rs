//! Config validation: referential integrity against the store schema and the registry.

use crate::config::{ServiceConfig, SorterDefinition};
use crate::error::ConfigError;
use crate::query::{PARAM_LIMIT, PARAM_ORDERBY, PARAM_SORT, PARAM_START};
use crate::registry::Registry;
use crate::service::PARAM_MAPPER;
use crate::store::StoreSchema;
use std::collections::HashSet;

/// Query-string keys the pipeline reads itself; filters may not shadow them.
pub const RESERVED_PARAMS: [&str; 5] = [PARAM_ORDERBY, PARAM_SORT, PARAM_LIMIT, PARAM_START, PARAM_MAPPER];

fn missing(kind: &'static str, id: &str) -> ConfigError {
    ConfigError::MissingReference {
        kind,
        id: id.to_string(),
    }
}

fn invalid(kind: &'static str, id: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidDefinition {
        kind,
        id: id.to_string(),
        reason: reason.into(),
    }
}

pub fn validate(config: &ServiceConfig, registry: &Registry, schema: &StoreSchema) -> Result<(), ConfigError> {
    for (id, route) in &config.routes {
        let requirements = &route.requirements;
        let entity = schema
            .entities
            .get(&requirements.entity_type)
            .ok_or_else(|| missing("entity type", &requirements.entity_type))?;
        if requirements.bundle.is_some() && entity.bundle_key.is_none() {
            return Err(invalid(
                "route",
                id,
                format!("entity type '{}' has no bundles", requirements.entity_type),
            ));
        }
        if route.methods.is_empty() {
            return Err(invalid("route", id, "no methods declared"));
        }
        if let Some(hook) = &requirements.custom_callback {
            if !registry.has_hook(hook) {
                return Err(ConfigError::UnknownStrategy {
                    kind: "requirement hook",
                    name: hook.clone(),
                });
            }
        }
        let defaults = &route.defaults;
        if let Some(mapper) = &defaults.mapper {
            if !config.mappers.contains_key(mapper) {
                return Err(missing("mapper", mapper));
            }
        }
        if let Some(filter) = &defaults.filter {
            if !config.filters.contains_key(filter) {
                return Err(missing("filter set", filter));
            }
        }
        let sorters = match &defaults.sorter {
            Some(name) => Some(config.sorters.get(name).ok_or_else(|| missing("sorter set", name))?),
            None => None,
        };
        if let Some(orderby) = &defaults.orderby {
            let declared = sorters.is_some_and(|s| s.contains_key(orderby));
            if !declared {
                return Err(missing("sorter", orderby));
            }
        }
    }

    for (name, mapping) in &config.mappers {
        let mut labels = HashSet::new();
        for (key, entry) in mapping {
            if !labels.insert(entry.label.as_str()) {
                return Err(invalid("mapper", name, format!("duplicate label '{}'", entry.label)));
            }
            if let Some(formatter) = &entry.formatter {
                if !registry.has_formatter(formatter) {
                    return Err(ConfigError::UnknownStrategy {
                        kind: "formatter",
                        name: format!("{} (mapper '{}', key '{}')", formatter, name, key),
                    });
                }
            }
        }
    }

    for (set, filters) in &config.filters {
        for (name, def) in filters {
            let id = format!("{}.{}", set, name);
            if RESERVED_PARAMS.contains(&name.as_str()) {
                return Err(invalid("filter", &id, "name is a reserved query parameter"));
            }
            match (&def.property, &def.field) {
                (Some(_), None) => {
                    if def.column.is_some() {
                        return Err(invalid("filter", &id, "column applies to field filters only"));
                    }
                }
                (None, Some(field)) => {
                    if schema.field_metadata(field).is_none() {
                        return Err(ConfigError::MissingFieldStorage(field.clone()));
                    }
                }
                _ => return Err(invalid("filter", &id, "set exactly one of property and field")),
            }
            if let Some(strategy) = &def.filter {
                if !registry.has_filter(strategy) {
                    return Err(ConfigError::UnknownStrategy {
                        kind: "filter",
                        name: strategy.clone(),
                    });
                }
            }
        }
    }

    for (set, sorters) in &config.sorters {
        for (name, def) in sorters {
            if !is_valid_sorter(def) {
                return Err(invalid(
                    "sorter",
                    &format!("{}.{}", set, name),
                    "set either property or table and column",
                ));
            }
        }
    }
    Ok(())
}

fn is_valid_sorter(def: &SorterDefinition) -> bool {
    matches!(
        (&def.property, &def.table, &def.column),
        (Some(_), None, None) | (None, Some(_), Some(_))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigKind;
    use crate::test_support;

    fn config() -> ServiceConfig {
        ServiceConfig::default()
            .with_yaml(
                ConfigKind::Route,
                r#"
articles:
  requirements: { type: node, bundle: article }
  defaults: { mapper: teaser, filter: article_filters, sorter: article_sorters, orderby: created }
"#,
            )
            .unwrap()
            .with_yaml(ConfigKind::Mapping, "teaser:\n  title: { label: title }\n  field_genres: { label: genres, formatter: taxonomy }\n")
            .unwrap()
            .with_yaml(ConfigKind::FilterSet, "article_filters:\n  genre: { field: field_genres, filter: taxonomy_by_name }\n")
            .unwrap()
            .with_yaml(ConfigKind::SorterSet, "article_sorters:\n  created: { property: created, sort: desc }\n")
            .unwrap()
    }

    fn check(config: &ServiceConfig) -> Result<(), ConfigError> {
        validate(config, &Registry::builtin(), &test_support::schema())
    }

    #[test]
    fn consistent_config_passes() {
        check(&config()).unwrap();
    }

    #[test]
    fn route_references_must_exist() {
        let mut c = config();
        c.routes["articles"].defaults.orderby = Some("title".into());
        assert!(matches!(check(&c), Err(ConfigError::MissingReference { kind: "sorter", .. })));

        let mut c = config();
        c.routes["articles"].requirements.entity_type = "user".into();
        assert!(matches!(check(&c), Err(ConfigError::MissingReference { kind: "entity type", .. })));

        let mut c = config();
        c.mappers.clear();
        assert!(matches!(check(&c), Err(ConfigError::MissingReference { kind: "mapper", .. })));
    }

    #[test]
    fn unknown_strategies_are_rejected() {
        let mut c = config();
        c.mappers["teaser"]["title"].formatter = Some("markdown".into());
        assert!(matches!(check(&c), Err(ConfigError::UnknownStrategy { kind: "formatter", .. })));

        let mut c = config();
        c.routes["articles"].requirements.custom_callback = Some("published_only".into());
        assert!(matches!(check(&c), Err(ConfigError::UnknownStrategy { .. })));
    }

    #[test]
    fn filter_and_sorter_shapes() {
        let mut c = config();
        c.filters["article_filters"]["genre"].property = Some("title".into());
        assert!(matches!(check(&c), Err(ConfigError::InvalidDefinition { kind: "filter", .. })));

        let mut c = config();
        c.filters["article_filters"]["genre"].field = Some("field_missing".into());
        assert!(matches!(check(&c), Err(ConfigError::MissingFieldStorage(_))));

        let mut c = config();
        c.sorters["article_sorters"]["created"].table = Some("node".into());
        assert!(matches!(check(&c), Err(ConfigError::InvalidDefinition { kind: "sorter", .. })));

        let mut c = config();
        let genre = c.filters["article_filters"]["genre"].clone();
        c.filters["article_filters"].insert("limit".into(), genre);
        assert!(matches!(check(&c), Err(ConfigError::InvalidDefinition { .. })));
    }

    #[test]
    fn duplicate_labels_are_rejected() {
        let mut c = config();
        c.mappers["teaser"]["field_genres"].label = "title".into();
        assert!(matches!(check(&c), Err(ConfigError::InvalidDefinition { kind: "mapper", .. })));
    }
}

//! Validated configuration with typed lookups for the request pipeline.

use crate::config::{validate, ConfigKind, FilterSet, Mapping, RouteConfig, ServiceConfig, SorterSet};
use crate::error::ConfigError;
use crate::registry::Registry;
use crate::store::StoreSchema;

/// One definition returned by [`ResolvedConfig::resolve`].
#[derive(Clone, Copy, Debug)]
pub enum Definition<'a> {
    Route(&'a RouteConfig),
    Mapping(&'a Mapping),
    FilterSet(&'a FilterSet),
    SorterSet(&'a SorterSet),
}

#[derive(Clone, Debug)]
pub struct ResolvedConfig {
    config: ServiceConfig,
}

/// Validate `config` against the registry and store schema and wrap it for lookup.
pub fn resolve(config: ServiceConfig, registry: &Registry, schema: &StoreSchema) -> Result<ResolvedConfig, ConfigError> {
    if let Err(e) = validate(&config, registry, schema) {
        tracing::error!(error = %e, "invalid configuration");
        return Err(e);
    }
    Ok(ResolvedConfig { config })
}

impl ResolvedConfig {
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn resolve(&self, kind: ConfigKind, name: &str) -> Result<Definition<'_>, ConfigError> {
        let found = match kind {
            ConfigKind::Route => self.config.routes.get(name).map(Definition::Route),
            ConfigKind::Mapping => self.config.mappers.get(name).map(Definition::Mapping),
            ConfigKind::FilterSet => self.config.filters.get(name).map(Definition::FilterSet),
            ConfigKind::SorterSet => self.config.sorters.get(name).map(Definition::SorterSet),
        };
        found.ok_or_else(|| ConfigError::MissingReference {
            kind: kind.as_str(),
            id: name.to_string(),
        })
    }

    pub fn route(&self, id: &str) -> Option<&RouteConfig> {
        self.config.routes.get(id)
    }

    pub fn mapping(&self, name: &str) -> Option<&Mapping> {
        self.config.mappers.get(name)
    }

    /// Filter set named by the route default, if any.
    pub fn filters_for(&self, route: &RouteConfig) -> Result<Option<&FilterSet>, ConfigError> {
        self.optional(ConfigKind::FilterSet, route.defaults.filter.as_deref())
            .map(|d| d.and_then(|d| match d {
                Definition::FilterSet(f) => Some(f),
                _ => None,
            }))
    }

    pub fn sorters_for(&self, route: &RouteConfig) -> Result<Option<&SorterSet>, ConfigError> {
        self.optional(ConfigKind::SorterSet, route.defaults.sorter.as_deref())
            .map(|d| d.and_then(|d| match d {
                Definition::SorterSet(s) => Some(s),
                _ => None,
            }))
    }

    fn optional(&self, kind: ConfigKind, name: Option<&str>) -> Result<Option<Definition<'_>>, ConfigError> {
        name.map(|n| self.resolve(kind, n)).transpose()
    }
}

//! Closed set of named strategies that configuration may reference.

use crate::error::{AppError, ConfigError};
use crate::filter::{DefaultFilter, FilterStrategy, TaxonomyByNameFilter};
use crate::formatter::{BaseFormatter, FieldFormatter, Formatter, PropertyFormatter, TaxonomyFormatter};
use crate::query::Query;
use crate::request::RequestContext;
use std::collections::HashMap;
use std::sync::Arc;

pub const DEFAULT_FORMATTER: &str = "base";
pub const DEFAULT_FILTER: &str = "default";

/// Route-level escape hatch for requirements the declarative model cannot express.
pub trait RequirementHook: Send + Sync {
    fn apply(&self, query: Query, ctx: &RequestContext) -> Result<Query, AppError>;
}

impl<F> RequirementHook for F
where
    F: Fn(Query, &RequestContext) -> Result<Query, AppError> + Send + Sync,
{
    fn apply(&self, query: Query, ctx: &RequestContext) -> Result<Query, AppError> {
        self(query, ctx)
    }
}

#[derive(Clone)]
pub struct Registry {
    formatters: HashMap<String, Arc<dyn Formatter>>,
    filters: HashMap<String, Arc<dyn FilterStrategy>>,
    hooks: HashMap<String, Arc<dyn RequirementHook>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Registry {
    /// Built-in formatters (`base`, `property`, `field`, `taxonomy`) and filters
    /// (`default`, `taxonomy_by_name`). No hooks.
    pub fn builtin() -> Self {
        let mut formatters: HashMap<String, Arc<dyn Formatter>> = HashMap::new();
        formatters.insert(DEFAULT_FORMATTER.into(), Arc::new(BaseFormatter));
        formatters.insert("property".into(), Arc::new(PropertyFormatter));
        formatters.insert("field".into(), Arc::new(FieldFormatter));
        formatters.insert("taxonomy".into(), Arc::new(TaxonomyFormatter));

        let mut filters: HashMap<String, Arc<dyn FilterStrategy>> = HashMap::new();
        filters.insert(DEFAULT_FILTER.into(), Arc::new(DefaultFilter));
        filters.insert("taxonomy_by_name".into(), Arc::new(TaxonomyByNameFilter));

        Registry {
            formatters,
            filters,
            hooks: HashMap::new(),
        }
    }

    pub fn with_formatter(mut self, name: impl Into<String>, formatter: impl Formatter + 'static) -> Self {
        self.formatters.insert(name.into(), Arc::new(formatter));
        self
    }

    pub fn with_filter(mut self, name: impl Into<String>, filter: impl FilterStrategy + 'static) -> Self {
        self.filters.insert(name.into(), Arc::new(filter));
        self
    }

    pub fn with_hook(mut self, name: impl Into<String>, hook: impl RequirementHook + 'static) -> Self {
        self.hooks.insert(name.into(), Arc::new(hook));
        self
    }

    /// Formatter by name; `None` selects the default.
    pub fn formatter(&self, name: Option<&str>) -> Result<Arc<dyn Formatter>, ConfigError> {
        let name = name.unwrap_or(DEFAULT_FORMATTER);
        self.formatters
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownStrategy {
                kind: "formatter",
                name: name.to_string(),
            })
    }

    /// Filter strategy by name; `None` selects the default.
    pub fn filter(&self, name: Option<&str>) -> Result<Arc<dyn FilterStrategy>, ConfigError> {
        let name = name.unwrap_or(DEFAULT_FILTER);
        self.filters
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownStrategy {
                kind: "filter",
                name: name.to_string(),
            })
    }

    pub fn hook(&self, name: &str) -> Result<Arc<dyn RequirementHook>, ConfigError> {
        self.hooks
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownStrategy {
                kind: "requirement hook",
                name: name.to_string(),
            })
    }

    pub fn has_formatter(&self, name: &str) -> bool {
        self.formatters.contains_key(name)
    }

    pub fn has_filter(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    pub fn has_hook(&self, name: &str) -> bool {
        self.hooks.contains_key(name)
    }
}

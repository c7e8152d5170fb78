//! Immutable per-request context built once at the HTTP boundary.

use crate::store::EntityId;
use indexmap::IndexMap;
use serde_json::{Map, Value};

/// Overrides supplied by the caller of the service rather than by the client.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Variables {
    pub mapper: Option<String>,
    /// Part of the content-cache key; lets callers keep per-region renderings apart.
    pub region: Option<String>,
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RequestContext {
    method: String,
    accept: Option<String>,
    path: String,
    query: IndexMap<String, String>,
    identifier: Option<EntityId>,
    variables: Variables,
}

impl RequestContext {
    pub fn new(method: &str, path: &str) -> Self {
        RequestContext {
            method: method.to_ascii_uppercase(),
            accept: None,
            path: path.to_string(),
            query: IndexMap::new(),
            identifier: None,
            variables: Variables::default(),
        }
    }

    pub fn with_accept(mut self, accept: Option<&str>) -> Self {
        self.accept = accept.map(str::trim).filter(|s| !s.is_empty()).map(String::from);
        self
    }

    /// Query-string pairs in arrival order; a repeated key keeps its first position and last value.
    pub fn with_query<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in pairs {
            self.query.insert(k.into(), v.into());
        }
        self
    }

    pub fn with_identifier(mut self, id: Option<EntityId>) -> Self {
        self.identifier = id;
        self
    }

    pub fn with_variables(mut self, variables: Variables) -> Self {
        self.variables = variables;
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn accept(&self) -> Option<&str> {
        self.accept.as_deref()
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &IndexMap<String, String> {
        &self.query
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    pub fn identifier(&self) -> Option<EntityId> {
        self.identifier
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    /// Cache key for path-keyed tiers: path without trailing slash, query pairs sorted by key.
    pub fn cache_path(&self) -> String {
        let path = match self.path.trim_end_matches('/') {
            "" => "/",
            p => p,
        };
        if self.query.is_empty() {
            return path.to_string();
        }
        let mut pairs: Vec<(&String, &String)> = self.query.iter().collect();
        pairs.sort();
        let qs = pairs
            .into_iter()
            .map(|(k, v)| format!("{}={}", escape(k), escape(v)))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{}", path, qs)
    }
}

fn escape(s: &str) -> String {
    s.replace('%', "%25").replace('&', "%26").replace('=', "%3D")
}

/// Precedence shared by mapper, limit and ordering: explicit > caller override > default.
pub fn resolve<T>(explicit: Option<T>, override_: Option<T>, default: Option<T>) -> Option<T> {
    explicit.or(override_).or(default)
}

//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use crate::service::Rejection;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing reference: {kind} '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("unknown {kind} strategy '{name}'")]
    UnknownStrategy { kind: &'static str, name: String },
    #[error("invalid definition {kind} '{id}': {reason}")]
    InvalidDefinition {
        kind: &'static str,
        id: String,
        reason: String,
    },
    #[error("field '{0}' has no storage metadata")]
    MissingFieldStorage(String),
    #[error("route '{route}' is a singleton but resolved {count} identifiers")]
    AmbiguousSingleton { route: String, count: usize },
    #[error("config load: {0}")]
    Load(String),
    #[error("config io: {0}")]
    Io(#[from] std::io::Error),
    #[error("config yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("unknown entity type: {0}")]
    UnknownEntityType(String),
    #[error("store: {0}")]
    Backend(String),
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache encode: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("cache backend: {0}")]
    Backend(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("no term named '{value}' for field '{field}'")]
    LookupNotFound { field: String, value: String },
    #[error("{}", .0.message())]
    Rejected(Rejection),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Config(_) | AppError::Store(_) | AppError::Cache(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::NotFound(_) | AppError::LookupNotFound { .. } => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Rejected(_) => StatusCode::NOT_ACCEPTABLE,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config_error",
            AppError::Store(_) => "store_error",
            AppError::Cache(_) => "cache_error",
            AppError::NotFound(_) => "not_found",
            AppError::BadRequest(_) => "bad_request",
            AppError::LookupNotFound { .. } => "lookup_not_found",
            AppError::Rejected(r) => r.kind.as_str(),
        }
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        if let AppError::Rejected(rejection) = &self {
            return (status, Json(rejection.to_body())).into_response();
        }
        let details = match &self {
            AppError::LookupNotFound { field, value } => {
                Some(serde_json::json!({ "field": field, "value": value }))
            }
            _ => None,
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code().to_string(),
                message: self.to_string(),
                details,
            },
        };
        (status, Json(body)).into_response()
    }
}

//! Transport-neutral response produced by the service, rendered by axum.

use crate::cache::Headers;
use crate::service::Rejection;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

pub const NO_RESULTS_MESSAGE: &str = "There are no entities that match the given conditions.";

#[derive(Clone, Debug, PartialEq)]
pub struct RestResponse {
    pub status: StatusCode,
    pub headers: Headers,
    pub body: Value,
}

impl RestResponse {
    pub fn ok(body: Value, headers: Headers) -> Self {
        RestResponse {
            status: StatusCode::OK,
            headers,
            body,
        }
    }

    pub fn rejected(rejection: &Rejection) -> Self {
        RestResponse {
            status: StatusCode::NOT_ACCEPTABLE,
            headers: Headers::new(),
            body: rejection.to_body(),
        }
    }

    pub fn no_results(status: StatusCode) -> Self {
        RestResponse {
            status,
            headers: Headers::new(),
            body: json!({ "status": "no_results", "message": NO_RESULTS_MESSAGE }),
        }
    }

    pub fn is_no_results(&self) -> bool {
        self.body.get("status").and_then(Value::as_str) == Some("no_results")
    }
}

impl IntoResponse for RestResponse {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            match (HeaderName::try_from(name.as_str()), HeaderValue::from_str(value)) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => tracing::warn!(header = %name, "dropping invalid response header"),
            }
        }
        // 204 and 304 carry no body.
        if self.status == StatusCode::NO_CONTENT || self.status == StatusCode::NOT_MODIFIED {
            return (self.status, headers).into_response();
        }
        (self.status, headers, Json(self.body)).into_response()
    }
}

//! Request validation against route-declared methods and content types.

use crate::config::RouteConfig;
use crate::request::RequestContext;
use serde_json::{json, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectionKind {
    UnsupportedMethod,
    UnsupportedContentType,
}

impl RejectionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RejectionKind::UnsupportedMethod => "unsupported_method",
            RejectionKind::UnsupportedContentType => "unsupported_content_type",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rejection {
    pub kind: RejectionKind,
    /// The offending method or format.
    pub value: String,
}

impl Rejection {
    pub fn message(&self) -> String {
        match self.kind {
            RejectionKind::UnsupportedMethod => format!("This service does not support the {} method.", self.value),
            RejectionKind::UnsupportedContentType => format!("This service does not support the {} format.", self.value),
        }
    }

    /// `{status, message, method}` or `{status, message, format}`.
    pub fn to_body(&self) -> Value {
        let key = match self.kind {
            RejectionKind::UnsupportedMethod => "method",
            RejectionKind::UnsupportedContentType => "format",
        };
        json!({
            "status": self.kind.as_str(),
            "message": self.message(),
            key: self.value,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValidationOutcome {
    Ok,
    Rejected(Rejection),
}

pub struct RequestValidator;

impl RequestValidator {
    /// Method first, then the `Accept` header. A missing header passes.
    pub fn validate(route: &RouteConfig, ctx: &RequestContext) -> ValidationOutcome {
        if !route.methods.iter().any(|m| m.eq_ignore_ascii_case(ctx.method())) {
            return ValidationOutcome::Rejected(Rejection {
                kind: RejectionKind::UnsupportedMethod,
                value: ctx.method().to_string(),
            });
        }
        if let Some(accept) = ctx.accept() {
            if !accepts(accept, &route.content_types) {
                return ValidationOutcome::Rejected(Rejection {
                    kind: RejectionKind::UnsupportedContentType,
                    value: accept.to_string(),
                });
            }
        }
        ValidationOutcome::Ok
    }
}

/// Any listed media range that is `*/*`, a matching `type/*`, or a supported type.
fn accepts(accept: &str, supported: &[String]) -> bool {
    accept
        .split(',')
        .map(|range| range.split(';').next().unwrap_or_default().trim())
        .any(|range| {
            range == "*/*"
                || supported.iter().any(|ct| {
                    ct.eq_ignore_ascii_case(range)
                        || range
                            .strip_suffix("/*")
                            .is_some_and(|major| ct.split('/').next().is_some_and(|m| m.eq_ignore_ascii_case(major)))
                })
        })
}

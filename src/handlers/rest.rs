//! Route handlers: build the request context and hand it to the service.

use crate::error::AppError;
use crate::request::RequestContext;
use crate::response::RestResponse;
use crate::state::AppState;
use crate::store::EntityId;
use axum::{
    extract::{OriginalUri, Path, Query, State},
    http::{header::ACCEPT, HeaderMap, Method},
};

fn context(method: &Method, headers: &HeaderMap, uri: &OriginalUri, query: Vec<(String, String)>) -> RequestContext {
    let accept = headers.get(ACCEPT).and_then(|v| v.to_str().ok());
    RequestContext::new(method.as_str(), uri.0.path())
        .with_accept(accept)
        .with_query(query)
}

fn parse_id(id_str: &str) -> Result<EntityId, AppError> {
    id_str
        .parse()
        .map_err(|_| AppError::BadRequest(format!("invalid id '{}'", id_str)))
}

pub async fn collection(
    State(state): State<AppState>,
    Path(route_id): Path<String>,
    method: Method,
    headers: HeaderMap,
    uri: OriginalUri,
    Query(query): Query<Vec<(String, String)>>,
) -> Result<RestResponse, AppError> {
    let ctx = context(&method, &headers, &uri, query);
    state.service.handle(&route_id, &ctx).await
}

pub async fn single(
    State(state): State<AppState>,
    Path((route_id, id_str)): Path<(String, String)>,
    method: Method,
    headers: HeaderMap,
    uri: OriginalUri,
    Query(query): Query<Vec<(String, String)>>,
) -> Result<RestResponse, AppError> {
    let id = parse_id(&id_str)?;
    let ctx = context(&method, &headers, &uri, query).with_identifier(Some(id));
    state.service.handle(&route_id, &ctx).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_must_be_integers() {
        assert_eq!(parse_id("42").unwrap(), 42);
        assert!(matches!(parse_id("abc"), Err(AppError::BadRequest(_))));
    }
}

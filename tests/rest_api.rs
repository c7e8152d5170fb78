//! Router-level tests: configured routes served from an in-memory entity store.

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use entity_rest::config::{ConfigKind, ServiceConfig};
use entity_rest::store::Term;
use entity_rest::{
    resolve, router, AppState, MemoryCacheStore, MemoryEntityStore, Registry, RestService, ServiceSettings,
    StoreSchema,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const SCHEMA: &str = r#"
entities:
  node:
    base_table: node
    id_key: nid
    bundle_key: type
    properties:
      nid: integer
      type: text
      title: text
      status: integer
      created: date
    fields: [field_genres]
fields:
  field_genres:
    cardinality: multiple
    type: term_reference
    vocabulary: genres
"#;

const ROUTES: &str = r#"
articles:
  methods: [GET]
  requirements: { type: node, bundle: article, properties: { status: 1 } }
  defaults: { mapper: teaser, filter: article_filters, sorter: article_sorters, orderby: created, limit: 2 }
article:
  requirements: { type: node, bundle: article }
  cardinality: singleton
  defaults: { mapper: full }
"#;

const MAPPERS: &str = r#"
teaser:
  nid: { label: id }
  title: { label: title }
full:
  nid: { label: id }
  title: { label: title }
  field_genres: { label: genres, formatter: taxonomy }
"#;

const FILTERS: &str = r#"
article_filters:
  genre: { field: field_genres, filter: taxonomy_by_name, default: all }
"#;

const SORTERS: &str = r#"
article_sorters:
  created: { property: created, sort: desc }
  title: { property: title }
"#;

/// Published articles 1 to 12 (fiction unless `nid` is a multiple of 3, poetry
/// otherwise), a fiction page 13 and an unpublished article 14.
fn store(schema: StoreSchema) -> MemoryEntityStore {
    let store = MemoryEntityStore::new(schema);
    for (tid, name, weight) in [(1, "Fiction", 0), (2, "Poetry", 1)] {
        store.insert_term(Term {
            tid,
            vocabulary: "genres".into(),
            name: name.into(),
            description: String::new(),
            weight,
        });
    }
    for nid in 1..=14_i64 {
        let bundle = if nid == 13 { "page" } else { "article" };
        let status = if nid == 14 { 0 } else { 1 };
        store.insert_row(
            "node",
            json!({
                "nid": nid,
                "type": bundle,
                "title": format!("Story {}", nid),
                "status": status,
                "created": nid * 10,
            }),
        );
        let genre = if nid % 3 == 0 { 2 } else { 1 };
        store.insert_field_items("field_genres", nid, vec![json!(genre)]);
    }
    store
}

fn app_with(settings: ServiceSettings) -> Router {
    let schema = StoreSchema::from_yaml_str(SCHEMA).unwrap();
    let registry = Registry::builtin();
    let config = ServiceConfig::default()
        .with_yaml(ConfigKind::Route, ROUTES)
        .unwrap()
        .with_yaml(ConfigKind::Mapping, MAPPERS)
        .unwrap()
        .with_yaml(ConfigKind::FilterSet, FILTERS)
        .unwrap()
        .with_yaml(ConfigKind::SorterSet, SORTERS)
        .unwrap();
    let config = resolve(config, &registry, &schema).unwrap();
    let service = RestService::new(
        config,
        Arc::new(store(schema)),
        registry,
        Arc::new(MemoryCacheStore::new()),
        settings,
    );
    router(AppState::new(service))
}

fn app() -> Router {
    app_with(ServiceSettings::default())
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value) {
    let res = app.oneshot(request).await.unwrap();
    let status = res.status();
    let headers = res.headers().clone();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, headers, body)
}

async fn get(app: Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, Value) {
    send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

fn ids(body: &Value) -> Vec<i64> {
    body.as_array().unwrap().iter().map(|r| r["id"].as_i64().unwrap()).collect()
}

#[tokio::test]
async fn default_listing_returns_newest_articles() {
    let (status, headers, body) = get(app(), "/articles").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([{ "id": 12, "title": "Story 12" }, { "id": 11, "title": "Story 11" }]));
    assert_eq!(headers["x-total-count"], "12");
    assert!(headers["etag"].to_str().unwrap().starts_with('"'));
}

#[tokio::test]
async fn genre_filter_pages_through_fiction() {
    let (status, headers, body) = get(app(), "/articles?genre=fiction&limit=1&start=1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body), vec![10]);
    assert_eq!(headers["x-total-count"], "8");
}

#[tokio::test]
async fn total_count_ignores_limit() {
    let (_, headers, body) = get(app(), "/articles?limit=5").await;
    assert_eq!(ids(&body), vec![12, 11, 10, 9, 8]);
    assert_eq!(headers["x-total-count"], "12");
}

#[tokio::test]
async fn negated_genre_and_client_ordering() {
    let (_, headers, body) = get(app(), "/articles?genre=!fiction&orderby=title&sort=asc&limit=10").await;
    // Titles sort as text.
    assert_eq!(ids(&body), vec![12, 3, 6, 9]);
    assert_eq!(headers["x-total-count"], "4");
}

#[tokio::test]
async fn singleton_route_returns_one_object() {
    let (status, _, body) = get(app(), "/article/3").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "id": 3,
            "title": "Story 3",
            "genres": { "2": { "name": "Poetry", "description": "", "order": 1 } },
        })
    );
}

#[tokio::test]
async fn no_results_is_204_without_body() {
    let (status, _, body) = get(app(), "/article/99").await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);
}

#[tokio::test]
async fn no_results_status_is_configurable() {
    let settings = ServiceSettings {
        no_results_status: StatusCode::OK,
        ..Default::default()
    };
    let (status, _, body) = get(app_with(settings), "/article/99").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "no_results");
}

#[tokio::test]
async fn unsupported_method_and_format_are_406() {
    let request = Request::builder().method("POST").uri("/articles").body(Body::empty()).unwrap();
    let (status, _, body) = send(app(), request).await;
    assert_eq!(status, StatusCode::NOT_ACCEPTABLE);
    assert_eq!(body["status"], "unsupported_method");
    assert_eq!(body["method"], "POST");

    let request = Request::builder()
        .uri("/articles")
        .header(header::ACCEPT, "text/html")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(app(), request).await;
    assert_eq!(status, StatusCode::NOT_ACCEPTABLE);
    assert_eq!(body["status"], "unsupported_content_type");
    assert_eq!(body["format"], "text/html");
}

#[tokio::test]
async fn client_errors() {
    let (status, _, body) = get(app(), "/articles?limit=lots").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");

    let (status, _, _) = get(app(), "/article/abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, body) = get(app(), "/articles?genre=westerns").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "lookup_not_found");

    let (status, _, body) = get(app(), "/pages").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn health_and_ready() {
    let (status, _, body) = get(app(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    let (status, _, _) = get(app(), "/ready").await;
    assert_eq!(status, StatusCode::OK);
}

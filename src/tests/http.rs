use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use crate::config::{QueryDefaults, QueryLimits};
use crate::query::QueryFacade;
use crate::registry::SpaceRegistry;
use crate::web;

fn app() -> (Router, tempfile::TempDir) {
    let tmp = tempfile::tempdir().unwrap();
    super::write_fixtures(tmp.path());

    let extensions = vec!["txt".to_string(), "vec".to_string()];
    let registry = SpaceRegistry::load_all(tmp.path(), &extensions).unwrap();
    let facade = QueryFacade::new(
        Arc::new(registry),
        QueryDefaults::default(),
        QueryLimits {
            max_neighbors: 20,
            max_projection: 5,
            max_sample: 30,
        },
    );
    (web::router(facade, true), tmp)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_typeahead() {
    let (app, _tmp) = app();
    let (status, body) = get(app, "/typeahead/toy?q=CA").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!({"tokens": ["cat", "car"]}));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_typeahead_empty_query() {
    let (app, _tmp) = app();
    let (status, body) = get(app, "/typeahead/toy?q=").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tokens"], serde_json::json!([]));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_nearest() {
    let (app, _tmp) = app();
    let (status, body) = get(app, "/nearest/toy?q=cat&n=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tokens"], serde_json::json!(["cat", "car", "dog"]));

    let vectors = body["vectors"].as_array().unwrap();
    assert_eq!(vectors.len(), 3);
    for point in vectors {
        let point = point.as_array().unwrap();
        assert_eq!(point.len(), 2);
        for c in point {
            let c = c.as_f64().unwrap();
            assert!((-1.0..=1.0).contains(&c));
        }
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_dist_repeated_q() {
    let (app, _tmp) = app();
    let (status, body) = get(app, "/dist/toy?q=dog&q=cat&q=car").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tokens"], serde_json::json!(["dog", "cat", "car"]));
    assert_eq!(body["vectors"].as_array().unwrap().len(), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_sim() {
    let (app, _tmp) = app();
    let (status, body) = get(app, "/sim/toy?q=cat&n=1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tokens"], serde_json::json!(["car"]));
    let sim = body["sims"][0].as_f64().unwrap();
    assert!((sim - 0.994).abs() < 1e-3);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_sim_multiple() {
    let (app, _tmp) = app();
    let (status, body) = get(app, "/sim_multiple/toy?q=cat&q=dog").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tokens"], serde_json::json!(["dog"]));
    let sim = body["sims"][0].as_f64().unwrap();
    assert!((sim + 1.0).abs() < 1e-6);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_sim_random() {
    let (app, _tmp) = app();
    let (status, body) = get(app, "/sim_random/grid?q=wa&n=4").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tokens"][0], "wa");
    assert_eq!(body["tokens"].as_array().unwrap().len(), 5);
    assert_eq!(body["sims"].as_array().unwrap().len(), 4);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_token_random() {
    let (app, _tmp) = app();
    let (status, body) = get(app, "/token_random/grid?n=7").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tokens"].as_array().unwrap().len(), 7);

    // default of 100 is above this router's max_sample
    let (app, _tmp) = self::app();
    let (status, _) = get(app, "/token_random/grid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_spaces_and_health() {
    let (app, _tmp) = app();
    let (status, body) = get(app.clone(), "/spaces").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        serde_json::json!([
            {"name": "grid", "tokens": 40, "dimension": 4},
            {"name": "toy", "tokens": 3, "dimension": 2},
        ])
    );

    let (status, body) = get(app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["spaces"], 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_error_statuses() {
    let cases = [
        ("/typeahead/nope?q=a", StatusCode::NOT_FOUND),
        ("/sim/toy?q=yak", StatusCode::NOT_FOUND),
        ("/dist/toy?q=cat&q=yak", StatusCode::NOT_FOUND),
        ("/nearest/toy", StatusCode::BAD_REQUEST),
        ("/dist/toy", StatusCode::BAD_REQUEST),
        ("/sim/toy?q=cat&n=0", StatusCode::BAD_REQUEST),
        ("/sim/toy?q=cat&n=-1", StatusCode::BAD_REQUEST),
        ("/sim/toy?q=cat&n=abc", StatusCode::BAD_REQUEST),
        ("/sim/toy?q=cat&n=21", StatusCode::BAD_REQUEST),
        ("/token_random/toy?n=5", StatusCode::BAD_REQUEST),
        (
            "/dist/toy?q=cat&q=car&q=dog&q=cat&q=car&q=dog",
            StatusCode::BAD_REQUEST,
        ),
    ];

    for (uri, expected) in cases {
        let (app, _tmp) = app();
        let (status, body) = get(app, uri).await;
        assert_eq!(status, expected, "{uri}");
        assert!(body["error"].is_string(), "{uri}: {body}");
    }
}

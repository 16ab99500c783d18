//! Admin API tests.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use serde_json::Value;

use edge_balancer::load_balancer::Strategy;

mod common;
use common::*;

fn admin(method: Method, uri: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder().method(method).uri(uri).body(body.into()).unwrap()
}

async fn json(response: axum::response::Response) -> Value {
    serde_json::from_str(&body_string(response).await).unwrap()
}

#[tokio::test]
async fn stats_report_backends_and_traffic() {
    let backend = start_static_backend("ok").await;
    let (_core, router) = app(config_for(&[&backend.address]));

    send(&router, get("/api/one")).await;
    send(&router, get("/api/two")).await;

    let response = send(&router, get("/admin/stats")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let stats = json(response).await;

    assert_eq!(stats["strategy"], "round_robin");
    assert_eq!(stats["metrics"]["total_requests"], 2);
    assert_eq!(stats["metrics"]["total_errors"], 0);
    assert_eq!(stats["tracked_ips"], 1);

    let backends = stats["backends"].as_array().unwrap();
    assert_eq!(backends.len(), 1);
    assert_eq!(backends[0]["id"], "backend-0");
    assert_eq!(backends[0]["alive"], true);
    assert_eq!(backends[0]["circuit_state"], "closed");
    assert_eq!(backends[0]["total_requests"], 2);
    assert_eq!(backends[0]["success_count"], 2);
}

#[tokio::test]
async fn added_backend_receives_traffic() {
    let first = start_static_backend("first").await;
    let second = start_static_backend("second").await;
    let (core, router) = app(config_for(&[&first.address]));

    let body = serde_json::json!({ "url": second.address, "weight": 2, "timeout": "3s" }).to_string();
    let response = send(&router, admin(Method::POST, "/admin/backend", body)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let added = json(response).await;
    assert_eq!(added["id"], "backend-1");
    assert_eq!(added["weight"], 2);
    assert_eq!(core.pool().len(), 2);

    for _ in 0..4 {
        send(&router, get("/api/x")).await;
    }
    assert_eq!(first.calls(), 2);
    assert_eq!(second.calls(), 2);
}

#[tokio::test]
async fn add_backend_rejects_bad_input() {
    let backend = start_static_backend("ok").await;
    let (core, router) = app(config_for(&[&backend.address]));

    for body in [
        "not json",
        r#"{"weight": 1}"#,
        r#"{"url": "http://127.0.0.1:9", "weight": 0}"#,
        r#"{"url": "ftp://example.com"}"#,
    ] {
        let response = send(&router, admin(Method::POST, "/admin/backend", body)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {:?}", body);
        assert!(json(response).await["error"].is_string());
    }
    assert_eq!(core.pool().len(), 1);
}

#[tokio::test]
async fn remove_backend_by_id() {
    let a = start_static_backend("a").await;
    let b = start_static_backend("b").await;
    let (core, router) = app(config_for(&[&a.address, &b.address]));

    let response = send(&router, admin(Method::DELETE, "/admin/backend?id=backend-0", Body::empty())).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json(response).await["removed"], "backend-0");

    let response = send(&router, admin(Method::DELETE, "/admin/backend?id=backend-0", Body::empty())).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(&router, admin(Method::DELETE, "/admin/backend", Body::empty())).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    for _ in 0..3 {
        assert_eq!(body_string(send(&router, get("/api/x")).await).await, "b");
    }
    assert_eq!(core.pool().len(), 1);
}

#[tokio::test]
async fn strategy_switch_via_query_and_form() {
    let backend = start_static_backend("ok").await;
    let (core, router) = app(config_for(&[&backend.address]));

    let response = send(
        &router,
        admin(Method::POST, "/admin/strategy?strategy=fastest_first", Body::empty()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json(response).await["strategy"], "fastest_first");
    assert_eq!(core.pool().strategy(), Strategy::FastestFirst);

    let form = Request::builder()
        .method(Method::POST)
        .uri("/admin/strategy")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("strategy=weighted_round_robin"))
        .unwrap();
    assert_eq!(send(&router, form).await.status(), StatusCode::OK);
    assert_eq!(core.pool().strategy(), Strategy::WeightedRoundRobin);

    let response = send(&router, admin(Method::POST, "/admin/strategy?strategy=random", Body::empty())).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let response = send(&router, admin(Method::POST, "/admin/strategy", Body::empty())).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(core.pool().strategy(), Strategy::WeightedRoundRobin);
}

#[tokio::test]
async fn wrong_method_is_405() {
    let backend = start_static_backend("ok").await;
    let (_core, router) = app(config_for(&[&backend.address]));

    let response = send(&router, get("/admin/strategy")).await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    let response = send(&router, admin(Method::PUT, "/admin/backend", Body::empty())).await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn disabled_admin_api_is_proxied() {
    let backend = start_static_backend("upstream").await;
    let mut config = config_for(&[&backend.address]);
    config.features.admin_api = false;
    let (_core, router) = app(config);

    let response = send(&router, get("/admin/stats")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "upstream");
    assert_eq!(backend.last_request().unwrap().path, "/admin/stats");
}

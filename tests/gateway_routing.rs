//! End-to-end routing tests for the gateway.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::StatusCode;
use axum::response::Response;
use serde_json::Value;
use tokio::net::TcpListener;

use stream_gateway::config::schema::{
    FallbackConfig, FilterConfig, GatewayConfig, PredicateConfig, RouteConfig,
};
use stream_gateway::error::UpstreamError;
use stream_gateway::http::HttpServer;
use stream_gateway::resilience::FallbackRegistry;

mod common;

fn config(routes: Vec<RouteConfig>) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.routes = routes;
    config.timeouts.connect_secs = 1;
    config.timeouts.request_secs = 2;
    config
}

#[tokio::test]
async fn test_rewrite_path_and_query_reach_upstream() {
    let backend = common::start_echo_backend().await;
    let gateway = common::start_gateway(
        config(vec![RouteConfig::new(
            "Twitter",
            &format!("{}/@", backend.url()),
            PredicateConfig::path("/twitter/**"),
        )
        .with_filter(FilterConfig::RewritePath {
            regex: "/twitter/(?<handle>.*)".into(),
            replacement: "/${handle}".into(),
        })]),
        FallbackRegistry::new(),
    )
    .await;

    let res = common::client()
        .get(gateway.url("/twitter/alice?lang=en"))
        .send()
        .await
        .expect("Gateway unreachable");

    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().contains_key("x-request-id"));
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["path"], "/@/alice");
    assert_eq!(body["query"], "lang=en");
    assert_eq!(body["host"], backend.addr.to_string());
    assert_eq!(body["x_forwarded_for"], "127.0.0.1");
    assert!(body["x_request_id"].is_string());

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn test_host_predicate_and_set_path() {
    let backend = common::start_echo_backend().await;
    let gateway = common::start_gateway(
        config(vec![RouteConfig::new(
            "HostTest",
            &format!("{}/", backend.url()),
            PredicateConfig::And {
                predicates: vec![
                    PredicateConfig::path("/test"),
                    PredicateConfig::host("*.spring.io"),
                ],
            },
        )
        .with_filter(FilterConfig::SetPath {
            template: "/guides".into(),
        })
        .with_filter(FilterConfig::AddRequestHeader {
            name: "x-gateway".into(),
            value: "stream".into(),
        })]),
        FallbackRegistry::new(),
    )
    .await;

    let client = common::client();
    let res = client
        .get(gateway.url("/test"))
        .header("host", "docs.spring.io")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["path"], "/guides");
    assert_eq!(body["x_forwarded_host"], "docs.spring.io");
    assert_eq!(body["x_gateway"], "stream");

    let res = client
        .get(gateway.url("/test"))
        .header("host", "spring.com")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(backend.hits(), 1);

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn test_unregistered_path_is_no_match() {
    let gateway = common::start_gateway(GatewayConfig::demo(), FallbackRegistry::new()).await;

    let res = common::client()
        .get(gateway.url("/unregistered-path"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert!(body["route"].is_null());
    assert!(body["error"].as_str().unwrap().contains("/unregistered-path"));

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn test_rewrite_mismatch_is_never_forwarded() {
    let backend = common::start_echo_backend().await;
    let gateway = common::start_gateway(
        config(vec![RouteConfig::new(
            "legacy",
            &backend.url(),
            PredicateConfig::path("/legacy/**"),
        )
        .with_filter(FilterConfig::RewritePath {
            regex: "^/v1/(?<rest>.*)$".into(),
            replacement: "/${rest}".into(),
        })]),
        FallbackRegistry::new(),
    )
    .await;

    let res = common::client()
        .get(gateway.url("/legacy/orders"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["route"], "legacy");
    assert_eq!(backend.hits(), 0);

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn test_unreachable_upstream_names_route() {
    let dead = common::unused_addr().await;
    let gateway = common::start_gateway(
        config(vec![RouteConfig::new(
            "customers",
            &format!("http://{}", dead),
            PredicateConfig::path("/customers"),
        )]),
        FallbackRegistry::new(),
    )
    .await;

    let res = common::client()
        .get(gateway.url("/customers"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["route"], "customers");
    assert_eq!(body["target"], format!("http://{}/customers", dead));

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn test_registered_fallback_invoked_exactly_once() {
    let dead = common::unused_addr().await;
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();

    let fallbacks = FallbackRegistry::new();
    fallbacks.register("customers", move |err: &UpstreamError| {
        seen.fetch_add(1, Ordering::SeqCst);
        let mut response = Response::new(Body::from(format!("fallback for {}", err.route_id())));
        *response.status_mut() = StatusCode::SERVICE_UNAVAILABLE;
        response
    });

    let gateway = common::start_gateway(
        config(vec![RouteConfig::new(
            "customers",
            &format!("http://{}", dead),
            PredicateConfig::path("/customers"),
        )]),
        fallbacks,
    )
    .await;

    let res = common::client()
        .get(gateway.url("/customers"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(res.text().await.unwrap(), "fallback for customers");
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // not consulted for requests that never reach an upstream
    let res = common::client()
        .get(gateway.url("/elsewhere"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn test_declared_fallback_from_config() {
    let dead = common::unused_addr().await;
    let gateway = common::start_gateway(
        config(vec![RouteConfig::new(
            "customers",
            &format!("http://{}", dead),
            PredicateConfig::path("/customers"),
        )
        .with_fallback(FallbackConfig {
            status: 200,
            body: "[]".into(),
            content_type: "application/json".into(),
        })]),
        FallbackRegistry::new(),
    )
    .await;

    let res = common::client()
        .get(gateway.url("/customers"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["content-type"], "application/json");
    assert_eq!(res.text().await.unwrap(), "[]");

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn test_route_table_hot_swap() {
    let backend = common::start_echo_backend().await;
    let gateway = common::start_gateway(
        config(vec![RouteConfig::new(
            "old",
            &backend.url(),
            PredicateConfig::path("/old"),
        )]),
        FallbackRegistry::new(),
    )
    .await;
    let client = common::client();

    assert_eq!(client.get(gateway.url("/new")).send().await.unwrap().status(), StatusCode::NOT_FOUND);

    // an invalid table is rejected and the current one stays
    gateway
        .updates
        .send(config(vec![RouteConfig::new(
            "broken",
            "ftp://nowhere",
            PredicateConfig::path("/new"),
        )]))
        .unwrap();
    gateway
        .updates
        .send(config(vec![RouteConfig::new(
            "new",
            &backend.url(),
            PredicateConfig::path("/new"),
        )]))
        .unwrap();

    let mut status = StatusCode::NOT_FOUND;
    for _ in 0..50 {
        status = client.get(gateway.url("/new")).send().await.unwrap().status();
        if status == StatusCode::OK {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(status, StatusCode::OK);
    assert_eq!(client.get(gateway.url("/old")).send().await.unwrap().status(), StatusCode::NOT_FOUND);

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn test_admin_api() {
    let mut config = config(vec![RouteConfig::new(
        "customers",
        "http://localhost:9200",
        PredicateConfig::path("/customers"),
    )]);
    config.admin.api_key = "test-key".into();

    let server = HttpServer::new(config).unwrap();
    let admin = server.admin_router();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, admin).await;
    });

    let client = common::client();
    let res = client.get(format!("http://{}/healthz", addr)).send().await.unwrap();
    assert_eq!(res.text().await.unwrap(), "ok");

    let res = client.get(format!("http://{}/admin/routes", addr)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(format!("http://{}/admin/routes", addr))
        .bearer_auth("test-key")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["generation"], 0);
    assert_eq!(body["routes"][0]["id"], "customers");
    assert_eq!(body["routes"][0]["upstream"], "http://localhost:9200/");
    assert_eq!(body["routes"][0]["fallback"], false);
}

//! End-to-end tests for the HTTP surface.
//!
//! Requests are driven through the router with `tower::ServiceExt::oneshot`;
//! the connection peer is supplied as a `ConnectInfo` extension the same way
//! `into_make_service_with_connect_info` would.
//!
//! Run with: `cargo test --test server_tests`
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use remoteaddr::models::{HealthResponse, WhoAmIResponse};
use remoteaddr::{TrustRegistry, build_router};
use serde_json::Value;
use tower::ServiceExt;

fn app() -> Router {
    build_router(Arc::new(
        TrustRegistry::default().with_forwarders(["127.0.0.0/8", "::1/128"]),
    ))
}

fn request(peer: &str, headers: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder()
        .uri("/")
        .extension(ConnectInfo(peer.parse::<SocketAddr>().unwrap()));
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::empty()).unwrap()
}

async fn whoami(req: Request<Body>) -> WhoAmIResponse {
    let response = app().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_whoami_direct_client() {
    let body = whoami(request(
        "31.69.99.22:51234",
        &[("X-Forwarded-For", "1.2.3.4")],
    ))
    .await;

    assert_eq!(
        body,
        WhoAmIResponse {
            ip: "31.69.99.22".to_string(),
            source: "peer".to_string(),
            header: None,
        }
    );
}

#[tokio::test]
async fn test_whoami_behind_loopback_proxy() {
    let body = whoami(request(
        "127.0.0.1:51234",
        &[
            ("CF-Connecting-IP", "85.100.50.25"),
            ("X-Forwarded-For", "31.69.99.22"),
        ],
    ))
    .await;

    assert_eq!(body.ip, "31.69.99.22");
    assert_eq!(body.source, "header");
    assert_eq!(body.header.as_deref(), Some("X-Forwarded-For"));
}

#[tokio::test]
async fn test_whoami_through_cdn_chain() {
    let body = whoami(request(
        "[::1]:51234",
        &[("X-Forwarded-For", "31.69.99.22, 85.100.50.25, 103.21.244.10")],
    ))
    .await;

    assert_eq!(body.ip, "85.100.50.25");
}

#[tokio::test]
async fn test_whoami_only_trusted_hops() {
    let body = whoami(request(
        "127.0.0.1:51234",
        &[("X-Real-Ip", "10.20.30.40")],
    ))
    .await;

    assert_eq!(body.ip, "10.20.30.40");
    assert_eq!(body.source, "trusted_hop");
    assert_eq!(body.header.as_deref(), Some("X-Real-Ip"));
}

#[tokio::test]
async fn test_whoami_dual_stack_peer_reports_ipv4() {
    let direct = whoami(request(
        "[::ffff:31.69.99.22]:4000",
        &[("X-Forwarded-For", "1.2.3.4")],
    ))
    .await;
    assert_eq!(direct.ip, "31.69.99.22");
    assert_eq!(direct.source, "peer");

    let proxied = whoami(request(
        "[::ffff:10.0.0.1]:4000",
        &[("X-Forwarded-For", "::ffff:31.69.99.22")],
    ))
    .await;
    assert_eq!(proxied.ip, direct.ip);
    assert_eq!(proxied.source, "header");
}

#[tokio::test]
async fn test_whoami_without_connect_info_is_server_error() {
    let req = Request::builder()
        .uri("/")
        .header("X-Forwarded-For", "1.2.3.4")
        .body(Body::empty())
        .unwrap();

    let response = app().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "client_ip_unavailable");
}

#[tokio::test]
async fn test_health_check() {
    let req = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let response = app().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let health: HealthResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
}

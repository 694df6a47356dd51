//! Capture real traffic through the proxy, then replay it offline.

use hermetic_http::codec::ExchangeCodec;
use hermetic_http::config::ConnectionPoolConfig;
use hermetic_http::matcher::{BoundMatcher, MatchingStrategy};
use hermetic_http::model::{ContentComparator, Method, Request, Response};
use hermetic_http::proxy::{
    ExchangeRecorder, Forwarder, HyperOutboundClient, InterceptingProxy, PassThroughRoute, Scheme,
};
use hermetic_http::replay::FileReplayProvider;
use hermetic_http::store::ExpectationStore;
use hermetic_http::transport::MockServer;
use std::net::SocketAddr;
use std::sync::Arc;
use tempfile::TempDir;

fn any_port() -> SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

fn outbound() -> Arc<HyperOutboundClient> {
    // No TLS in these tests; skipping verification avoids loading system roots
    Arc::new(HyperOutboundClient::new(&ConnectionPoolConfig::default(), true).unwrap())
}

async fn upstream() -> MockServer {
    let store = ExpectationStore::new().with_strategy(MatchingStrategy::simple());
    store.expect(
        Request::builder(Method::Post, "/svc")
            .header("Content-Type", "application/json")
            .content(r#"{"a":1}"#)
            .comparator(ContentComparator::Json)
            .build()
            .unwrap(),
        Response::new(201)
            .with_content_type("application/json")
            .with_content(r#"{"id":7}"#),
    );
    store.expect(
        Request::builder(Method::Get, "/health").build().unwrap(),
        Response::new(204),
    );
    MockServer::start(any_port(), Arc::new(store)).await.unwrap()
}

async fn record(upstream: &MockServer, codec: ExchangeCodec) -> InterceptingProxy {
    let target = upstream.local_addr();
    let forwarder = Forwarder::new(outbound())
        .with_route(PassThroughRoute::new(Scheme::Http, target.ip().to_string(), target.port()))
        .with_recorder(Arc::new(ExchangeRecorder::new(codec)));
    InterceptingProxy::new(any_port(), forwarder)
}

#[tokio::test]
async fn test_record_then_replay() {
    let dir = TempDir::new().unwrap();
    let codec = ExchangeCodec::new(dir.path(), "svc");
    let upstream = upstream().await;
    let proxy = record(&upstream, codec.clone()).await;
    let proxy_addr = proxy.start().await.unwrap();
    let client = reqwest::Client::new();

    let recorded = client
        .post(format!("http://{proxy_addr}/svc"))
        .header("Content-Type", "application/json")
        .body(r#"{"a":1}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(recorded.status(), 201);
    assert_eq!(recorded.text().await.unwrap(), r#"{"id":7}"#);

    let health = client
        .get(format!("http://{proxy_addr}/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(health.status(), 204);

    proxy.stop().await.unwrap();
    assert!(upstream.verify().is_ok());
    upstream.stop().await.unwrap();

    let paths = codec.paths(1);
    assert!(paths.request.is_file());
    assert!(paths.request_entity.is_file());
    assert!(paths.response_entity.is_file());
    assert!(!codec.paths(2).response_entity.exists());
    assert!(!codec.has_request(3));

    // Upstream is gone; the recording answers instead
    let replay = MockServer::start(any_port(), Arc::new(FileReplayProvider::new(codec)))
        .await
        .unwrap();
    let replayed = client
        .post(format!("{}/svc", replay.url()))
        .header("Content-Type", "application/json")
        .body(r#"{"a":1}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(replayed.status(), 201);
    assert_eq!(
        replayed.headers().get("content-type").unwrap(),
        "application/json"
    );
    assert_eq!(replayed.text().await.unwrap(), r#"{"id":7}"#);

    let health = client
        .get(format!("{}/health", replay.url()))
        .send()
        .await
        .unwrap();
    assert_eq!(health.status(), 204);

    let unknown = client
        .get(format!("{}/unknown", replay.url()))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status(), 404);

    let err = replay.verify().unwrap_err();
    assert!(err.to_string().contains("1 unexpected request(s)"));
    replay.stop().await.unwrap();
}

#[tokio::test]
async fn test_replay_with_extra_headers_under_superset_matcher() {
    let dir = TempDir::new().unwrap();
    let codec = ExchangeCodec::new(dir.path(), "svc");
    let recorded = Request::builder(Method::Post, "/svc")
        .header("Content-Type", "application/json")
        .header("Accept", "application/json")
        .content(r#"{"a":1}"#)
        .comparator(ContentComparator::Json)
        .build()
        .unwrap();
    let response = Response::new(200)
        .with_content_type("application/json")
        .with_content(r#"{"ok":true}"#);
    codec.write_exchange(1, &recorded, &response).unwrap();

    let provider = FileReplayProvider::new(codec).with_matcher(BoundMatcher::new(
        recorded,
        MatchingStrategy::ignore_additional_headers(),
    ));
    let replay = MockServer::start(any_port(), Arc::new(provider))
        .await
        .unwrap();

    let answer = reqwest::Client::new()
        .post(format!("{}/svc", replay.url()))
        .header("X-Trace", "123")
        .header("Accept", "application/json")
        .header("Content-Type", "application/json")
        .body(r#"{"a": 1}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(answer.status(), 200);
    assert_eq!(answer.text().await.unwrap(), r#"{"ok":true}"#);
    assert!(replay.verify().is_ok());
    replay.stop().await.unwrap();
}

#[tokio::test]
async fn test_unreachable_upstream_is_571() {
    let dir = TempDir::new().unwrap();
    let codec = ExchangeCodec::new(dir.path(), "svc");
    // Bind then drop a listener to get a port nothing listens on
    let closed = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();
    let forwarder = Forwarder::new(outbound())
        .with_route(PassThroughRoute::new(Scheme::Http, "127.0.0.1", closed.port()))
        .with_recorder(Arc::new(ExchangeRecorder::new(codec.clone())));
    let proxy = InterceptingProxy::new(any_port(), forwarder);
    let addr = proxy.start().await.unwrap();

    let response = reqwest::get(format!("http://{addr}/anything")).await.unwrap();
    assert_eq!(response.status(), 571);
    assert!(!codec.has_request(1));
    proxy.stop().await.unwrap();
}

#[tokio::test]
async fn test_proxy_lifecycle() {
    let dir = TempDir::new().unwrap();
    let upstream = upstream().await;
    let proxy = record(&upstream, ExchangeCodec::new(dir.path(), "svc")).await;
    assert!(!proxy.is_listening().await);

    let first = proxy.start().await.unwrap();
    assert!(proxy.is_listening().await);

    // Restarting closes the previous listener first
    let second = proxy.start().await.unwrap();
    assert_eq!(proxy.local_addr().await, Some(second));
    assert!(reqwest::get(format!("http://{first}/health")).await.is_err());

    let health = reqwest::get(format!("http://{second}/health")).await.unwrap();
    assert_eq!(health.status(), 204);

    proxy.stop().await.unwrap();
    assert!(!proxy.is_listening().await);
    assert_eq!(proxy.local_addr().await, None);
    upstream.stop().await.unwrap();
}

#[tokio::test]
async fn test_blank_upstream_content_type_is_recorded_as_absent() {
    let store = ExpectationStore::new().with_strategy(MatchingStrategy::simple());
    store.expect(
        Request::builder(Method::Get, "/blank").build().unwrap(),
        Response::new(200).with_content_type("").with_content("x"),
    );
    let upstream = MockServer::start(any_port(), Arc::new(store)).await.unwrap();
    let dir = TempDir::new().unwrap();
    let codec = ExchangeCodec::new(dir.path(), "svc");
    let proxy = record(&upstream, codec.clone()).await;
    let addr = proxy.start().await.unwrap();

    let response = reqwest::get(format!("http://{addr}/blank")).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "x");

    let replayed = codec.read_response(1).unwrap();
    assert_eq!(replayed, Response::new(200).with_content("x"));
    proxy.stop().await.unwrap();
    upstream.stop().await.unwrap();
}

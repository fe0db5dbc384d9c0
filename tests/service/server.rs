//! Live server tests.
//!
//! These tests start a real server, send raw TCP traffic, and assert on
//! observable behavior.

use std::net::SocketAddr;
use std::sync::Arc;

use gangway::{App, Metadata, Overrides, server};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use super::add;

/// Start a server on a random local port serving `add`, with the document
/// published.
async fn start_test_server() -> server::Server {
    let overrides = Overrides::new()
        .set("host", "127.0.0.1")
        .set("port", 0u16)
        .set("publish_openapi", true);
    let app = App::build(vec![add()], &Metadata::new(), &overrides).expect("failed to build app");
    server::start(Arc::new(app))
        .await
        .expect("failed to start test server")
}

/// Send a raw HTTP/1.1 request with `Connection: close` and read the full response.
async fn raw_request(addr: SocketAddr, payload: &[u8]) -> String {
    let mut stream = TcpStream::connect(addr).await.expect("failed to connect");
    stream.write_all(payload).await.expect("failed to write");

    let mut buf = Vec::new();
    let _ = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        stream.read_to_end(&mut buf),
    )
    .await;
    String::from_utf8_lossy(&buf).into_owned()
}

fn post(path: &str, body: &str) -> Vec<u8> {
    format!(
        "POST {path} HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\n\
         Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
    .into_bytes()
}

#[tokio::test]
async fn serves_ping_route_and_document() {
    let server = start_test_server().await;
    let addr = server.addr();

    let ping = raw_request(
        addr,
        b"GET /ping HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;
    let sum = raw_request(addr, &post("/add", r#"{"a": 10, "b": 5}"#)).await;
    let doc = raw_request(
        addr,
        b"GET /openapi HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;

    server.shutdown().await.unwrap();

    assert!(ping.starts_with("HTTP/1.1 200"), "{ping}");
    assert!(ping.contains(r#"{"ping":"pong"}"#), "{ping}");
    assert!(sum.starts_with("HTTP/1.1 200"), "{sum}");
    assert!(sum.ends_with("15"), "{sum}");
    assert!(doc.contains(r#""openapi":"3.0.2""#), "{doc}");
}

#[tokio::test]
async fn responses_carry_security_headers() {
    let server = start_test_server().await;
    let response = raw_request(server.addr(), &post("/add", r#"{"b": 1}"#)).await;
    server.shutdown().await.unwrap();

    let lower = response.to_ascii_lowercase();
    assert!(response.starts_with("HTTP/1.1 400"), "{response}");
    assert!(lower.contains("x-content-type-options: nosniff"), "{response}");
    assert!(lower.contains("x-frame-options: deny"), "{response}");
    assert!(lower.contains("x-error-type: inputerror"), "{response}");
}

/// Sends headers declaring a 10 MB Content-Length; the server should reject
/// based on the header alone and return 413 Payload Too Large.
#[tokio::test]
async fn server_rejects_oversized_body() {
    let server = start_test_server().await;
    let response = raw_request(
        server.addr(),
        b"POST /add HTTP/1.1\r\nHost: localhost\r\nContent-Length: 10485760\r\nConnection: close\r\n\r\n",
    )
    .await;
    server.shutdown().await.unwrap();

    assert!(
        response.contains("413"),
        "Expected 413 Payload Too Large, got:\n{response}"
    );
}

#[tokio::test]
async fn unknown_path_is_not_found() {
    let server = start_test_server().await;
    let response = raw_request(
        server.addr(),
        b"GET /missing HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;
    server.shutdown().await.unwrap();
    assert!(response.starts_with("HTTP/1.1 404"), "{response}");
}

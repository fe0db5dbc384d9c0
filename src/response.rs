//! HTTP response builders.
//!
//! Every response the core produces is tagged with an explicit content type.

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{CONTENT_TYPE, HeaderValue};
use hyper::{Response, StatusCode};
use serde::Serialize;
use serde_json::Value;

/// Response body type used throughout gangway.
pub type Body = Full<Bytes>;

/// Full response type used throughout gangway.
pub type HttpResponse = Response<Body>;

/// Content types understood by the bundled mappers.
pub mod content_type {
    pub const JSON: &str = "application/json";
    pub const BINARY: &str = "application/octet-stream";
    pub const FORM: &str = "multipart/form-data";
    pub const RAW: &str = "text/plain";
    pub const HTML: &str = "text/html";
}

/// A wire payload produced by an output mapper.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Bytes(Bytes),
    Text(String),
    Html(String),
}

impl Payload {
    pub fn content_type(&self) -> &'static str {
        match self {
            Payload::Json(_) => content_type::JSON,
            Payload::Bytes(_) => content_type::BINARY,
            Payload::Text(_) => content_type::RAW,
            Payload::Html(_) => content_type::HTML,
        }
    }

    /// Serialize the payload into a response with the given status.
    pub fn into_response(self, status: StatusCode) -> crate::Result<HttpResponse> {
        let content_type = self.content_type();
        let body = match self {
            Payload::Json(value) => Bytes::from(serde_json::to_vec(&value)?),
            Payload::Bytes(bytes) => bytes,
            Payload::Text(text) | Payload::Html(text) => Bytes::from(text),
        };
        Ok(build(status, content_type, body))
    }
}

fn build(status: StatusCode, content_type: &'static str, body: Bytes) -> HttpResponse {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

/// Build a JSON response with the given status code and body.
pub fn json<T: Serialize>(status: StatusCode, body: &T) -> crate::Result<HttpResponse> {
    let json = serde_json::to_vec(body)?;
    Ok(build(status, content_type::JSON, Bytes::from(json)))
}

/// Build a 200 OK JSON response.
pub fn ok<T: Serialize>(body: &T) -> crate::Result<HttpResponse> {
    json(StatusCode::OK, body)
}

/// Build a 200 OK HTML response.
pub fn html(page: String) -> HttpResponse {
    build(StatusCode::OK, content_type::HTML, Bytes::from(page))
}

/// Build an empty response, used for CORS preflight answers.
pub fn no_content() -> HttpResponse {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = StatusCode::NO_CONTENT;
    response
}

/// Build a `{"error": message}` response tagged with the error kind.
pub fn error(status: StatusCode, kind: &'static str, message: &str) -> HttpResponse {
    let body = serde_json::json!({ "error": message });
    let mut response = build(status, content_type::JSON, Bytes::from(body.to_string()));
    response
        .headers_mut()
        .insert("X-Error-Type", HeaderValue::from_static(kind));
    response
}

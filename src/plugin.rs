//! Plugins wrap endpoints: they can reject a request before the handler runs
//! and adjust every response afterwards.
//!
//! Authentication is left to plugins supplied by the caller.

use hyper::header::HeaderValue;

use crate::Result;
use crate::request::Request;
use crate::response::HttpResponse;

pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    /// Runs before the handler. An error is answered without calling it.
    fn before(&self, _req: &Request) -> Result<()> {
        Ok(())
    }

    /// Runs on the response, in reverse plugin order.
    fn after(&self, _req: &Request, _resp: &mut HttpResponse) {}
}

pub const CORS_ALLOW_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
pub const CORS_ALLOW_HEADERS: &str =
    "Origin, Accept, Content-Type, X-Requested-With, Authorization, X-api-key";

/// Adds CORS headers to every response it wraps.
#[derive(Debug, Clone)]
pub struct Cors {
    allowed_origins: String,
}

impl Cors {
    pub fn new(allowed_origins: impl Into<String>) -> Self {
        Self {
            allowed_origins: allowed_origins.into(),
        }
    }
}

impl Plugin for Cors {
    fn name(&self) -> &str {
        "cors"
    }

    fn after(&self, _req: &Request, resp: &mut HttpResponse) {
        let headers = resp.headers_mut();
        if let Ok(origins) = HeaderValue::from_str(&self.allowed_origins) {
            headers.insert("Access-Control-Allow-Origin", origins);
        }
        headers.insert(
            "Access-Control-Allow-Methods",
            HeaderValue::from_static(CORS_ALLOW_METHODS),
        );
        headers.insert(
            "Access-Control-Allow-Headers",
            HeaderValue::from_static(CORS_ALLOW_HEADERS),
        );
    }
}

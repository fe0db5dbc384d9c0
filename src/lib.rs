//! Gangway - expose plain functions as HTTP endpoints.
//!
//! Gangway binds described functions to routes and serves them:
//!
//! - **Signature**: Callables with explicit parameter and return annotations
//! - **Schema**: JSON schemas extracted from signatures
//! - **Config**: Three-tier settings (function metadata → overrides → defaults)
//! - **Mapper**: Wire formats (JSON, binary, form, raw) to call arguments and back
//! - **Route**: The decode → validate → invoke → encode pipeline
//! - **OpenAPI**: The document describing every bound route
//! - **App**: Composition with `/ping`, `/openapi`, Swagger and CORS
//! - **Server**: Hyper-based HTTP server
//!
//! # Example
//!
//! ```ignore
//! use gangway::{Annotation, App, Function, Metadata, Overrides, Param, Signature};
//!
//! #[tokio::main]
//! async fn main() -> gangway::Result<()> {
//!     let add = Function::new(
//!         "add",
//!         Signature::new()
//!             .param(Param::new("a"))
//!             .param(Param::new("b").annotated(Annotation::Int).default(0))
//!             .returns(Annotation::Int),
//!         |args| {
//!             let a: i64 = args.get("a")?;
//!             let b: i64 = args.get("b")?;
//!             Ok(gangway::json!(a + b))
//!         },
//!     );
//!
//!     let overrides = Overrides::new().set("publish_openapi", true);
//!     gangway::server::run_app(vec![add], &Metadata::new(), &overrides).await
//! }
//! ```

pub mod app;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod mapper;
pub mod metadata;
pub mod module;
pub mod multipart;
pub mod openapi;
pub mod outcome;
pub mod plugin;
pub mod request;
pub mod response;
pub mod route;
pub mod router;
pub mod schema;
pub mod server;
pub mod signature;
pub mod validator;

// Re-export main types at crate root
pub use app::{App, AppSpec, Handler, SubService};
pub use config::{ConfigValue, Defaults, Hook, Loader, Overrides, Resolver};
pub use dispatch::{Dispatch, Exposed, ObjectStore};
pub use error::{Error, Result};
pub use metadata::Metadata;
pub use module::Service;
pub use openapi::Info;
pub use outcome::Outcome;
pub use plugin::Plugin;
pub use request::Request;
pub use route::{Route, Scheduling};
pub use router::Router;
pub use signature::{Annotation, Function, Param, Record, Signature};

// Re-export commonly used dependencies for convenience
pub use hyper::Method;
pub use serde_json::json;

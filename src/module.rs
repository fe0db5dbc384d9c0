//! Service trait for grouping handlers.
//!
//! A service names a set of handlers and, optionally, settings of its own.
//! Several services can be mounted side by side, each under `/<name>`.
//!
//! # Example
//!
//! ```ignore
//! use gangway::{Function, Handler, Service, Signature};
//!
//! pub struct Health;
//!
//! impl Service for Health {
//!     fn name(&self) -> &str {
//!         "health"
//!     }
//!
//!     fn handlers(&self) -> Vec<Handler> {
//!         let status = Function::new("status", Signature::new(), |_| {
//!             Ok(serde_json::json!({"status": "ok"}))
//!         });
//!         vec![status.into()]
//!     }
//! }
//! ```

use crate::app::{AppSpec, Handler, SubService};
use crate::config::Overrides;

/// A named group of handlers.
pub trait Service: Send + Sync {
    /// Service name, used as its mount prefix.
    fn name(&self) -> &str;

    /// Handlers to expose.
    fn handlers(&self) -> Vec<Handler>;

    /// Settings applied on top of the parent's.
    fn config(&self) -> Option<Overrides> {
        None
    }

    /// This service as a mountable sub-service.
    fn sub_service(&self) -> SubService {
        SubService {
            handlers: self.handlers(),
            config: self.config(),
        }
    }
}

/// Mount each service under `/<name>`.
pub fn mount(services: &[&dyn Service]) -> AppSpec {
    AppSpec::Services(
        services
            .iter()
            .map(|service| (format!("/{}", service.name()), service.sub_service()))
            .collect(),
    )
}

//! Results of pipeline steps that may or may not suspend.

use std::future::Future;
use std::pin::Pin;

/// Boxed future for suspending steps.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What a mapper or function body hands back: either a finished result or a
/// future that still has to be driven.
pub enum Outcome<T> {
    Ready(crate::Result<T>),
    Pending(BoxFuture<'static, crate::Result<T>>),
}

impl<T> Outcome<T> {
    pub fn ready(value: T) -> Self {
        Outcome::Ready(Ok(value))
    }

    pub fn pending<F>(fut: F) -> Self
    where
        F: Future<Output = crate::Result<T>> + Send + 'static,
    {
        Outcome::Pending(Box::pin(fut))
    }

    /// Await the step on the caller's event loop.
    pub async fn resolve(self) -> crate::Result<T> {
        match self {
            Outcome::Ready(result) => result,
            Outcome::Pending(fut) => fut.await,
        }
    }

    /// Drive the step to completion from synchronous code.
    ///
    /// A pending step gets a fresh current-thread runtime for this one call.
    /// Must not be called from inside an async task.
    pub fn resolve_blocking(self) -> crate::Result<T> {
        match self {
            Outcome::Ready(result) => result,
            Outcome::Pending(fut) => {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()?;
                runtime.block_on(fut)
            }
        }
    }
}

impl<T> From<crate::Result<T>> for Outcome<T> {
    fn from(result: crate::Result<T>) -> Self {
        Outcome::Ready(result)
    }
}

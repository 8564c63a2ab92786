//! Graceful shutdown orchestration
//!
//! Components register async cleanup handlers on a shared [`Shutdown`]
//! handle. When the process is asked to stop, the handlers run in reverse
//! registration order (LIFO), so whatever started last is torn down first.
//! Background tasks watch [`Shutdown::token`] to stop their loops.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use shutdown::Shutdown;
//!
//! # async fn example() {
//! let shutdown = Shutdown::new();
//!
//! shutdown.register("database", || async {
//!     // close the pool
//!     Ok(())
//! });
//!
//! // Blocks until SIGINT/SIGTERM, then runs the handlers
//! if let Err(e) = shutdown.wait_for_signal().await {
//!     tracing::error!(error = %e, "Shutdown finished with errors");
//! }
//! # }
//! ```

mod error;
mod signal;

pub use error::{HandlerError, ShutdownError};
pub use signal::shutdown_signal;
pub use tokio_util::sync::CancellationToken;

use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Overall time budget for running every handler
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

type HandlerFn = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<()>> + Send>;

struct Handler {
    name: String,
    run: HandlerFn,
}

#[derive(Default)]
struct Inner {
    handlers: Mutex<Vec<Handler>>,
    token: CancellationToken,
}

/// Cloneable registry of shutdown handlers
#[derive(Clone, Default)]
pub struct Shutdown {
    inner: Arc<Inner>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named cleanup handler
    ///
    /// Handlers registered after a completed shutdown run on the next call
    /// to [`Shutdown::shutdown`].
    pub fn register<F, Fut>(&self, name: impl Into<String>, handler: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let name = name.into();
        debug!(handler = %name, "Registered shutdown handler");
        self.inner.handlers.lock().push(Handler {
            name,
            run: Box::new(move || handler().boxed()),
        });
    }

    /// Token cancelled as soon as shutdown begins
    pub fn token(&self) -> CancellationToken {
        self.inner.token.clone()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Number of handlers still waiting to run
    pub fn pending(&self) -> usize {
        self.inner.handlers.lock().len()
    }

    /// Cancel the token, then run every handler in LIFO order
    ///
    /// All handlers share one deadline of `timeout`. A handler that misses
    /// it is recorded as failed and the remaining handlers still get called.
    /// The registry is emptied, so a second call returns `Ok(())`.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), ShutdownError> {
        self.inner.token.cancel();

        let handlers = std::mem::take(&mut *self.inner.handlers.lock());
        if handlers.is_empty() {
            return Ok(());
        }

        info!(handlers = handlers.len(), timeout = ?timeout, "Running shutdown handlers");

        let deadline = Instant::now() + timeout;
        let mut failures = Vec::new();

        for handler in handlers.into_iter().rev() {
            let Handler { name, run } = handler;
            let result = match tokio::time::timeout_at(deadline, run()).await {
                Ok(result) => result,
                Err(_) => Err(error::timed_out(timeout)),
            };

            match result {
                Ok(()) => debug!(handler = %name, "Shutdown handler completed"),
                Err(source) => {
                    warn!(handler = %name, error = %source, "Shutdown handler failed");
                    failures.push(HandlerError { name, source });
                }
            }
        }

        if failures.is_empty() {
            info!("Shutdown complete");
            Ok(())
        } else {
            Err(ShutdownError::Handlers(failures))
        }
    }

    /// Wait for SIGINT/SIGTERM and shut down with [`DEFAULT_SHUTDOWN_TIMEOUT`]
    pub async fn wait_for_signal(&self) -> Result<(), ShutdownError> {
        self.wait_for_signal_with_timeout(DEFAULT_SHUTDOWN_TIMEOUT)
            .await
    }

    /// Wait for SIGINT/SIGTERM, or for the token to be cancelled elsewhere,
    /// then shut down with `timeout`
    pub async fn wait_for_signal_with_timeout(
        &self,
        timeout: Duration,
    ) -> Result<(), ShutdownError> {
        let token = self.token();
        tokio::select! {
            _ = shutdown_signal() => {},
            _ = token.cancelled() => {
                info!("Shutdown requested");
            },
        }
        self.shutdown(timeout).await
    }
}

//! Cooperative shutdown of background activities.
//!
//! The process entrypoint owns one [`ShutdownCoordinator`]. Every background
//! activity (HTTP server, scheduled job, connection pool) gets its own
//! [`ShutdownHandle`] at startup. On termination the entrypoint calls
//! [`ShutdownCoordinator::cancel`], which signals every handle first and only
//! then waits for them, all under one shared deadline.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShutdownError {
    /// Handles must be created before shutdown starts; a late one would never be awaited.
    #[error("shutdown already started, refusing to register handle {0:?}")]
    AlreadyCancelled(String),
}

/// Creates shutdown handles and cancels all of them at once.
///
/// `cancel` waits for every handle to call [`ShutdownHandle::notify`], or
/// until the configured timeout elapses, whichever comes first.
#[derive(Debug)]
pub struct ShutdownCoordinator {
    shutdown_timeout: Duration,
    handles: Mutex<Vec<ShutdownHandle>>,
    cancelled: AtomicBool,
}

impl ShutdownCoordinator {
    pub fn new(shutdown_timeout: Duration) -> Self {
        Self {
            shutdown_timeout,
            handles: Mutex::new(Vec::new()),
            cancelled: AtomicBool::new(false),
        }
    }

    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    /// Register a new handle. The name is only used for diagnostics.
    pub fn new_handle(&self, name: impl Into<String>) -> Result<ShutdownHandle, ShutdownError> {
        let name = name.into();
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        // Checked under the lock: `cancel` sets the flag before it snapshots the list.
        if self.cancelled.load(Ordering::Acquire) {
            return Err(ShutdownError::AlreadyCancelled(name));
        }

        debug!(handle = %name, "registering shutdown handle");
        let handle = ShutdownHandle::new(name, self.shutdown_timeout);
        handles.push(handle.clone());
        Ok(handle)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Cancel every handle, then wait for all of them to complete their shutdown.
    ///
    /// Only the first call does anything; later calls return immediately.
    pub async fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::AcqRel) {
            debug!("shutdown already requested");
            return;
        }

        let handles = self
            .handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for handle in &handles {
            debug!(handle = handle.name(), "signaling shutdown");
            handle.inner.cancel.cancel();
        }

        let deadline = Instant::now().checked_add(self.shutdown_timeout);
        let mut abandoned = 0_usize;
        for handle in &handles {
            debug!(handle = handle.name(), "waiting for handle");
            let completed = handle.inner.completed.cancelled();
            let in_time = match deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, completed).await.is_ok(),
                None => {
                    completed.await;
                    true
                }
            };

            if in_time {
                debug!(handle = handle.name(), "handle completed shutdown");
            } else {
                abandoned += 1;
                warn!(
                    handle = handle.name(),
                    timeout = ?self.shutdown_timeout,
                    "handle didn't complete shutdown in time"
                );
            }
        }

        info!(handles = handles.len(), abandoned, "shutdown sequence finished");
    }
}

/// Capability given to one background activity.
///
/// Clones share the same signals, so an activity may pass clones into the
/// futures it spawns.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    inner: Arc<HandleInner>,
}

#[derive(Debug)]
struct HandleInner {
    name: String,
    shutdown_timeout: Duration,
    cancel: CancellationToken,
    completed: CancellationToken,
    notified: AtomicBool,
}

impl ShutdownHandle {
    fn new(name: String, shutdown_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                name,
                shutdown_timeout,
                cancel: CancellationToken::new(),
                completed: CancellationToken::new(),
                notified: AtomicBool::new(false),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Time allotted for graceful shutdown, counted from the moment `done` resolves.
    ///
    /// Past it the coordinator stops waiting for this activity.
    pub fn timeout(&self) -> Duration {
        self.inner.shutdown_timeout
    }

    /// Resolves once shutdown has been requested; immediately if it already was.
    pub async fn done(&self) {
        self.inner.cancel.cancelled().await;
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Report that this activity finished its graceful shutdown.
    ///
    /// Later calls are no-ops. Calling it before shutdown was requested
    /// (an activity that exits on its own) is allowed.
    pub fn notify(&self) {
        if self
            .inner
            .notified
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            debug!(handle = self.name(), "handle notified shutdown completion");
            self.inner.completed.cancel();
        }
    }

    pub fn has_notified(&self) -> bool {
        self.inner.notified.load(Ordering::Acquire)
    }
}

//! Async runtime for mobile platforms.
//!
//! Swift and Kotlin call into the bridge from threads Tokio knows nothing
//! about. Each [`crate::BridgeHostFFI`] owns an [`AsyncRuntime`] that runs
//! reply handlers and backs the blocking and callback-style request APIs.

use crate::{BridgeMobileError, Result};
use std::future::Future;
use tokio::runtime::{Builder, Handle, Runtime};

/// Async runtime wrapper for mobile.
///
/// The last reference to a bridge may be released from one of the
/// runtime's own threads, so the runtime shuts down in the background
/// instead of blocking on drop.
pub struct AsyncRuntime {
    runtime: Option<Runtime>,
    handle: Handle,
}

impl AsyncRuntime {
    /// Create a runtime with one worker per core.
    pub fn new() -> Result<Self> {
        Self::build(Builder::new_multi_thread())
    }

    /// Create with a fixed number of worker threads.
    pub fn with_threads(num_threads: usize) -> Result<Self> {
        let mut builder = Builder::new_multi_thread();
        builder.worker_threads(num_threads);
        Self::build(builder)
    }

    fn build(mut builder: Builder) -> Result<Self> {
        let runtime = builder
            .enable_time()
            .thread_name("paykit-bridge")
            .build()
            .map_err(|e| BridgeMobileError::Internal {
                msg: format!("Failed to create runtime: {}", e),
            })?;
        let handle = runtime.handle().clone();
        Ok(Self {
            runtime: Some(runtime),
            handle,
        })
    }

    /// Handle for spawning onto this runtime.
    pub fn handle(&self) -> Handle {
        self.handle.clone()
    }

    /// Run a future to completion, blocking the current thread.
    ///
    /// Must be called from a platform thread, never from inside a Tokio
    /// runtime. Must not be called on the main thread while the future
    /// waits on the web view, which delivers on the main thread.
    ///
    /// # Panics
    ///
    /// Panics if called from within a Tokio runtime context.
    pub fn block_on<F, T>(&self, future: F) -> T
    where
        F: Future<Output = T>,
    {
        self.handle.block_on(future)
    }

    /// Spawn an async task (fire and forget).
    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handle.spawn(future);
    }
}

impl Drop for AsyncRuntime {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

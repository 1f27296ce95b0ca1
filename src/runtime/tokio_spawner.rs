//! Tokio runtime spawner implementation.

use std::future::Future;
use std::sync::Arc;

use crate::core::protector::Spawn;

#[derive(Clone)]
enum Inner {
    /// Borrows an existing runtime via its handle.
    Handle(tokio::runtime::Handle),
    /// Owns a runtime built by [`TokioSpawner::with_worker_threads`].
    Owned(Arc<tokio::runtime::Runtime>),
}

/// Tokio-based spawner that runs watchdog and reprocess tasks on a tokio
/// runtime.
#[derive(Clone)]
pub struct TokioSpawner {
    inner: Inner,
}

impl TokioSpawner {
    /// Create a spawner from an existing tokio runtime handle.
    #[must_use]
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self {
            inner: Inner::Handle(handle),
        }
    }

    /// Create a spawner owning a new multi-threaded runtime with the given
    /// number of worker threads.
    ///
    /// # Errors
    ///
    /// Returns the I/O error from the runtime builder.
    pub fn with_worker_threads(worker_threads: usize) -> Result<Self, std::io::Error> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(worker_threads)
            .enable_all()
            .build()?;
        Ok(Self {
            inner: Inner::Owned(Arc::new(runtime)),
        })
    }
}

impl Spawn for TokioSpawner {
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match &self.inner {
            Inner::Handle(handle) => {
                handle.spawn(fut);
            }
            Inner::Owned(runtime) => {
                runtime.spawn(fut);
            }
        }
    }
}

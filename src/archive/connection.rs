use std::{future::Future, sync::Arc};

use tokio::sync::RwLock;

/// A client handle that is opened on first use, shared afterwards and can be
/// closed explicitly. A failed connect leaves it empty so the next caller
/// tries again.
pub struct LazyConnection<T> {
    handle: RwLock<Option<Arc<T>>>,
}

impl<T> Default for LazyConnection<T> {
    fn default() -> Self {
        Self {
            handle: RwLock::new(None),
        }
    }
}

impl<T> LazyConnection<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_connect<F, Fut>(&self, connect: F) -> anyhow::Result<Arc<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        if let Some(handle) = self.handle.read().await.as_ref() {
            return Ok(handle.clone());
        }

        let mut guard = self.handle.write().await;

        // another caller may have connected while we waited for the lock
        if let Some(handle) = guard.as_ref() {
            return Ok(handle.clone());
        }

        let handle = Arc::new(connect().await?);
        *guard = Some(handle.clone());

        Ok(handle)
    }

    /// Drops the shared handle. Returns whether one was open.
    pub async fn close(&self) -> bool {
        self.handle.write().await.take().is_some()
    }

    pub async fn is_open(&self) -> bool {
        self.handle.read().await.is_some()
    }
}

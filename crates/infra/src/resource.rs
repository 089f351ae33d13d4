//! Process-scoped resource handles: initialize once, reuse, explicit shutdown.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResourceError {
    #[error("resource '{0}' has not been initialized")]
    NotInitialized(&'static str),

    #[error("resource '{0}' has been shut down")]
    ShutDown(&'static str),

    #[error("failed to initialize resource '{name}': {message}")]
    Init { name: &'static str, message: String },
}

/// Something with an explicit close step.
#[async_trait::async_trait]
pub trait Resource: Send + Sync + 'static {
    async fn close(&self) {}
}

#[async_trait::async_trait]
impl Resource for sqlx::PgPool {
    async fn close(&self) {
        sqlx::PgPool::close(self).await
    }
}

#[cfg(feature = "redis")]
impl Resource for redis::Client {}

#[derive(Debug)]
enum State<T> {
    Uninit,
    Ready(Arc<T>),
    Closed,
}

#[derive(Debug)]
pub struct ResourceHandle<T> {
    name: &'static str,
    state: Mutex<State<T>>,
}

impl<T: Resource> ResourceHandle<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Mutex::new(State::Uninit),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Return the resource, running `init` only on first use.
    ///
    /// Concurrent callers wait for the first initialization. A failed
    /// initialization leaves the handle uninitialized.
    pub async fn get_or_try_init<F, Fut, E>(&self, init: F) -> Result<Arc<T>, ResourceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut state = self.state.lock().await;
        match &*state {
            State::Ready(resource) => return Ok(Arc::clone(resource)),
            State::Closed => return Err(ResourceError::ShutDown(self.name)),
            State::Uninit => {}
        }

        let resource = Arc::new(init().await.map_err(|e| ResourceError::Init {
            name: self.name,
            message: e.to_string(),
        })?);
        *state = State::Ready(Arc::clone(&resource));
        tracing::info!(resource = self.name, "resource initialized");
        Ok(resource)
    }

    pub async fn get(&self) -> Result<Arc<T>, ResourceError> {
        match &*self.state.lock().await {
            State::Ready(resource) => Ok(Arc::clone(resource)),
            State::Uninit => Err(ResourceError::NotInitialized(self.name)),
            State::Closed => Err(ResourceError::ShutDown(self.name)),
        }
    }

    pub async fn is_ready(&self) -> bool {
        matches!(&*self.state.lock().await, State::Ready(_))
    }

    /// Close the resource. Later `get`/`get_or_try_init` calls fail.
    pub async fn shutdown(&self) {
        let previous = std::mem::replace(&mut *self.state.lock().await, State::Closed);
        if let State::Ready(resource) = previous {
            resource.close().await;
            tracing::info!(resource = self.name, "resource shut down");
        }
    }
}

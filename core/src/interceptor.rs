//! Interceptor registries for the request and response phases.
//!
//! # Design
//! A registry is an arena: ids are slot indices, handed out in increasing
//! order and never reused. Ejecting an entry empties its slot instead of
//! removing it, so ids held by callers stay valid and the remaining
//! entries keep their relative order. The lock is only held to add, eject
//! or snapshot; handlers always run outside it.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::RwLock;

use crate::config::RequestConfig;
use crate::error::{Error, Result};
use crate::http::Response;

pub type Fulfilled<T> = Arc<dyn Fn(T) -> BoxFuture<'static, Result<T>> + Send + Sync>;
pub type Rejected<T> = Arc<dyn Fn(Error) -> BoxFuture<'static, Result<T>> + Send + Sync>;

/// Handle returned by `InterceptorManager::add`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InterceptorId(usize);

impl InterceptorId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// A fulfilment handler with an optional rejection handler.
pub struct Interceptor<T> {
    pub fulfilled: Fulfilled<T>,
    pub rejected: Option<Rejected<T>>,
}

impl<T> Clone for Interceptor<T> {
    fn clone(&self) -> Self {
        Self {
            fulfilled: self.fulfilled.clone(),
            rejected: self.rejected.clone(),
        }
    }
}

impl<T> fmt::Debug for Interceptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptor")
            .field("rejected", &self.rejected.is_some())
            .finish_non_exhaustive()
    }
}

impl<T: Send + 'static> Interceptor<T> {
    pub fn new<F, Fut>(fulfilled: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        Self {
            fulfilled: Arc::new(move |value| fulfilled(value).boxed()),
            rejected: None,
        }
    }

    pub fn with_rejected<R, Fut>(mut self, rejected: R) -> Self
    where
        R: Fn(Error) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        self.rejected = Some(Arc::new(move |error| rejected(error).boxed()));
        self
    }

    /// Run this pair against the outcome of the previous stage.
    pub async fn run(&self, outcome: Result<T>) -> Result<T> {
        match (outcome, &self.rejected) {
            (Ok(value), _) => (self.fulfilled)(value).await,
            (Err(error), Some(rejected)) => rejected(error).await,
            (Err(error), None) => Err(error),
        }
    }
}

/// Ordered, id-addressable collection of interceptors for one phase.
pub struct InterceptorManager<T> {
    slots: RwLock<Vec<Option<Interceptor<T>>>>,
}

impl<T> Default for InterceptorManager<T> {
    fn default() -> Self {
        Self {
            slots: RwLock::new(Vec::new()),
        }
    }
}

impl<T> fmt::Debug for InterceptorManager<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = self.slots.read();
        f.debug_struct("InterceptorManager")
            .field("slots", &slots.len())
            .field("live", &slots.iter().filter(|s| s.is_some()).count())
            .finish()
    }
}

impl<T: Send + 'static> InterceptorManager<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fulfilment handler.
    pub fn add<F, Fut>(&self, fulfilled: F) -> InterceptorId
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        self.push(Interceptor::new(fulfilled))
    }

    /// Register a fulfilment handler and a rejection handler.
    pub fn add_with_rejected<F, FutF, R, FutR>(&self, fulfilled: F, rejected: R) -> InterceptorId
    where
        F: Fn(T) -> FutF + Send + Sync + 'static,
        FutF: Future<Output = Result<T>> + Send + 'static,
        R: Fn(Error) -> FutR + Send + Sync + 'static,
        FutR: Future<Output = Result<T>> + Send + 'static,
    {
        self.push(Interceptor::new(fulfilled).with_rejected(rejected))
    }

    pub fn push(&self, interceptor: Interceptor<T>) -> InterceptorId {
        let mut slots = self.slots.write();
        slots.push(Some(interceptor));
        InterceptorId(slots.len() - 1)
    }

    /// Remove the interceptor behind `id`. Unknown or already ejected ids
    /// are ignored.
    pub fn eject(&self, id: InterceptorId) {
        if let Some(slot) = self.slots.write().get_mut(id.0) {
            *slot = None;
        }
    }

    /// Eject every interceptor. Ids handed out later still never collide
    /// with earlier ones.
    pub fn clear(&self) {
        for slot in self.slots.write().iter_mut() {
            *slot = None;
        }
    }

    /// Visit live interceptors in registration order.
    pub fn for_each(&self, mut visit: impl FnMut(&Interceptor<T>)) {
        for interceptor in self.snapshot() {
            visit(&interceptor);
        }
    }

    /// Live interceptors in registration order, detached from the registry.
    pub fn snapshot(&self) -> Vec<Interceptor<T>> {
        self.slots.read().iter().flatten().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.slots.read().iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The two registries owned by a client.
#[derive(Debug, Default)]
pub struct Interceptors {
    pub request: InterceptorManager<RequestConfig>,
    pub response: InterceptorManager<Response>,
}

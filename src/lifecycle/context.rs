//! Per-request execution context.
//!
//! # Responsibilities
//! - Register deferred work that must finish before the instance goes away
//! - Carry a mutable bag of values used to enrich error reports
//! - Track settling contexts across requests so shutdown can drain them
//!
//! # Design Decisions
//! - Deferred work starts immediately; `settle` only waits for it
//! - Nothing here is shared between requests except the tracker

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::task::{JoinHandle, JoinSet};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Capabilities handed to every handler alongside the request.
#[derive(Debug, Default)]
pub struct ExecutionContext {
    deferred: Mutex<Vec<JoinHandle<()>>>,
    extras: Mutex<BTreeMap<String, Value>>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule background work that must complete before the context is released.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn wait_until<F>(&self, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(work);
        lock(&self.deferred).push(handle);
    }

    /// Number of registered tasks not yet awaited by [`settle`](Self::settle).
    pub fn pending(&self) -> usize {
        lock(&self.deferred).len()
    }

    /// Wait for every piece of deferred work, including work registered while settling.
    pub async fn settle(&self) {
        loop {
            let batch = std::mem::take(&mut *lock(&self.deferred));
            if batch.is_empty() {
                return;
            }
            for handle in batch {
                if let Err(e) = handle.await {
                    tracing::warn!(error = %e, "Deferred task did not complete");
                }
            }
        }
    }

    /// Attach a value to any error report produced for this request.
    pub fn set_extra(&self, key: impl Into<String>, value: Value) {
        lock(&self.extras).insert(key.into(), value);
    }

    /// Snapshot of the enrichment values.
    pub fn extras(&self) -> BTreeMap<String, Value> {
        lock(&self.extras).clone()
    }
}

/// Keeps settling contexts alive after their responses are sent.
#[derive(Debug, Default)]
pub struct DeferredTracker {
    tasks: Mutex<JoinSet<()>>,
}

impl DeferredTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Settle `ctx` in the background.
    pub fn track(&self, ctx: Arc<ExecutionContext>) {
        let mut tasks = lock(&self.tasks);
        while tasks.try_join_next().is_some() {}
        tasks.spawn(async move { ctx.settle().await });
    }

    /// Contexts still settling.
    pub fn in_flight(&self) -> usize {
        lock(&self.tasks).len()
    }

    /// Wait for all tracked contexts, giving up after `timeout`.
    ///
    /// Returns `false` if the deadline passed first.
    pub async fn drain(&self, timeout: Duration) -> bool {
        let mut tasks = std::mem::take(&mut *lock(&self.tasks));
        let wait_all = async {
            while let Some(result) = tasks.join_next().await {
                if let Err(e) = result {
                    tracing::warn!(error = %e, "Deferred work panicked during drain");
                }
            }
        };
        tokio::time::timeout(timeout, wait_all).await.is_ok()
    }
}

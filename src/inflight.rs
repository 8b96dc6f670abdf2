//! # In-Flight Read Coalescing
//!
//! Per-key deduplication of concurrent identical reads. When several staff
//! terminals refresh the same schedule at once, the first caller's fetch is
//! shared and the rest await it instead of issuing duplicates. Generic over
//! the key and the loaded value; results must be cloneable because every
//! waiter receives the same one.

use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;

use dashmap::DashMap;
use futures::future::{FutureExt, Shared};

use crate::error::{QueueError, Result};

type SharedLoad<V> = Shared<Pin<Box<dyn Future<Output = Result<V>> + Send>>>;

pub struct ReadCoalescer<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    inflight: DashMap<K, SharedLoad<V>>,
}

impl<K, V> ReadCoalescer<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            inflight: DashMap::new(),
        }
    }

    /// Run `loader` for `key`, unless an identical load is already in
    /// flight, in which case its result is shared. The slot is cleared once
    /// the load settles, so later calls observe fresh data; this is
    /// request coalescing, not a cache.
    pub async fn get_or_load<F, Fut>(&self, key: K, loader: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let shared = match self.inflight.entry(key.clone()) {
            dashmap::mapref::entry::Entry::Occupied(existing) => existing.get().clone(),
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                let fut: Pin<Box<dyn Future<Output = Result<V>> + Send>> = Box::pin(loader());
                let shared = fut.shared();
                vacant.insert(shared.clone());
                shared
            }
        };

        let result = shared.await;
        self.inflight.remove(&key);
        result
    }

    pub fn inflight_count(&self) -> usize {
        self.inflight.len()
    }
}

impl<K, V> Default for ReadCoalescer<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

// QueueError is Clone, which is what lets a Shared future fan a failure
// out to every coalesced waiter.
const _: fn() = || {
    fn assert_clone<T: Clone>() {}
    assert_clone::<QueueError>();
};

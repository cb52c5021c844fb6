//! Fault injection for exercising the resilience layer

use async_trait::async_trait;
use rand::Rng;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::publisher::{LogEvent, LogPublisher};
use crate::store::{KeyValueStore, StoreKey, StoreValue};
use crate::{StoreError, StoreResult};

/// Store or publisher wrapper that fails a share of calls with
/// [`StoreError::Unavailable`]
pub struct FaultInjector<S> {
    inner: S,
    failure_rate: f64,
    outage: Arc<AtomicBool>,
    calls: AtomicU64,
    injected: AtomicU64,
}

impl<S> FaultInjector<S> {
    /// `failure_rate` is clamped to `0.0..=1.0`
    pub fn new(inner: S, failure_rate: f64) -> Self {
        Self {
            inner,
            failure_rate: failure_rate.clamp(0.0, 1.0),
            outage: Arc::new(AtomicBool::new(false)),
            calls: AtomicU64::new(0),
            injected: AtomicU64::new(0),
        }
    }

    /// Shared switch forcing every call to fail while set
    pub fn outage_switch(&self) -> Arc<AtomicBool> {
        self.outage.clone()
    }

    /// Total calls seen, including injected failures
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn injected_failures(&self) -> u64 {
        self.injected.load(Ordering::Relaxed)
    }

    fn inject(&self) -> StoreResult<()> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let fail = self.outage.load(Ordering::Relaxed)
            || (self.failure_rate > 0.0 && rand::thread_rng().gen_bool(self.failure_rate));
        if fail {
            self.injected.fetch_add(1, Ordering::Relaxed);
            return Err(StoreError::unavailable("injected fault"));
        }
        Ok(())
    }
}

#[async_trait]
impl<K, V, S> KeyValueStore<K, V> for FaultInjector<S>
where
    K: StoreKey + 'static,
    V: StoreValue + 'static,
    S: KeyValueStore<K, V>,
{
    async fn get(&self, key: &K) -> StoreResult<Option<V>> {
        self.inject()?;
        self.inner.get(key).await
    }

    async fn put(&self, key: K, value: V) -> StoreResult<()> {
        self.inject()?;
        self.inner.put(key, value).await
    }
}

#[async_trait]
impl<P: LogPublisher> LogPublisher for FaultInjector<P> {
    async fn publish(&self, channel: &str, event: &LogEvent) -> StoreResult<usize> {
        self.inject()?;
        self.inner.publish(channel, event).await
    }
}

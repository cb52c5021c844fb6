//! Store and publisher adapters guarded by a [`Dependency`]

use async_trait::async_trait;
use std::sync::Arc;
use todos_resilience::{CallContext, Dependency};

use crate::publisher::{LogEvent, LogPublisher, Operation};
use crate::store::{KeyValueStore, StoreKey, StoreValue};
use crate::StoreResult;

/// Key/value store whose calls are retried and circuit-broken
pub struct ResilientStore<S> {
    inner: Arc<S>,
    dependency: Dependency,
}

impl<S> ResilientStore<S> {
    pub fn new(inner: S, dependency: Dependency) -> Self {
        Self {
            inner: Arc::new(inner),
            dependency,
        }
    }

    pub fn dependency(&self) -> &Dependency {
        &self.dependency
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S> ResilientStore<S> {
    /// `get` with cancellation and deadline from `ctx`
    pub async fn get_with<K, V>(&self, ctx: &CallContext, key: &K) -> StoreResult<Option<V>>
    where
        K: StoreKey + 'static,
        V: StoreValue + 'static,
        S: KeyValueStore<K, V>,
    {
        let inner = &self.inner;
        Ok(self.dependency.call_with(ctx, || inner.get(key)).await?)
    }

    /// `put` with cancellation and deadline from `ctx`
    pub async fn put_with<K, V>(&self, ctx: &CallContext, key: K, value: V) -> StoreResult<()>
    where
        K: StoreKey + 'static,
        V: StoreValue + 'static,
        S: KeyValueStore<K, V>,
    {
        let inner = &self.inner;
        Ok(self
            .dependency
            .call_with(ctx, || inner.put(key.clone(), value.clone()))
            .await?)
    }
}

#[async_trait]
impl<K, V, S> KeyValueStore<K, V> for ResilientStore<S>
where
    K: StoreKey + 'static,
    V: StoreValue + 'static,
    S: KeyValueStore<K, V>,
{
    async fn get(&self, key: &K) -> StoreResult<Option<V>> {
        self.get_with(&CallContext::default(), key).await
    }

    async fn put(&self, key: K, value: V) -> StoreResult<()> {
        self.put_with(&CallContext::default(), key, value).await
    }
}

/// Operation-log publisher whose publishes are retried and circuit-broken
pub struct ResilientPublisher<P> {
    inner: Arc<P>,
    dependency: Dependency,
    channel: String,
}

impl<P: LogPublisher> ResilientPublisher<P> {
    pub fn new(inner: P, dependency: Dependency, channel: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(inner),
            dependency,
            channel: channel.into(),
        }
    }

    pub fn dependency(&self) -> &Dependency {
        &self.dependency
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Record that `username` performed `operation` on `todo_id`
    pub async fn log_operation(
        &self,
        operation: Operation,
        username: &str,
        todo_id: impl ToString,
    ) -> StoreResult<usize> {
        let event = LogEvent::new(operation, username, todo_id);
        self.publish(&self.channel, &event).await
    }

    /// `publish` with cancellation and deadline from `ctx`
    pub async fn publish_with(
        &self,
        ctx: &CallContext,
        channel: &str,
        event: &LogEvent,
    ) -> StoreResult<usize> {
        let inner = &self.inner;
        Ok(self
            .dependency
            .call_with(ctx, || inner.publish(channel, event))
            .await?)
    }
}

#[async_trait]
impl<P: LogPublisher> LogPublisher for ResilientPublisher<P> {
    async fn publish(&self, channel: &str, event: &LogEvent) -> StoreResult<usize> {
        self.publish_with(&CallContext::default(), channel, event)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BroadcastPublisher, FaultInjector, InMemoryStore, StoreError};
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use todos_resilience::{CircuitBreakerConfig, CircuitState, RetryPolicy, PUBLISHER, STORE};

    fn store_dependency() -> Dependency {
        Dependency::new(
            STORE,
            CircuitBreakerConfig {
                failure_threshold: 2,
                reset_timeout: Duration::from_secs(10),
                half_open_max_calls: 1,
            },
            RetryPolicy::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_outage_trips_store_breaker() {
        let flaky = FaultInjector::new(InMemoryStore::<String, u32>::new(), 0.0);
        let outage = flaky.outage_switch();
        let store = ResilientStore::new(flaky, store_dependency());

        store.put("alice".to_string(), 1).await.unwrap();

        outage.store(true, Ordering::Relaxed);
        for _ in 0..2 {
            let err = store.get(&"alice".to_string()).await.unwrap_err();
            assert_eq!(err, StoreError::unavailable("injected fault"));
        }
        assert_eq!(store.dependency().breaker().state(), CircuitState::Open);
        assert_eq!(store.inner().calls(), 7);

        let err = store.get(&"alice".to_string()).await.unwrap_err();
        assert_eq!(err, StoreError::CircuitOpen(STORE.to_string()));
        assert_eq!(store.inner().calls(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_publisher_has_its_own_breaker() {
        let flaky = FaultInjector::new(InMemoryStore::<String, u32>::new(), 1.0);
        let store = ResilientStore::new(flaky, store_dependency());
        for _ in 0..2 {
            assert!(store.get(&"bob".to_string()).await.is_err());
        }
        assert_eq!(store.dependency().breaker().state(), CircuitState::Open);

        let broadcast = BroadcastPublisher::default();
        let mut receiver = broadcast.subscribe("log_channel");
        let publisher = ResilientPublisher::new(
            broadcast,
            Dependency::with_defaults(PUBLISHER),
            "log_channel",
        );

        let delivered = publisher
            .log_operation(Operation::Create, "bob", 4)
            .await
            .unwrap();
        assert_eq!(delivered, 1);
        assert!(receiver.recv().await.unwrap().contains("\"opName\":\"CREATE\""));
        assert_eq!(publisher.dependency().breaker().state(), CircuitState::Closed);
    }
}

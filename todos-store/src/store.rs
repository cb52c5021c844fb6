//! Key/value store interface and in-memory implementation

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use crate::StoreResult;

/// Trait for types that can be used as store keys
pub trait StoreKey: Clone + Eq + Hash + Debug + Send + Sync {}

/// Trait for types that can be stored
pub trait StoreValue: Clone + Debug + Send + Sync {}

// Blanket implementations
impl<T> StoreKey for T where T: Clone + Eq + Hash + Debug + Send + Sync {}
impl<T> StoreValue for T where T: Clone + Debug + Send + Sync {}

/// Shared key/value store
#[async_trait]
pub trait KeyValueStore<K: StoreKey + 'static, V: StoreValue + 'static>: Send + Sync {
    /// Get a value from the store
    async fn get(&self, key: &K) -> StoreResult<Option<V>>;

    /// Put a value into the store, replacing any previous value
    async fn put(&self, key: K, value: V) -> StoreResult<()>;
}

#[async_trait]
impl<K, V, S> KeyValueStore<K, V> for Arc<S>
where
    K: StoreKey + 'static,
    V: StoreValue + 'static,
    S: KeyValueStore<K, V> + ?Sized,
{
    async fn get(&self, key: &K) -> StoreResult<Option<V>> {
        (**self).get(key).await
    }

    async fn put(&self, key: K, value: V) -> StoreResult<()> {
        (**self).put(key, value).await
    }
}

/// Simple in-memory store
#[derive(Clone)]
pub struct InMemoryStore<K, V> {
    entries: Arc<RwLock<HashMap<K, V>>>,
}

impl<K: StoreKey, V: StoreValue> InMemoryStore<K, V> {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<K: StoreKey, V: StoreValue> Default for InMemoryStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<K: StoreKey + 'static, V: StoreValue + 'static> KeyValueStore<K, V> for InMemoryStore<K, V> {
    async fn get(&self, key: &K) -> StoreResult<Option<V>> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn put(&self, key: K, value: V) -> StoreResult<()> {
        self.entries.write().insert(key, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_then_get() {
        let store = InMemoryStore::new();
        assert!(store.is_empty());

        store.put("alice".to_string(), vec![1, 2]).await.unwrap();
        store.put("alice".to_string(), vec![3]).await.unwrap();

        assert_eq!(store.get(&"alice".to_string()).await.unwrap(), Some(vec![3]));
        assert_eq!(store.get(&"bob".to_string()).await.unwrap(), None);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_clones_share_entries() {
        let store: InMemoryStore<u32, &'static str> = InMemoryStore::new();
        let other = store.clone();

        store.put(1, "one").await.unwrap();
        assert_eq!(other.get(&1).await.unwrap(), Some("one"));
    }
}

//! Connection establishment under a reconnect policy

use async_trait::async_trait;
use log::info;
use todos_resilience::{ReconnectError, ReconnectPolicy};

use crate::{StoreError, StoreResult};

/// Something that can open a connection to a backend
#[async_trait]
pub trait Connector: Send + Sync {
    type Connection: Send;

    /// Backend address, for logging
    fn address(&self) -> String;

    async fn connect(&self, attempt: u32) -> StoreResult<Self::Connection>;
}

/// Open a connection through `connector`, retrying per `policy`
///
/// Refused connections fail at once; transient errors are retried with the
/// policy's linear backoff.
pub async fn establish<C: Connector>(
    policy: &ReconnectPolicy,
    connector: &C,
) -> Result<C::Connection, ReconnectError<StoreError>> {
    let connection = policy
        .connect(|attempt| connector.connect(attempt))
        .await?;
    info!("Connected to {}", connector.address());
    Ok(connection)
}

/// Connector handing out clones of an in-process backend
pub struct InMemoryConnector<T> {
    backend: T,
    address: String,
}

impl<T: Clone + Send + Sync> InMemoryConnector<T> {
    pub fn new(backend: T, address: impl Into<String>) -> Self {
        Self {
            backend,
            address: address.into(),
        }
    }
}

#[async_trait]
impl<T: Clone + Send + Sync> Connector for InMemoryConnector<T> {
    type Connection = T;

    fn address(&self) -> String {
        self.address.clone()
    }

    async fn connect(&self, _attempt: u32) -> StoreResult<T> {
        Ok(self.backend.clone())
    }
}

//! External collaborators of the todos service
//!
//! The key/value store and the operation-log publisher are reached only
//! through the traits in this crate. The `Resilient*` adapters route every
//! call through a [`todos_resilience::Dependency`], one per collaborator.

pub mod connect;
pub mod error;
pub mod faults;
pub mod publisher;
pub mod resilient;
pub mod store;

pub use connect::{establish, Connector, InMemoryConnector};
pub use error::{StoreError, StoreResult};
pub use faults::FaultInjector;
pub use publisher::{BroadcastPublisher, LogEvent, LogPublisher, Operation};
pub use resilient::{ResilientPublisher, ResilientStore};
pub use store::{InMemoryStore, KeyValueStore, StoreKey, StoreValue};

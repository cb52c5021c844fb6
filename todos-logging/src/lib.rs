//! Logging initialisation
//!
//! Library crates emit records through the `log` facade; this crate installs
//! a `tracing-subscriber` that collects both `log` and `tracing` events.

mod init;

pub use init::{build_filter, init_logging, init_simple_tracing};
pub use todos_config::domains::logging::{LogFormat, LogLevel};
pub use todos_config::LoggingConfig;

//! Configuration loading for the w3s storage client
//!
//! This crate parses `w3s.toml` files and layers them with a global config and
//! `W3S_*` environment overrides into a single [`ClientConfig`].

pub mod file;
pub mod merge;

// Re-export main types
pub use file::{ClientConfig, ConfigLayer, RetrySection, DEFAULT_API_URL, DEFAULT_GATEWAY_TEMPLATE};
pub use merge::{ConfigLayering, ConfigLoader, ConfigSource};

use w3s_core::error::StorageError;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, StorageError>;

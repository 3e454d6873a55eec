//! # w3s-core
//!
//! Core types and utilities shared across all w3s crates.
//!
//! This crate provides:
//! - StorageError enum for unified error handling
//! - ErrorKind for coarse classification of failures
//! - Byte-size formatting and content identifier checks
//!
//! ## Architecture
//!
//! The crate is organized into modules:
//! - `error`: Error types and result aliases
//! - `utils`: Formatting and validation helpers

pub mod error;
pub mod utils;

// Re-export commonly used types
pub use error::{ErrorKind, StorageError, StorageResult};
pub use utils::{format_file_size, is_valid_cid};

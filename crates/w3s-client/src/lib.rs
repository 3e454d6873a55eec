//! web3.storage client
//!
//! This crate provides HTTP client functionality for uploading files to
//! web3.storage, inspecting their pin status and reading them back through
//! the IPFS gateway, with exponential backoff for uploads.

pub mod api;
pub mod client;
pub mod retry;

// Re-export main types
pub use api::{FileMetadata, PinState, PinStatus, UploadResult};
pub use client::{detect_content_type, StorageClient, FALLBACK_CONTENT_TYPE};
pub use retry::{retry, retry_if, RetryPolicy};

pub use w3s_config::ClientConfig;
pub use w3s_core::error::{ErrorKind, StorageError, StorageResult};
pub use w3s_core::utils::{format_file_size, is_valid_cid};

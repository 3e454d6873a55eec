//! Utility functions and helpers.
//!
//! Formatting and validation shared by the client and its callers.

pub mod cid;
pub mod size;

// Re-export commonly used utilities
pub use cid::{is_valid_cid, MAX_CID_LEN, MIN_CID_LEN};
pub use size::format_file_size;

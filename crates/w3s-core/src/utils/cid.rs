//! Content identifier checks.
//!
//! This is a shape heuristic only. It does not decode the multibase prefix or
//! the multihash, so a string passing here may still be rejected by a gateway.

/// Shortest accepted identifier
pub const MIN_CID_LEN: usize = 46;

/// Longest accepted identifier
pub const MAX_CID_LEN: usize = 59;

/// Check that `cid` is 46 to 59 ASCII alphanumeric characters
pub fn is_valid_cid(cid: &str) -> bool {
    (MIN_CID_LEN..=MAX_CID_LEN).contains(&cid.len())
        && cid.chars().all(|c| c.is_ascii_alphanumeric())
}

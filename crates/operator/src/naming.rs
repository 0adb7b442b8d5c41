//! Bounded names for derived objects
//!
//! Job names, label values and finalizer names are capped at 63 characters,
//! while a MariaDBDatabase name may be up to 253. Names that fit are kept as
//! they are; longer ones are cut and suffixed with a hash of the full name so
//! distinct inputs stay distinct.

use sha2::{Digest, Sha256};

/// Upper bound for label values, Job names and unprefixed finalizers
pub const MAX_NAME_LEN: usize = 63;

const HASH_LEN: usize = 8;

/// `name` unchanged if it fits in `max_len`, otherwise a truncated prefix
/// followed by `-<hash>`. The result starts and ends with an alphanumeric
/// character whenever `name` starts with one.
pub fn bounded_name(name: &str, max_len: usize) -> String {
    if name.len() <= max_len {
        return name.to_string();
    }

    let digest = hex::encode(Sha256::digest(name.as_bytes()));
    let hash = &digest[..HASH_LEN];
    let keep = max_len.saturating_sub(HASH_LEN + 1);
    let prefix = name
        .get(..keep)
        .unwrap_or_default()
        .trim_end_matches(|c: char| !c.is_ascii_alphanumeric());

    if prefix.is_empty() {
        hash.to_string()
    } else {
        format!("{prefix}-{hash}")
    }
}

//! API-key checks.
//!
//! [`check`] is the hard gate the extraction client applies before every
//! request. [`is_plausible`] is the softer status check a front end shows
//! the user; it additionally enforces a minimum length.

use crate::error::ReviewError;

/// Values shipped in sample configuration files.
pub const PLACEHOLDER_KEYS: [&str; 2] = ["YOUR_API_KEY_HERE", "YOUR_GEMINI_API_KEY_HERE"];

/// Keys of this length or shorter are never real.
pub const MIN_CREDENTIAL_LEN: usize = 10;

pub fn is_placeholder(key: &str) -> bool {
    PLACEHOLDER_KEYS.contains(&key)
}

/// Reject empty and placeholder keys.
pub fn check(key: &str) -> Result<(), ReviewError> {
    if key.is_empty() || is_placeholder(key) {
        return Err(ReviewError::InvalidCredential);
    }
    Ok(())
}

/// `true` when the key passes [`check`] and is long enough to be real.
pub fn is_plausible(key: &str) -> bool {
    check(key).is_ok() && key.chars().count() > MIN_CREDENTIAL_LEN
}

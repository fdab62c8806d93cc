//! Environment variable parsing utilities.
//!
//! Pipeline steps take their tunables (retry counts, delays, batch sizes) from the
//! environment with documented defaults, replacing patterns like:
//!
//! ```ignore
//! std::env::var("PARALLEL_BATCH_SIZE")
//!     .ok()
//!     .and_then(|v| v.parse::<usize>().ok())
//!     .unwrap_or(12)
//! ```
//!
//! # Example
//!
//! ```
//! use forge_types::env_utils::{env_var, env_var_or};
//!
//! let parallel: usize = env_var_or("PARALLEL_BATCH_SIZE", 12);
//! let start: Option<usize> = env_var("START_INDEX");
//! ```

use std::str::FromStr;
use std::time::Duration;

/// Parse an environment variable into a type that implements `FromStr`.
///
/// Returns `None` if the variable is not set, empty, or cannot be parsed.
pub fn env_var<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .and_then(|v| v.trim().parse().ok())
}

/// Parse an environment variable with a default value.
///
/// ```
/// use forge_types::env_utils::env_var_or;
///
/// let limit: u32 = env_var_or("COMPUTE_UNIT_LIMIT", 250_000);
/// ```
pub fn env_var_or<T: FromStr>(key: &str, default: T) -> T {
    env_var(key).unwrap_or(default)
}

fn truthy(v: &str) -> bool {
    matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Check if an environment variable is set to "1", "true", "yes" or "on" (case-insensitive).
pub fn env_bool(key: &str) -> bool {
    env_bool_or(key, false)
}

/// Like [`env_bool`], with a default for when the variable is unset.
pub fn env_bool_or(key: &str, default: bool) -> bool {
    match std::env::var(key).ok() {
        Some(v) => truthy(&v),
        None => default,
    }
}

/// Get an environment variable as a string with a default value.
///
/// Blank values count as unset.
pub fn env_string_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Read a millisecond count into a `Duration`.
///
/// ```
/// use forge_types::env_utils::env_duration_ms_or;
///
/// let delay = env_duration_ms_or("RETRY_DELAY_MS", 3000);
/// ```
pub fn env_duration_ms_or(key: &str, default_ms: u64) -> Duration {
    Duration::from_millis(env_var_or(key, default_ms))
}

//! Shared types for the nft-forge workspace.
//!
//! This crate provides foundational types used across multiple crates in the workspace,
//! breaking circular dependency chains.
//!
//! ## Capability Types
//!
//! The [`capability`] module contains the narrow async contracts that pipeline steps
//! are written against:
//! - [`BalanceSource`](capability::BalanceSource) / [`Funder`](capability::Funder) - funding accounts
//! - [`StorageUploader`](capability::StorageUploader) - decentralized storage uploads
//! - [`AssetMinter`](capability::AssetMinter), [`AssetReader`](capability::AssetReader),
//!   [`CollectionVerifier`](capability::CollectionVerifier), [`AssetBurner`](capability::AssetBurner) - token lifecycle

pub mod address;
pub mod amount;
pub mod asset;
pub mod capability;
pub mod env_utils;
pub mod error;

pub use address::{is_http_uri, parse_address};
pub use amount::{format_amount, from_base_units, to_base_units, Amount, BASE_UNITS_PER_TOKEN};
pub use asset::{CollectionRef, DigitalAsset, MintOptions, MintRequest, TokenStandard, UploadReceipt};
pub use env_utils::{env_bool, env_bool_or, env_duration_ms_or, env_string_or, env_var, env_var_or};
pub use error::{is_permanent, ForgeError};

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How the delay between attempts grows.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    /// Same delay after every failed attempt.
    #[default]
    Constant,
    /// `delay * attempt` after the n-th failed attempt.
    Linear,
}

/// Configuration for retry behavior on network operations.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
    backoff: Backoff,
}

impl RetryPolicy {
    /// Create a new RetryPolicy. `max_attempts` must be at least 1.
    pub fn new(max_attempts: u32, delay: Duration, backoff: Backoff) -> Result<Self, ForgeError> {
        if max_attempts == 0 {
            return Err(ForgeError::InvalidInput(
                "retry policy needs at least one attempt".to_string(),
            ));
        }
        Ok(Self {
            max_attempts,
            delay,
            backoff,
        })
    }

    /// Constant delay policy, clamping `max_attempts` to at least 1.
    pub fn constant(max_attempts: u32, delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay: Duration::from_millis(delay_ms),
            backoff: Backoff::Constant,
        }
    }

    /// Linearly increasing delay policy, clamping `max_attempts` to at least 1.
    pub fn linear(max_attempts: u32, base_delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay: Duration::from_millis(base_delay_ms),
            backoff: Backoff::Linear,
        }
    }

    /// A policy that never retries.
    pub fn once() -> Self {
        Self::constant(1, 0)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.delay
    }

    pub fn backoff(&self) -> Backoff {
        self.backoff
    }

    /// Delay to wait after the given (1-based) failed attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Constant => self.delay,
            Backoff::Linear => self.delay.saturating_mul(attempt.max(1)),
        }
    }
}

impl Default for RetryPolicy {
    /// Three attempts, 3000ms apart.
    fn default() -> Self {
        Self::constant(3, 3000)
    }
}

/// Soft target and hard floor for an account that pays for operations.
///
/// All values are in base units.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingThreshold {
    /// Funding is triggered when the balance is below this value.
    pub min_balance: Amount,
    /// Amount requested from the funder.
    pub top_up_amount: Amount,
    /// Balance after funding below this value means funding failed.
    pub hard_floor: Amount,
}

impl FundingThreshold {
    pub fn new(min_balance: Amount, top_up_amount: Amount, hard_floor: Amount) -> Result<Self, ForgeError> {
        if hard_floor > min_balance {
            return Err(ForgeError::InvalidInput(format!(
                "hard floor {} exceeds minimum balance {}",
                format_amount(hard_floor),
                format_amount(min_balance)
            )));
        }
        Ok(Self {
            min_balance,
            top_up_amount,
            hard_floor,
        })
    }

    /// Storage node threshold: fund 0.05 when below 0.05, fail below 0.01.
    pub fn storage_default() -> Self {
        Self {
            min_balance: to_base_units(0.05),
            top_up_amount: to_base_units(0.05),
            hard_floor: to_base_units(0.01),
        }
    }

    /// Devnet wallet threshold: airdrop 1 token when below 0.5.
    pub fn airdrop_default() -> Self {
        Self {
            min_balance: to_base_units(0.5),
            top_up_amount: to_base_units(1.0),
            hard_floor: to_base_units(0.01),
        }
    }
}

/// Opaque identifier returned by a creating or uploading operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceHandle(String);

impl ResourceHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ResourceHandle {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ResourceHandle {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_attempts_rejected() {
        let err = RetryPolicy::new(0, Duration::from_millis(10), Backoff::Constant).unwrap_err();
        assert!(matches!(err, ForgeError::InvalidInput(_)));
        assert_eq!(RetryPolicy::constant(0, 10).max_attempts(), 1);
    }

    #[test]
    fn test_constant_delay_is_flat() {
        let policy = RetryPolicy::constant(5, 1000);
        for attempt in 1..5 {
            assert_eq!(policy.delay_after(attempt), Duration::from_millis(1000));
        }
    }

    #[test]
    fn test_linear_delay_scales_with_attempt() {
        let policy = RetryPolicy::linear(4, 5000);
        assert_eq!(policy.delay_after(1), Duration::from_secs(5));
        assert_eq!(policy.delay_after(2), Duration::from_secs(10));
        assert_eq!(policy.delay_after(3), Duration::from_secs(15));
        let delays: Vec<_> = (1..4).map(|a| policy.delay_after(a)).collect();
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_threshold_floor_must_not_exceed_min() {
        assert!(FundingThreshold::new(10, 5, 20).is_err());
        let t = FundingThreshold::new(20, 5, 10).unwrap();
        assert_eq!(t.hard_floor, 10);
    }

    #[test]
    fn test_storage_default_threshold() {
        let t = FundingThreshold::storage_default();
        assert_eq!(t.min_balance, 50_000_000);
        assert_eq!(t.top_up_amount, 50_000_000);
        assert_eq!(t.hard_floor, 10_000_000);
    }
}

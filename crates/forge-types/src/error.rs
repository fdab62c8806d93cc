//! Error taxonomy for resilient operations.
//!
//! Transient failures are plain `anyhow::Error`s returned by an operation and are
//! retried. The variants below are what callers see once the core gives up, plus the
//! permanent kinds that are never retried.

use thiserror::Error;

use crate::amount::{format_amount, Amount};
use crate::ResourceHandle;

#[derive(Debug, Error)]
pub enum ForgeError {
    /// Every attempt failed; `source` is the last attempt's error.
    #[error("{operation} failed after {attempts} attempt(s)")]
    Exhausted {
        operation: String,
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },

    /// Funding did not bring the account above the hard floor.
    #[error(
        "insufficient balance after funding: {} < floor {}",
        tokens(.balance),
        tokens(.floor)
    )]
    InsufficientFunds { balance: Amount, floor: Amount },

    /// The resource never became visible on the read path.
    #[error("resource {handle} not found after {attempts} attempt(s)")]
    NotFound {
        handle: ResourceHandle,
        attempts: u32,
    },

    /// Malformed input detected before any network call.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The account worker stopped before answering.
    #[error("account queue closed")]
    QueueClosed,
}

fn tokens(amount: &Amount) -> String {
    format_amount(*amount)
}

impl ForgeError {
    /// Errors that no amount of retrying will fix.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            ForgeError::InvalidInput(_) | ForgeError::InsufficientFunds { .. }
        )
    }

    /// Number of attempts recorded in the error, if any.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            ForgeError::Exhausted { attempts, .. } | ForgeError::NotFound { attempts, .. } => {
                Some(*attempts)
            }
            _ => None,
        }
    }
}

/// Whether any error in the chain is a permanent [`ForgeError`].
pub fn is_permanent(error: &anyhow::Error) -> bool {
    error
        .chain()
        .filter_map(|e| e.downcast_ref::<ForgeError>())
        .any(ForgeError::is_permanent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Context};

    #[test]
    fn test_permanent_classification() {
        let invalid = anyhow::Error::new(ForgeError::InvalidInput("bad".into()));
        assert!(is_permanent(&invalid));

        let wrapped = Err::<(), _>(ForgeError::InsufficientFunds {
            balance: 1,
            floor: 2,
        })
        .context("upload step")
        .unwrap_err();
        assert!(is_permanent(&wrapped));

        assert!(!is_permanent(&anyhow!("connection reset")));

        let exhausted = anyhow::Error::new(ForgeError::Exhausted {
            operation: "upload".into(),
            attempts: 3,
            source: anyhow!("timeout"),
        });
        assert!(!is_permanent(&exhausted));
    }

    #[test]
    fn test_messages_carry_context() {
        let err = ForgeError::NotFound {
            handle: ResourceHandle::new("Mint111"),
            attempts: 10,
        };
        assert_eq!(err.to_string(), "resource Mint111 not found after 10 attempt(s)");
        assert_eq!(err.attempts(), Some(10));

        let err = ForgeError::InsufficientFunds {
            balance: 5_000_000,
            floor: 10_000_000,
        };
        assert_eq!(
            err.to_string(),
            "insufficient balance after funding: 0.00500 < floor 0.01000"
        );
    }
}

//! Balance assurance for paying accounts.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

use forge_types::capability::{BalanceSource, Funder};
use forge_types::{format_amount, Amount, ForgeError, FundingThreshold, RetryPolicy};

use crate::retry::retry;

/// Outcome of [`ensure_funded`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Funding {
    /// Balance already met the minimum; no funding call was made.
    AlreadyFunded { balance: Amount },
    /// Funding ran and the balance ended at or above the hard floor.
    ToppedUp { before: Amount, after: Amount },
}

impl Funding {
    /// Balance after assurance.
    pub fn balance(&self) -> Amount {
        match self {
            Funding::AlreadyFunded { balance } => *balance,
            Funding::ToppedUp { after, .. } => *after,
        }
    }

    pub fn funded(&self) -> bool {
        matches!(self, Funding::ToppedUp { .. })
    }
}

/// Make sure `source` holds at least `threshold.min_balance`, funding it otherwise.
///
/// The funding call is retried with `funding_policy`; balance queries are not.
/// A post-funding balance under `threshold.hard_floor` is reported as
/// [`ForgeError::InsufficientFunds`], while anything between the floor and the
/// minimum is accepted.
pub async fn ensure_funded<S, F>(
    source: &S,
    funder: &F,
    threshold: &FundingThreshold,
    funding_policy: &RetryPolicy,
) -> Result<Funding>
where
    S: BalanceSource + ?Sized,
    F: Funder + ?Sized,
{
    let before = source.balance().await.context("balance query failed")?;
    if before >= threshold.min_balance {
        debug!(
            balance = %format_amount(before),
            min = %format_amount(threshold.min_balance),
            "balance sufficient, skipping funding"
        );
        return Ok(Funding::AlreadyFunded { balance: before });
    }

    info!(
        balance = %format_amount(before),
        min = %format_amount(threshold.min_balance),
        top_up = %format_amount(threshold.top_up_amount),
        "balance below minimum, funding"
    );
    retry("fund", funding_policy, |_| funder.fund(threshold.top_up_amount)).await?;

    let after = source
        .balance()
        .await
        .context("balance query after funding failed")?;
    if after < threshold.hard_floor {
        warn!(
            balance = %format_amount(after),
            floor = %format_amount(threshold.hard_floor),
            "balance still below floor after funding"
        );
        return Err(ForgeError::InsufficientFunds {
            balance: after,
            floor: threshold.hard_floor,
        }
        .into());
    }
    if after < threshold.min_balance {
        warn!(
            balance = %format_amount(after),
            min = %format_amount(threshold.min_balance),
            "funding landed below minimum, continuing above floor"
        );
    }

    info!(
        before = %format_amount(before),
        after = %format_amount(after),
        "funding complete"
    );
    Ok(Funding::ToppedUp { before, after })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use forge_types::to_base_units;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Account whose balance jumps to `after_funding` once funded.
    struct FakeAccount {
        balance: Mutex<Amount>,
        after_funding: Amount,
        fund_calls: AtomicU32,
        fail_first: u32,
    }

    impl FakeAccount {
        fn new(balance: f64, after_funding: f64) -> Self {
            Self {
                balance: Mutex::new(to_base_units(balance)),
                after_funding: to_base_units(after_funding),
                fund_calls: AtomicU32::new(0),
                fail_first: 0,
            }
        }

        fn calls(&self) -> u32 {
            self.fund_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BalanceSource for FakeAccount {
        async fn balance(&self) -> Result<Amount> {
            Ok(*self.balance.lock())
        }
    }

    #[async_trait]
    impl Funder for FakeAccount {
        async fn fund(&self, _amount: Amount) -> Result<()> {
            let n = self.fund_calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.fail_first {
                return Err(anyhow!("node rejected deposit"));
            }
            *self.balance.lock() = self.after_funding;
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_funding_when_balance_meets_minimum() {
        for balance in [0.05, 0.06, 3.0] {
            let account = FakeAccount::new(balance, 10.0);
            let outcome = ensure_funded(
                &account,
                &account,
                &FundingThreshold::storage_default(),
                &RetryPolicy::linear(3, 5000),
            )
            .await
            .unwrap();
            assert_eq!(account.calls(), 0);
            assert!(!outcome.funded());
            assert_eq!(outcome.balance(), to_base_units(balance));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_top_up_reaches_target() {
        let account = FakeAccount::new(0.02, 0.06);
        let outcome = ensure_funded(
            &account,
            &account,
            &FundingThreshold::storage_default(),
            &RetryPolicy::linear(3, 5000),
        )
        .await
        .unwrap();
        assert_eq!(account.calls(), 1);
        assert_eq!(
            outcome,
            Funding::ToppedUp {
                before: to_base_units(0.02),
                after: to_base_units(0.06)
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_top_up_above_floor_is_accepted() {
        let account = FakeAccount::new(0.02, 0.03);
        let outcome = ensure_funded(
            &account,
            &account,
            &FundingThreshold::storage_default(),
            &RetryPolicy::once(),
        )
        .await
        .unwrap();
        assert_eq!(outcome.balance(), to_base_units(0.03));
    }

    #[tokio::test(start_paused = true)]
    async fn test_below_floor_after_funding_is_insufficient() {
        let account = FakeAccount::new(0.02, 0.005);
        let err = ensure_funded(
            &account,
            &account,
            &FundingThreshold::storage_default(),
            &RetryPolicy::linear(3, 5000),
        )
        .await
        .unwrap_err();
        assert_eq!(account.calls(), 1);
        match err.downcast_ref::<ForgeError>() {
            Some(ForgeError::InsufficientFunds { balance, floor }) => {
                assert_eq!(*balance, to_base_units(0.005));
                assert_eq!(*floor, to_base_units(0.01));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_funding_is_retried() {
        let mut account = FakeAccount::new(0.0, 0.05);
        account.fail_first = 2;
        let outcome = ensure_funded(
            &account,
            &account,
            &FundingThreshold::storage_default(),
            &RetryPolicy::linear(3, 5000),
        )
        .await
        .unwrap();
        assert_eq!(account.calls(), 3);
        assert!(outcome.funded());
    }

    #[tokio::test(start_paused = true)]
    async fn test_funding_exhaustion_surfaces_attempts() {
        let mut account = FakeAccount::new(0.0, 0.05);
        account.fail_first = 10;
        let err = ensure_funded(
            &account,
            &account,
            &FundingThreshold::storage_default(),
            &RetryPolicy::constant(3, 10),
        )
        .await
        .unwrap_err();
        assert_eq!(account.calls(), 3);
        let forge = err.downcast_ref::<ForgeError>().unwrap();
        assert_eq!(forge.attempts(), Some(3));
    }
}

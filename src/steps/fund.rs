//! Wallet balance and devnet airdrops.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use forge_resilience::{ensure_funded, Funding};
use forge_transport::Cluster;
use forge_types::capability::{BalanceSource, Funder};
use forge_types::{format_amount, Amount, FundingThreshold, RetryPolicy};

pub async fn wallet_balance<S: BalanceSource + ?Sized>(wallet: &S) -> Result<Amount> {
    wallet.balance().await.context("wallet balance query failed")
}

/// Airdrop when the wallet is below the devnet threshold. Does nothing on mainnet.
pub async fn ensure_wallet_funded<W>(wallet: &W, cluster: Cluster, policy: &RetryPolicy) -> Result<Option<Funding>>
where
    W: BalanceSource + Funder + ?Sized,
{
    if !cluster.supports_airdrop() {
        info!(%cluster, "airdrops unavailable, using the wallet balance as-is");
        return Ok(None);
    }
    let funding = ensure_funded(wallet, wallet, &FundingThreshold::airdrop_default(), policy).await?;
    Ok(Some(funding))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AirdropSummary {
    pub cluster: Cluster,
    pub funded: bool,
    pub before: Amount,
    pub after: Amount,
}

/// Explicit airdrop with a caller-chosen threshold.
pub async fn airdrop<W>(
    wallet: &W,
    cluster: Cluster,
    threshold: &FundingThreshold,
    policy: &RetryPolicy,
) -> Result<AirdropSummary>
where
    W: BalanceSource + Funder + ?Sized,
{
    let funding = ensure_funded(wallet, wallet, threshold, policy).await?;
    let (before, after) = match funding {
        Funding::AlreadyFunded { balance } => (balance, balance),
        Funding::ToppedUp { before, after } => (before, after),
    };
    info!(
        %cluster,
        before = %format_amount(before),
        after = %format_amount(after),
        "airdrop step finished"
    );
    Ok(AirdropSummary {
        cluster,
        funded: funding.funded(),
        before,
        after,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_sandbox::{Operation, SandboxLedger};
    use forge_types::to_base_units;

    const PAYER: &str = "11111111111111111111111111111111";

    #[tokio::test]
    async fn test_devnet_wallet_gets_airdrop() {
        let ledger = SandboxLedger::in_memory(PAYER).unwrap();
        let funding = ensure_wallet_funded(&ledger, Cluster::Devnet, &RetryPolicy::constant(5, 0))
            .await
            .unwrap()
            .unwrap();
        assert!(funding.funded());
        assert_eq!(wallet_balance(&ledger).await.unwrap(), to_base_units(1.0));

        let again = ensure_wallet_funded(&ledger, Cluster::Devnet, &RetryPolicy::constant(5, 0))
            .await
            .unwrap()
            .unwrap();
        assert!(!again.funded());
    }

    #[tokio::test]
    async fn test_mainnet_never_airdrops() {
        let ledger = SandboxLedger::in_memory(PAYER).unwrap();
        let funding = ensure_wallet_funded(&ledger, Cluster::MainnetBeta, &RetryPolicy::once())
            .await
            .unwrap();
        assert!(funding.is_none());
        assert_eq!(ledger.wallet_balance(PAYER), 0);
    }

    #[tokio::test]
    async fn test_airdrop_retries_transient_failures() {
        let ledger = SandboxLedger::in_memory(PAYER).unwrap();
        ledger.fail_next(Operation::Airdrop, 2);
        let threshold = FundingThreshold::new(to_base_units(2.0), to_base_units(2.0), to_base_units(1.0)).unwrap();

        let summary = airdrop(&ledger, Cluster::Devnet, &threshold, &RetryPolicy::constant(3, 0))
            .await
            .unwrap();
        assert!(summary.funded);
        assert_eq!(summary.before, 0);
        assert_eq!(summary.after, to_base_units(2.0));
        assert_eq!(ledger.pending_faults(Operation::Airdrop), 0);
    }
}

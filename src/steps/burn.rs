//! Burn a token and reclaim its rent.

use anyhow::Result;
use serde::Serialize;
use tracing::info;

use forge_resilience::retry;
use forge_types::capability::{AssetBurner, AssetReader, BalanceSource};
use forge_types::{format_amount, parse_address, Amount, ResourceHandle, RetryPolicy};

use crate::cache::Cache;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BurnSummary {
    pub mint: String,
    pub name: String,
    pub reclaimed: Amount,
    pub balance_after: Amount,
    /// The address was removed from the minted list.
    pub uncached: bool,
}

pub async fn burn_token<L>(ledger: &L, mint: &str, cache: &Cache, policy: &RetryPolicy) -> Result<BurnSummary>
where
    L: AssetReader + AssetBurner + BalanceSource + ?Sized,
{
    let handle = ResourceHandle::new(parse_address(mint)?);
    let asset = retry("fetch asset", policy, |_| ledger.fetch_asset(&handle)).await?;
    info!(mint = %handle, name = %asset.name, standard = ?asset.token_standard, "burning token");

    let reclaimed = retry("burn", policy, |_| ledger.burn(&handle)).await?;
    let balance_after = ledger.balance().await?;

    let mut minted = cache.minted()?;
    let uncached = minted.forget(handle.as_str());
    if uncached {
        cache.write_minted(&minted)?;
    }
    info!(
        mint = %handle,
        reclaimed = %format_amount(reclaimed),
        balance = %format_amount(balance_after),
        "token burned"
    );

    Ok(BurnSummary {
        mint: handle.to_string(),
        name: asset.name,
        reclaimed,
        balance_after,
        uncached,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MintedNfts;
    use forge_sandbox::{Operation, SandboxLedger};
    use forge_types::capability::AssetMinter;
    use forge_types::{to_base_units, MintRequest, TokenStandard};
    use tempfile::TempDir;

    const PAYER: &str = "7NLD2Ps6Xek4kjkM1gFxFAFZqf7nJA2jjQWeq3QHvm77";

    async fn minted_token(ledger: &SandboxLedger) -> String {
        ledger
            .mint(&MintRequest {
                name: "Doomed".into(),
                symbol: String::new(),
                uri: "https://devnet.irys.xyz/Doomed".into(),
                token_standard: TokenStandard::NonFungible,
                is_collection: false,
                is_mutable: false,
                seller_fee_basis_points: 1000,
                collection: None,
                rule_set: None,
                options: Default::default(),
            })
            .await
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn test_burn_reclaims_rent_and_updates_cache() {
        let dir = TempDir::new().unwrap();
        let cache = Cache::new(dir.path());
        let ledger = SandboxLedger::in_memory(PAYER).unwrap();
        ledger.configure(|c| c.visibility_lag = 0);
        ledger.credit(PAYER, to_base_units(1.0));
        let mint = minted_token(&ledger).await;
        let mut minted = MintedNfts::default();
        minted.record("0.json", &mint);
        cache.write_minted(&minted).unwrap();
        let before = ledger.wallet_balance(PAYER);
        ledger.fail_next(Operation::Burn, 1);

        let summary = burn_token(&ledger, &mint, &cache, &RetryPolicy::constant(3, 0)).await.unwrap();
        assert_eq!(summary.name, "Doomed");
        assert_eq!(summary.reclaimed, ledger.config().mint_rent);
        assert_eq!(summary.balance_after, before + summary.reclaimed - ledger.config().tx_fee);
        assert!(summary.uncached);
        assert!(cache.minted().unwrap().is_empty());

        let err = burn_token(&ledger, &mint, &cache, &RetryPolicy::constant(2, 0)).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<forge_types::ForgeError>().and_then(|e| e.attempts()),
            Some(2)
        );
    }

    #[tokio::test]
    async fn test_malformed_mint_is_rejected_without_calls() {
        let dir = TempDir::new().unwrap();
        let cache = Cache::new(dir.path());
        let ledger = SandboxLedger::in_memory(PAYER).unwrap();
        ledger.fail_next(Operation::Fetch, 1);

        let err = burn_token(&ledger, "not-an-address", &cache, &RetryPolicy::once())
            .await
            .unwrap_err();
        assert!(forge_types::is_permanent(&err));
        assert_eq!(ledger.pending_faults(Operation::Fetch), 1);
    }
}

//! Royalty rule set shared by every programmable token of the wallet.

use anyhow::Result;
use serde::Serialize;
use tracing::info;

use forge_resilience::retry;
use forge_types::capability::AssetMinter;
use forge_types::RetryPolicy;

use crate::cache::Cache;

pub const RULE_SET_NAME: &str = "MyRoyaltyRuleSet";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleSetOutcome {
    pub address: String,
    /// False when the cache already pointed at this rule set.
    pub newly_cached: bool,
}

/// Create the rule set if needed and record its address in the cache.
///
/// Creating an existing rule set is a no-op on the ledger side, so this is safe to
/// run before every step that mints programmable tokens.
pub async fn ensure_rule_set<M>(minter: &M, cache: &Cache, policy: &RetryPolicy) -> Result<RuleSetOutcome>
where
    M: AssetMinter + ?Sized,
{
    let address = retry("create rule set", policy, |_| minter.create_rule_set(RULE_SET_NAME))
        .await?
        .to_string();

    let cached = cache.rule_set()?;
    let newly_cached = cached.as_deref() != Some(address.as_str());
    if newly_cached {
        let path = cache.write_rule_set(&address)?;
        info!(rule_set = %address, path = %path.display(), "rule set address saved");
    }
    Ok(RuleSetOutcome { address, newly_cached })
}

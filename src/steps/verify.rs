//! Verify collection membership of minted tokens.

use anyhow::Result;
use serde::Serialize;
use tracing::{info, warn};

use forge_resilience::{await_visible, retry, run_batch, AccountQueue, FailureMode};
use forge_types::capability::{AssetReader, CollectionVerifier};
use forge_types::{ForgeError, ResourceHandle, RetryPolicy};

use crate::cache::{Cache, MINTED_FILE};
use crate::config::StepPolicies;
use crate::steps::UnitFailure;

/// What happened to one token.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyStatus {
    Verified,
    AlreadyVerified,
    /// Programmable tokens are verified at mint time by their rule set.
    SkippedProgrammable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifySummary {
    pub collection: String,
    pub collection_programmable: bool,
    pub verified: Vec<String>,
    pub already_verified: Vec<String>,
    pub skipped_programmable: Vec<String>,
    pub failed: Vec<UnitFailure>,
    /// Not attempted because an earlier token failed.
    pub not_attempted: Vec<String>,
}

impl VerifySummary {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.not_attempted.is_empty()
    }
}

/// Verify every cached token against the cached collection.
///
/// The collection token is looked up first and must be a collection. Tokens already
/// verified or programmable are left alone.
pub async fn verify_collection<L>(
    ledger: &L,
    cache: &Cache,
    policies: &StepPolicies,
    parallelism: usize,
    mode: FailureMode,
) -> Result<VerifySummary>
where
    L: AssetReader + CollectionVerifier + Clone + 'static,
{
    let collection = ResourceHandle::new(cache.require_collection()?);
    let minted = cache.minted()?;
    if minted.is_empty() {
        return Err(ForgeError::InvalidInput(format!(
            "No NFT addresses found in {}",
            cache.path(MINTED_FILE).display()
        ))
        .into());
    }

    let collection_asset = await_visible(&collection, &policies.collection_visibility, |handle| async move {
        ledger.fetch_asset(&handle).await
    })
    .await?;
    if !collection_asset.is_collection {
        return Err(ForgeError::InvalidInput(format!("{} is not a collection token", collection)).into());
    }
    let collection_programmable = collection_asset.token_standard.is_programmable();
    if collection_programmable {
        info!(%collection, "collection is programmable, nothing to verify on the collection itself");
    } else {
        info!(%collection, name = %collection_asset.name, "collection found");
    }

    let queue = AccountQueue::spawn(format!("verify-{}", collection));
    let report = run_batch(minted.minted_nfts.clone(), parallelism, mode, |_, mint| {
        verify_one(ledger, &queue, &collection, policies, mint)
    })
    .await;

    let mut summary = VerifySummary {
        collection: collection.to_string(),
        collection_programmable,
        verified: Vec::new(),
        already_verified: Vec::new(),
        skipped_programmable: Vec::new(),
        failed: Vec::new(),
        not_attempted: Vec::new(),
    };
    for (i, status) in report.succeeded {
        let mint = minted.minted_nfts[i].clone();
        match status {
            VerifyStatus::Verified => summary.verified.push(mint),
            VerifyStatus::AlreadyVerified => summary.already_verified.push(mint),
            VerifyStatus::SkippedProgrammable => summary.skipped_programmable.push(mint),
        }
    }
    for (i, error) in &report.failed {
        let failure = UnitFailure::new(minted.minted_nfts[*i].clone(), error);
        warn!(mint = %failure.unit, error = %failure.error, "verification failed");
        summary.failed.push(failure);
    }
    summary.not_attempted = report
        .skipped
        .iter()
        .map(|i| minted.minted_nfts[*i].clone())
        .collect();

    info!(
        verified = summary.verified.len(),
        already_verified = summary.already_verified.len(),
        skipped = summary.skipped_programmable.len(),
        failed = summary.failed.len(),
        "verification finished"
    );
    Ok(summary)
}

async fn verify_one<L>(
    ledger: &L,
    queue: &AccountQueue,
    collection: &ResourceHandle,
    policies: &StepPolicies,
    mint: String,
) -> Result<VerifyStatus>
where
    L: AssetReader + CollectionVerifier + Clone + 'static,
{
    let handle = ResourceHandle::new(mint);
    let asset = retry("fetch asset", &policies.send, |_| ledger.fetch_asset(&handle)).await?;

    if asset.token_standard.is_programmable() {
        info!(mint = %handle, "programmable token, skipping");
        return Ok(VerifyStatus::SkippedProgrammable);
    }
    if asset.is_verified_member_of(collection.as_str()) {
        info!(mint = %handle, "already verified");
        return Ok(VerifyStatus::AlreadyVerified);
    }

    let verifier = ledger.clone();
    let collection = collection.clone();
    let send = policies.send;
    queue
        .run(async move { verify_member(&verifier, &handle, &collection, &send).await })
        .await??;
    Ok(VerifyStatus::Verified)
}

async fn verify_member<V: CollectionVerifier>(
    verifier: &V,
    member: &ResourceHandle,
    collection: &ResourceHandle,
    policy: &RetryPolicy,
) -> Result<()> {
    retry("verify collection", policy, |_| verifier.verify_member(member, collection)).await
}

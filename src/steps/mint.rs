//! Mint member tokens in bounded concurrent batches.
//!
//! Per unit: funding check and mint go through the wallet's [`AccountQueue`], so
//! mints never interleave on the paying account; the visibility poll runs outside
//! the queue, letting the next unit mint while earlier ones are still propagating.
//! A mint whose poll runs out is cached as unconfirmed; the next run looks it up
//! again instead of minting a second copy.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use forge_resilience::{
    await_visible, chunked, ensure_funded, retry, run_batch, AccountQueue, BatchReport, FailureMode,
};
use forge_transport::Cluster;
use forge_types::capability::{AssetMinter, AssetReader, BalanceSource, Funder};
use forge_types::{
    format_amount, Amount, ForgeError, FundingThreshold, MintRequest, ResourceHandle, RetryPolicy,
};

use crate::assets::{list_files, AssetLayout, TokenMetadata, METADATA_EXTENSIONS};
use crate::cache::{Cache, MINTED_FILE};
use crate::config::{MintSettings, StepPolicies};
use crate::steps::rule_set::ensure_rule_set;
use crate::steps::UnitFailure;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MintedToken {
    pub source: String,
    pub mint: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MintSummary {
    pub collection: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_set: Option<String>,
    /// Metadata files in the selected range.
    pub selected: usize,
    /// Selected files minted by an earlier run.
    pub already_minted: usize,
    pub minted: Vec<MintedToken>,
    /// Unconfirmed mints from an earlier run that are visible now.
    pub confirmed: Vec<MintedToken>,
    /// Minted but not visible yet; the next run looks them up before minting.
    pub unconfirmed: Vec<MintedToken>,
    pub failed: Vec<UnitFailure>,
    /// Units never dispatched because an earlier unit failed.
    pub skipped: Vec<String>,
    pub balance_before: Amount,
    pub balance_after: Amount,
    pub cache_file: PathBuf,
}

impl MintSummary {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty() && self.unconfirmed.is_empty()
    }
}

struct MintUnit {
    source: String,
    request: MintRequest,
}

enum MintOutcome {
    Visible(MintedToken),
    Unconfirmed(MintedToken),
}

/// Mint every selected metadata file not already recorded in the cache.
///
/// Metadata files are validated up front; a malformed file fails the whole step
/// before anything is minted. Minted addresses are merged into the cache even when
/// some units failed, so a re-run only retries what is missing.
pub async fn mint_nfts<L>(
    ledger: &L,
    layout: &AssetLayout,
    cache: &Cache,
    cluster: Cluster,
    policies: &StepPolicies,
    settings: &MintSettings,
    mode: FailureMode,
) -> Result<MintSummary>
where
    L: AssetMinter + AssetReader + BalanceSource + Funder + Clone + 'static,
{
    let collection = cache.require_collection()?;
    let files = list_files(&layout.nft_metadata(), &METADATA_EXTENSIONS)?;
    if files.is_empty() {
        return Err(ForgeError::InvalidInput(format!(
            "No NFT metadata found in {}",
            layout.nft_metadata().display()
        ))
        .into());
    }
    let range = settings.select(files.len());
    let selected = range.len();
    let mut minted_cache = cache.minted()?;

    let mut pending = Vec::new();
    let mut lagging = Vec::new();
    let mut already_minted = 0;
    for path in &files[range] {
        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if let Some(mint) = minted_cache.minted_from(&source) {
            info!(%source, %mint, "already minted, skipping");
            already_minted += 1;
            continue;
        }
        let metadata = TokenMetadata::read(path)?;
        if let Some(mint) = minted_cache.unconfirmed_from(&source) {
            lagging.push(MintedToken {
                mint: mint.to_string(),
                source,
                name: metadata.name,
            });
            continue;
        }
        let uri = metadata.mint_uri()?.to_string();
        pending.push((source, metadata, uri));
    }

    let mut confirmed = Vec::new();
    let mut unconfirmed = Vec::new();
    for token in lagging {
        let handle = ResourceHandle::new(token.mint.clone());
        let visible = await_visible(&handle, &policies.mint_visibility, |h| async move {
            ledger.fetch_asset(&h).await
        })
        .await;
        match visible {
            Ok(_) => {
                info!(source = %token.source, mint = %token.mint, "earlier mint is visible now");
                minted_cache.record(&token.source, &token.mint);
                confirmed.push(token);
            }
            Err(e) => {
                warn!(
                    source = %token.source,
                    mint = %token.mint,
                    error = %format!("{:#}", e),
                    "earlier mint still not visible, not minting it again"
                );
                unconfirmed.push(token);
            }
        }
    }

    let rule_set = if settings.token_standard.is_programmable() && !pending.is_empty() {
        Some(ensure_rule_set(ledger, cache, &policies.send).await?.address)
    } else {
        None
    };

    let units: Vec<MintUnit> = pending
        .into_iter()
        .map(|(source, metadata, uri)| MintUnit {
            source,
            request: MintRequest {
                name: metadata.name,
                symbol: metadata.symbol,
                uri,
                token_standard: settings.token_standard,
                is_collection: false,
                is_mutable: false,
                seller_fee_basis_points: settings.seller_fee_basis_points,
                collection: Some(collection.clone()),
                rule_set: rule_set.clone(),
                options: settings.options,
            },
        })
        .collect();
    let sources: Vec<String> = units.iter().map(|u| u.source.clone()).collect();

    let balance_before = ledger.balance().await.context("wallet balance query failed")?;
    info!(
        selected,
        already_minted,
        to_mint = units.len(),
        parallelism = settings.parallelism,
        balance = %format_amount(balance_before),
        "minting"
    );

    let queue = AccountQueue::spawn(ledger_account_label(cluster));
    let mut report: BatchReport<MintOutcome> = BatchReport::default();
    let mut offset = 0;
    let batches = chunked(units, settings.parallelism);
    let batch_count = batches.len();

    for (batch_no, batch) in batches.into_iter().enumerate() {
        let size = batch.len();
        if mode == FailureMode::Abort && !report.failed.is_empty() {
            report.skipped.extend(offset..offset + size);
            offset += size;
            continue;
        }

        let before = ledger.balance().await.context("wallet balance query failed")?;
        info!(
            batch = batch_no + 1,
            batches = batch_count,
            size,
            balance = %format_amount(before),
            "batch starting"
        );

        let batch_report = run_batch(batch, settings.parallelism, mode, |_, unit| {
            mint_unit(ledger, &queue, cluster, policies, unit)
        })
        .await;

        let after = ledger.balance().await.context("wallet balance query failed")?;
        info!(
            batch = batch_no + 1,
            succeeded = batch_report.succeeded.len(),
            failed = batch_report.failed.len(),
            balance = %format_amount(after),
            spent = %format_amount(before.saturating_sub(after)),
            "batch finished"
        );

        report.merge(batch_report, offset);
        offset += size;
    }

    let mut minted = Vec::new();
    for (_, outcome) in report.succeeded {
        match outcome {
            MintOutcome::Visible(token) => {
                minted_cache.record(&token.source, &token.mint);
                minted.push(token);
            }
            MintOutcome::Unconfirmed(token) => {
                minted_cache.record_unconfirmed(&token.source, &token.mint);
                unconfirmed.push(token);
            }
        }
    }
    let unchanged = minted.is_empty() && confirmed.is_empty() && unconfirmed.is_empty();
    let cache_file = if unchanged && cache.path(MINTED_FILE).exists() {
        cache.path(MINTED_FILE)
    } else {
        cache.write_minted(&minted_cache)?
    };

    let balance_after = ledger.balance().await.context("wallet balance query failed")?;
    let failed: Vec<UnitFailure> = report
        .failed
        .iter()
        .map(|(i, e)| UnitFailure::new(sources[*i].clone(), e))
        .collect();
    for failure in &failed {
        warn!(unit = %failure.unit, error = %failure.error, "mint failed; re-run to retry this unit");
    }

    Ok(MintSummary {
        collection,
        rule_set,
        selected,
        already_minted,
        minted,
        confirmed,
        unconfirmed,
        failed,
        skipped: report.skipped.iter().map(|i| sources[*i].clone()).collect(),
        balance_before,
        balance_after,
        cache_file,
    })
}

fn ledger_account_label(cluster: Cluster) -> String {
    format!("{}-payer", cluster)
}

async fn mint_unit<L>(
    ledger: &L,
    queue: &AccountQueue,
    cluster: Cluster,
    policies: &StepPolicies,
    unit: MintUnit,
) -> Result<MintOutcome>
where
    L: AssetMinter + AssetReader + BalanceSource + Funder + Clone + 'static,
{
    let MintUnit { source, request } = unit;
    let name = request.name.clone();
    let wallet = ledger.clone();
    let airdrop = policies.airdrop;
    let send = policies.send;

    let mint = queue
        .run(async move { fund_and_mint(&wallet, cluster, &airdrop, &send, &request).await })
        .await??;
    info!(%source, %mint, "minted, waiting for it to become visible");

    let visible = await_visible(&mint, &policies.mint_visibility, |handle| async move {
        ledger.fetch_asset(&handle).await
    })
    .await;

    let token = MintedToken {
        source,
        mint: mint.to_string(),
        name,
    };
    match visible {
        Ok(_) => Ok(MintOutcome::Visible(token)),
        Err(e) => {
            warn!(
                source = %token.source,
                mint = %token.mint,
                error = %format!("{:#}", e),
                "minted but not visible yet, caching as unconfirmed"
            );
            Ok(MintOutcome::Unconfirmed(token))
        }
    }
}

async fn fund_and_mint<L>(
    wallet: &L,
    cluster: Cluster,
    airdrop: &RetryPolicy,
    send: &RetryPolicy,
    request: &MintRequest,
) -> Result<ResourceHandle>
where
    L: AssetMinter + BalanceSource + Funder,
{
    if cluster.supports_airdrop() {
        ensure_funded(wallet, wallet, &FundingThreshold::airdrop_default(), airdrop).await?;
    }
    retry("mint", send, |_| wallet.mint(request)).await
}

//! Create the collection token.

use std::path::PathBuf;

use anyhow::Result;
use serde::Serialize;
use tracing::info;

use forge_resilience::{await_visible, retry, Funding};
use forge_transport::{explorer_link, Cluster, ExplorerKind};
use forge_types::capability::{AssetMinter, AssetReader, BalanceSource, Funder};
use forge_types::{MintOptions, MintRequest, TokenStandard};

use crate::assets::{collection_metadata_file, AssetLayout, TokenMetadata};
use crate::cache::Cache;
use crate::config::{StepPolicies, DEFAULT_ROYALTY_BPS};
use crate::steps::fund::ensure_wallet_funded;
use crate::steps::rule_set::ensure_rule_set;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionSettings {
    pub token_standard: TokenStandard,
    pub seller_fee_basis_points: u16,
    pub options: MintOptions,
}

impl Default for CollectionSettings {
    fn default() -> Self {
        Self {
            token_standard: TokenStandard::ProgrammableNonFungible,
            seller_fee_basis_points: DEFAULT_ROYALTY_BPS,
            options: MintOptions::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionSummary {
    pub address: String,
    pub name: String,
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_set: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub funding: Option<Funding>,
    pub cache_file: PathBuf,
    pub explorer: String,
}

/// Mint the collection token described by `metadata/collection` and cache its address.
///
/// The metadata must already carry an uploaded `uri`; that is checked before the
/// wallet is funded or anything is minted.
pub async fn create_collection<L>(
    ledger: &L,
    layout: &AssetLayout,
    cache: &Cache,
    cluster: Cluster,
    policies: &StepPolicies,
    settings: &CollectionSettings,
) -> Result<CollectionSummary>
where
    L: AssetMinter + AssetReader + BalanceSource + Funder + ?Sized,
{
    let metadata_path = collection_metadata_file(layout)?;
    let metadata = TokenMetadata::read(&metadata_path)?;
    let uri = metadata.mint_uri()?.to_string();
    info!(name = %metadata.name, %uri, "collection metadata loaded");

    let funding = ensure_wallet_funded(ledger, cluster, &policies.airdrop).await?;

    let rule_set = if settings.token_standard.is_programmable() {
        Some(ensure_rule_set(ledger, cache, &policies.send).await?.address)
    } else {
        None
    };

    let request = MintRequest {
        name: metadata.name.clone(),
        symbol: metadata.symbol.clone(),
        uri: uri.clone(),
        token_standard: settings.token_standard,
        is_collection: true,
        is_mutable: false,
        seller_fee_basis_points: settings.seller_fee_basis_points,
        collection: None,
        rule_set: rule_set.clone(),
        options: settings.options,
    };
    let mint = retry("create collection", &policies.send, |_| ledger.mint(&request)).await?;
    info!(mint = %mint, "collection token submitted, waiting for it to become visible");

    await_visible(&mint, &policies.collection_visibility, |handle| async move {
        ledger.fetch_asset(&handle).await
    })
    .await?;

    let cache_file = cache.write_collection(mint.as_str())?;
    info!(mint = %mint, path = %cache_file.display(), "collection address saved");

    Ok(CollectionSummary {
        explorer: explorer_link(ExplorerKind::Address, mint.as_str(), cluster),
        address: mint.to_string(),
        name: metadata.name,
        uri,
        rule_set,
        funding,
        cache_file,
    })
}

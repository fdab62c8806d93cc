//! Upload images and metadata to decentralized storage.
//!
//! Each unit is uploaded in two steps: the image first, then the metadata file
//! patched to point at the image. The local metadata file ends up with `uri`
//! pointing at the uploaded metadata, which is what the mint steps read.

use std::path::Path;

use anyhow::Result;
use serde::Serialize;
use tracing::{info, warn};

use forge_resilience::{ensure_funded, retry, Funding};
use forge_transport::{GatewayUrls, DEFAULT_ARCHIVE_GATEWAY, DEFAULT_STORAGE_GATEWAY};
use forge_types::capability::{BalanceSource, Funder, StorageUploader};
use forge_types::{env_string_or, format_amount, Amount, FundingThreshold};

use crate::assets::{mime_type, AssetInventory, AssetLayout, AssetPair, TokenMetadata};
use crate::cache::{Cache, UploadCache, UploadEntry};
use crate::config::StepPolicies;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    /// Upload the metadata a second time after `uri` was patched, so the stored copy
    /// matches the local one.
    pub reupload_metadata: bool,
    /// Upload units even when the cache says they are done.
    pub force: bool,
    pub storage_base: String,
    pub archive_base: String,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            reupload_metadata: false,
            force: false,
            storage_base: DEFAULT_STORAGE_GATEWAY.to_string(),
            archive_base: DEFAULT_ARCHIVE_GATEWAY.to_string(),
        }
    }
}

impl UploadOptions {
    /// Gateway bases from `BASE_IRYS_URL` and `BASE_ARWEAVE_URL`.
    pub fn from_env() -> Self {
        Self {
            storage_base: env_string_or("BASE_IRYS_URL", DEFAULT_STORAGE_GATEWAY),
            archive_base: env_string_or("BASE_ARWEAVE_URL", DEFAULT_ARCHIVE_GATEWAY),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedUnit {
    pub metadata_file: String,
    pub image_url: String,
    pub metadata_url: String,
    pub archive_url: String,
    /// Storage id of the last metadata upload. With `reupload_metadata` this is the
    /// copy whose `uri` points at the first upload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_metadata_id: Option<String>,
    pub cost: Amount,
    /// Already uploaded by an earlier run.
    pub skipped: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadSummary {
    /// Set only when some unit needed uploading.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub funding: Option<Funding>,
    pub collection: UploadedUnit,
    pub nfts: Vec<UploadedUnit>,
    pub total_cost: Amount,
}

impl UploadSummary {
    pub fn uploaded(&self) -> usize {
        std::iter::once(&self.collection)
            .chain(&self.nfts)
            .filter(|u| !u.skipped)
            .count()
    }
}

fn file_key(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// The cached upload for a unit, if the local metadata still points at it.
fn cached_upload<'a>(
    metadata: &TokenMetadata,
    entry: Option<&'a UploadEntry>,
    options: &UploadOptions,
) -> Option<&'a UploadEntry> {
    if options.force {
        return None;
    }
    entry.filter(|done| {
        metadata.uri.as_deref() == Some(done.metadata.as_str())
            && GatewayUrls::is_gateway_uri(&done.metadata, &options.storage_base)
    })
}

fn needs_upload(pair: &AssetPair, uploads: &UploadCache, options: &UploadOptions) -> Result<bool> {
    let metadata = TokenMetadata::read(&pair.metadata)?;
    Ok(cached_upload(&metadata, uploads.get(&file_key(&pair.metadata)), options).is_none())
}

/// Upload the collection pair and every NFT pair, in file order.
///
/// The asset tree is validated before the storage node is touched. The upload cache
/// is saved after every unit so an interrupted run resumes where it stopped.
pub async fn upload_assets<N>(
    node: &N,
    layout: &AssetLayout,
    cache: &Cache,
    policies: &StepPolicies,
    options: &UploadOptions,
) -> Result<UploadSummary>
where
    N: StorageUploader + BalanceSource + Funder + ?Sized,
{
    let inventory = AssetInventory::scan(layout)?;
    info!(
        nfts = inventory.nfts.len(),
        root = %layout.root().display(),
        "asset tree validated"
    );

    let mut uploads = cache.uploads()?;

    let mut pending = 0;
    for pair in std::iter::once(&inventory.collection).chain(&inventory.nfts) {
        if needs_upload(pair, &uploads, options)? {
            pending += 1;
        }
    }

    let funding = if pending > 0 {
        let funding = ensure_funded(
            node,
            node,
            &FundingThreshold::storage_default(),
            &policies.storage_funding,
        )
        .await?;
        info!(pending, balance = %format_amount(funding.balance()), "storage node ready");
        Some(funding)
    } else {
        info!("every unit already uploaded, storage node left untouched");
        None
    };

    info!(metadata = %inventory.collection.metadata.display(), "uploading collection");
    let collection = upload_pair(node, &inventory.collection, policies, options, &mut uploads).await?;
    cache.write_uploads(&uploads)?;

    let mut nfts = Vec::with_capacity(inventory.nfts.len());
    for (i, pair) in inventory.nfts.iter().enumerate() {
        info!(
            unit = i + 1,
            total = inventory.nfts.len(),
            metadata = %pair.metadata.display(),
            "uploading nft"
        );
        nfts.push(upload_pair(node, pair, policies, options, &mut uploads).await?);
        cache.write_uploads(&uploads)?;
    }

    let total_cost = std::iter::once(&collection)
        .chain(&nfts)
        .map(|u| u.cost)
        .sum();
    Ok(UploadSummary {
        funding,
        collection,
        nfts,
        total_cost,
    })
}

async fn upload_pair<N>(
    node: &N,
    pair: &AssetPair,
    policies: &StepPolicies,
    options: &UploadOptions,
    uploads: &mut UploadCache,
) -> Result<UploadedUnit>
where
    N: StorageUploader + ?Sized,
{
    let key = file_key(&pair.metadata);
    let mut metadata = TokenMetadata::read(&pair.metadata)?;

    if let Some(done) = cached_upload(&metadata, uploads.get(&key), options) {
        info!(metadata = %key, uri = %done.metadata, "already uploaded, skipping");
        return Ok(UploadedUnit {
            metadata_file: key,
            image_url: done.image.clone(),
            metadata_url: done.metadata.clone(),
            archive_url: String::new(),
            final_metadata_id: None,
            cost: 0,
            skipped: true,
        });
    }
    if !options.force && uploads.contains_key(&key) {
        warn!(metadata = %key, "local metadata changed since the last upload, uploading again");
    }

    let image = retry("upload image", &policies.upload, |_| node.upload(&pair.image)).await?;
    let image_urls = GatewayUrls::with_bases(&options.storage_base, &options.archive_base, image.id.as_str());
    metadata.attach_image(&image_urls.storage, mime_type(&pair.image));
    metadata.write(&pair.metadata)?;
    info!(image = %pair.image.display(), url = %image_urls.storage, "image uploaded");

    let stored = retry("upload metadata", &policies.upload, |_| node.upload(&pair.metadata)).await?;
    let metadata_urls = GatewayUrls::with_bases(&options.storage_base, &options.archive_base, stored.id.as_str());
    metadata.uri = Some(metadata_urls.storage.clone());
    metadata.write(&pair.metadata)?;
    info!(metadata = %pair.metadata.display(), uri = %metadata_urls.storage, "metadata uploaded and patched");

    let mut cost = image.cost + stored.cost;
    let mut final_metadata_id = stored.id.to_string();
    if options.reupload_metadata {
        let again = retry("re-upload metadata", &policies.upload, |_| node.upload(&pair.metadata)).await?;
        cost += again.cost;
        info!(metadata = %pair.metadata.display(), id = %again.id, "patched metadata re-uploaded");
        final_metadata_id = again.id.to_string();
    }

    uploads.insert(
        key.clone(),
        UploadEntry {
            image: image_urls.storage.clone(),
            metadata: metadata_urls.storage.clone(),
        },
    );

    Ok(UploadedUnit {
        metadata_file: key,
        image_url: image_urls.storage,
        metadata_url: metadata_urls.storage,
        archive_url: metadata_urls.archive,
        final_metadata_id: Some(final_metadata_id),
        cost,
        skipped: false,
    })
}

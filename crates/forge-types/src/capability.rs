//! Narrow capability contracts injected into pipeline steps.
//!
//! Each backend implements only the traits it can honour; steps take exactly the
//! capabilities they use instead of a monolithic client.

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;

use crate::amount::Amount;
use crate::asset::{DigitalAsset, MintRequest, UploadReceipt};
use crate::ResourceHandle;

/// Reads the current balance of one account.
#[async_trait]
pub trait BalanceSource: Send + Sync {
    async fn balance(&self) -> Result<Amount>;
}

/// Adds funds to one account (airdrop, storage node deposit, ...).
#[async_trait]
pub trait Funder: Send + Sync {
    async fn fund(&self, amount: Amount) -> Result<()>;
}

/// Uploads a local file to decentralized storage.
#[async_trait]
pub trait StorageUploader: Send + Sync {
    async fn upload(&self, path: &Path) -> Result<UploadReceipt>;
}

/// Creates rule sets and tokens.
///
/// Every call builds and submits a fresh transaction; implementations must not reuse
/// anything signed by a previous call.
#[async_trait]
pub trait AssetMinter: Send + Sync {
    /// Create or update the named rule set owned by the payer; returns its address.
    async fn create_rule_set(&self, name: &str) -> Result<ResourceHandle>;

    async fn mint(&self, request: &MintRequest) -> Result<ResourceHandle>;
}

/// Looks up a token by mint address.
#[async_trait]
pub trait AssetReader: Send + Sync {
    async fn fetch_asset(&self, mint: &ResourceHandle) -> Result<DigitalAsset>;
}

/// Marks a member token as verified for its collection.
#[async_trait]
pub trait CollectionVerifier: Send + Sync {
    async fn verify_member(&self, member: &ResourceHandle, collection: &ResourceHandle) -> Result<()>;
}

/// Burns a token held by the payer; returns the reclaimed rent.
#[async_trait]
pub trait AssetBurner: Send + Sync {
    async fn burn(&self, mint: &ResourceHandle) -> Result<Amount>;
}

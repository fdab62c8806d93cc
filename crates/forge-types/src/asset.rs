//! Token and upload records exchanged between pipeline steps and backends.

use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::ResourceHandle;

/// Token standard of a minted asset.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TokenStandard {
    NonFungible,
    /// Programmable NFT governed by a rule set.
    #[default]
    ProgrammableNonFungible,
}

impl TokenStandard {
    pub fn is_programmable(&self) -> bool {
        matches!(self, TokenStandard::ProgrammableNonFungible)
    }
}

/// Collection membership recorded on a member token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionRef {
    pub key: String,
    pub verified: bool,
}

/// On-chain view of a minted token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigitalAsset {
    pub mint: String,
    pub owner: String,
    pub name: String,
    pub symbol: String,
    pub uri: String,
    pub token_standard: TokenStandard,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<CollectionRef>,
    #[serde(default)]
    pub is_collection: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_set: Option<String>,
    #[serde(default)]
    pub is_mutable: bool,
    /// Royalty in basis points.
    #[serde(default)]
    pub seller_fee_basis_points: u16,
}

impl DigitalAsset {
    /// Verified member of the given collection.
    pub fn is_verified_member_of(&self, collection: &str) -> bool {
        self.collection
            .as_ref()
            .is_some_and(|c| c.verified && c.key == collection)
    }
}

/// Priority fee settings attached to a mint transaction.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintOptions {
    /// Compute unit price in micro-lamports (at least 1).
    pub compute_unit_price: u64,
    pub compute_unit_limit: u32,
}

impl MintOptions {
    pub fn new(compute_unit_price: u64, compute_unit_limit: u32) -> Self {
        Self {
            compute_unit_price: compute_unit_price.max(1),
            compute_unit_limit,
        }
    }

    /// Priority fee in base units: price (micro-lamports per unit) * limit.
    pub fn priority_fee(&self) -> Amount {
        self.compute_unit_price
            .saturating_mul(self.compute_unit_limit as u64)
            / 1_000_000
    }
}

impl Default for MintOptions {
    fn default() -> Self {
        Self::new(500, 250_000)
    }
}

/// Everything needed to mint one token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintRequest {
    pub name: String,
    pub symbol: String,
    pub uri: String,
    pub token_standard: TokenStandard,
    pub is_collection: bool,
    pub is_mutable: bool,
    pub seller_fee_basis_points: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_set: Option<String>,
    #[serde(default)]
    pub options: MintOptions,
}

/// Result of a storage upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub id: ResourceHandle,
    pub bytes: u64,
    pub cost: Amount,
}

//! Pipeline steps.
//!
//! Every step is generic over the capability traits it needs, so the same code runs
//! against the sandbox ledger in tests and the CLI and against any other backend
//! implementing those traits.

pub mod burn;
pub mod collection;
pub mod fund;
pub mod mint;
pub mod rule_set;
pub mod upload;
pub mod verify;

use serde::Serialize;

use forge_types::ForgeError;

pub use burn::{burn_token, BurnSummary};
pub use collection::{create_collection, CollectionSettings, CollectionSummary};
pub use fund::{airdrop, ensure_wallet_funded, wallet_balance, AirdropSummary};
pub use mint::{mint_nfts, MintSummary, MintedToken};
pub use rule_set::{ensure_rule_set, RuleSetOutcome, RULE_SET_NAME};
pub use upload::{upload_assets, UploadOptions, UploadSummary, UploadedUnit};
pub use verify::{verify_collection, VerifyStatus, VerifySummary};

/// A unit of a batch step that did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitFailure {
    /// Metadata file name or mint address identifying the unit.
    pub unit: String,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
}

impl UnitFailure {
    pub fn new(unit: impl Into<String>, error: &anyhow::Error) -> Self {
        let attempts = error
            .chain()
            .filter_map(|e| e.downcast_ref::<ForgeError>())
            .find_map(ForgeError::attempts);
        Self {
            unit: unit.into(),
            error: format!("{:#}", error),
            attempts,
        }
    }
}

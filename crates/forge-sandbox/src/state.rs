//! Persisted ledger state.
//!
//! The whole ledger is one pretty-printed JSON document so it can be inspected and
//! edited by hand between pipeline steps.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use forge_types::{to_base_units, Amount, DigitalAsset};

/// Fee schedule and behaviour knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Storage cost per uploaded byte.
    pub price_per_byte: Amount,
    /// Flat fee per transaction.
    pub tx_fee: Amount,
    /// Rent locked in a minted token; returned on burn.
    pub mint_rent: Amount,
    /// Rent locked in a new rule set.
    pub rule_set_rent: Amount,
    /// Largest single airdrop.
    pub airdrop_cap: Amount,
    /// Lookups that miss after each mint before the token becomes visible.
    pub visibility_lag: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            price_per_byte: 20,
            tx_fee: 5_000,
            mint_rent: 5_616_720,
            rule_set_rent: 2_039_280,
            airdrop_cap: to_base_units(5.0),
            visibility_lag: 1,
        }
    }
}

/// One stored file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRecord {
    pub file_name: String,
    pub bytes: u64,
    pub content_type: String,
    pub sha256: String,
    pub cost: Amount,
    pub uploaded_at: String,
}

/// One minted token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub asset: DigitalAsset,
    #[serde(default)]
    pub burned: bool,
    /// Remaining lookups that report the token as missing.
    #[serde(default)]
    pub pending_lookups: u32,
    pub minted_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSetRecord {
    pub name: String,
    pub owner: String,
    pub revision: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerMetadata {
    pub created_at: Option<String>,
    pub last_modified: Option<String>,
}

/// Serializable ledger contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedLedger {
    /// Wallet address -> balance
    pub wallets: BTreeMap<String, Amount>,
    /// Storage node deposit per wallet address
    pub storage_deposits: BTreeMap<String, Amount>,
    /// Upload id -> record
    pub uploads: BTreeMap<String, UploadRecord>,
    /// Rule set address -> record
    pub rule_sets: BTreeMap<String, RuleSetRecord>,
    /// Mint address -> record
    pub assets: BTreeMap<String, AssetRecord>,
    /// Monotonic counter mixed into generated ids
    pub sequence: u64,
    pub config: LedgerConfig,
    pub metadata: LedgerMetadata,
}

impl PersistedLedger {
    pub fn new() -> Self {
        Self {
            metadata: LedgerMetadata {
                created_at: Some(chrono::Utc::now().to_rfc3339()),
                last_modified: None,
            },
            ..Default::default()
        }
    }

    /// Load state from a file
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read ledger file {}", path.display()))?;
        serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse ledger file {}", path.display()))
    }

    /// Save state to a file, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut persisted = self.clone();
        persisted.metadata.last_modified = Some(chrono::Utc::now().to_rfc3339());
        let mut data = serde_json::to_string_pretty(&persisted).context("Failed to serialize ledger")?;
        data.push('\n');
        std::fs::write(path, data)
            .with_context(|| format!("Failed to write ledger file {}", path.display()))?;
        Ok(())
    }

    pub fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_then_load_keeps_contents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache").join("ledger.json");

        let mut ledger = PersistedLedger::new();
        ledger.wallets.insert("Payer".into(), 42);
        ledger.config.visibility_lag = 3;
        ledger.next_sequence();
        ledger.save(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.ends_with('\n'));

        let loaded = PersistedLedger::load(&path).unwrap();
        assert_eq!(loaded.wallets["Payer"], 42);
        assert_eq!(loaded.config.visibility_lag, 3);
        assert_eq!(loaded.sequence, 1);
        assert!(loaded.metadata.last_modified.is_some());
    }

    #[test]
    fn test_partial_document_fills_defaults() {
        let ledger: PersistedLedger = serde_json::from_str(r#"{"wallets": {"A": 7}}"#).unwrap();
        assert_eq!(ledger.wallets["A"], 7);
        assert_eq!(ledger.config, LedgerConfig::default());
    }
}

//! Step configuration resolved from flags, environment variables and `.env` files.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use forge_resilience::DEFAULT_PARALLELISM;
use forge_transport::Cluster;
use forge_types::{env_var, env_var_or, ForgeError, MintOptions, RetryPolicy, TokenStandard};

/// Royalty written into every minted token unless a volume overrides it.
pub const DEFAULT_ROYALTY_BPS: u16 = 1000;

/// Environment variable that replaces every retry and poll delay, in milliseconds.
pub const RETRY_DELAY_OVERRIDE_ENV: &str = "FORGE_RETRY_DELAY_MS";

/// Where mutating operations are executed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// File-backed local ledger and storage node.
    #[default]
    Sandbox,
    /// Live cluster JSON-RPC; balance and airdrop only.
    Rpc,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Sandbox => "sandbox",
            Backend::Rpc => "rpc",
        }
    }
}

/// Load `.env.<cluster>` on top of whatever `.env` already set. Missing files are fine.
pub fn load_cluster_env(cluster: Cluster) {
    let file = format!(".env.{}", cluster.as_str());
    match dotenv::from_filename(&file) {
        Ok(path) => debug!(path = %path.display(), "loaded cluster environment"),
        Err(dotenv::Error::Io(_)) => {}
        Err(e) => warn!(file = %file, error = %e, "failed to parse cluster environment file"),
    }
}

/// Wallet keypair used when `--keypair` / `KEYPAIR_PATH` is not given.
pub fn default_keypair_path(cluster: Cluster) -> PathBuf {
    Path::new("wallets").join(cluster.keypair_file_name())
}

/// One entry of `volumes.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeConfig {
    pub folder_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Royalty in whole percent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub royalty_percent: Option<u16>,
    /// Upper bound on tokens minted from this volume.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_nfts: Option<usize>,
}

impl VolumeConfig {
    /// Volume stored in a folder of the same name, with no overrides.
    pub fn plain(folder_name: &str) -> Self {
        Self {
            folder_name: folder_name.to_string(),
            display_name: None,
            royalty_percent: None,
            max_nfts: None,
        }
    }

    /// `<root>/volumes/<folder>/assets`
    pub fn assets_dir(&self, root: &Path) -> PathBuf {
        root.join("volumes").join(&self.folder_name).join("assets")
    }

    pub fn seller_fee_basis_points(&self) -> u16 {
        self.royalty_percent
            .map(|p| p.saturating_mul(100))
            .unwrap_or(DEFAULT_ROYALTY_BPS)
    }
}

/// Resolve volume `key` from the mapping file, falling back to a plain volume
/// when the file or the key is absent.
pub fn resolve_volume(mapping_file: &Path, key: &str) -> Result<VolumeConfig> {
    if key.trim().is_empty() {
        return Err(ForgeError::InvalidInput("volume name is empty".into()).into());
    }
    if !mapping_file.exists() {
        debug!(volume = key, "no volume mapping file, using folder name as-is");
        return Ok(VolumeConfig::plain(key));
    }
    let data = std::fs::read_to_string(mapping_file)
        .with_context(|| format!("Failed to read {}", mapping_file.display()))?;
    let mut volumes: BTreeMap<String, VolumeConfig> = serde_json::from_str(&data)
        .with_context(|| format!("Failed to parse {}", mapping_file.display()))?;
    Ok(volumes.remove(key).unwrap_or_else(|| {
        warn!(volume = key, file = %mapping_file.display(), "volume not in mapping, using folder name as-is");
        VolumeConfig::plain(key)
    }))
}

/// Knobs of the mint step, read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintSettings {
    pub parallelism: usize,
    pub start_index: usize,
    /// 0 means no limit.
    pub max_to_mint: usize,
    pub options: MintOptions,
    pub token_standard: TokenStandard,
    pub seller_fee_basis_points: u16,
}

impl Default for MintSettings {
    fn default() -> Self {
        Self {
            parallelism: DEFAULT_PARALLELISM,
            start_index: 0,
            max_to_mint: 0,
            options: MintOptions::default(),
            token_standard: TokenStandard::ProgrammableNonFungible,
            seller_fee_basis_points: DEFAULT_ROYALTY_BPS,
        }
    }
}

impl MintSettings {
    /// `PARALLEL_BATCH_SIZE`, `START_INDEX`, `MAX_TO_MINT`, `COMPUTE_MICROLAMPORTS`,
    /// `COMPUTE_UNIT_LIMIT`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            parallelism: env_var_or("PARALLEL_BATCH_SIZE", defaults.parallelism).max(1),
            start_index: env_var_or("START_INDEX", 0),
            max_to_mint: env_var_or("MAX_TO_MINT", 0),
            options: MintOptions::new(
                env_var_or("COMPUTE_MICROLAMPORTS", defaults.options.compute_unit_price),
                env_var_or("COMPUTE_UNIT_LIMIT", defaults.options.compute_unit_limit),
            ),
            ..defaults
        }
    }

    /// Narrow the limits to what a volume allows.
    pub fn with_volume(mut self, volume: &VolumeConfig) -> Self {
        self.seller_fee_basis_points = volume.seller_fee_basis_points();
        if let Some(max) = volume.max_nfts {
            self.max_to_mint = match self.max_to_mint {
                0 => max,
                n => n.min(max),
            };
        }
        self
    }

    /// Index range `[start, end)` selected out of `total` files.
    pub fn select(&self, total: usize) -> std::ops::Range<usize> {
        let start = self.start_index.min(total);
        let end = match self.max_to_mint {
            0 => total,
            n => start.saturating_add(n).min(total),
        };
        start..end
    }
}

/// Retry and poll schedules of every pipeline step.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StepPolicies {
    /// Storage node deposit.
    pub storage_funding: RetryPolicy,
    /// Each file upload.
    pub upload: RetryPolicy,
    /// Devnet airdrop.
    pub airdrop: RetryPolicy,
    /// Rule set, mint, verify and burn transactions.
    pub send: RetryPolicy,
    /// Collection token visibility.
    pub collection_visibility: RetryPolicy,
    /// Member token visibility.
    pub mint_visibility: RetryPolicy,
}

impl Default for StepPolicies {
    fn default() -> Self {
        Self {
            storage_funding: RetryPolicy::linear(3, 5000),
            upload: RetryPolicy::constant(5, 3000),
            airdrop: RetryPolicy::constant(5, 3000),
            send: RetryPolicy::constant(3, 2000),
            collection_visibility: RetryPolicy::constant(10, 3000),
            mint_visibility: RetryPolicy::constant(6, 5000),
        }
    }
}

impl StepPolicies {
    /// Defaults, with every delay replaced by `FORGE_RETRY_DELAY_MS` when set.
    pub fn from_env() -> Self {
        match env_var::<u64>(RETRY_DELAY_OVERRIDE_ENV) {
            Some(ms) => Self::default().with_delay_ms(ms),
            None => Self::default(),
        }
    }

    /// Same attempt counts with a different base delay.
    pub fn with_delay_ms(self, ms: u64) -> Self {
        let rebase = |p: RetryPolicy| match p.backoff() {
            forge_types::Backoff::Constant => RetryPolicy::constant(p.max_attempts(), ms),
            forge_types::Backoff::Linear => RetryPolicy::linear(p.max_attempts(), ms),
        };
        Self {
            storage_funding: rebase(self.storage_funding),
            upload: rebase(self.upload),
            airdrop: rebase(self.airdrop),
            send: rebase(self.send),
            collection_visibility: rebase(self.collection_visibility),
            mint_visibility: rebase(self.mint_visibility),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_volume_mapping() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("volumes.json");
        std::fs::write(
            &file,
            r#"{"vol02": {"folderName": "volume-2", "displayName": "Volume II", "royaltyPercent": 7, "maxNfts": 50}}"#,
        )
        .unwrap();

        let vol = resolve_volume(&file, "vol02").unwrap();
        assert_eq!(vol.folder_name, "volume-2");
        assert_eq!(vol.seller_fee_basis_points(), 700);
        assert_eq!(
            vol.assets_dir(Path::new("/work")),
            PathBuf::from("/work/volumes/volume-2/assets")
        );

        let fallback = resolve_volume(&file, "vol09").unwrap();
        assert_eq!(fallback, VolumeConfig::plain("vol09"));
        assert_eq!(fallback.seller_fee_basis_points(), DEFAULT_ROYALTY_BPS);

        let missing = resolve_volume(&dir.path().join("nope.json"), "vol01").unwrap();
        assert_eq!(missing.folder_name, "vol01");
        assert!(resolve_volume(&file, " ").is_err());
    }

    #[test]
    fn test_mint_selection() {
        let mut settings = MintSettings::default();
        assert_eq!(settings.select(10), 0..10);

        settings.start_index = 3;
        settings.max_to_mint = 4;
        assert_eq!(settings.select(10), 3..7);
        assert_eq!(settings.select(5), 3..5);
        assert_eq!(settings.select(2), 2..2);
    }

    #[test]
    fn test_volume_caps_mint_count() {
        let volume = VolumeConfig {
            max_nfts: Some(5),
            ..VolumeConfig::plain("v")
        };
        assert_eq!(MintSettings::default().with_volume(&volume).max_to_mint, 5);

        let settings = MintSettings {
            max_to_mint: 3,
            ..Default::default()
        };
        assert_eq!(settings.with_volume(&volume).max_to_mint, 3);
    }

    #[test]
    fn test_policies_keep_attempts_when_rebased() {
        let fast = StepPolicies::default().with_delay_ms(0);
        assert_eq!(fast.upload.max_attempts(), 5);
        assert_eq!(fast.mint_visibility.max_attempts(), 6);
        assert_eq!(fast.storage_funding.delay_after(3), Duration::ZERO);
        assert_eq!(fast.storage_funding.backoff(), forge_types::Backoff::Linear);
    }

    #[test]
    fn test_default_keypair_path() {
        assert_eq!(
            default_keypair_path(Cluster::Devnet),
            PathBuf::from("wallets/devnet-id.json")
        );
        assert_eq!(
            default_keypair_path(Cluster::MainnetBeta),
            PathBuf::from("wallets/mainnet-id.json")
        );
    }
}

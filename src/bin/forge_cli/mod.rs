//! CLI subcommand implementations for nft-forge

pub mod burn;
pub mod collection;
pub mod fund;
pub mod mint;
pub mod output;
pub mod upload;
pub mod verify;
pub mod wallet;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::ValueEnum;
use tracing::debug;

use forge_sandbox::{Operation, SandboxLedger};
use forge_transport::{resolve_rpc_url, Cluster, RpcAccount, RpcClient};
use forge_types::{ForgeError, TokenStandard};
use nft_forge::{AssetLayout, Backend, Cache, Keypair, StepPolicies, VolumeConfig};

/// Token standard as written on the command line.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum, Default)]
pub enum StandardArg {
    /// Programmable NFT with a royalty rule set
    #[default]
    Pnft,
    /// Plain NFT
    Nft,
}

impl From<StandardArg> for TokenStandard {
    fn from(value: StandardArg) -> Self {
        match value {
            StandardArg::Pnft => TokenStandard::ProgrammableNonFungible,
            StandardArg::Nft => TokenStandard::NonFungible,
        }
    }
}

/// Everything a subcommand needs, resolved from global flags and the environment.
pub struct ForgeSession {
    pub cluster: Cluster,
    pub backend: Backend,
    pub layout: AssetLayout,
    pub cache: Cache,
    pub keypair_path: PathBuf,
    pub state_file: PathBuf,
    pub policies: StepPolicies,
    pub volume: Option<VolumeConfig>,
    flaky: Vec<(Operation, u32)>,
    ledger: Option<SandboxLedger>,
}

impl ForgeSession {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cluster: Cluster,
        backend: Backend,
        assets: PathBuf,
        keypair_path: PathBuf,
        state_file: Option<PathBuf>,
        volume: Option<VolumeConfig>,
        flaky: Vec<(Operation, u32)>,
    ) -> Self {
        let layout = AssetLayout::new(assets);
        let cache = Cache::new(layout.cache_dir());
        let state_file = state_file.unwrap_or_else(|| layout.cache_dir().join("sandbox-ledger.json"));
        Self {
            cluster,
            backend,
            layout,
            cache,
            keypair_path,
            state_file,
            policies: StepPolicies::from_env(),
            volume,
            flaky,
            ledger: None,
        }
    }

    pub fn keypair(&self) -> Result<Keypair> {
        Keypair::read(&self.keypair_path)
    }

    /// The sandbox ledger paying from the session wallet, opened on first use.
    pub fn sandbox(&mut self) -> Result<SandboxLedger> {
        if self.backend != Backend::Sandbox {
            return Err(ForgeError::InvalidInput(format!(
                "this command needs --backend sandbox; the {} backend only supports balance and airdrop",
                self.backend.as_str()
            ))
            .into());
        }
        if let Some(ledger) = &self.ledger {
            return Ok(ledger.clone());
        }
        let payer = self.keypair()?.address();
        let ledger = SandboxLedger::load_or_create(&self.state_file, &payer)?;
        for (op, count) in &self.flaky {
            debug!(operation = %op, count, "injecting transient failures");
            ledger.fail_next(*op, *count);
        }
        self.ledger = Some(ledger.clone());
        Ok(ledger)
    }

    /// The session wallet on the live cluster.
    pub fn rpc_account(&self) -> Result<RpcAccount> {
        let payer = self.keypair()?.address();
        let client = RpcClient::new(&resolve_rpc_url(self.cluster));
        Ok(RpcAccount::new(client, &payer, self.cluster)?.with_confirm_policy(self.policies.collection_visibility))
    }

    /// Persist the sandbox ledger if a command opened it.
    pub fn save(&self) -> Result<()> {
        match &self.ledger {
            Some(ledger) => ledger
                .save()
                .with_context(|| format!("Failed to save ledger to {}", self.state_file.display())),
            None => Ok(()),
        }
    }
}

//! Wallet commands - convert and export keypair files

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use serde::Serialize;

use forge_types::{env_var, ForgeError};
use nft_forge::wallet::default_secret_output;
use nft_forge::Keypair;

use super::output::{format_error, to_json};
use super::ForgeSession;

#[derive(Serialize)]
struct WalletResult {
    address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    secret: Option<String>,
}

#[derive(Parser, Debug)]
pub struct ConvertSecretCmd {
    /// Base58 secret key exported from a wallet app (default: $SOLANA_SECRET_KEY)
    #[arg(long)]
    pub secret: Option<String>,

    /// Network name used in the output file name (default: the selected cluster)
    #[arg(long)]
    pub network: Option<String>,

    /// Output file (default: ~/.config/solana/<network>-id.json)
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Overwrite an existing keypair file
    #[arg(long)]
    pub force: bool,
}

impl ConvertSecretCmd {
    pub async fn execute(&self, session: &ForgeSession, json_output: bool, _verbose: bool) -> Result<()> {
        match self.execute_inner(session) {
            Ok(result) => {
                if json_output {
                    println!("{}", to_json(&result));
                } else {
                    println!(
                        "\x1b[32m✓ Keypair written\x1b[0m\nAddress: \x1b[36m{}\x1b[0m\nPath: {}",
                        result.address,
                        result.path.as_ref().map(|p| p.display().to_string()).unwrap_or_default()
                    );
                }
                Ok(())
            }
            Err(e) => {
                eprintln!("{}", format_error(&e, json_output));
                Err(e)
            }
        }
    }

    fn execute_inner(&self, session: &ForgeSession) -> Result<WalletResult> {
        let secret = self
            .secret
            .clone()
            .or_else(|| env_var::<String>("SOLANA_SECRET_KEY"))
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ForgeError::InvalidInput("SOLANA_SECRET_KEY is not set; pass --secret".into()))?;
        let keypair = Keypair::from_base58(&secret)?;

        let network = self
            .network
            .clone()
            .unwrap_or_else(|| session.cluster.as_str().to_string());
        let path = match &self.out {
            Some(path) => path.clone(),
            None => default_secret_output(&network)?,
        };
        if path.exists() && !self.force {
            return Err(ForgeError::InvalidInput(format!(
                "{} already exists; pass --force to overwrite it",
                path.display()
            ))
            .into());
        }
        keypair.write(&path)?;

        Ok(WalletResult {
            address: keypair.address(),
            path: Some(path),
            secret: None,
        })
    }
}

/// Reads the keypair selected by `--keypair`.
#[derive(Parser, Debug)]
pub struct ExportSecretCmd {}

impl ExportSecretCmd {
    pub async fn execute(&self, session: &ForgeSession, json_output: bool, _verbose: bool) -> Result<()> {
        let path = session.keypair_path.clone();
        match Keypair::read(&path) {
            Ok(keypair) => {
                let result = WalletResult {
                    address: keypair.address(),
                    path: Some(path),
                    secret: Some(keypair.seed_base58()),
                };
                if json_output {
                    println!("{}", to_json(&result));
                } else {
                    println!("Address: {}", result.address);
                    println!("Private key (base58): {}", result.secret.unwrap_or_default());
                }
                Ok(())
            }
            Err(e) => {
                eprintln!("{}", format_error(&e, json_output));
                Err(e)
            }
        }
    }
}

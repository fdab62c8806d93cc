//! Mint command - mint member tokens in batches

use anyhow::{anyhow, Result};
use clap::Parser;

use forge_resilience::FailureMode;
use nft_forge::steps::{mint_nfts, MintSummary};
use nft_forge::MintSettings;

use super::output::{format_error, format_mint_summary};
use super::{ForgeSession, StandardArg};

#[derive(Parser, Debug)]
pub struct MintCmd {
    /// Token standard of the minted tokens
    #[arg(long, value_enum, default_value_t = StandardArg::Pnft)]
    pub standard: StandardArg,

    /// Tokens in flight at once (default: $PARALLEL_BATCH_SIZE or 12)
    #[arg(long)]
    pub parallelism: Option<usize>,

    /// First metadata file to mint, by sorted position (default: $START_INDEX or 0)
    #[arg(long)]
    pub start_index: Option<usize>,

    /// Mint at most this many files; 0 = no limit (default: $MAX_TO_MINT or 0)
    #[arg(long)]
    pub max: Option<usize>,

    /// Stop dispatching after the first failed token
    #[arg(long)]
    pub fail_fast: bool,
}

impl MintCmd {
    pub async fn execute(&self, session: &mut ForgeSession, json_output: bool, _verbose: bool) -> Result<()> {
        match self.execute_inner(session).await {
            Ok(summary) => {
                println!("{}", format_mint_summary(&summary, json_output));
                if summary.is_clean() {
                    Ok(())
                } else {
                    Err(anyhow!(
                        "{} token(s) failed, {} are not visible yet and {} were not attempted; re-run mint to retry them",
                        summary.failed.len(),
                        summary.unconfirmed.len(),
                        summary.skipped.len()
                    ))
                }
            }
            Err(e) => {
                eprintln!("{}", format_error(&e, json_output));
                Err(e)
            }
        }
    }

    fn settings(&self, session: &ForgeSession) -> MintSettings {
        let mut settings = MintSettings::from_env();
        settings.token_standard = self.standard.into();
        if let Some(p) = self.parallelism {
            settings.parallelism = p.max(1);
        }
        if let Some(start) = self.start_index {
            settings.start_index = start;
        }
        if let Some(max) = self.max {
            settings.max_to_mint = max;
        }
        match &session.volume {
            Some(volume) => settings.with_volume(volume),
            None => settings,
        }
    }

    async fn execute_inner(&self, session: &mut ForgeSession) -> Result<MintSummary> {
        let ledger = session.sandbox()?;
        let settings = self.settings(session);
        let mode = if self.fail_fast {
            FailureMode::Abort
        } else {
            FailureMode::Continue
        };
        mint_nfts(
            &ledger,
            &session.layout,
            &session.cache,
            session.cluster,
            &session.policies,
            &settings,
            mode,
        )
        .await
    }
}

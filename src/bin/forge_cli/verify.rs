//! Verify command - mark minted tokens as collection members

use anyhow::{anyhow, Result};
use clap::Parser;

use forge_resilience::FailureMode;
use forge_types::env_var_or;
use nft_forge::steps::{verify_collection, VerifySummary};

use super::output::{format_error, format_verify_summary};
use super::ForgeSession;

#[derive(Parser, Debug)]
pub struct VerifyCmd {
    /// Tokens checked at once (default: $PARALLEL_BATCH_SIZE or 12)
    #[arg(long)]
    pub parallelism: Option<usize>,

    /// Stop dispatching after the first failed token
    #[arg(long)]
    pub fail_fast: bool,
}

impl VerifyCmd {
    pub async fn execute(&self, session: &mut ForgeSession, json_output: bool, _verbose: bool) -> Result<()> {
        match self.execute_inner(session).await {
            Ok(summary) => {
                println!("{}", format_verify_summary(&summary, json_output));
                if summary.is_clean() {
                    Ok(())
                } else {
                    Err(anyhow!(
                        "{} token(s) failed verification; re-run verify to retry them",
                        summary.failed.len() + summary.not_attempted.len()
                    ))
                }
            }
            Err(e) => {
                eprintln!("{}", format_error(&e, json_output));
                Err(e)
            }
        }
    }

    async fn execute_inner(&self, session: &mut ForgeSession) -> Result<VerifySummary> {
        let ledger = session.sandbox()?;
        let parallelism = self
            .parallelism
            .unwrap_or_else(|| env_var_or("PARALLEL_BATCH_SIZE", 12usize))
            .max(1);
        let mode = if self.fail_fast {
            FailureMode::Abort
        } else {
            FailureMode::Continue
        };
        verify_collection(&ledger, &session.cache, &session.policies, parallelism, mode).await
    }
}

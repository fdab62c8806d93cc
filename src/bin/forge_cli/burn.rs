//! Burn command - destroy one token and reclaim its rent

use anyhow::Result;
use clap::Parser;

use nft_forge::steps::{burn_token, BurnSummary};

use super::output::{format_burn_summary, format_error};
use super::ForgeSession;

#[derive(Parser, Debug)]
pub struct BurnCmd {
    /// Mint address of the token to burn
    #[arg(long)]
    pub mint: String,
}

impl BurnCmd {
    pub async fn execute(&self, session: &mut ForgeSession, json_output: bool, _verbose: bool) -> Result<()> {
        match self.execute_inner(session).await {
            Ok(summary) => {
                println!("{}", format_burn_summary(&summary, json_output));
                Ok(())
            }
            Err(e) => {
                eprintln!("{}", format_error(&e, json_output));
                Err(e)
            }
        }
    }

    async fn execute_inner(&self, session: &mut ForgeSession) -> Result<BurnSummary> {
        let ledger = session.sandbox()?;
        burn_token(&ledger, &self.mint, &session.cache, &session.policies.send).await
    }
}

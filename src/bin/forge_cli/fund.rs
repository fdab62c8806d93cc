//! Balance and airdrop commands

use anyhow::Result;
use clap::Parser;
use serde::Serialize;

use forge_transport::Cluster;
use forge_types::{format_amount, to_base_units, Amount, ForgeError, FundingThreshold};
use nft_forge::steps::{airdrop, wallet_balance, AirdropSummary};
use nft_forge::Backend;

use super::output::{format_airdrop_summary, format_error, to_json};
use super::ForgeSession;

#[derive(Serialize)]
struct BalanceResult {
    address: String,
    cluster: Cluster,
    backend: Backend,
    balance: Amount,
}

#[derive(Parser, Debug)]
pub struct BalanceCmd {}

impl BalanceCmd {
    pub async fn execute(&self, session: &mut ForgeSession, json_output: bool, _verbose: bool) -> Result<()> {
        match self.execute_inner(session).await {
            Ok(result) => {
                if json_output {
                    println!("{}", to_json(&result));
                } else {
                    println!("Address: \x1b[36m{}\x1b[0m", result.address);
                    println!("Balance: {} ({})", format_amount(result.balance), result.cluster);
                }
                Ok(())
            }
            Err(e) => {
                eprintln!("{}", format_error(&e, json_output));
                Err(e)
            }
        }
    }

    async fn execute_inner(&self, session: &mut ForgeSession) -> Result<BalanceResult> {
        let address = session.keypair()?.address();
        let balance = match session.backend {
            Backend::Sandbox => wallet_balance(&session.sandbox()?).await?,
            Backend::Rpc => wallet_balance(&session.rpc_account()?).await?,
        };
        Ok(BalanceResult {
            address,
            cluster: session.cluster,
            backend: session.backend,
            balance,
        })
    }
}

#[derive(Parser, Debug)]
pub struct AirdropCmd {
    /// Airdrop only when the balance is below this many tokens
    #[arg(long, default_value_t = 0.5)]
    pub min: f64,

    /// Tokens to request
    #[arg(long, default_value_t = 1.0)]
    pub amount: f64,
}

impl AirdropCmd {
    pub async fn execute(&self, session: &mut ForgeSession, json_output: bool, _verbose: bool) -> Result<()> {
        match self.execute_inner(session).await {
            Ok(summary) => {
                println!("{}", format_airdrop_summary(&summary, json_output));
                Ok(())
            }
            Err(e) => {
                eprintln!("{}", format_error(&e, json_output));
                Err(e)
            }
        }
    }

    fn threshold(&self) -> Result<FundingThreshold> {
        if !(self.min >= 0.0 && self.amount > 0.0) {
            return Err(ForgeError::InvalidInput("--min must be >= 0 and --amount > 0".into()).into());
        }
        let min_balance = to_base_units(self.min);
        let floor = FundingThreshold::airdrop_default().hard_floor.min(min_balance);
        Ok(FundingThreshold::new(min_balance, to_base_units(self.amount), floor)?)
    }

    async fn execute_inner(&self, session: &mut ForgeSession) -> Result<AirdropSummary> {
        if !session.cluster.supports_airdrop() {
            return Err(ForgeError::InvalidInput(format!(
                "airdrops are not available on {}",
                session.cluster
            ))
            .into());
        }
        let threshold = self.threshold()?;
        let policy = session.policies.airdrop;
        match session.backend {
            Backend::Sandbox => airdrop(&session.sandbox()?, session.cluster, &threshold, &policy).await,
            Backend::Rpc => airdrop(&session.rpc_account()?, session.cluster, &threshold, &policy).await,
        }
    }
}

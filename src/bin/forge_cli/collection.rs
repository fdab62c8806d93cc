//! Create-collection command - mint the collection token

use anyhow::Result;
use clap::Parser;

use nft_forge::config::DEFAULT_ROYALTY_BPS;
use nft_forge::steps::{create_collection, CollectionSettings, CollectionSummary};
use nft_forge::MintSettings;

use super::output::{format_collection_summary, format_error};
use super::{ForgeSession, StandardArg};

#[derive(Parser, Debug)]
pub struct CollectionCmd {
    /// Token standard of the collection token
    #[arg(long, value_enum, default_value_t = StandardArg::Pnft)]
    pub standard: StandardArg,
}

impl CollectionCmd {
    pub async fn execute(&self, session: &mut ForgeSession, json_output: bool, _verbose: bool) -> Result<()> {
        match self.execute_inner(session).await {
            Ok(summary) => {
                println!("{}", format_collection_summary(&summary, json_output));
                Ok(())
            }
            Err(e) => {
                eprintln!("{}", format_error(&e, json_output));
                Err(e)
            }
        }
    }

    async fn execute_inner(&self, session: &mut ForgeSession) -> Result<CollectionSummary> {
        let ledger = session.sandbox()?;
        let settings = CollectionSettings {
            token_standard: self.standard.into(),
            seller_fee_basis_points: session
                .volume
                .as_ref()
                .map(|v| v.seller_fee_basis_points())
                .unwrap_or(DEFAULT_ROYALTY_BPS),
            options: MintSettings::from_env().options,
        };
        create_collection(
            &ledger,
            &session.layout,
            &session.cache,
            session.cluster,
            &session.policies,
            &settings,
        )
        .await
    }
}

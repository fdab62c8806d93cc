//! Upload command - push images and metadata to storage

use anyhow::Result;
use clap::Parser;

use nft_forge::steps::{upload_assets, UploadOptions, UploadSummary};

use super::output::{format_error, format_upload_summary};
use super::ForgeSession;

#[derive(Parser, Debug)]
pub struct UploadCmd {
    /// Upload each metadata file again after its uri was patched
    #[arg(long)]
    pub reupload_metadata: bool,

    /// Upload every unit, even those recorded as uploaded
    #[arg(long)]
    pub force: bool,
}

impl UploadCmd {
    pub async fn execute(&self, session: &mut ForgeSession, json_output: bool, _verbose: bool) -> Result<()> {
        match self.execute_inner(session).await {
            Ok(summary) => {
                println!("{}", format_upload_summary(&summary, json_output));
                Ok(())
            }
            Err(e) => {
                eprintln!("{}", format_error(&e, json_output));
                Err(e)
            }
        }
    }

    async fn execute_inner(&self, session: &mut ForgeSession) -> Result<UploadSummary> {
        let ledger = session.sandbox()?;
        let options = UploadOptions {
            reupload_metadata: self.reupload_metadata,
            force: self.force,
            ..UploadOptions::from_env()
        };
        upload_assets(
            &ledger.storage_node(),
            &session.layout,
            &session.cache,
            &session.policies,
            &options,
        )
        .await
    }
}

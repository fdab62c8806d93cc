//! nft-forge: run-once CLI steps for creating an NFT collection
//!
//! ## Steps
//!
//! - **convert-secret** / **export-secret**: move a wallet secret between base58 and keypair files
//! - **balance** / **airdrop**: inspect and fund the wallet
//! - **upload**: push images and metadata to storage
//! - **create-collection**: mint the collection token
//! - **mint**: mint member tokens in bounded batches
//! - **verify**: mark minted tokens as collection members
//! - **burn**: destroy a token and reclaim its rent
//!
//! ## Example Usage
//!
//! ```bash
//! nft-forge convert-secret --secret 3x7F...
//! nft-forge upload
//! nft-forge create-collection
//! nft-forge mint --max 50
//! nft-forge verify
//! nft-forge burn --mint 9xQe...
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::warn;

use forge_sandbox::{parse_fault_spec, Operation};
use forge_transport::Cluster;
use forge_types::env_var;
use nft_forge::config::{default_keypair_path, load_cluster_env, resolve_volume};
use nft_forge::logging::init_logging;
use nft_forge::Backend;

mod forge_cli;

use forge_cli::{
    burn::BurnCmd,
    collection::CollectionCmd,
    fund::{AirdropCmd, BalanceCmd},
    mint::MintCmd,
    upload::UploadCmd,
    verify::VerifyCmd,
    wallet::{ConvertSecretCmd, ExportSecretCmd},
    ForgeSession,
};

#[derive(Parser)]
#[command(
    name = "nft-forge",
    author,
    version,
    about = "Create, mint and verify an NFT collection step by step",
    long_about = "Run-once pipeline steps for an NFT collection.\n\n\
                  Every step retries transient failures, keeps the paying wallet funded \
                  and waits for new tokens to become visible before reporting them."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Asset directory (default: $ASSETS_PATH, the volume's assets, or ./assets)
    #[arg(long, global = true)]
    assets: Option<PathBuf>,

    /// Volume folder under ./volumes (default: $VOLUME)
    #[arg(long, global = true)]
    volume: Option<String>,

    /// Volume mapping file
    #[arg(long, global = true, default_value = "volumes.json")]
    volumes_file: PathBuf,

    /// devnet, testnet or mainnet-beta (default: $CLUSTER or devnet)
    #[arg(long, global = true)]
    cluster: Option<String>,

    /// Wallet keypair file (default: $KEYPAIR_PATH or wallets/<cluster>-id.json)
    #[arg(long, global = true)]
    keypair: Option<PathBuf>,

    /// Sandbox ledger state file (default: <assets>/cache/sandbox-ledger.json)
    #[arg(long, global = true)]
    state_file: Option<PathBuf>,

    /// Where operations run
    #[arg(long, global = true, value_enum, default_value_t = Backend::Sandbox)]
    backend: Backend,

    /// Make the next N sandbox calls of an operation fail, as op=N (repeatable)
    #[arg(long, global = true, value_parser = parse_fault_spec)]
    flaky: Vec<(Operation, u32)>,

    /// Output as JSON instead of human-readable format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (debug logging)
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a base58 secret key as a keypair file
    ConvertSecret(ConvertSecretCmd),

    /// Print the base58 private key of a keypair file
    ExportSecret(ExportSecretCmd),

    /// Show the wallet balance
    Balance(BalanceCmd),

    /// Airdrop test tokens when the wallet runs low
    Airdrop(AirdropCmd),

    /// Upload images and metadata to storage
    Upload(UploadCmd),

    /// Mint the collection token
    CreateCollection(CollectionCmd),

    /// Mint member tokens from the metadata files
    Mint(MintCmd),

    /// Verify minted tokens as collection members
    Verify(VerifyCmd),

    /// Burn one token
    Burn(BurnCmd),
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::ConvertSecret(_) => "convert-secret",
            Commands::ExportSecret(_) => "export-secret",
            Commands::Balance(_) => "balance",
            Commands::Airdrop(_) => "airdrop",
            Commands::Upload(_) => "upload",
            Commands::CreateCollection(_) => "create-collection",
            Commands::Mint(_) => "mint",
            Commands::Verify(_) => "verify",
            Commands::Burn(_) => "burn",
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let Cli {
        command,
        assets,
        volume,
        volumes_file,
        cluster,
        keypair,
        state_file,
        backend,
        flaky,
        json,
        verbose,
    } = Cli::parse();

    dotenv::dotenv().ok();
    init_logging(verbose);

    let cluster: Cluster = cluster
        .or_else(|| env_var::<String>("CLUSTER"))
        .unwrap_or_else(|| Cluster::default().as_str().to_string())
        .parse()?;
    load_cluster_env(cluster);

    let volume = match volume.or_else(|| env_var::<String>("VOLUME")).filter(|v| !v.is_empty()) {
        Some(key) => Some(resolve_volume(&volumes_file, &key)?),
        None => None,
    };
    let assets = assets
        .or_else(|| env_var::<PathBuf>("ASSETS_PATH"))
        .or_else(|| volume.as_ref().map(|v| v.assets_dir(&PathBuf::from("."))))
        .unwrap_or_else(|| PathBuf::from("./assets"));
    let keypair = keypair
        .or_else(|| env_var::<PathBuf>("KEYPAIR_PATH"))
        .unwrap_or_else(|| default_keypair_path(cluster));

    let command_name = command.name();
    tracing::debug!(command = command_name, %cluster, backend = backend.as_str(), assets = %assets.display(), "starting");

    let mut session = ForgeSession::new(cluster, backend, assets, keypair, state_file, volume, flaky);

    let result = match command {
        Commands::ConvertSecret(cmd) => cmd.execute(&session, json, verbose).await,
        Commands::ExportSecret(cmd) => cmd.execute(&session, json, verbose).await,
        Commands::Balance(cmd) => cmd.execute(&mut session, json, verbose).await,
        Commands::Airdrop(cmd) => cmd.execute(&mut session, json, verbose).await,
        Commands::Upload(cmd) => cmd.execute(&mut session, json, verbose).await,
        Commands::CreateCollection(cmd) => cmd.execute(&mut session, json, verbose).await,
        Commands::Mint(cmd) => cmd.execute(&mut session, json, verbose).await,
        Commands::Verify(cmd) => cmd.execute(&mut session, json, verbose).await,
        Commands::Burn(cmd) => cmd.execute(&mut session, json, verbose).await,
    };

    // Ledger writes that happened before a failure are kept, so the cache files stay in step.
    if let Err(e) = session.save() {
        if result.is_ok() {
            return Err(e);
        }
        warn!(command = command_name, error = %e, "failed to save sandbox ledger");
    }

    result
}

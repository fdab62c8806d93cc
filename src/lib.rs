//! nft-forge
//!
//! Run-once pipeline steps for NFT collections, built on the resilient operation
//! executor in `forge-resilience`:
//!
//! - **upload**: fund the storage node, upload images and metadata, patch local metadata
//! - **create-collection**: airdrop on devnet, create the royalty rule set, mint the collection
//! - **mint**: mint member tokens in bounded concurrent batches
//! - **verify**: verify collection membership
//! - **burn**: burn one token and reclaim its rent
//!
//! Steps communicate only through files: the metadata JSON under the asset folder
//! and the JSON files in its `cache/` directory (see [`cache`]).

pub mod assets;
pub mod cache;
pub mod config;
pub mod logging;
pub mod steps;
pub mod wallet;

pub use assets::{AssetInventory, AssetLayout, TokenMetadata};
pub use cache::{Cache, MintedNfts};
pub use config::{Backend, MintSettings, StepPolicies, VolumeConfig};
pub use wallet::Keypair;

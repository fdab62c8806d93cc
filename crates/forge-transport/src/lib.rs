//! Forge Transport Layer
//!
//! Network access for nft-forge pipeline steps.
//!
//! This crate provides:
//! - [`network`]: cluster names, RPC endpoints, explorer links and storage gateway URLs
//! - [`rpc`]: JSON-RPC client for balance queries, devnet airdrops and account lookups
//!
//! # Example
//!
//! ```ignore
//! use forge_transport::{Cluster, RpcAccount, RpcClient};
//!
//! let cluster: Cluster = "devnet".parse()?;
//! let client = RpcClient::for_cluster(cluster);
//! let account = RpcAccount::new(client, "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin", cluster)?;
//! let lamports = account.balance().await?;
//! ```

pub mod network;
pub mod rpc;

pub use network::{
    explorer_link, resolve_rpc_url, Cluster, ExplorerKind, GatewayUrls, DEFAULT_ARCHIVE_GATEWAY,
    DEFAULT_STORAGE_GATEWAY,
};
pub use rpc::{AccountInfo, RpcAccount, RpcClient};

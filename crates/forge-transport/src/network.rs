use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use forge_types::{env_string_or, env_var, ForgeError};

const MAINNET_RPC: &str = "https://api.mainnet-beta.solana.com";
const TESTNET_RPC: &str = "https://api.testnet.solana.com";
const DEVNET_RPC: &str = "https://api.devnet.solana.com";

const EXPLORER_BASE: &str = "https://explorer.solana.com";

pub const DEFAULT_STORAGE_GATEWAY: &str = "https://devnet.irys.xyz";
pub const DEFAULT_ARCHIVE_GATEWAY: &str = "https://arweave.net";

/// Ledger cluster a pipeline runs against.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Cluster {
    #[default]
    #[serde(rename = "devnet")]
    Devnet,
    #[serde(rename = "testnet")]
    Testnet,
    #[serde(rename = "mainnet-beta")]
    MainnetBeta,
}

impl Cluster {
    pub fn as_str(&self) -> &'static str {
        match self {
            Cluster::Devnet => "devnet",
            Cluster::Testnet => "testnet",
            Cluster::MainnetBeta => "mainnet-beta",
        }
    }

    pub fn rpc_url(&self) -> &'static str {
        match self {
            Cluster::Devnet => DEVNET_RPC,
            Cluster::Testnet => TESTNET_RPC,
            Cluster::MainnetBeta => MAINNET_RPC,
        }
    }

    /// Whether the cluster hands out free test tokens.
    pub fn supports_airdrop(&self) -> bool {
        !matches!(self, Cluster::MainnetBeta)
    }

    /// File name of the wallet keypair used on this cluster.
    pub fn keypair_file_name(&self) -> &'static str {
        match self {
            Cluster::Devnet => "devnet-id.json",
            _ => "mainnet-id.json",
        }
    }
}

impl fmt::Display for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Cluster {
    type Err = ForgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "devnet" => Ok(Cluster::Devnet),
            "testnet" => Ok(Cluster::Testnet),
            "mainnet-beta" | "mainnet" => Ok(Cluster::MainnetBeta),
            other => Err(ForgeError::InvalidInput(format!(
                "Invalid CLUSTER value: {}. Must be 'devnet', 'testnet', or 'mainnet-beta'.",
                other
            ))),
        }
    }
}

pub fn infer_cluster_from_url(url: &str) -> Option<Cluster> {
    let lower = url.to_lowercase();
    if lower.contains("testnet") {
        Some(Cluster::Testnet)
    } else if lower.contains("devnet") {
        Some(Cluster::Devnet)
    } else if lower.contains("mainnet") {
        Some(Cluster::MainnetBeta)
    } else {
        None
    }
}

/// RPC endpoint for `cluster`, unless `RPC_URL` overrides it.
pub fn resolve_rpc_url(cluster: Cluster) -> String {
    env_var::<String>("RPC_URL")
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| cluster.rpc_url().to_string())
}

/// Kind of entity an explorer link points at.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExplorerKind {
    Address,
    Tx,
}

impl ExplorerKind {
    fn path(&self) -> &'static str {
        match self {
            ExplorerKind::Address => "address",
            ExplorerKind::Tx => "tx",
        }
    }
}

/// Block explorer URL for an address or a transaction.
pub fn explorer_link(kind: ExplorerKind, id: &str, cluster: Cluster) -> String {
    let base = format!("{}/{}/{}", EXPLORER_BASE, kind.path(), id);
    match cluster {
        Cluster::MainnetBeta => base,
        other => format!("{}?cluster={}", base, other.as_str()),
    }
}

/// Public URLs of an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayUrls {
    /// URL on the storage node's own gateway; written into metadata.
    pub storage: String,
    /// URL on the permanent archive gateway.
    pub archive: String,
}

impl GatewayUrls {
    /// Gateway URLs for `id`, with bases from `BASE_IRYS_URL` and `BASE_ARWEAVE_URL`.
    pub fn for_id(id: &str) -> Self {
        let storage = env_string_or("BASE_IRYS_URL", DEFAULT_STORAGE_GATEWAY);
        let archive = env_string_or("BASE_ARWEAVE_URL", DEFAULT_ARCHIVE_GATEWAY);
        Self::with_bases(&storage, &archive, id)
    }

    pub fn with_bases(storage_base: &str, archive_base: &str, id: &str) -> Self {
        Self {
            storage: format!("{}/{}", storage_base.trim_end_matches('/'), id),
            archive: format!("{}/{}", archive_base.trim_end_matches('/'), id),
        }
    }

    /// Whether `uri` points at the storage gateway under `storage_base`.
    pub fn is_gateway_uri(uri: &str, storage_base: &str) -> bool {
        let base = storage_base.trim_end_matches('/');
        uri.len() > base.len() + 1 && uri.starts_with(base) && uri[base.len()..].starts_with('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_parsing() {
        assert_eq!("devnet".parse::<Cluster>().unwrap(), Cluster::Devnet);
        assert_eq!("testnet".parse::<Cluster>().unwrap(), Cluster::Testnet);
        assert_eq!("mainnet-beta".parse::<Cluster>().unwrap(), Cluster::MainnetBeta);
        assert_eq!("mainnet".parse::<Cluster>().unwrap(), Cluster::MainnetBeta);

        let err = "localnet".parse::<Cluster>().unwrap_err();
        assert!(err.is_permanent());
        assert!(err.to_string().contains("Invalid CLUSTER value: localnet"));
    }

    #[test]
    fn test_cluster_properties() {
        assert!(Cluster::Devnet.supports_airdrop());
        assert!(!Cluster::MainnetBeta.supports_airdrop());
        assert_eq!(Cluster::Devnet.keypair_file_name(), "devnet-id.json");
        assert_eq!(Cluster::Testnet.keypair_file_name(), "mainnet-id.json");
        assert_eq!(Cluster::MainnetBeta.to_string(), "mainnet-beta");
    }

    #[test]
    fn test_infer_cluster_from_url() {
        assert_eq!(
            infer_cluster_from_url("https://api.devnet.solana.com"),
            Some(Cluster::Devnet)
        );
        assert_eq!(
            infer_cluster_from_url("https://api.mainnet-beta.solana.com"),
            Some(Cluster::MainnetBeta)
        );
        assert_eq!(infer_cluster_from_url("http://127.0.0.1:8899"), None);
    }

    #[test]
    fn test_explorer_link() {
        assert_eq!(
            explorer_link(ExplorerKind::Address, "Abc", Cluster::Devnet),
            "https://explorer.solana.com/address/Abc?cluster=devnet"
        );
        assert_eq!(
            explorer_link(ExplorerKind::Tx, "Sig", Cluster::MainnetBeta),
            "https://explorer.solana.com/tx/Sig"
        );
    }

    #[test]
    fn test_gateway_urls() {
        let urls = GatewayUrls::with_bases("https://devnet.irys.xyz/", "https://arweave.net", "TxId");
        assert_eq!(urls.storage, "https://devnet.irys.xyz/TxId");
        assert_eq!(urls.archive, "https://arweave.net/TxId");

        assert!(GatewayUrls::is_gateway_uri(&urls.storage, "https://devnet.irys.xyz"));
        assert!(!GatewayUrls::is_gateway_uri("https://devnet.irys.xyz/", "https://devnet.irys.xyz"));
        assert!(!GatewayUrls::is_gateway_uri("https://example.com/TxId", "https://devnet.irys.xyz"));
    }
}

//! Wallet keypair files.
//!
//! A keypair file is a JSON array of the 64 secret key bytes; the last 32 bytes
//! are the public key. Nothing here signs anything.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use forge_types::address::{encode_address, ADDRESS_LEN};
use forge_types::ForgeError;

pub const SECRET_KEY_LEN: usize = 64;

/// 64-byte secret key as exported by browser wallets.
#[derive(Clone, PartialEq, Eq)]
pub struct Keypair {
    bytes: [u8; SECRET_KEY_LEN],
}

impl Keypair {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ForgeError> {
        let bytes: [u8; SECRET_KEY_LEN] = bytes.try_into().map_err(|_| {
            ForgeError::InvalidInput(format!(
                "secret key must be {} bytes, got {}",
                SECRET_KEY_LEN,
                bytes.len()
            ))
        })?;
        Ok(Self { bytes })
    }

    /// Decode a base58 secret key string.
    pub fn from_base58(secret: &str) -> Result<Self, ForgeError> {
        let bytes = bs58::decode(secret.trim())
            .into_vec()
            .map_err(|e| ForgeError::InvalidInput(format!("secret key is not valid base58: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    /// Read a keypair file.
    pub fn read(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Keypair file not found at {}", path.display()))?;
        let bytes: Vec<u8> = serde_json::from_str(&data)
            .map_err(|e| ForgeError::InvalidInput(format!("{} is not a keypair file: {}", path.display(), e)))?;
        Ok(Self::from_bytes(&bytes)?)
    }

    /// Write the keypair file, creating parent directories.
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string(&self.bytes.to_vec())?;
        std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Base58 public key.
    pub fn address(&self) -> String {
        let mut public = [0u8; ADDRESS_LEN];
        public.copy_from_slice(&self.bytes[ADDRESS_LEN..]);
        encode_address(&public)
    }

    /// Base58 of the first 32 bytes, the form wallet apps import.
    pub fn seed_base58(&self) -> String {
        bs58::encode(&self.bytes[..ADDRESS_LEN]).into_string()
    }

    pub fn to_base58(&self) -> String {
        bs58::encode(&self.bytes).into_string()
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair").field("address", &self.address()).finish()
    }
}

/// `~/.config/solana/<network>-id.json`
pub fn default_secret_output(network: &str) -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home
        .join(".config")
        .join("solana")
        .join(format!("{}-id.json", network)))
}

//! JSON files through which pipeline steps hand results to each other.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use forge_types::ForgeError;

pub const COLLECTION_FILE: &str = "collection-address.json";
pub const RULE_SET_FILE: &str = "ruleset-address.json";
pub const MINTED_FILE: &str = "nft-addresses.json";
pub const UPLOADS_FILE: &str = "uploads.json";

#[derive(Debug, Serialize, Deserialize)]
struct CollectionAddress {
    #[serde(alias = "mintedCollectionAddress")]
    address: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RuleSetAddress {
    rule_set_address: String,
}

/// Tokens minted so far, and the metadata file each came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MintedNfts {
    pub minted_nfts: Vec<String>,
    /// Metadata file name -> mint address
    pub sources: BTreeMap<String, String>,
    /// Minted but never seen by a lookup. Metadata file name -> mint address
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub unconfirmed: BTreeMap<String, String>,
}

impl MintedNfts {
    /// Accepts a bare array, `{mintedNfts}` or `{mintedNftAddresses}`.
    pub fn from_json(value: serde_json::Value) -> Result<Self, ForgeError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Object {
            #[serde(default, alias = "mintedNftAddresses")]
            minted_nfts: Vec<String>,
            #[serde(default)]
            sources: BTreeMap<String, String>,
            #[serde(default)]
            unconfirmed: BTreeMap<String, String>,
        }

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Shape {
            List(Vec<String>),
            Object(Object),
        }

        match serde_json::from_value::<Shape>(value) {
            Ok(Shape::List(minted_nfts)) => Ok(Self {
                minted_nfts,
                ..Self::default()
            }),
            Ok(Shape::Object(o)) => Ok(Self {
                minted_nfts: o.minted_nfts,
                sources: o.sources,
                unconfirmed: o.unconfirmed,
            }),
            Err(e) => Err(ForgeError::InvalidInput(format!("unrecognized {} layout: {}", MINTED_FILE, e))),
        }
    }

    pub fn record(&mut self, source: &str, address: &str) {
        if !self.minted_nfts.iter().any(|a| a == address) {
            self.minted_nfts.push(address.to_string());
        }
        self.sources.insert(source.to_string(), address.to_string());
        self.unconfirmed.remove(source);
    }

    /// Remember a mint whose visibility poll ran out, so the next run looks it up
    /// instead of minting the file again.
    pub fn record_unconfirmed(&mut self, source: &str, address: &str) {
        self.unconfirmed.insert(source.to_string(), address.to_string());
    }

    pub fn minted_from(&self, source: &str) -> Option<&str> {
        self.sources.get(source).map(String::as_str)
    }

    pub fn unconfirmed_from(&self, source: &str) -> Option<&str> {
        self.unconfirmed.get(source).map(String::as_str)
    }

    /// Drop an address, e.g. after it was burned.
    pub fn forget(&mut self, address: &str) -> bool {
        let before = self.minted_nfts.len() + self.unconfirmed.len();
        self.minted_nfts.retain(|a| a != address);
        self.sources.retain(|_, a| a != address);
        self.unconfirmed.retain(|_, a| a != address);
        before != self.minted_nfts.len() + self.unconfirmed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.minted_nfts.is_empty() && self.unconfirmed.is_empty()
    }
}

/// Gateway URLs recorded for one uploaded image + metadata pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadEntry {
    pub image: String,
    pub metadata: String,
}

/// Metadata file name -> upload URLs.
pub type UploadCache = BTreeMap<String, UploadEntry>;

/// The `cache/` directory of an asset set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cache {
    dir: PathBuf,
}

impl Cache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    fn read<T: DeserializeOwned>(&self, file: &str) -> Result<Option<T>> {
        let path = self.path(file);
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;
        let value = serde_json::from_str(&data)
            .map_err(|e| ForgeError::InvalidInput(format!("invalid JSON in {}: {}", path.display(), e)))?;
        Ok(Some(value))
    }

    fn write<T: Serialize>(&self, file: &str, value: &T) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir).with_context(|| format!("Failed to create {}", self.dir.display()))?;
        let path = self.path(file);
        let mut data = serde_json::to_string_pretty(value)?;
        data.push('\n');
        std::fs::write(&path, data).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    pub fn collection(&self) -> Result<Option<String>> {
        Ok(self.read::<CollectionAddress>(COLLECTION_FILE)?.map(|c| c.address))
    }

    /// The collection address, failing when the collection step has not run.
    pub fn require_collection(&self) -> Result<String> {
        self.collection()?.ok_or_else(|| {
            ForgeError::InvalidInput(format!(
                "Collection address not found at {}. Run create-collection first.",
                self.path(COLLECTION_FILE).display()
            ))
            .into()
        })
    }

    pub fn write_collection(&self, address: &str) -> Result<PathBuf> {
        self.write(
            COLLECTION_FILE,
            &CollectionAddress {
                address: address.to_string(),
            },
        )
    }

    pub fn rule_set(&self) -> Result<Option<String>> {
        Ok(self.read::<RuleSetAddress>(RULE_SET_FILE)?.map(|r| r.rule_set_address))
    }

    pub fn write_rule_set(&self, address: &str) -> Result<PathBuf> {
        self.write(
            RULE_SET_FILE,
            &RuleSetAddress {
                rule_set_address: address.to_string(),
            },
        )
    }

    pub fn minted(&self) -> Result<MintedNfts> {
        match self.read::<serde_json::Value>(MINTED_FILE)? {
            Some(value) => Ok(MintedNfts::from_json(value)?),
            None => Ok(MintedNfts::default()),
        }
    }

    pub fn write_minted(&self, minted: &MintedNfts) -> Result<PathBuf> {
        self.write(MINTED_FILE, minted)
    }

    pub fn uploads(&self) -> Result<UploadCache> {
        Ok(self.read(UPLOADS_FILE)?.unwrap_or_default())
    }

    pub fn write_uploads(&self, uploads: &UploadCache) -> Result<PathBuf> {
        self.write(UPLOADS_FILE, uploads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_collection_address_file() {
        let dir = TempDir::new().unwrap();
        let cache = Cache::new(dir.path().join("cache"));
        assert_eq!(cache.collection().unwrap(), None);
        assert!(forge_types::is_permanent(&cache.require_collection().unwrap_err()));

        let path = cache.write_collection("Coll111").unwrap();
        let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(raw, json!({"address": "Coll111"}));
        assert_eq!(cache.require_collection().unwrap(), "Coll111");

        std::fs::write(cache.path(COLLECTION_FILE), r#"{"mintedCollectionAddress": "Coll222"}"#).unwrap();
        assert_eq!(cache.collection().unwrap().as_deref(), Some("Coll222"));
    }

    #[test]
    fn test_rule_set_file_uses_camel_case() {
        let dir = TempDir::new().unwrap();
        let cache = Cache::new(dir.path());
        cache.write_rule_set("Rule111").unwrap();
        let raw = std::fs::read_to_string(cache.path(RULE_SET_FILE)).unwrap();
        assert!(raw.contains("\"ruleSetAddress\""));
        assert_eq!(cache.rule_set().unwrap().as_deref(), Some("Rule111"));
    }

    #[test]
    fn test_minted_file_shapes() {
        let bare = MintedNfts::from_json(json!(["A", "B"])).unwrap();
        assert_eq!(bare.minted_nfts, vec!["A", "B"]);

        let legacy = MintedNfts::from_json(json!({"mintedNftAddresses": ["C"]})).unwrap();
        assert_eq!(legacy.minted_nfts, vec!["C"]);

        let current = MintedNfts::from_json(json!({"mintedNfts": ["D"], "sources": {"1.json": "D"}})).unwrap();
        assert_eq!(current.minted_from("1.json"), Some("D"));

        assert!(MintedNfts::from_json(json!(42)).is_err());
    }

    #[test]
    fn test_minted_record_and_forget() {
        let dir = TempDir::new().unwrap();
        let cache = Cache::new(dir.path());
        let mut minted = cache.minted().unwrap();
        assert!(minted.is_empty());

        minted.record("1.json", "A");
        minted.record("2.json", "B");
        minted.record("1.json", "A");
        cache.write_minted(&minted).unwrap();

        let mut reread = cache.minted().unwrap();
        assert_eq!(reread.minted_nfts, vec!["A", "B"]);
        assert!(reread.forget("A"));
        assert!(!reread.forget("A"));
        assert_eq!(reread.minted_from("1.json"), None);
    }

    #[test]
    fn test_unconfirmed_mints_survive_reload_until_recorded() {
        let dir = TempDir::new().unwrap();
        let cache = Cache::new(dir.path());
        let mut minted = MintedNfts::default();
        minted.record_unconfirmed("3.json", "Lagging");
        assert!(!minted.is_empty());
        cache.write_minted(&minted).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(cache.path(MINTED_FILE)).unwrap()).unwrap();
        assert_eq!(raw["unconfirmed"], json!({"3.json": "Lagging"}));

        let mut reread = cache.minted().unwrap();
        assert_eq!(reread.unconfirmed_from("3.json"), Some("Lagging"));
        assert_eq!(reread.minted_from("3.json"), None);

        reread.record("3.json", "Lagging");
        assert_eq!(reread.unconfirmed_from("3.json"), None);
        assert_eq!(reread.minted_from("3.json"), Some("Lagging"));
        cache.write_minted(&reread).unwrap();
        let raw = std::fs::read_to_string(cache.path(MINTED_FILE)).unwrap();
        assert!(!raw.contains("unconfirmed"));
    }

    #[test]
    fn test_uploads_default_to_empty() {
        let dir = TempDir::new().unwrap();
        let cache = Cache::new(dir.path());
        assert!(cache.uploads().unwrap().is_empty());

        let mut uploads = UploadCache::new();
        uploads.insert(
            "1.json".into(),
            UploadEntry {
                image: "https://g/img".into(),
                metadata: "https://g/meta".into(),
            },
        );
        cache.write_uploads(&uploads).unwrap();
        assert_eq!(cache.uploads().unwrap(), uploads);
    }
}

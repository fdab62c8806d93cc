//! Asset folder layout and token metadata files.
//!
//! ```text
//! <assets>/images/collection/*.png|jpg|jpeg
//! <assets>/metadata/collection/*.json
//! <assets>/images/nfts/*
//! <assets>/metadata/nfts/*.json
//! <assets>/cache/
//! ```
//!
//! Files are sorted by name and paired by position.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use forge_types::ForgeError;

pub const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];
pub const METADATA_EXTENSIONS: [&str; 1] = ["json"];

/// Directory tree of one asset set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetLayout {
    root: PathBuf,
}

impl AssetLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn collection_images(&self) -> PathBuf {
        self.root.join("images").join("collection")
    }

    pub fn collection_metadata(&self) -> PathBuf {
        self.root.join("metadata").join("collection")
    }

    pub fn nft_images(&self) -> PathBuf {
        self.root.join("images").join("nfts")
    }

    pub fn nft_metadata(&self) -> PathBuf {
        self.root.join("metadata").join("nfts")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.root.join("cache")
    }
}

/// Files in `dir` with one of `extensions` (case-insensitive), sorted by path.
/// A missing directory yields an empty list.
pub fn list_files(dir: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)));
        if matches {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// An image and the metadata file describing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetPair {
    pub image: PathBuf,
    pub metadata: PathBuf,
}

/// Everything the upload step works on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetInventory {
    pub collection: AssetPair,
    pub nfts: Vec<AssetPair>,
}

impl AssetInventory {
    /// Scan the layout; fails before any upload when files are missing or unpaired.
    pub fn scan(layout: &AssetLayout) -> Result<Self> {
        let collection_images = list_files(&layout.collection_images(), &IMAGE_EXTENSIONS)?;
        let collection_metadata = list_files(&layout.collection_metadata(), &METADATA_EXTENSIONS)?;
        let nft_images = list_files(&layout.nft_images(), &IMAGE_EXTENSIONS)?;
        let nft_metadata = list_files(&layout.nft_metadata(), &METADATA_EXTENSIONS)?;

        if nft_images.len() != nft_metadata.len() {
            let missing = if nft_images.len() > nft_metadata.len() {
                "Metadata missing for some images."
            } else {
                "Images missing for some metadata files."
            };
            return Err(ForgeError::InvalidInput(format!(
                "Mismatched NFT images ({}) and metadata ({}). {}",
                nft_images.len(),
                nft_metadata.len(),
                missing
            ))
            .into());
        }

        let (Some(image), Some(metadata)) = (collection_images.first(), collection_metadata.first()) else {
            return Err(ForgeError::InvalidInput(
                "No collection image or metadata found. Please place them in the correct folders.".into(),
            )
            .into());
        };
        if collection_images.len() > 1 || collection_metadata.len() > 1 {
            warn!(
                image = %image.display(),
                metadata = %metadata.display(),
                "several collection files found, using the first of each"
            );
        }

        Ok(Self {
            collection: AssetPair {
                image: image.clone(),
                metadata: metadata.clone(),
            },
            nfts: nft_images
                .into_iter()
                .zip(nft_metadata)
                .map(|(image, metadata)| AssetPair { image, metadata })
                .collect(),
        })
    }
}

/// The collection metadata file: the first json in `metadata/collection`.
pub fn collection_metadata_file(layout: &AssetLayout) -> Result<PathBuf> {
    let files = list_files(&layout.collection_metadata(), &METADATA_EXTENSIONS)?;
    let Some(first) = files.first() else {
        return Err(ForgeError::InvalidInput(format!(
            "No collection metadata found in {}",
            layout.collection_metadata().display()
        ))
        .into());
    };
    if files.len() > 1 {
        warn!(using = %first.display(), count = files.len(), "several collection metadata files found");
    }
    Ok(first.clone())
}

/// Mime type of an image, from its extension.
pub fn mime_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataFile {
    pub uri: String,
    #[serde(rename = "type")]
    pub content_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataProperties {
    #[serde(default)]
    pub files: Vec<MetadataFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Off-chain token metadata. Unknown fields are kept as they are.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub name: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<MetadataProperties>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TokenMetadata {
    pub fn read(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let metadata = serde_json::from_str(&data)
            .map_err(|e| ForgeError::InvalidInput(format!("invalid metadata in {}: {}", path.display(), e)))?;
        Ok(metadata)
    }

    /// Write pretty JSON with a trailing newline.
    pub fn write(&self, path: &Path) -> Result<()> {
        let mut data = serde_json::to_string_pretty(self)?;
        data.push('\n');
        std::fs::write(path, data).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Point the metadata at an uploaded image. `uri` also points at the image
    /// until the metadata itself has been uploaded.
    pub fn attach_image(&mut self, image_url: &str, content_type: &str) {
        self.image = Some(image_url.to_string());
        self.uri = Some(image_url.to_string());
        let extra = self
            .properties
            .take()
            .map(|p| p.extra)
            .unwrap_or_default();
        self.properties = Some(MetadataProperties {
            files: vec![MetadataFile {
                uri: image_url.to_string(),
                content_type: content_type.to_string(),
            }],
            category: Some("image".to_string()),
            extra,
        });
    }

    /// `uri` as required for minting: present and http(s).
    pub fn mint_uri(&self) -> Result<&str, ForgeError> {
        match self.uri.as_deref() {
            Some(uri) if forge_types::is_http_uri(uri) => Ok(uri),
            _ => Err(ForgeError::InvalidInput(format!(
                "metadata.uri is not a valid URL for '{}'",
                self.name
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path, contents: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    fn metadata_json(name: &str) -> String {
        format!(r#"{{"name": "{}", "symbol": "TST", "attributes": [{{"trait_type": "eyes", "value": "blue"}}]}}"#, name)
    }

    #[test]
    fn test_scan_pairs_sorted_files() {
        let dir = TempDir::new().unwrap();
        let layout = AssetLayout::new(dir.path());
        touch(&layout.collection_images().join("collection.png"), "png");
        touch(&layout.collection_metadata().join("collection.json"), &metadata_json("C"));
        touch(&layout.nft_images().join("2.jpg"), "two");
        touch(&layout.nft_images().join("1.PNG"), "one");
        touch(&layout.nft_images().join("notes.txt"), "ignored");
        touch(&layout.nft_metadata().join("1.json"), &metadata_json("One"));
        touch(&layout.nft_metadata().join("2.json"), &metadata_json("Two"));

        let inventory = AssetInventory::scan(&layout).unwrap();
        assert_eq!(inventory.nfts.len(), 2);
        assert!(inventory.nfts[0].image.ends_with("1.PNG"));
        assert!(inventory.nfts[0].metadata.ends_with("1.json"));
        assert!(inventory.nfts[1].image.ends_with("2.jpg"));
        assert!(inventory.collection.metadata.ends_with("collection.json"));
    }

    #[test]
    fn test_scan_rejects_unpaired_files() {
        let dir = TempDir::new().unwrap();
        let layout = AssetLayout::new(dir.path());
        touch(&layout.collection_images().join("c.png"), "png");
        touch(&layout.collection_metadata().join("c.json"), &metadata_json("C"));
        touch(&layout.nft_images().join("1.png"), "one");
        touch(&layout.nft_images().join("2.png"), "two");
        touch(&layout.nft_metadata().join("1.json"), &metadata_json("One"));

        let err = AssetInventory::scan(&layout).unwrap_err();
        assert!(forge_types::is_permanent(&err));
        assert!(err.to_string().contains("Metadata missing for some images."));

        touch(&layout.nft_metadata().join("2.json"), &metadata_json("Two"));
        touch(&layout.nft_metadata().join("3.json"), &metadata_json("Three"));
        let err = AssetInventory::scan(&layout).unwrap_err();
        assert!(err.to_string().contains("Images missing for some metadata files."));
    }

    #[test]
    fn test_scan_requires_collection_files() {
        let dir = TempDir::new().unwrap();
        let layout = AssetLayout::new(dir.path());
        touch(&layout.collection_metadata().join("c.json"), &metadata_json("C"));

        let err = AssetInventory::scan(&layout).unwrap_err();
        assert!(err.to_string().contains("No collection image or metadata found"));
    }

    #[test]
    fn test_attach_image_keeps_unknown_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("1.json");
        touch(&path, &metadata_json("One"));

        let mut metadata = TokenMetadata::read(&path).unwrap();
        assert!(metadata.mint_uri().is_err());
        metadata.attach_image("https://devnet.irys.xyz/Img", mime_type(Path::new("1.jpeg")));
        metadata.write(&path).unwrap();

        let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["image"], "https://devnet.irys.xyz/Img");
        assert_eq!(value["uri"], "https://devnet.irys.xyz/Img");
        assert_eq!(value["properties"]["files"][0]["type"], "image/jpeg");
        assert_eq!(value["properties"]["category"], "image");
        assert_eq!(value["attributes"][0]["value"], "blue");

        let reread = TokenMetadata::read(&path).unwrap();
        assert_eq!(reread.mint_uri().unwrap(), "https://devnet.irys.xyz/Img");
    }

    #[test]
    fn test_invalid_metadata_is_invalid_input() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        touch(&path, "{ not json");
        let err = TokenMetadata::read(&path).unwrap_err();
        assert!(forge_types::is_permanent(&err));
    }
}

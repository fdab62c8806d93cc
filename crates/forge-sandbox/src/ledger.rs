//! The sandbox ledger and its storage node.
//!
//! Clones of a [`SandboxLedger`] share one state behind a mutex, so concurrent units
//! of work see each other's writes. Each handle is bound to a paying wallet.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use forge_types::address::encode_address;
use forge_types::capability::{
    AssetBurner, AssetMinter, AssetReader, BalanceSource, CollectionVerifier, Funder, StorageUploader,
};
use forge_types::{
    format_amount, is_http_uri, parse_address, Amount, CollectionRef, DigitalAsset, ForgeError, MintRequest,
    ResourceHandle, UploadReceipt,
};

use crate::faults::{FaultPlan, Operation};
use crate::state::{AssetRecord, LedgerConfig, PersistedLedger, RuleSetRecord, UploadRecord};

struct Inner {
    state: PersistedLedger,
    path: Option<PathBuf>,
    dirty: bool,
    faults: FaultPlan,
}

/// Handle to the shared sandbox state, bound to one paying wallet.
#[derive(Clone)]
pub struct SandboxLedger {
    inner: Arc<Mutex<Inner>>,
    payer: String,
}

/// Hash `parts` into a 32-byte base58 address.
fn derive_address(parts: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&hasher.finalize());
    encode_address(&digest)
}

fn content_type_for(path: &Path) -> &'static str {
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

fn account_not_found(mint: &str) -> anyhow::Error {
    anyhow!("account {} not found", mint)
}

fn debit(state: &mut PersistedLedger, address: &str, amount: Amount, purpose: &str) -> Result<()> {
    let balance = state.wallets.get(address).copied().unwrap_or_default();
    if balance < amount {
        return Err(anyhow!(
            "insufficient lamports for {}: balance {}, need {}",
            purpose,
            format_amount(balance),
            format_amount(amount)
        ));
    }
    state.wallets.insert(address.to_string(), balance - amount);
    Ok(())
}

fn credit(state: &mut PersistedLedger, address: &str, amount: Amount) {
    let entry = state.wallets.entry(address.to_string()).or_default();
    *entry = entry.saturating_add(amount);
}

impl SandboxLedger {
    /// Ledger that is never written to disk.
    pub fn in_memory(payer: &str) -> Result<Self, ForgeError> {
        Ok(Self {
            inner: Arc::new(Mutex::new(Inner {
                state: PersistedLedger::new(),
                path: None,
                dirty: false,
                faults: FaultPlan::default(),
            })),
            payer: parse_address(payer)?,
        })
    }

    /// Load the ledger from `path`, or start an empty one that will be saved there.
    pub fn load_or_create(path: &Path, payer: &str) -> Result<Self> {
        let payer = parse_address(payer)?;
        let (state, dirty) = if path.exists() {
            (PersistedLedger::load(path)?, false)
        } else {
            debug!(path = %path.display(), "creating new sandbox ledger");
            (PersistedLedger::new(), true)
        };
        Ok(Self {
            inner: Arc::new(Mutex::new(Inner {
                state,
                path: Some(path.to_path_buf()),
                dirty,
                faults: FaultPlan::default(),
            })),
            payer,
        })
    }

    /// Write the ledger back to its file if anything changed.
    pub fn save(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        let Some(path) = inner.path.clone() else {
            return Ok(());
        };
        if !inner.dirty {
            return Ok(());
        }
        inner.state.save(&path)?;
        inner.dirty = false;
        debug!(path = %path.display(), "sandbox ledger saved");
        Ok(())
    }

    pub fn path(&self) -> Option<PathBuf> {
        self.inner.lock().path.clone()
    }

    /// Handle on the same state paying from another wallet.
    pub fn for_payer(&self, payer: &str) -> Result<Self, ForgeError> {
        Ok(Self {
            inner: Arc::clone(&self.inner),
            payer: parse_address(payer)?,
        })
    }

    /// The storage node account of this handle's payer.
    pub fn storage_node(&self) -> StorageNode {
        StorageNode {
            ledger: self.clone(),
        }
    }

    /// Make the next `count` calls of `op` fail with a transient error.
    pub fn fail_next(&self, op: Operation, count: u32) {
        self.inner.lock().faults.add(op, count);
    }

    pub fn pending_faults(&self, op: Operation) -> u32 {
        self.inner.lock().faults.pending(op)
    }

    pub fn config(&self) -> LedgerConfig {
        self.inner.lock().state.config.clone()
    }

    pub fn configure(&self, f: impl FnOnce(&mut LedgerConfig)) {
        let mut inner = self.inner.lock();
        f(&mut inner.state.config);
        inner.dirty = true;
    }

    /// Add funds to a wallet directly, bypassing the airdrop cap.
    pub fn credit(&self, address: &str, amount: Amount) {
        let mut inner = self.inner.lock();
        credit(&mut inner.state, address, amount);
        inner.dirty = true;
    }

    pub fn wallet_balance(&self, address: &str) -> Amount {
        self.inner
            .lock()
            .state
            .wallets
            .get(address)
            .copied()
            .unwrap_or_default()
    }

    /// Storage node deposit of this handle's payer.
    pub fn storage_deposit(&self) -> Amount {
        self.inner
            .lock()
            .state
            .storage_deposits
            .get(&self.payer)
            .copied()
            .unwrap_or_default()
    }

    /// Token record as stored, ignoring visibility lag.
    pub fn asset_record(&self, mint: &str) -> Option<AssetRecord> {
        self.inner.lock().state.assets.get(mint).cloned()
    }

    pub fn upload_record(&self, id: &str) -> Option<UploadRecord> {
        self.inner.lock().state.uploads.get(id).cloned()
    }

    /// Live tokens owned by `owner`, ordered by mint address.
    pub fn assets_owned_by(&self, owner: &str) -> Vec<DigitalAsset> {
        self.inner
            .lock()
            .state
            .assets
            .values()
            .filter(|r| !r.burned && r.asset.owner == owner)
            .map(|r| r.asset.clone())
            .collect()
    }

    /// Address of the rule set `name` owned by `owner`.
    pub fn rule_set_address(owner: &str, name: &str) -> String {
        derive_address(&[b"rule_set", owner.as_bytes(), name.as_bytes()])
    }

    fn with_state<R>(&self, op: Operation, f: impl FnOnce(&mut PersistedLedger) -> Result<R>) -> Result<R> {
        let mut inner = self.inner.lock();
        inner.faults.check(op)?;
        let result = f(&mut inner.state)?;
        inner.dirty = true;
        Ok(result)
    }
}

impl std::fmt::Debug for SandboxLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SandboxLedger")
            .field("payer", &self.payer)
            .field("path", &self.path())
            .finish()
    }
}

#[async_trait]
impl BalanceSource for SandboxLedger {
    async fn balance(&self) -> Result<Amount> {
        let mut inner = self.inner.lock();
        inner.faults.check(Operation::Balance)?;
        Ok(inner.state.wallets.get(&self.payer).copied().unwrap_or_default())
    }
}

/// Airdrop into the payer wallet.
#[async_trait]
impl Funder for SandboxLedger {
    async fn fund(&self, amount: Amount) -> Result<()> {
        let cap = self.config().airdrop_cap;
        if amount > cap {
            return Err(ForgeError::InvalidInput(format!(
                "airdrop of {} exceeds the per-request cap of {}",
                format_amount(amount),
                format_amount(cap)
            ))
            .into());
        }
        self.with_state(Operation::Airdrop, |state| {
            credit(state, &self.payer, amount);
            Ok(())
        })?;
        info!(wallet = %self.payer, amount = %format_amount(amount), "airdrop credited");
        Ok(())
    }
}

#[async_trait]
impl AssetMinter for SandboxLedger {
    async fn create_rule_set(&self, name: &str) -> Result<ResourceHandle> {
        if name.trim().is_empty() {
            return Err(ForgeError::InvalidInput("rule set name is empty".into()).into());
        }
        let address = Self::rule_set_address(&self.payer, name);
        self.with_state(Operation::RuleSet, |state| {
            if state.rule_sets.contains_key(&address) {
                debug!(rule_set = %address, "rule set already exists");
                return Ok(());
            }
            let cost = state.config.rule_set_rent + state.config.tx_fee;
            debit(state, &self.payer, cost, "rule set")?;
            state.rule_sets.insert(
                address.clone(),
                RuleSetRecord {
                    name: name.to_string(),
                    owner: self.payer.clone(),
                    revision: 1,
                },
            );
            info!(rule_set = %address, name, "rule set created");
            Ok(())
        })?;
        Ok(ResourceHandle::new(address))
    }

    async fn mint(&self, request: &MintRequest) -> Result<ResourceHandle> {
        if request.name.trim().is_empty() {
            return Err(ForgeError::InvalidInput("token name is empty".into()).into());
        }
        if !is_http_uri(&request.uri) {
            return Err(ForgeError::InvalidInput(format!("metadata uri is not a valid URL: {}", request.uri)).into());
        }
        if request.rule_set.is_some() && !request.token_standard.is_programmable() {
            return Err(
                ForgeError::InvalidInput("rule sets only apply to programmable tokens".into()).into(),
            );
        }

        let mint = self.with_state(Operation::Mint, |state| {
            if let Some(key) = &request.collection {
                let is_collection = state
                    .assets
                    .get(key)
                    .is_some_and(|r| !r.burned && r.asset.is_collection);
                if !is_collection {
                    return Err(ForgeError::InvalidInput(format!("{} is not a collection token", key)).into());
                }
            }
            if let Some(rule_set) = &request.rule_set {
                if !state.rule_sets.contains_key(rule_set) {
                    return Err(ForgeError::InvalidInput(format!("rule set {} does not exist", rule_set)).into());
                }
            }

            let cost = state.config.mint_rent + state.config.tx_fee + request.options.priority_fee();
            debit(state, &self.payer, cost, "mint")?;

            let seq = state.next_sequence();
            let mint = derive_address(&[
                b"mint",
                self.payer.as_bytes(),
                &seq.to_le_bytes(),
                request.name.as_bytes(),
            ]);
            let asset = DigitalAsset {
                mint: mint.clone(),
                owner: self.payer.clone(),
                name: request.name.clone(),
                symbol: request.symbol.clone(),
                uri: request.uri.clone(),
                token_standard: request.token_standard,
                collection: request.collection.as_ref().map(|key| CollectionRef {
                    key: key.clone(),
                    verified: false,
                }),
                is_collection: request.is_collection,
                rule_set: request.rule_set.clone(),
                is_mutable: request.is_mutable,
                seller_fee_basis_points: request.seller_fee_basis_points,
            };
            state.assets.insert(
                mint.clone(),
                AssetRecord {
                    asset,
                    burned: false,
                    pending_lookups: state.config.visibility_lag,
                    minted_at: chrono::Utc::now().to_rfc3339(),
                },
            );
            debug!(mint = %mint, name = %request.name, cost = %format_amount(cost), "token minted");
            Ok(mint)
        })?;
        Ok(ResourceHandle::new(mint))
    }
}

#[async_trait]
impl AssetReader for SandboxLedger {
    async fn fetch_asset(&self, mint: &ResourceHandle) -> Result<DigitalAsset> {
        self.with_state(Operation::Fetch, |state| {
            let record = state
                .assets
                .get_mut(mint.as_str())
                .filter(|r| !r.burned)
                .ok_or_else(|| account_not_found(mint.as_str()))?;
            if record.pending_lookups > 0 {
                record.pending_lookups -= 1;
                return Err(account_not_found(mint.as_str()));
            }
            Ok(record.asset.clone())
        })
    }
}

#[async_trait]
impl CollectionVerifier for SandboxLedger {
    async fn verify_member(&self, member: &ResourceHandle, collection: &ResourceHandle) -> Result<()> {
        self.with_state(Operation::Verify, |state| {
            let is_collection = state
                .assets
                .get(collection.as_str())
                .is_some_and(|r| !r.burned && r.asset.is_collection);
            if !is_collection {
                return Err(ForgeError::InvalidInput(format!("{} is not a collection token", collection)).into());
            }
            let belongs = state
                .assets
                .get(member.as_str())
                .filter(|r| !r.burned)
                .and_then(|r| r.asset.collection.as_ref())
                .is_some_and(|c| c.key == collection.as_str());
            if !belongs {
                return Err(ForgeError::InvalidInput(format!(
                    "{} is not a member of collection {}",
                    member, collection
                ))
                .into());
            }

            let fee = state.config.tx_fee;
            debit(state, &self.payer, fee, "verify")?;
            if let Some(c) = state
                .assets
                .get_mut(member.as_str())
                .and_then(|r| r.asset.collection.as_mut())
            {
                c.verified = true;
            }
            Ok(())
        })?;
        info!(member = %member, collection = %collection, "collection membership verified");
        Ok(())
    }
}

#[async_trait]
impl AssetBurner for SandboxLedger {
    async fn burn(&self, mint: &ResourceHandle) -> Result<Amount> {
        let reclaimed = self.with_state(Operation::Burn, |state| {
            let record = state
                .assets
                .get(mint.as_str())
                .filter(|r| !r.burned)
                .ok_or_else(|| ForgeError::InvalidInput(format!("token {} does not exist or is already burned", mint)))?;
            if record.asset.owner != self.payer {
                return Err(ForgeError::InvalidInput(format!(
                    "token {} is owned by {}, not {}",
                    mint, record.asset.owner, self.payer
                ))
                .into());
            }

            let rent = state.config.mint_rent;
            let fee = state.config.tx_fee;
            debit(state, &self.payer, fee, "burn")?;
            if let Some(record) = state.assets.get_mut(mint.as_str()) {
                record.burned = true;
            }
            credit(state, &self.payer, rent);
            Ok(rent)
        })?;
        info!(mint = %mint, reclaimed = %format_amount(reclaimed), "token burned");
        Ok(reclaimed)
    }
}

/// Storage node deposit account of one wallet.
#[derive(Clone, Debug)]
pub struct StorageNode {
    ledger: SandboxLedger,
}

impl StorageNode {
    pub fn ledger(&self) -> &SandboxLedger {
        &self.ledger
    }
}

#[async_trait]
impl BalanceSource for StorageNode {
    async fn balance(&self) -> Result<Amount> {
        let mut inner = self.ledger.inner.lock();
        inner.faults.check(Operation::StorageBalance)?;
        Ok(inner
            .state
            .storage_deposits
            .get(&self.ledger.payer)
            .copied()
            .unwrap_or_default())
    }
}

/// Deposit from the payer wallet into the storage node.
#[async_trait]
impl Funder for StorageNode {
    async fn fund(&self, amount: Amount) -> Result<()> {
        let payer = &self.ledger.payer;
        self.ledger.with_state(Operation::StorageFund, |state| {
            let cost = amount + state.config.tx_fee;
            debit(state, payer, cost, "storage deposit")?;
            let deposit = state.storage_deposits.entry(payer.clone()).or_default();
            *deposit = deposit.saturating_add(amount);
            Ok(())
        })?;
        info!(wallet = %payer, amount = %format_amount(amount), "storage node funded");
        Ok(())
    }
}

#[async_trait]
impl StorageUploader for StorageNode {
    async fn upload(&self, path: &Path) -> Result<UploadReceipt> {
        let data = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let sha256 = Sha256::digest(&data);
        let bytes = data.len() as u64;
        let payer = &self.ledger.payer;

        let (id, cost) = self.ledger.with_state(Operation::Upload, |state| {
            let cost = bytes.saturating_mul(state.config.price_per_byte);
            let deposit = state.storage_deposits.get(payer).copied().unwrap_or_default();
            if deposit < cost {
                return Err(anyhow!(
                    "storage node balance {} too low for {} ({} bytes, cost {})",
                    format_amount(deposit),
                    file_name,
                    bytes,
                    format_amount(cost)
                ));
            }
            state.storage_deposits.insert(payer.clone(), deposit - cost);

            let seq = state.next_sequence();
            let id = derive_address(&[b"upload", sha256.as_slice(), &seq.to_le_bytes()]);
            state.uploads.insert(
                id.clone(),
                UploadRecord {
                    file_name: file_name.clone(),
                    bytes,
                    content_type: content_type_for(path).to_string(),
                    sha256: hex::encode(sha256),
                    cost,
                    uploaded_at: chrono::Utc::now().to_rfc3339(),
                },
            );
            Ok((id, cost))
        })?;
        debug!(file = %path.display(), id = %id, bytes, "file uploaded");
        Ok(UploadReceipt {
            id: ResourceHandle::new(id),
            bytes,
            cost,
        })
    }
}

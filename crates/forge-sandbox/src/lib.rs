//! Local sandbox ledger
//!
//! A file-backed stand-in for a cluster and a storage node, so pipeline steps can run
//! end to end without signing real transactions.
//!
//! - [`state`]: persisted ledger contents and the fee schedule
//! - [`faults`]: transient failure injection per operation
//! - [`ledger`]: [`SandboxLedger`], implementing every capability trait
//!
//! # Example
//!
//! ```ignore
//! use forge_sandbox::SandboxLedger;
//!
//! let ledger = SandboxLedger::load_or_create(&state_path, &payer)?;
//! let node = ledger.storage_node();
//! let receipt = node.upload(&image_path).await?;
//! ledger.save()?;
//! ```

pub mod faults;
pub mod ledger;
pub mod state;

pub use faults::{parse_fault_spec, Operation};
pub use ledger::{SandboxLedger, StorageNode};
pub use state::{AssetRecord, LedgerConfig, PersistedLedger, UploadRecord};

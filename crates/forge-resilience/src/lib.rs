//! Resilient operation executor
//!
//! Control-flow utilities shared by every pipeline step that talks to a ledger or a
//! storage network:
//!
//! - [`retry`]: re-invoke a fallible async operation with constant or linear backoff
//! - [`balance`]: make sure a paying account is funded before a dependent operation
//! - [`poll`]: wait for a freshly written resource to show up on the read path
//! - [`batch`]: bounded concurrent fan-out with wait-for-all semantics
//! - [`account`]: single-owner queue serializing work against one account
//!
//! # Example
//!
//! ```ignore
//! use forge_resilience::{retry, await_visible};
//! use forge_types::RetryPolicy;
//!
//! let mint = retry("mint", &RetryPolicy::constant(3, 2000), |_| minter.mint(&request)).await?;
//! let asset = await_visible(&mint, &RetryPolicy::constant(6, 5000), |h| reader.fetch_asset(h)).await?;
//! ```

pub mod account;
pub mod balance;
pub mod batch;
pub mod delay;
pub mod poll;
pub mod retry;

pub use account::AccountQueue;
pub use balance::{ensure_funded, Funding};
pub use batch::{chunked, run_batch, BatchReport, FailureMode};
pub use delay::sleep;
pub use forge_types::{is_permanent, ForgeError, FundingThreshold, ResourceHandle, RetryPolicy};
pub use poll::await_visible;
pub use retry::retry;

/// Default number of units in flight for batch steps.
pub const DEFAULT_PARALLELISM: usize = 12;

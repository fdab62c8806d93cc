//! Transient failure injection.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use forge_types::ForgeError;

/// Ledger operations that can be made to fail.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    Balance,
    Airdrop,
    StorageBalance,
    StorageFund,
    Upload,
    RuleSet,
    Mint,
    Fetch,
    Verify,
    Burn,
}

impl Operation {
    pub const ALL: [Operation; 10] = [
        Operation::Balance,
        Operation::Airdrop,
        Operation::StorageBalance,
        Operation::StorageFund,
        Operation::Upload,
        Operation::RuleSet,
        Operation::Mint,
        Operation::Fetch,
        Operation::Verify,
        Operation::Burn,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Balance => "balance",
            Operation::Airdrop => "airdrop",
            Operation::StorageBalance => "storage-balance",
            Operation::StorageFund => "storage-fund",
            Operation::Upload => "upload",
            Operation::RuleSet => "rule-set",
            Operation::Mint => "mint",
            Operation::Fetch => "fetch",
            Operation::Verify => "verify",
            Operation::Burn => "burn",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = ForgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|op| op.as_str() == s.trim())
            .ok_or_else(|| ForgeError::InvalidInput(format!("unknown ledger operation '{}'", s)))
    }
}

/// Parse `op=count` (count defaults to 1), as accepted by `--flaky`.
pub fn parse_fault_spec(spec: &str) -> Result<(Operation, u32), ForgeError> {
    let (op, count) = match spec.split_once('=') {
        Some((op, count)) => {
            let count = count.trim().parse::<u32>().map_err(|_| {
                ForgeError::InvalidInput(format!("invalid failure count in '{}'", spec))
            })?;
            (op, count)
        }
        None => (spec, 1),
    };
    Ok((op.parse()?, count))
}

/// Remaining injected failures per operation.
#[derive(Debug, Default)]
pub(crate) struct FaultPlan {
    remaining: HashMap<Operation, u32>,
}

impl FaultPlan {
    pub(crate) fn add(&mut self, op: Operation, count: u32) {
        *self.remaining.entry(op).or_default() += count;
    }

    /// Consume one injected failure for `op`, if any is left.
    pub(crate) fn check(&mut self, op: Operation) -> Result<()> {
        match self.remaining.get_mut(&op) {
            Some(n) if *n > 0 => {
                *n -= 1;
                Err(anyhow!("injected transient failure in {}", op))
            }
            _ => Ok(()),
        }
    }

    pub(crate) fn pending(&self, op: Operation) -> u32 {
        self.remaining.get(&op).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fault_spec() {
        assert_eq!(parse_fault_spec("mint=3").unwrap(), (Operation::Mint, 3));
        assert_eq!(parse_fault_spec("storage-fund").unwrap(), (Operation::StorageFund, 1));
        assert!(parse_fault_spec("mint=lots").is_err());
        assert!(parse_fault_spec("teleport=1").unwrap_err().is_permanent());
    }

    #[test]
    fn test_fault_plan_counts_down() {
        let mut plan = FaultPlan::default();
        plan.add(Operation::Upload, 2);
        assert!(plan.check(Operation::Mint).is_ok());
        assert!(plan.check(Operation::Upload).is_err());
        assert_eq!(plan.pending(Operation::Upload), 1);
        assert!(plan.check(Operation::Upload).is_err());
        assert!(plan.check(Operation::Upload).is_ok());
    }
}

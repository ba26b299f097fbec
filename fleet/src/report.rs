//! Per-wallet status transitions and batch outcome reports.

use std::fmt;

use solana_sdk::{pubkey::Pubkey, signature::Signature};
use tracing::{info, warn};

/// Status of one operation on one wallet, as shown to whoever drives the fleet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OperationStatus {
    Pending,
    Retrying { attempt: u32, max: u32 },
    Success,
    Error(String),
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationStatus::Pending => write!(f, "pending"),
            OperationStatus::Retrying { attempt, max } => write!(f, "retrying ({attempt}/{max})"),
            OperationStatus::Success => write!(f, "success"),
            OperationStatus::Error(msg) => write!(f, "error: {msg}"),
        }
    }
}

/// Receives every status transition.
pub trait StatusSink: Send + Sync {
    fn update(&self, wallet: &Pubkey, operation: &str, status: &OperationStatus);
}

/// Writes status transitions to the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogStatusSink;

impl StatusSink for LogStatusSink {
    fn update(&self, wallet: &Pubkey, operation: &str, status: &OperationStatus) {
        match status {
            OperationStatus::Error(_) => warn!("[{}] {}: {}", operation, wallet, status),
            _ => info!("[{}] {}: {}", operation, wallet, status),
        }
    }
}

/// Final result for one wallet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Success { note: Option<String> },
    Failed(String),
    /// Not finished and not failed: settle never became ready, or the
    /// transaction was never confirmed either way
    Incomplete(String),
}

impl Outcome {
    pub fn success() -> Self {
        Outcome::Success { note: None }
    }

    pub fn noted(note: impl Into<String>) -> Self {
        Outcome::Success {
            note: Some(note.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success { note: None } => write!(f, "✓"),
            Outcome::Success { note: Some(note) } => write!(f, "✓ ({note})"),
            Outcome::Failed(reason) => write!(f, "✗ {reason}"),
            Outcome::Incomplete(reason) => write!(f, "… incomplete: {reason}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WalletResult {
    pub wallet: Pubkey,
    pub outcome: Outcome,
    /// Last transaction that carried this wallet's instructions
    pub signature: Option<Signature>,
}

/// Aggregated outcome of a run, one entry per wallet.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub success_count: usize,
    pub failed_count: usize,
    pub incomplete_count: usize,
    pub results: Vec<WalletResult>,
}

impl BatchReport {
    pub fn push(&mut self, result: WalletResult) {
        match result.outcome {
            Outcome::Success { .. } => self.success_count += 1,
            Outcome::Failed(_) => self.failed_count += 1,
            Outcome::Incomplete(_) => self.incomplete_count += 1,
        }
        self.results.push(result);
    }

    pub fn merge(&mut self, other: BatchReport) {
        for result in other.results {
            self.push(result);
        }
    }

    pub fn outcome_of(&self, wallet: &Pubkey) -> Option<&Outcome> {
        self.results
            .iter()
            .find(|r| r.wallet == *wallet)
            .map(|r| &r.outcome)
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed_count == 0 && self.incomplete_count == 0
    }
}

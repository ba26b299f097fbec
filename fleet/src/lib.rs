//! Ponzimon wallet fleet
//!
//! Drives many wallets through the Ponzimon farming program in batched
//! transactions: per-wallet locking, bounded concurrency, fallback to
//! individual transactions, and slot-aware commit/settle for randomness.

pub mod config;
pub mod error;
pub mod journal;
pub mod ledger;
pub mod lock;
pub mod orchestrator;
pub mod report;
pub mod rpc;
pub mod scheduler;
pub mod sender;
pub mod wallet;

pub use error::FleetError;
pub use ledger::{Ledger, SimulationOutcome, TxStatus};
pub use orchestrator::{BatchSizes, FarmStrategy, Intent, Orchestrator, Tuning};
pub use report::{BatchReport, OperationStatus, Outcome, StatusSink, WalletResult};
pub use wallet::WalletCredential;

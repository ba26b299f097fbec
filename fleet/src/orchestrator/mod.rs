//! Batch orchestration
//!
//! Turns one intent over many wallets into batched transactions:
//! - wallets are split into batches sized per intent
//! - at most `max_concurrency` batches are in flight
//! - every wallet in a batch stays locked until the batch's whole lifecycle ends
//! - a failed batch falls back to one transaction per wallet
//! - two-phase intents settle in groups of identical commit slot once ready

mod batch;
mod prepare;
mod settle;
mod strategy;

use std::{
    collections::HashSet,
    fmt,
    sync::{atomic::AtomicU64, Arc},
    time::Duration,
};

use ponzimon_sdk::{PlayerAccount, RawIndex};
use solana_sdk::{
    packet::PACKET_DATA_SIZE,
    pubkey::Pubkey,
    signature::{Keypair, Signer},
};
use tracing::info;

use crate::{
    config::NetworkConfig,
    error::FleetError,
    journal::Journal,
    ledger::{load_player, Ledger},
    lock::WalletLockRegistry,
    report::{BatchReport, LogStatusSink, OperationStatus, Outcome, StatusSink},
    scheduler::BatchLimiter,
    wallet::WalletCredential,
};

use batch::{wallet_result, Prelude};

pub use batch::{BatchResult, BatchState, Landed};
pub use settle::{partition_ready, Commitment, Readiness};

/// What to do with the starter cards after purchasing a farm.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum FarmStrategy {
    /// Purchase only
    None,
    /// Stake the first two starter cards
    #[default]
    Stake12,
    /// Stake one starter, recycle another, then stake the best remaining card
    StakeRecycleStake,
}

/// One operation applied to every wallet of a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Intent {
    InitAccount(FarmStrategy),
    Stake(RawIndex),
    Unstake(RawIndex),
    UpgradeFarm,
    OpenBooster,
    Recycle(Vec<RawIndex>),
    ClaimRewards,
    TransferAll,
}

impl Intent {
    pub fn name(&self) -> &'static str {
        match self {
            Intent::InitAccount(_) => "init",
            Intent::Stake(_) => "stake",
            Intent::Unstake(_) => "unstake",
            Intent::UpgradeFarm => "upgrade",
            Intent::OpenBooster => "open-booster",
            Intent::Recycle(_) => "recycle",
            Intent::ClaimRewards => "claim",
            Intent::TransferAll => "transfer",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Timing, fee and size knobs.
#[derive(Clone, Debug)]
pub struct Tuning {
    pub compute_unit_limit: u32,
    /// Settles consume randomness and need more room
    pub settle_compute_unit_limit: u32,
    /// Microlamports per compute unit
    pub priority_fee: u64,
    pub max_transaction_size: usize,
    pub max_concurrency: usize,
    /// Slots that must pass after a commit before its settle
    pub min_settle_delay: u64,
    pub settle_retries: u32,
    pub settle_retry_delay: Duration,
    pub submit_retries: u32,
    /// Attempts per wallet once a batch has fallen back
    pub individual_retries: u32,
    pub retry_delay: Duration,
    pub confirm_poll_interval: Duration,
    pub confirm_timeout: Duration,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            compute_unit_limit: 1_000_000,
            settle_compute_unit_limit: 1_400_000,
            priority_fee: 200,
            max_transaction_size: PACKET_DATA_SIZE,
            max_concurrency: 10,
            min_settle_delay: 5,
            settle_retries: 3,
            settle_retry_delay: Duration::from_secs(3),
            submit_retries: 3,
            individual_retries: 3,
            retry_delay: Duration::from_secs(1),
            confirm_poll_interval: Duration::from_millis(300),
            confirm_timeout: Duration::from_secs(30),
        }
    }
}

/// Wallets per transaction, by intent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchSizes {
    pub account_creation: usize,
    pub claim: usize,
    pub transfer: usize,
    /// Everything else
    pub default: usize,
}

impl Default for BatchSizes {
    fn default() -> Self {
        Self {
            account_creation: 4,
            claim: 5,
            transfer: 6,
            default: 4,
        }
    }
}

impl BatchSizes {
    pub fn for_intent(&self, intent: &Intent) -> usize {
        let size = match intent {
            Intent::InitAccount(_) => self.account_creation,
            Intent::ClaimRewards => self.claim,
            Intent::TransferAll => self.transfer,
            _ => self.default,
        };
        size.max(1)
    }
}

/// A wallet's decoded account and balances, for display.
#[derive(Debug)]
pub struct WalletSnapshot {
    pub wallet: Pubkey,
    pub player: Result<Option<PlayerAccount>, FleetError>,
    pub token_balance: Result<u64, FleetError>,
    /// Lamports available for fees
    pub lamports: Result<u64, FleetError>,
}

/// Drives intents over a fleet of wallets against one ledger.
pub struct Orchestrator<L: Ledger> {
    ledger: Arc<L>,
    network: NetworkConfig,
    tuning: Tuning,
    sizes: BatchSizes,
    locks: WalletLockRegistry,
    limiter: BatchLimiter,
    fee_payer: Option<Arc<Keypair>>,
    status: Arc<dyn StatusSink>,
    journal: Option<Journal>,
    next_batch_id: AtomicU64,
}

impl<L: Ledger> Orchestrator<L> {
    pub fn new(ledger: Arc<L>, network: NetworkConfig, tuning: Tuning) -> Self {
        let limiter = BatchLimiter::new(tuning.max_concurrency);
        Self {
            ledger,
            network,
            tuning,
            sizes: BatchSizes::default(),
            locks: WalletLockRegistry::new(),
            limiter,
            fee_payer: None,
            status: Arc::new(LogStatusSink),
            journal: None,
            next_batch_id: AtomicU64::new(1),
        }
    }

    /// Pay every fee from `payer` instead of the first wallet of each batch.
    pub fn with_fee_payer(mut self, payer: Keypair) -> Self {
        self.fee_payer = Some(Arc::new(payer));
        self
    }

    pub fn with_status_sink(mut self, sink: Arc<dyn StatusSink>) -> Self {
        self.status = sink;
        self
    }

    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn with_batch_sizes(mut self, sizes: BatchSizes) -> Self {
        self.sizes = sizes;
        self
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    /// The master wallet paying fees, if one is configured.
    pub fn fee_payer(&self) -> Option<Pubkey> {
        self.fee_payer.as_ref().map(|payer| payer.pubkey())
    }

    /// Apply `intent` to every wallet, batching as configured.
    ///
    /// Duplicate wallets are dropped; each remaining wallet gets exactly one
    /// entry in the report.
    pub async fn run_batch(
        &self,
        intent: &Intent,
        wallets: &[Arc<WalletCredential>],
    ) -> BatchReport {
        let wallets = dedup_wallets(wallets);
        let size = self.sizes.for_intent(intent);
        let chunks: Vec<&[Arc<WalletCredential>]> = wallets.chunks(size).collect();

        info!(
            "[{}] {} wallets in {} batches of up to {} ({} in flight)",
            intent,
            wallets.len(),
            chunks.len(),
            size,
            self.limiter.max_concurrency()
        );

        let reports = self
            .limiter
            .run_all(chunks.into_iter().map(|chunk| self.run_chunk(intent, chunk)))
            .await;

        let mut total = BatchReport::default();
        for report in reports {
            total.merge(report);
        }
        info!(
            "[{}] done: {} succeeded, {} failed, {} incomplete",
            intent, total.success_count, total.failed_count, total.incomplete_count
        );
        total
    }

    /// Stake a different card on each wallet, batched together.
    pub async fn stake_each(&self, picks: &[(Arc<WalletCredential>, RawIndex)]) -> BatchReport {
        let size = self.sizes.default.max(1);
        let reports = self
            .limiter
            .run_all(picks.chunks(size).map(|chunk| async move {
                let keys: Vec<Pubkey> = chunk.iter().map(|(w, _)| w.pubkey()).collect();
                let _guards = self.locks.acquire_all(&keys).await;
                self.mark_pending("stake", chunk.iter().map(|(w, _)| w.pubkey()));
                let report = self.stake_picks("stake", chunk).await;
                self.mark_final("stake", &report);
                report
            }))
            .await;

        let mut total = BatchReport::default();
        for report in reports {
            total.merge(report);
        }
        total
    }

    /// Read every wallet's player account, token balance and lamports.
    pub async fn snapshots(&self, wallets: &[Arc<WalletCredential>]) -> Vec<WalletSnapshot> {
        self.limiter
            .run_all(wallets.iter().map(|wallet| async move {
                let accounts = wallet.accounts();
                let (player, token_balance, lamports) = tokio::join!(
                    load_player(self.ledger.as_ref(), &accounts.player),
                    self.ledger.get_token_balance(&accounts.player_token_account),
                    self.ledger.get_balance(&accounts.wallet),
                );
                WalletSnapshot {
                    wallet: wallet.pubkey(),
                    player,
                    token_balance,
                    lamports,
                }
            }))
            .await
    }

    /// One batch: lock its wallets, run the intent's phases, release.
    async fn run_chunk(&self, intent: &Intent, chunk: &[Arc<WalletCredential>]) -> BatchReport {
        let keys: Vec<Pubkey> = chunk.iter().map(|w| w.pubkey()).collect();
        let _guards = self.locks.acquire_all(&keys).await;
        self.mark_pending(intent.name(), keys.iter().copied());

        let report = match intent {
            Intent::InitAccount(strategy) => self.init_accounts(chunk, *strategy).await,
            Intent::OpenBooster | Intent::Recycle(_) => self.commit_and_settle(intent, chunk).await,
            _ => self.single_phase(intent, chunk).await,
        };

        self.mark_final(intent.name(), &report);
        report
    }

    /// Intents that need one transaction per wallet.
    async fn single_phase(&self, intent: &Intent, chunk: &[Arc<WalletCredential>]) -> BatchReport {
        let (members, mut report) = self.prepare_all(intent, chunk).await;
        if members.is_empty() {
            return report;
        }

        let prelude = match intent {
            Intent::TransferAll => match self.transfer_prelude().await {
                Ok(prelude) => prelude,
                Err(e) => {
                    for member in &members {
                        report.push(wallet_result(member.pubkey(), &BatchResult::Failed(e.clone())));
                    }
                    return report;
                }
            },
            _ => Prelude::Empty,
        };

        let results = self
            .send_with_fallback(intent.name(), &members, prelude, self.tuning.compute_unit_limit)
            .await;
        for (member, result) in members.iter().zip(&results) {
            report.push(wallet_result(member.pubkey(), result));
        }
        report
    }

    fn mark_pending(&self, operation: &str, wallets: impl Iterator<Item = Pubkey>) {
        for wallet in wallets {
            self.status.update(&wallet, operation, &OperationStatus::Pending);
        }
    }

    fn mark_final(&self, operation: &str, report: &BatchReport) {
        for result in &report.results {
            let status = match &result.outcome {
                Outcome::Success { .. } => OperationStatus::Success,
                Outcome::Failed(reason) => OperationStatus::Error(reason.clone()),
                Outcome::Incomplete(reason) => OperationStatus::Error(format!("incomplete: {reason}")),
            };
            self.status.update(&result.wallet, operation, &status);
        }
    }
}

fn dedup_wallets(wallets: &[Arc<WalletCredential>]) -> Vec<Arc<WalletCredential>> {
    let mut seen = HashSet::new();
    wallets
        .iter()
        .filter(|w| seen.insert(w.pubkey()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_sizes_per_intent() {
        let sizes = BatchSizes {
            account_creation: 4,
            claim: 5,
            transfer: 6,
            default: 0,
        };
        assert_eq!(sizes.for_intent(&Intent::InitAccount(FarmStrategy::None)), 4);
        assert_eq!(sizes.for_intent(&Intent::ClaimRewards), 5);
        assert_eq!(sizes.for_intent(&Intent::TransferAll), 6);
        // zero would never make progress
        assert_eq!(sizes.for_intent(&Intent::UpgradeFarm), 1);
    }

    #[test]
    fn default_tuning_fits_a_packet() {
        let tuning = Tuning::default();
        assert_eq!(tuning.max_transaction_size, 1232);
        assert_eq!(tuning.min_settle_delay, 5);
        assert!(tuning.settle_compute_unit_limit > tuning.compute_unit_limit);
    }
}

//! Commit/settle protocol for booster opening and recycling.
//!
//! A commit lands at some slot; its settle is accepted once `min_settle_delay`
//! slots have passed. Wallets committed at the same slot settle together.

use std::{collections::BTreeMap, fmt, sync::Arc};

use ponzimon_sdk::{
    instruction::{recycle_cards_settle, settle_open_booster},
    PlayerAccounts,
};
use solana_sdk::instruction::Instruction;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::{
    batch::{wallet_result, BatchResult, Landed, Member, Prelude},
    Intent, Orchestrator,
};
use crate::{
    error::FleetError,
    ledger::Ledger,
    report::{BatchReport, Outcome, WalletResult},
    wallet::WalletCredential,
};

/// A landed commit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Commitment {
    pub commit_slot: u64,
}

/// Whether a commitment can be settled at a given slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Readiness {
    SettleReady,
    SettleWaiting { slots_remaining: u64 },
}

impl Commitment {
    pub fn new(commit_slot: u64) -> Self {
        Self { commit_slot }
    }

    pub fn ready_at(&self, min_delay: u64) -> u64 {
        self.commit_slot.saturating_add(min_delay)
    }

    pub fn poll(&self, current_slot: u64, min_delay: u64) -> Readiness {
        let ready_at = self.ready_at(min_delay);
        if current_slot >= ready_at {
            Readiness::SettleReady
        } else {
            Readiness::SettleWaiting {
                slots_remaining: ready_at - current_slot,
            }
        }
    }
}

/// Split pending items into ready groups keyed by commit slot, and the rest.
///
/// Items keep their relative order inside each group and in the waiting list.
pub fn partition_ready<T>(
    pending: Vec<T>,
    commit_slot: impl Fn(&T) -> u64,
    current_slot: u64,
    min_delay: u64,
) -> (BTreeMap<u64, Vec<T>>, Vec<T>) {
    let mut ready: BTreeMap<u64, Vec<T>> = BTreeMap::new();
    let mut waiting = Vec::new();
    for item in pending {
        let slot = commit_slot(&item);
        match Commitment::new(slot).poll(current_slot, min_delay) {
            Readiness::SettleReady => ready.entry(slot).or_default().push(item),
            Readiness::SettleWaiting { .. } => waiting.push(item),
        }
    }
    (ready, waiting)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SettleKind {
    Booster,
    Recycle,
}

impl SettleKind {
    pub fn for_intent(intent: &Intent) -> Option<Self> {
        match intent {
            Intent::OpenBooster => Some(SettleKind::Booster),
            Intent::Recycle(_) => Some(SettleKind::Recycle),
            _ => None,
        }
    }

    fn instruction(&self, accounts: &PlayerAccounts) -> Instruction {
        match self {
            SettleKind::Booster => settle_open_booster(accounts),
            SettleKind::Recycle => recycle_cards_settle(accounts),
        }
    }
}

impl fmt::Display for SettleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettleKind::Booster => write!(f, "booster-settle"),
            SettleKind::Recycle => write!(f, "recycle-settle"),
        }
    }
}

/// A wallet whose commit landed and which still owes a settle.
#[derive(Clone, Debug)]
pub(crate) struct PendingSettle {
    pub member: Member,
    pub commitment: Commitment,
}

pub(crate) struct Settled {
    pub settled: Vec<(Member, Landed)>,
    /// Failed and incomplete wallets only
    pub report: BatchReport,
}

impl<L: Ledger> Orchestrator<L> {
    /// Commit for every eligible wallet, then settle each one.
    pub(crate) async fn commit_and_settle(
        &self,
        intent: &Intent,
        chunk: &[Arc<WalletCredential>],
    ) -> BatchReport {
        let Some(kind) = SettleKind::for_intent(intent) else {
            return self.single_phase(intent, chunk).await;
        };
        let (members, mut report) = self.prepare_all(intent, chunk).await;
        if members.is_empty() {
            return report;
        }

        let label = format!("{intent}-commit");
        let results = self
            .send_with_fallback(&label, &members, Prelude::Empty, self.tuning.compute_unit_limit)
            .await;
        let pending = committed(members, results, &mut report);

        let settled = self.settle(kind, pending).await;
        for (member, landed) in settled.settled {
            report.push(wallet_result(member.pubkey(), &BatchResult::Landed(landed)));
        }
        report.merge(settled.report);
        report
    }

    /// Settle every pending wallet once its commit is old enough, retrying
    /// the ones that are not yet ready.
    pub(crate) async fn settle(&self, kind: SettleKind, pending: Vec<PendingSettle>) -> Settled {
        let min_delay = self.tuning.min_settle_delay;
        let mut settled = Vec::new();
        let mut report = BatchReport::default();
        let mut waiting = pending;
        let mut retries = 0;

        while !waiting.is_empty() {
            match self.ledger.get_slot().await {
                Ok(current) => {
                    let (groups, not_ready) = partition_ready(
                        std::mem::take(&mut waiting),
                        |p: &PendingSettle| p.commitment.commit_slot,
                        current,
                        min_delay,
                    );
                    waiting = not_ready;

                    for (commit_slot, group) in groups {
                        let label = format!("{kind}@{commit_slot}");
                        let members: Vec<Member> = group
                            .iter()
                            .map(|p| Member {
                                instructions: vec![kind.instruction(&p.member.accounts)],
                                ..p.member.clone()
                            })
                            .collect();
                        let results = self
                            .send_with_fallback(&label, &members, Prelude::Empty, self.tuning.settle_compute_unit_limit)
                            .await;

                        for (p, result) in group.into_iter().zip(results) {
                            match result {
                                BatchResult::Landed(landed) => settled.push((p.member, landed)),
                                BatchResult::Failed(FleetError::NotReady(reason)) => {
                                    debug!("[{}] {} not ready: {}", kind, p.member.pubkey(), reason);
                                    waiting.push(p);
                                }
                                other => report.push(wallet_result(p.member.pubkey(), &other)),
                            }
                        }
                    }

                    for p in &waiting {
                        if let Readiness::SettleWaiting { slots_remaining } =
                            p.commitment.poll(current, min_delay)
                        {
                            debug!(
                                "[{}] {} waiting {} more slots (commit slot {})",
                                kind,
                                p.member.pubkey(),
                                slots_remaining,
                                p.commitment.commit_slot
                            );
                        }
                    }
                }
                Err(e) => warn!("[{}] slot read failed: {}", kind, e),
            }

            if waiting.is_empty() || retries >= self.tuning.settle_retries {
                break;
            }
            retries += 1;
            info!(
                "[{}] {} wallets not ready, retry {}/{} in {:?}",
                kind,
                waiting.len(),
                retries,
                self.tuning.settle_retries,
                self.tuning.settle_retry_delay
            );
            sleep(self.tuning.settle_retry_delay).await;
        }

        for p in waiting {
            warn!("[{}] {} gave up waiting for settle", kind, p.member.pubkey());
            report.push(WalletResult {
                wallet: p.member.pubkey(),
                outcome: Outcome::Incomplete(format!(
                    "settle not ready after {} retries (commit slot {}, ready at {})",
                    retries,
                    p.commitment.commit_slot,
                    p.commitment.ready_at(min_delay)
                )),
                signature: None,
            });
        }

        Settled { settled, report }
    }
}

/// Turn commit results into pending settles; everything that did not land
/// goes straight into `report`.
pub(crate) fn committed(
    members: Vec<Member>,
    results: Vec<BatchResult>,
    report: &mut BatchReport,
) -> Vec<PendingSettle> {
    let mut pending = Vec::new();
    for (member, result) in members.into_iter().zip(results) {
        match result {
            BatchResult::Landed(landed) => pending.push(PendingSettle {
                member,
                commitment: Commitment::new(landed.slot),
            }),
            other => report.push(wallet_result(member.pubkey(), &other)),
        }
    }
    pending
}

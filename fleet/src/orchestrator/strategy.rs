//! Farm setup strategies run right after the initial purchase, and staking a
//! different card per wallet.

use std::sync::Arc;

use futures::future::join_all;
use ponzimon_sdk::{
    instruction::{recycle_cards_commit, stake_card},
    RawIndex,
};
use solana_sdk::{instruction::Instruction, pubkey::Pubkey};
use tracing::{debug, info, warn};

use super::{
    batch::{wallet_result, BatchResult, Landed, Member, Prelude},
    prepare::split_preparations,
    settle::{Commitment, PendingSettle, SettleKind},
    FarmStrategy, Intent, Orchestrator,
};
use crate::{
    error::FleetError,
    ledger::{load_player, Ledger},
    report::{BatchReport, Outcome, WalletResult},
    wallet::WalletCredential,
};

/// Starter cards a purchase must show before anything is staked
const MIN_STARTER_CARDS: usize = 2;

impl<L: Ledger> Orchestrator<L> {
    /// Purchase farms for the wallets that have none, then apply `strategy`.
    pub(crate) async fn init_accounts(
        &self,
        chunk: &[Arc<WalletCredential>],
        strategy: FarmStrategy,
    ) -> BatchReport {
        let (members, mut report) = self.prepare_all(&Intent::InitAccount(strategy), chunk).await;
        let purchased = self.stage("init", members, &mut report, "purchase").await;
        if purchased.is_empty() {
            return report;
        }

        let fresh = match strategy {
            FarmStrategy::None => {
                for (member, landed) in purchased {
                    report.push(wallet_result(member.pubkey(), &BatchResult::Landed(landed)));
                }
                return report;
            }
            _ => self.with_starter_cards(purchased, &mut report).await,
        };

        let rest = match strategy {
            FarmStrategy::StakeRecycleStake => self.stake_recycle_stake(fresh).await,
            _ => self.stake_starters(fresh).await,
        };
        report.merge(rest);
        report
    }

    /// Keep the freshly purchased wallets whose account shows its starter
    /// cards; the rest are incomplete.
    async fn with_starter_cards(
        &self,
        purchased: Vec<(Member, Landed)>,
        report: &mut BatchReport,
    ) -> Vec<Member> {
        let checks = join_all(purchased.iter().map(|(member, _)| {
            load_player(self.ledger.as_ref(), &member.accounts.player)
        }))
        .await;

        let mut fresh = Vec::new();
        for ((member, landed), check) in purchased.into_iter().zip(checks) {
            let reason = match check {
                Ok(Some(player)) if player.cards().len() >= MIN_STARTER_CARDS => {
                    fresh.push(member);
                    continue;
                }
                Ok(Some(player)) => format!("only {} starter cards visible", player.cards().len()),
                Ok(None) => "account not visible yet".to_string(),
                Err(e) => e.to_string(),
            };
            warn!("[init] {} purchased but not verified: {}", member.pubkey(), reason);
            report.push(WalletResult {
                wallet: member.pubkey(),
                outcome: Outcome::Incomplete(format!("farm purchased; {reason}")),
                signature: Some(landed.signature),
            });
        }
        fresh
    }

    /// Stake starter slots 0 and 1, one batched transaction each.
    async fn stake_starters(&self, fresh: Vec<Member>) -> BatchReport {
        let mut report = BatchReport::default();
        let [first, second, _] = RawIndex::STARTER_SLOTS;

        let members = with_instructions(fresh, |m| vec![stake_card(&m.accounts, first)]);
        let staked = self
            .stage("stake12-first", members, &mut report, "farm purchased; staking #0")
            .await;

        let members = with_instructions(staked.into_iter().map(|(m, _)| m).collect(), |m| {
            vec![stake_card(&m.accounts, second)]
        });
        let staked = self
            .stage("stake12-second", members, &mut report, "#0 staked; staking #1")
            .await;

        for (member, landed) in staked {
            report.push(wallet_result(member.pubkey(), &BatchResult::Landed(landed)));
        }
        report
    }

    /// Stake starter slot 0 and recycle slot 2, settle the recycle, then stake
    /// the best unstaked card left.
    async fn stake_recycle_stake(&self, fresh: Vec<Member>) -> BatchReport {
        let mut report = BatchReport::default();
        let [first, _, third] = RawIndex::STARTER_SLOTS;

        let mut members = Vec::with_capacity(fresh.len());
        for member in fresh {
            match recycle_cards_commit(&member.accounts, &[third]) {
                Ok(recycle) => members.push(Member {
                    instructions: vec![stake_card(&member.accounts, first), recycle],
                    ..member
                }),
                Err(e) => report.push(failed(member.pubkey(), &FleetError::from(e))),
            }
        }
        let committed = self
            .stage("stake-recycle", members, &mut report, "farm purchased; stake and recycle")
            .await;

        let pending = committed
            .into_iter()
            .map(|(member, landed)| PendingSettle {
                member,
                commitment: Commitment::new(landed.slot),
            })
            .collect();
        let settled = self.settle(SettleKind::Recycle, pending).await;
        for result in settled.report.results {
            report.push(in_context(result, "#0 staked, #2 recycling"));
        }

        let picks = join_all(settled.settled.into_iter().map(|(member, landed)| async move {
            let raw = self.best_unstaked(&member).await;
            (member, landed, raw)
        }))
        .await;
        let mut members = Vec::with_capacity(picks.len());
        for (member, landed, raw) in picks {
            match raw {
                Some(raw) => members.push(Member {
                    instructions: vec![stake_card(&member.accounts, raw)],
                    ..member
                }),
                None => report.push(WalletResult {
                    wallet: member.pubkey(),
                    outcome: Outcome::noted("recycled; no unstaked card left to stake"),
                    signature: Some(landed.signature),
                }),
            }
        }
        let staked = self
            .stage("stake-best", members, &mut report, "recycled; staking best card")
            .await;

        for (member, landed) in staked {
            report.push(wallet_result(member.pubkey(), &BatchResult::Landed(landed)));
        }
        report
    }

    /// Highest-rarity unstaked card, `None` when every card is staked, or
    /// starter slot 1 if the account cannot be read.
    async fn best_unstaked(&self, member: &Member) -> Option<RawIndex> {
        let fallback = RawIndex::STARTER_SLOTS[1];
        match load_player(self.ledger.as_ref(), &member.accounts.player).await {
            Ok(Some(player)) => {
                let view = player.highest_rarity_unstaked();
                match &view {
                    Some(view) => debug!(
                        "[stake-best] {} picks {} (rarity {})",
                        member.pubkey(),
                        view.raw_index,
                        view.card.rarity
                    ),
                    None => info!("[stake-best] {} has no unstaked card", member.pubkey()),
                }
                view.map(|view| view.raw_index)
            }
            Ok(None) => {
                warn!("[stake-best] {} account missing, trying {}", member.pubkey(), fallback);
                Some(fallback)
            }
            Err(e) => {
                warn!("[stake-best] {} read failed ({}), trying {}", member.pubkey(), e, fallback);
                Some(fallback)
            }
        }
    }

    /// Stake one chosen card per wallet. Caller holds the wallets' locks.
    pub(crate) async fn stake_picks(
        &self,
        label: &str,
        picks: &[(Arc<WalletCredential>, RawIndex)],
    ) -> BatchReport {
        let prepared = join_all(picks.iter().map(|(wallet, raw)| async move {
            let intent = Intent::Stake(*raw);
            (wallet.pubkey(), self.prepare(&intent, wallet).await)
        }))
        .await;
        let (members, mut report) = split_preparations(label, prepared);

        let staked = self.stage(label, members, &mut report, "stake").await;
        for (member, landed) in staked {
            report.push(wallet_result(member.pubkey(), &BatchResult::Landed(landed)));
        }
        report
    }

    /// Send one step for every member. Members that land are returned for
    /// the next step; all others get their report entry here.
    async fn stage(
        &self,
        label: &str,
        members: Vec<Member>,
        report: &mut BatchReport,
        context: &str,
    ) -> Vec<(Member, Landed)> {
        if members.is_empty() {
            return Vec::new();
        }
        info!("[{}] {} wallets", label, members.len());
        let results = self
            .send_with_fallback(label, &members, Prelude::Empty, self.tuning.compute_unit_limit)
            .await;

        let mut landed = Vec::new();
        for (member, result) in members.into_iter().zip(results) {
            match result {
                BatchResult::Landed(l) => landed.push((member, l)),
                other => report.push(in_context(wallet_result(member.pubkey(), &other), context)),
            }
        }
        landed
    }
}

fn with_instructions(members: Vec<Member>, build: impl Fn(&Member) -> Vec<Instruction>) -> Vec<Member> {
    members
        .into_iter()
        .map(|member| Member {
            instructions: build(&member),
            ..member
        })
        .collect()
}

fn failed(wallet: Pubkey, e: &FleetError) -> WalletResult {
    WalletResult {
        wallet,
        outcome: Outcome::Failed(e.to_string()),
        signature: None,
    }
}

/// Prefix a failure with the step it happened in.
fn in_context(mut result: WalletResult, context: &str) -> WalletResult {
    result.outcome = match result.outcome {
        Outcome::Failed(reason) => Outcome::Failed(format!("{context}: {reason}")),
        Outcome::Incomplete(reason) => Outcome::Incomplete(format!("{context}: {reason}")),
        success => success,
    };
    result
}

//! Per-wallet preconditions and instructions for each intent.

use std::sync::Arc;

use futures::future::join_all;
use ponzimon_sdk::{
    build_instruction,
    consts::{BOOSTER_PACK_COST, MAX_CARDS, MAX_FARM_TYPE, MAX_RECYCLE_BATCH},
    instruction::transfer_tokens,
    InstructionKind, PlayerAccount, PlayerAccounts, RawIndex,
};
use solana_sdk::{instruction::Instruction, pubkey::Pubkey};
use tracing::{debug, info};

use super::{
    batch::{Member, Prelude},
    Intent, Orchestrator,
};
use crate::{
    error::FleetError,
    ledger::{load_player, Ledger},
    report::{BatchReport, Outcome, WalletResult},
    wallet::WalletCredential,
};

/// What preparing one wallet produced.
pub(crate) enum Preparation {
    /// Goes into the batch
    Ready(Member),
    /// Settled without a transaction
    Done(Outcome),
}

impl<L: Ledger> Orchestrator<L> {
    /// Prepare every wallet of a batch, reading their accounts concurrently.
    ///
    /// Wallets that are done or ineligible already have their entry in the
    /// returned report.
    pub(crate) async fn prepare_all(
        &self,
        intent: &Intent,
        wallets: &[Arc<WalletCredential>],
    ) -> (Vec<Member>, BatchReport) {
        let prepared = join_all(wallets.iter().map(|w| async move {
            (w.pubkey(), self.prepare(intent, w).await)
        }))
        .await;
        split_preparations(intent.name(), prepared)
    }

    pub(super) async fn prepare(
        &self,
        intent: &Intent,
        wallet: &Arc<WalletCredential>,
    ) -> Result<Preparation, FleetError> {
        if let Intent::TransferAll = intent {
            return self.prepare_transfer(wallet).await;
        }

        let base = wallet.accounts();
        let player = load_player(self.ledger.as_ref(), &base.player).await?;

        if let Intent::InitAccount(_) = intent {
            if player.is_some() {
                return Ok(Preparation::Done(Outcome::noted("farm already purchased")));
            }
            let ix = build_instruction(&InstructionKind::PurchaseInitialFarm, base)?;
            return Ok(ready(wallet, base.clone(), vec![ix]));
        }

        let player = player.ok_or(FleetError::AccountMissing(base.player))?;
        let accounts = accounts_for(base, &player);

        let kind = match intent {
            Intent::Stake(raw) => {
                let view = player
                    .card(*raw)
                    .ok_or_else(|| FleetError::InsufficientResource(format!("no card in slot {raw}")))?;
                if view.is_staked {
                    return Ok(Preparation::Done(Outcome::noted(format!("{raw} already staked"))));
                }
                InstructionKind::StakeCard(*raw)
            }
            Intent::Unstake(raw) => {
                let view = player
                    .card(*raw)
                    .ok_or_else(|| FleetError::InsufficientResource(format!("no card in slot {raw}")))?;
                if !view.is_staked {
                    return Ok(Preparation::Done(Outcome::noted(format!("{raw} not staked"))));
                }
                InstructionKind::UnstakeCard(*raw)
            }
            Intent::UpgradeFarm => {
                let next = player.farm.farm_type.saturating_add(1);
                if next > MAX_FARM_TYPE {
                    return Ok(Preparation::Done(Outcome::noted("farm at highest tier")));
                }
                InstructionKind::UpgradeFarm(next)
            }
            Intent::OpenBooster => {
                if player.card_count as usize >= MAX_CARDS {
                    return Err(FleetError::InsufficientResource(format!(
                        "card storage full ({}/{MAX_CARDS})",
                        player.card_count
                    )));
                }
                let balance = self
                    .ledger
                    .get_token_balance(&accounts.player_token_account)
                    .await?;
                if balance < BOOSTER_PACK_COST {
                    return Err(FleetError::InsufficientResource(format!(
                        "token balance {balance} below booster cost {BOOSTER_PACK_COST}"
                    )));
                }
                InstructionKind::OpenBoosterCommit
            }
            Intent::Recycle(raws) => {
                check_recyclable(&player, raws)?;
                InstructionKind::RecycleCardsCommit(raws.clone())
            }
            Intent::ClaimRewards => InstructionKind::ClaimRewards,
            Intent::InitAccount(_) | Intent::TransferAll => unreachable!("handled above"),
        };

        let ix = build_instruction(&kind, &accounts)?;
        Ok(ready(wallet, accounts, vec![ix]))
    }

    async fn prepare_transfer(&self, wallet: &Arc<WalletCredential>) -> Result<Preparation, FleetError> {
        let base = wallet.accounts();
        let recipient = self.network.recipient;
        if wallet.pubkey() == recipient {
            return Ok(Preparation::Done(Outcome::noted("wallet is the recipient")));
        }
        let balance = self.ledger.get_token_balance(&base.player_token_account).await?;
        if balance == 0 {
            return Ok(Preparation::Done(Outcome::noted("no tokens to transfer")));
        }
        let ix = transfer_tokens(&wallet.pubkey(), &recipient, &base.token_mint, balance)
            .map_err(|e| FleetError::Signing(e.to_string()))?;
        Ok(ready(wallet, base.clone(), vec![ix]))
    }

    /// What every transfer transaction starts with: creating the recipient's
    /// token account when it does not exist yet. Each transaction creates it
    /// with its own fee payer, so fallback sends stand alone.
    pub(crate) async fn transfer_prelude(&self) -> Result<Prelude, FleetError> {
        let recipient = self.network.recipient;
        let mint = self.network.token_mint;
        let recipient_ata =
            spl_associated_token_account::get_associated_token_address(&recipient, &mint);
        if self.ledger.get_account(&recipient_ata).await?.is_some() {
            return Ok(Prelude::Empty);
        }
        info!("[transfer] creating recipient token account {}", recipient_ata);
        Ok(Prelude::CreateTokenAccount {
            owner: recipient,
            mint,
        })
    }
}

/// Members to batch, and a report entry for every wallet that is not one.
pub(crate) fn split_preparations(
    label: &str,
    prepared: Vec<(Pubkey, Result<Preparation, FleetError>)>,
) -> (Vec<Member>, BatchReport) {
    let mut members = Vec::new();
    let mut report = BatchReport::default();
    for (wallet, preparation) in prepared {
        match preparation {
            Ok(Preparation::Ready(member)) => members.push(member),
            Ok(Preparation::Done(outcome)) => {
                debug!("[{}] {} skipped: {}", label, wallet, outcome);
                report.push(WalletResult {
                    wallet,
                    outcome,
                    signature: None,
                });
            }
            Err(e) => {
                info!("[{}] {} not eligible: {}", label, wallet, e);
                report.push(WalletResult {
                    wallet,
                    outcome: Outcome::Failed(e.to_string()),
                    signature: None,
                });
            }
        }
    }
    (members, report)
}

fn ready(wallet: &Arc<WalletCredential>, accounts: PlayerAccounts, instructions: Vec<Instruction>) -> Preparation {
    Preparation::Ready(Member {
        wallet: wallet.clone(),
        accounts,
        instructions,
    })
}

/// Addresses for instructions that pay the referrer recorded on the account.
pub(crate) fn accounts_for(base: &PlayerAccounts, player: &PlayerAccount) -> PlayerAccounts {
    match player.referrer {
        Some(referrer) if referrer != base.referrer => base.with_referrer(referrer),
        _ => base.clone(),
    }
}

/// Every index must hold an unstaked card.
pub(crate) fn check_recyclable(player: &PlayerAccount, raws: &[RawIndex]) -> Result<(), FleetError> {
    if raws.is_empty() || raws.len() > MAX_RECYCLE_BATCH {
        return Err(FleetError::InsufficientResource(format!(
            "recycle takes 1 to {MAX_RECYCLE_BATCH} cards, got {}",
            raws.len()
        )));
    }
    for raw in raws {
        match player.card(*raw) {
            None => {
                return Err(FleetError::InsufficientResource(format!("no card in slot {raw}")))
            }
            Some(view) if view.is_staked => {
                return Err(FleetError::InsufficientResource(format!(
                    "card in slot {raw} is staked"
                )))
            }
            Some(_) => {}
        }
    }
    Ok(())
}

//! Instruction builders for the farming program.
//!
//! Account order and signer/writable flags are part of the program's contract:
//! the program rejects any transaction that reorders or mismarks them.

use solana_program::{
    instruction::{AccountMeta, Instruction},
    program_error::ProgramError,
    pubkey::Pubkey,
    sysvar::{rent, slot_hashes},
};
use spl_associated_token_account::{
    get_associated_token_address, instruction::create_associated_token_account_idempotent,
};

use crate::{
    consts::{
        CLAIM_REWARDS, MAX_FARM_TYPE, MAX_RECYCLE_BATCH, OPEN_BOOSTER_COMMIT,
        PURCHASE_INITIAL_FARM, RECYCLE_CARDS_COMMIT, RECYCLE_CARDS_SETTLE, SETTLE_OPEN_BOOSTER,
        STAKE_CARD, SYSTEM_PROGRAM_ID, TOKEN_DECIMALS, UNSTAKE_CARD, UPGRADE_FARM,
    },
    error::BuildError,
    pda::PlayerAccounts,
    state::RawIndex,
};

/// Operation kinds the program understands, with their arguments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InstructionKind {
    PurchaseInitialFarm,
    StakeCard(RawIndex),
    UnstakeCard(RawIndex),
    OpenBoosterCommit,
    SettleOpenBooster,
    RecycleCardsCommit(Vec<RawIndex>),
    RecycleCardsSettle,
    ClaimRewards,
    UpgradeFarm(u8),
}

/// Build one program instruction for the wallet described by `accounts`.
pub fn build_instruction(
    kind: &InstructionKind,
    accounts: &PlayerAccounts,
) -> Result<Instruction, BuildError> {
    Ok(match kind {
        InstructionKind::PurchaseInitialFarm => purchase_initial_farm(accounts),
        InstructionKind::StakeCard(raw) => stake_card(accounts, *raw),
        InstructionKind::UnstakeCard(raw) => unstake_card(accounts, *raw),
        InstructionKind::OpenBoosterCommit => open_booster_commit(accounts),
        InstructionKind::SettleOpenBooster => settle_open_booster(accounts),
        InstructionKind::RecycleCardsCommit(raws) => recycle_cards_commit(accounts, raws)?,
        InstructionKind::RecycleCardsSettle => recycle_cards_settle(accounts),
        InstructionKind::ClaimRewards => claim_rewards(accounts),
        InstructionKind::UpgradeFarm(farm_type) => upgrade_farm(accounts, *farm_type)?,
    })
}

/// Creates the player account, pays the farm fee and grants the starter cards.
///
/// Data: identifier only.
pub fn purchase_initial_farm(a: &PlayerAccounts) -> Instruction {
    Instruction {
        program_id: a.program_id,
        accounts: vec![
            AccountMeta::new(a.wallet, true),
            AccountMeta::new(a.player, false),
            AccountMeta::new(a.global_state, false),
            AccountMeta::new(a.fees_wallet, false),
            AccountMeta::new(a.referrer, false),
            AccountMeta::new(a.token_mint, false),
            AccountMeta::new(a.player_token_account, false),
            AccountMeta::new_readonly(spl_token::id(), false),
            AccountMeta::new_readonly(spl_associated_token_account::id(), false),
            AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
            AccountMeta::new_readonly(rent::id(), false),
        ],
        data: PURCHASE_INITIAL_FARM.to_vec(),
    }
}

fn stake_accounts(a: &PlayerAccounts) -> Vec<AccountMeta> {
    vec![
        AccountMeta::new(a.wallet, true),
        AccountMeta::new(a.player, false),
        AccountMeta::new(a.global_state, false),
        AccountMeta::new(a.rewards_vault, false),
        AccountMeta::new_readonly(a.token_mint, false),
        AccountMeta::new(a.player_token_account, false),
        AccountMeta::new_readonly(spl_token::id(), false),
    ]
}

/// Data layout (9 bytes): identifier + raw slot index (u8)
pub fn stake_card(a: &PlayerAccounts, raw: RawIndex) -> Instruction {
    let mut data = STAKE_CARD.to_vec();
    data.push(raw.get());
    Instruction {
        program_id: a.program_id,
        accounts: stake_accounts(a),
        data,
    }
}

/// Data layout (9 bytes): identifier + raw slot index (u8)
pub fn unstake_card(a: &PlayerAccounts, raw: RawIndex) -> Instruction {
    let mut data = UNSTAKE_CARD.to_vec();
    data.push(raw.get());
    Instruction {
        program_id: a.program_id,
        accounts: stake_accounts(a),
        data,
    }
}

/// Pays for a booster pack and records the commit slot.
pub fn open_booster_commit(a: &PlayerAccounts) -> Instruction {
    Instruction {
        program_id: a.program_id,
        accounts: vec![
            AccountMeta::new(a.wallet, true),
            AccountMeta::new(a.player, false),
            AccountMeta::new(a.global_state, false),
            AccountMeta::new(a.rewards_vault, false),
            AccountMeta::new(a.player_token_account, false),
            AccountMeta::new(a.fees_token_account, false),
            AccountMeta::new(a.referrer_token_account, false),
            AccountMeta::new(a.token_mint, false),
            AccountMeta::new_readonly(spl_token::id(), false),
        ],
        data: OPEN_BOOSTER_COMMIT.to_vec(),
    }
}

/// Draws the booster cards from the slot hashes recorded after the commit.
pub fn settle_open_booster(a: &PlayerAccounts) -> Instruction {
    Instruction {
        program_id: a.program_id,
        accounts: settle_accounts(a),
        data: SETTLE_OPEN_BOOSTER.to_vec(),
    }
}

fn recycle_accounts(a: &PlayerAccounts) -> Vec<AccountMeta> {
    vec![
        AccountMeta::new(a.wallet, true),
        AccountMeta::new(a.player, false),
        AccountMeta::new(a.global_state, false),
        AccountMeta::new(a.rewards_vault, false),
        AccountMeta::new_readonly(a.token_mint, false),
    ]
}

fn settle_accounts(a: &PlayerAccounts) -> Vec<AccountMeta> {
    let mut accounts = recycle_accounts(a);
    accounts.push(AccountMeta::new_readonly(slot_hashes::id(), false));
    accounts
}

/// Data layout: identifier + u32 LE count + one u8 raw index per card
pub fn recycle_cards_commit(
    a: &PlayerAccounts,
    raws: &[RawIndex],
) -> Result<Instruction, BuildError> {
    if raws.is_empty() {
        return Err(BuildError::EmptyRecycle);
    }
    if raws.len() > MAX_RECYCLE_BATCH {
        return Err(BuildError::RecycleTooLarge {
            len: raws.len(),
            max: MAX_RECYCLE_BATCH,
        });
    }

    let mut data = RECYCLE_CARDS_COMMIT.to_vec();
    data.extend_from_slice(&(raws.len() as u32).to_le_bytes());
    data.extend(raws.iter().map(|raw| raw.get()));

    Ok(Instruction {
        program_id: a.program_id,
        accounts: recycle_accounts(a),
        data,
    })
}

pub fn recycle_cards_settle(a: &PlayerAccounts) -> Instruction {
    Instruction {
        program_id: a.program_id,
        accounts: settle_accounts(a),
        data: RECYCLE_CARDS_SETTLE.to_vec(),
    }
}

pub fn claim_rewards(a: &PlayerAccounts) -> Instruction {
    Instruction {
        program_id: a.program_id,
        accounts: vec![
            AccountMeta::new(a.wallet, true),
            AccountMeta::new(a.player, false),
            AccountMeta::new(a.global_state, false),
            AccountMeta::new(a.rewards_vault, false),
            AccountMeta::new(a.player_token_account, false),
            AccountMeta::new(a.token_mint, false),
            AccountMeta::new_readonly(spl_token::id(), false),
        ],
        data: CLAIM_REWARDS.to_vec(),
    }
}

/// Data layout (9 bytes): identifier + target farm type (u8, 1-10)
pub fn upgrade_farm(a: &PlayerAccounts, farm_type: u8) -> Result<Instruction, BuildError> {
    if !(1..=MAX_FARM_TYPE).contains(&farm_type) {
        return Err(BuildError::InvalidFarmType(farm_type));
    }

    let mut data = UPGRADE_FARM.to_vec();
    data.push(farm_type);

    Ok(Instruction {
        program_id: a.program_id,
        accounts: vec![
            AccountMeta::new(a.wallet, true),
            AccountMeta::new(a.player, false),
            AccountMeta::new(a.global_state, false),
            AccountMeta::new(a.rewards_vault, false),
            AccountMeta::new(a.player_token_account, false),
            AccountMeta::new(a.fees_token_account, false),
            AccountMeta::new(a.token_mint, false),
            AccountMeta::new_readonly(spl_token::id(), false),
        ],
        data,
    })
}

// =============================================================================
// Token helpers
// =============================================================================

/// Creates `owner`'s token account for `mint` unless it already exists.
pub fn create_token_account(payer: &Pubkey, owner: &Pubkey, mint: &Pubkey) -> Instruction {
    create_associated_token_account_idempotent(payer, owner, mint, &spl_token::id())
}

/// Moves `amount` of the game token from `owner`'s token account to `recipient`'s.
pub fn transfer_tokens(
    owner: &Pubkey,
    recipient: &Pubkey,
    mint: &Pubkey,
    amount: u64,
) -> Result<Instruction, ProgramError> {
    spl_token::instruction::transfer_checked(
        &spl_token::id(),
        &get_associated_token_address(owner, mint),
        mint,
        &get_associated_token_address(recipient, mint),
        owner,
        &[],
        amount,
        TOKEN_DECIMALS,
    )
}

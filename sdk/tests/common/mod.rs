#![allow(dead_code)]

use ponzimon_sdk::{Card, Farm, GlobalState, PlayerAccount, PlayerAccounts};
use solana_program::pubkey::Pubkey;

// ============================================================================
// Records
// ============================================================================

pub fn sample_global_state() -> GlobalState {
    GlobalState {
        authority: Pubkey::new_unique(),
        token_mint: Pubkey::new_unique(),
        fees_wallet: Pubkey::new_unique(),
        total_supply: 1_000_000_000_000,
        burned_tokens: 0,
        cumulative_rewards: 500_000_000,
        start_slot: 320_000_000,
        reward_rate: 50_000_000,
        acc_tokens_per_hashpower: (7u128 << 64) | 123_456_789,
        last_reward_slot: 320_500_000,
        burn_rate: 75,
        referral_fee: 25,
        production_enabled: true,
        cooldown_slots: 216_000,
        dust_threshold_divisor: 1_000,
        initial_farm_purchase_fee_lamports: 300_000_000,
        booster_pack_cost_microtokens: 100_000,
        gamble_fee_lamports: 100_000_000,
        total_berries: 12_000,
        total_hashpower: 45_000,
        total_global_gambles: 10,
        total_global_gamble_wins: 4,
        total_booster_packs_opened: 900,
        total_card_recycling_attempts: 300,
        total_successful_card_recycling: 120,
        total_staked_tokens: 5_000_000,
        staking_lockup_slots: 432_000,
        acc_sol_rewards_per_token: u128::MAX - 1,
        acc_token_rewards_per_token: 1 << 100,
        last_staking_reward_slot: 320_499_000,
        token_reward_rate: 10,
        total_sol_deposited: 2_000_000_000,
        reward_rate_multiplier: 1_000,
        last_rate_update_slot: 320_000_500,
        rewards_vault: Pubkey::new_unique(),
        padding: [0xab; 32],
    }
}

pub fn card(id: u16, rarity: u8) -> Card {
    Card {
        id,
        rarity,
        hashpower: 25 + rarity as u16 * 10,
        berry_consumption: 2 + rarity,
    }
}

/// A player with cards in raw slots 0, 3 and 127, slot 3 staked.
pub fn sample_player() -> PlayerAccount {
    let mut player = PlayerAccount::new(Pubkey::new_unique());
    player.farm = Farm {
        farm_type: 3,
        total_cards: 7,
        berry_capacity: 20,
    };
    player.cards[0] = card(179, 0);
    player.cards[3] = card(58, 4);
    player.cards[127] = card(12, 6);
    player.card_count = 3;
    player.staked_cards_bitset = 1 << 3;
    player.berries = 17;
    player.total_hashpower = 65;
    player.referrer = Some(Pubkey::new_unique());
    player.last_acc_tokens_per_hashpower = 99 << 70;
    player.last_claim_slot = 320_400_000;
    player.last_upgrade_slot = 320_100_000;
    player.total_rewards = 4_200_000;
    player
}

// ============================================================================
// Addresses
// ============================================================================

pub fn sample_accounts() -> PlayerAccounts {
    PlayerAccounts::derive(
        Pubkey::new_unique(),
        Pubkey::new_unique(),
        Pubkey::new_unique(),
        None,
        Pubkey::new_unique(),
    )
}

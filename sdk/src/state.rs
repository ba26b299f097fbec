//! Account records of the farming program and their fixed-layout decoders.
//!
//! Layouts follow the on-chain structs field by field with no padding between
//! fields. There is no self-describing schema: a layout change on chain needs
//! the matching change in both `decode_*` and `to_bytes` here.

use std::fmt;

use serde::{Serialize, Serializer};
use serde_big_array::BigArray;
use solana_program::pubkey::Pubkey;

use crate::{
    consts::{DISCRIMINATOR_LEN, GLOBAL_STATE_DISCRIMINATOR, MAX_CARDS, PLAYER_DISCRIMINATOR},
    error::DecodeError,
    reader::{
        read_bool, read_bytes, read_option, read_pubkey, read_u128, read_u16, read_u64, read_u8,
        Writer,
    },
};

fn base58<S: Serializer>(key: &Pubkey, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(key)
}

fn base58_opt<S: Serializer>(key: &Option<Pubkey>, s: S) -> Result<S::Ok, S::Error> {
    match key {
        Some(key) => s.collect_str(key),
        None => s.serialize_none(),
    }
}

/// Position of a card slot inside the full 128-slot array.
///
/// This is the only handle the program accepts for stake, unstake and recycle.
/// It is deliberately not interchangeable with [`FilteredPosition`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct RawIndex(u8);

impl RawIndex {
    /// Slots holding the three starter cards of a freshly purchased farm.
    ///
    /// Only meaningful for an account nothing has been recycled from yet.
    pub const STARTER_SLOTS: [RawIndex; 3] = [RawIndex(0), RawIndex(1), RawIndex(2)];

    pub const fn new(index: u8) -> Option<Self> {
        if (index as usize) < MAX_CARDS {
            Some(Self(index))
        } else {
            None
        }
    }

    pub const fn get(self) -> u8 {
        self.0
    }

    fn bit(self) -> u128 {
        1u128 << self.0
    }
}

impl fmt::Display for RawIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Position of a card inside the filtered (non-empty) card list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FilteredPosition(pub usize);

/// One card slot as stored on chain. `id == 0` marks an empty slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Card {
    pub id: u16,
    pub rarity: u8,
    pub hashpower: u16,
    pub berry_consumption: u8,
}

impl Card {
    pub const EMPTY: Card = Card {
        id: 0,
        rarity: 0,
        hashpower: 0,
        berry_consumption: 0,
    };

    pub fn is_empty(&self) -> bool {
        self.id == 0
    }
}

/// A non-empty card together with where it lives and whether it is staked.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct CardView {
    pub raw_index: RawIndex,
    #[serde(flatten)]
    pub card: Card,
    pub is_staked: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Farm {
    /// Farm tier, 1..=10 once purchased
    pub farm_type: u8,
    /// Card slots the farm can stake
    pub total_cards: u8,
    pub berry_capacity: u64,
}

/// Per-wallet player account.
/// PDA seeds: ["player", wallet, mint]
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PlayerAccount {
    #[serde(serialize_with = "base58")]
    pub owner: Pubkey,
    pub farm: Farm,
    #[serde(with = "BigArray")]
    pub cards: [Card; MAX_CARDS],
    pub card_count: u8,
    /// Bit i set means slot i is staked
    pub staked_cards_bitset: u128,
    pub berries: u64,
    pub total_hashpower: u64,
    #[serde(serialize_with = "base58_opt")]
    pub referrer: Option<Pubkey>,
    pub last_acc_tokens_per_hashpower: u128,
    pub last_claim_slot: u64,
    pub last_upgrade_slot: u64,
    pub total_rewards: u64,
}

impl PlayerAccount {
    /// An empty account owned by `owner`.
    pub fn new(owner: Pubkey) -> Self {
        Self {
            owner,
            farm: Farm::default(),
            cards: [Card::EMPTY; MAX_CARDS],
            card_count: 0,
            staked_cards_bitset: 0,
            berries: 0,
            total_hashpower: 0,
            referrer: None,
            last_acc_tokens_per_hashpower: 0,
            last_claim_slot: 0,
            last_upgrade_slot: 0,
            total_rewards: 0,
        }
    }

    pub fn is_staked(&self, raw: RawIndex) -> bool {
        self.staked_cards_bitset & raw.bit() != 0
    }

    /// The card in a raw slot, or `None` when the slot is empty.
    pub fn card(&self, raw: RawIndex) -> Option<CardView> {
        let card = self.cards[raw.get() as usize];
        (!card.is_empty()).then(|| CardView {
            raw_index: raw,
            card,
            is_staked: self.is_staked(raw),
        })
    }

    /// Non-empty cards in slot order, each carrying its raw index.
    pub fn cards(&self) -> Vec<CardView> {
        (0..MAX_CARDS as u8)
            .filter_map(RawIndex::new)
            .filter_map(|raw| self.card(raw))
            .collect()
    }

    /// Resolve a position in [`PlayerAccount::cards`] back to its card.
    pub fn card_at(&self, position: FilteredPosition) -> Option<CardView> {
        self.cards().into_iter().nth(position.0)
    }

    /// Highest-rarity card that is not staked; the first one wins ties.
    pub fn highest_rarity_unstaked(&self) -> Option<CardView> {
        self.cards()
            .into_iter()
            .filter(|view| !view.is_staked)
            .fold(None, |best: Option<CardView>, view| match best {
                Some(b) if view.card.rarity <= b.card.rarity => Some(b),
                _ => Some(view),
            })
    }

    /// Staking bits set on empty slots. Always zero for a consistent account.
    pub fn staked_empty_slots(&self) -> u128 {
        let occupied = self
            .cards
            .iter()
            .enumerate()
            .filter(|(_, card)| !card.is_empty())
            .fold(0u128, |mask, (i, _)| mask | (1u128 << i));
        self.staked_cards_bitset & !occupied
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.bytes(&PLAYER_DISCRIMINATOR)
            .pubkey(&self.owner)
            .u8(self.farm.farm_type)
            .u8(self.farm.total_cards)
            .u64(self.farm.berry_capacity);
        for card in &self.cards {
            w.u16(card.id)
                .u8(card.rarity)
                .u16(card.hashpower)
                .u8(card.berry_consumption);
        }
        w.u8(self.card_count)
            .u128(self.staked_cards_bitset)
            .u64(self.berries)
            .u64(self.total_hashpower)
            .option_pubkey(self.referrer.as_ref())
            .u128(self.last_acc_tokens_per_hashpower)
            .u64(self.last_claim_slot)
            .u64(self.last_upgrade_slot)
            .u64(self.total_rewards);
        w.into_inner()
    }
}

fn read_card(buf: &[u8], offset: usize) -> Result<(Card, usize), DecodeError> {
    let (id, offset) = read_u16(buf, offset)?;
    let (rarity, offset) = read_u8(buf, offset)?;
    let (hashpower, offset) = read_u16(buf, offset)?;
    let (berry_consumption, offset) = read_u8(buf, offset)?;
    Ok((
        Card {
            id,
            rarity,
            hashpower,
            berry_consumption,
        },
        offset,
    ))
}

/// Decode a player account, skipping the leading discriminator.
///
/// The caller is expected to have checked the discriminator already.
pub fn decode_player_account(buf: &[u8]) -> Result<PlayerAccount, DecodeError> {
    let offset = DISCRIMINATOR_LEN;
    let (owner, offset) = read_pubkey(buf, offset)?;
    let (farm_type, offset) = read_u8(buf, offset)?;
    let (total_cards, offset) = read_u8(buf, offset)?;
    let (berry_capacity, mut offset) = read_u64(buf, offset)?;

    let mut cards = [Card::EMPTY; MAX_CARDS];
    for slot in cards.iter_mut() {
        let (card, next) = read_card(buf, offset)?;
        *slot = card;
        offset = next;
    }

    let (card_count, offset) = read_u8(buf, offset)?;
    let (staked_cards_bitset, offset) = read_u128(buf, offset)?;
    let (berries, offset) = read_u64(buf, offset)?;
    let (total_hashpower, offset) = read_u64(buf, offset)?;
    let (referrer, offset) = read_option(buf, offset, read_pubkey)?;
    let (last_acc_tokens_per_hashpower, offset) = read_u128(buf, offset)?;
    let (last_claim_slot, offset) = read_u64(buf, offset)?;
    let (last_upgrade_slot, offset) = read_u64(buf, offset)?;
    let (total_rewards, _) = read_u64(buf, offset)?;

    Ok(PlayerAccount {
        owner,
        farm: Farm {
            farm_type,
            total_cards,
            berry_capacity,
        },
        cards,
        card_count,
        staked_cards_bitset,
        berries,
        total_hashpower,
        referrer,
        last_acc_tokens_per_hashpower,
        last_claim_slot,
        last_upgrade_slot,
        total_rewards,
    })
}

/// Program-wide singleton.
/// PDA seeds: ["global_state", mint]
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GlobalState {
    #[serde(serialize_with = "base58")]
    pub authority: Pubkey,
    #[serde(serialize_with = "base58")]
    pub token_mint: Pubkey,
    #[serde(serialize_with = "base58")]
    pub fees_wallet: Pubkey,
    pub total_supply: u64,
    pub burned_tokens: u64,
    pub cumulative_rewards: u64,
    pub start_slot: u64,
    pub reward_rate: u64,
    /// Rewards per unit of hashpower, scaled by `ACC_SCALE`
    pub acc_tokens_per_hashpower: u128,
    pub last_reward_slot: u64,
    pub burn_rate: u8,
    pub referral_fee: u8,
    pub production_enabled: bool,
    pub cooldown_slots: u64,
    pub dust_threshold_divisor: u64,
    pub initial_farm_purchase_fee_lamports: u64,
    pub booster_pack_cost_microtokens: u64,
    pub gamble_fee_lamports: u64,
    pub total_berries: u64,
    pub total_hashpower: u64,
    pub total_global_gambles: u64,
    pub total_global_gamble_wins: u64,
    pub total_booster_packs_opened: u64,
    pub total_card_recycling_attempts: u64,
    pub total_successful_card_recycling: u64,
    pub total_staked_tokens: u64,
    pub staking_lockup_slots: u64,
    pub acc_sol_rewards_per_token: u128,
    /// Rewards per staked token, scaled by `ACC_SCALE`
    pub acc_token_rewards_per_token: u128,
    pub last_staking_reward_slot: u64,
    pub token_reward_rate: u64,
    pub total_sol_deposited: u64,
    pub reward_rate_multiplier: u64,
    pub last_rate_update_slot: u64,
    #[serde(serialize_with = "base58")]
    pub rewards_vault: Pubkey,
    #[serde(skip)]
    pub padding: [u8; 32],
}

impl GlobalState {
    /// `burned_tokens <= cumulative_rewards <= total_supply`
    pub fn supply_invariant_holds(&self) -> bool {
        self.burned_tokens <= self.cumulative_rewards && self.cumulative_rewards <= self.total_supply
    }

    /// Tokens that can still be minted as rewards.
    pub fn remaining_supply(&self) -> u64 {
        let circulating = self.cumulative_rewards.saturating_sub(self.burned_tokens);
        self.total_supply.saturating_sub(circulating)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.bytes(&GLOBAL_STATE_DISCRIMINATOR)
            .pubkey(&self.authority)
            .pubkey(&self.token_mint)
            .pubkey(&self.fees_wallet)
            .u64(self.total_supply)
            .u64(self.burned_tokens)
            .u64(self.cumulative_rewards)
            .u64(self.start_slot)
            .u64(self.reward_rate)
            .u128(self.acc_tokens_per_hashpower)
            .u64(self.last_reward_slot)
            .u8(self.burn_rate)
            .u8(self.referral_fee)
            .bool(self.production_enabled);
        for value in [
            self.cooldown_slots,
            self.dust_threshold_divisor,
            self.initial_farm_purchase_fee_lamports,
            self.booster_pack_cost_microtokens,
            self.gamble_fee_lamports,
            self.total_berries,
            self.total_hashpower,
            self.total_global_gambles,
            self.total_global_gamble_wins,
            self.total_booster_packs_opened,
            self.total_card_recycling_attempts,
            self.total_successful_card_recycling,
            self.total_staked_tokens,
            self.staking_lockup_slots,
        ] {
            w.u64(value);
        }
        w.u128(self.acc_sol_rewards_per_token)
            .u128(self.acc_token_rewards_per_token)
            .u64(self.last_staking_reward_slot)
            .u64(self.token_reward_rate)
            .u64(self.total_sol_deposited)
            .u64(self.reward_rate_multiplier)
            .u64(self.last_rate_update_slot)
            .pubkey(&self.rewards_vault)
            .bytes(&self.padding);
        w.into_inner()
    }
}

/// Decode the global state, skipping the leading discriminator.
pub fn decode_global_state(buf: &[u8]) -> Result<GlobalState, DecodeError> {
    let offset = DISCRIMINATOR_LEN;
    let (authority, offset) = read_pubkey(buf, offset)?;
    let (token_mint, offset) = read_pubkey(buf, offset)?;
    let (fees_wallet, offset) = read_pubkey(buf, offset)?;
    let (total_supply, offset) = read_u64(buf, offset)?;
    let (burned_tokens, offset) = read_u64(buf, offset)?;
    let (cumulative_rewards, offset) = read_u64(buf, offset)?;
    let (start_slot, offset) = read_u64(buf, offset)?;
    let (reward_rate, offset) = read_u64(buf, offset)?;
    let (acc_tokens_per_hashpower, offset) = read_u128(buf, offset)?;
    let (last_reward_slot, offset) = read_u64(buf, offset)?;
    let (burn_rate, offset) = read_u8(buf, offset)?;
    let (referral_fee, offset) = read_u8(buf, offset)?;
    let (production_enabled, offset) = read_bool(buf, offset)?;
    let (cooldown_slots, offset) = read_u64(buf, offset)?;
    let (dust_threshold_divisor, offset) = read_u64(buf, offset)?;
    let (initial_farm_purchase_fee_lamports, offset) = read_u64(buf, offset)?;
    let (booster_pack_cost_microtokens, offset) = read_u64(buf, offset)?;
    let (gamble_fee_lamports, offset) = read_u64(buf, offset)?;
    let (total_berries, offset) = read_u64(buf, offset)?;
    let (total_hashpower, offset) = read_u64(buf, offset)?;
    let (total_global_gambles, offset) = read_u64(buf, offset)?;
    let (total_global_gamble_wins, offset) = read_u64(buf, offset)?;
    let (total_booster_packs_opened, offset) = read_u64(buf, offset)?;
    let (total_card_recycling_attempts, offset) = read_u64(buf, offset)?;
    let (total_successful_card_recycling, offset) = read_u64(buf, offset)?;
    let (total_staked_tokens, offset) = read_u64(buf, offset)?;
    let (staking_lockup_slots, offset) = read_u64(buf, offset)?;
    let (acc_sol_rewards_per_token, offset) = read_u128(buf, offset)?;
    let (acc_token_rewards_per_token, offset) = read_u128(buf, offset)?;
    let (last_staking_reward_slot, offset) = read_u64(buf, offset)?;
    let (token_reward_rate, offset) = read_u64(buf, offset)?;
    let (total_sol_deposited, offset) = read_u64(buf, offset)?;
    let (reward_rate_multiplier, offset) = read_u64(buf, offset)?;
    let (last_rate_update_slot, offset) = read_u64(buf, offset)?;
    let (rewards_vault, offset) = read_pubkey(buf, offset)?;
    let (padding, _) = read_bytes::<32>(buf, offset)?;

    Ok(GlobalState {
        authority,
        token_mint,
        fees_wallet,
        total_supply,
        burned_tokens,
        cumulative_rewards,
        start_slot,
        reward_rate,
        acc_tokens_per_hashpower,
        last_reward_slot,
        burn_rate,
        referral_fee,
        production_enabled,
        cooldown_slots,
        dust_threshold_divisor,
        initial_farm_purchase_fee_lamports,
        booster_pack_cost_microtokens,
        gamble_fee_lamports,
        total_berries,
        total_hashpower,
        total_global_gambles,
        total_global_gamble_wins,
        total_booster_packs_opened,
        total_card_recycling_attempts,
        total_successful_card_recycling,
        total_staked_tokens,
        staking_lockup_slots,
        acc_sol_rewards_per_token,
        acc_token_rewards_per_token,
        last_staking_reward_slot,
        token_reward_rate,
        total_sol_deposited,
        reward_rate_multiplier,
        last_rate_update_slot,
        rewards_vault,
        padding,
    })
}

/// Check the 8-byte account discriminator ahead of decoding.
pub fn check_discriminator(buf: &[u8], expected: [u8; 8]) -> Result<(), DecodeError> {
    let (found, _) = read_bytes::<8>(buf, 0)?;
    if found != expected {
        return Err(DecodeError::DiscriminatorMismatch { expected, found });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(i: u8) -> RawIndex {
        RawIndex::new(i).unwrap()
    }

    fn card(id: u16, rarity: u8) -> Card {
        Card {
            id,
            rarity,
            hashpower: 10,
            berry_consumption: 1,
        }
    }

    #[test]
    fn raw_index_is_bounded() {
        assert!(RawIndex::new(127).is_some());
        assert!(RawIndex::new(128).is_none());
    }

    #[test]
    fn filtered_view_keeps_raw_indices() {
        let mut player = PlayerAccount::new(Pubkey::new_unique());
        player.cards[0] = card(179, 0);
        player.cards[5] = card(175, 2);
        player.cards[9] = card(147, 1);
        player.card_count = 3;
        player.staked_cards_bitset = 1 << 5;

        let views = player.cards();
        let raws: Vec<u8> = views.iter().map(|v| v.raw_index.get()).collect();
        assert_eq!(raws, vec![0, 5, 9]);
        assert_eq!(views.len(), player.card_count as usize);

        // Position 1 of the filtered list is raw slot 5, not raw slot 1
        assert_eq!(player.card_at(FilteredPosition(1)).unwrap().raw_index, raw(5));
        assert!(player.card(raw(1)).is_none());
        assert!(player.card(raw(5)).unwrap().is_staked);
    }

    #[test]
    fn highest_rarity_skips_staked_cards() {
        let mut player = PlayerAccount::new(Pubkey::new_unique());
        player.cards[0] = card(1, 4);
        player.cards[1] = card(2, 2);
        player.cards[3] = card(3, 2);
        player.card_count = 3;
        player.staked_cards_bitset = 1;

        // Slot 0 is staked; slots 1 and 3 tie, the first one wins
        assert_eq!(player.highest_rarity_unstaked().unwrap().raw_index, raw(1));

        player.staked_cards_bitset = 0b1011;
        assert!(player.highest_rarity_unstaked().is_none());
    }

    #[test]
    fn staked_empty_slots_detects_inconsistency() {
        let mut player = PlayerAccount::new(Pubkey::new_unique());
        player.cards[0] = card(1, 0);
        player.staked_cards_bitset = 0b11;
        assert_eq!(player.staked_empty_slots(), 0b10);
    }

    #[test]
    fn discriminator_mismatch() {
        let player = PlayerAccount::new(Pubkey::new_unique());
        let bytes = player.to_bytes();
        assert!(check_discriminator(&bytes, PLAYER_DISCRIMINATOR).is_ok());
        assert!(matches!(
            check_discriminator(&bytes, GLOBAL_STATE_DISCRIMINATOR),
            Err(DecodeError::DiscriminatorMismatch { .. })
        ));
    }
}

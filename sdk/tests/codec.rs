mod common;

use common::{card, sample_global_state, sample_player};
use ponzimon_sdk::{
    consts::{MAX_CARDS, PLAYER_DISCRIMINATOR},
    decode_global_state, decode_player_account, DecodeError, PlayerAccount, RawIndex,
};
use solana_program::pubkey::Pubkey;

#[test]
fn global_state_round_trip() {
    let state = sample_global_state();
    let bytes = state.to_bytes();
    assert_eq!(bytes.len(), 8 + 411);
    assert_eq!(decode_global_state(&bytes).unwrap(), state);
}

#[test]
fn global_state_supply_counters() {
    let state = sample_global_state();
    let decoded = decode_global_state(&state.to_bytes()).unwrap();

    assert_eq!(decoded.total_supply, 1_000_000_000_000);
    assert_eq!(decoded.cumulative_rewards.to_string(), "500000000");
    assert!(decoded.burned_tokens <= decoded.cumulative_rewards);
    assert!(decoded.supply_invariant_holds());
}

#[test]
fn global_state_wide_accumulators() {
    let decoded = decode_global_state(&sample_global_state().to_bytes()).unwrap();
    assert_eq!(decoded.acc_tokens_per_hashpower, (7u128 << 64) | 123_456_789);
    assert_eq!(decoded.acc_sol_rewards_per_token, u128::MAX - 1);
    assert_eq!(decoded.acc_token_rewards_per_token, 1 << 100);
}

#[test]
fn player_round_trip() {
    let player = sample_player();
    let bytes = player.to_bytes();
    // owner + farm + 128 cards + count + bitset + 3 u64 + Some(referrer) + acc + 3 u64
    assert_eq!(bytes.len(), 8 + 32 + 10 + MAX_CARDS * 6 + 1 + 16 + 16 + 33 + 16 + 24);
    assert_eq!(decode_player_account(&bytes).unwrap(), player);
}

#[test]
fn player_round_trip_without_referrer() {
    let mut player = sample_player();
    player.referrer = None;
    let decoded = decode_player_account(&player.to_bytes()).unwrap();
    assert_eq!(decoded.referrer, None);
    assert_eq!(decoded, player);
}

#[test]
fn filtered_view_matches_card_count() {
    let player = decode_player_account(&sample_player().to_bytes()).unwrap();
    let views = player.cards();

    assert_eq!(views.len(), player.card_count as usize);
    let mut raws: Vec<u8> = views.iter().map(|v| v.raw_index.get()).collect();
    assert_eq!(raws, vec![0, 3, 127]);
    raws.dedup();
    assert_eq!(raws.len(), views.len());
}

#[test]
fn staked_flag_follows_bitset() {
    let mut player = PlayerAccount::new(Pubkey::new_unique());
    for (i, slot) in [1u8, 2, 64, 65, 126].iter().enumerate() {
        player.cards[*slot as usize] = card(100 + i as u16, 1);
    }
    player.card_count = 5;
    player.staked_cards_bitset = (1 << 2) | (1 << 65) | (1 << 126);

    let decoded = decode_player_account(&player.to_bytes()).unwrap();
    for view in decoded.cards() {
        let bit = decoded.staked_cards_bitset >> view.raw_index.get() & 1 == 1;
        assert_eq!(view.is_staked, bit, "slot {}", view.raw_index);
    }
    assert_eq!(decoded.staked_empty_slots(), 0);
}

#[test]
fn highest_rarity_resolves_to_raw_index() {
    let player = decode_player_account(&sample_player().to_bytes()).unwrap();
    // Slot 3 is rarer but staked
    let best = player.highest_rarity_unstaked().unwrap();
    assert_eq!(best.raw_index, RawIndex::new(127).unwrap());
    assert_eq!(best.card.rarity, 6);
}

#[test]
fn truncated_player_is_malformed() {
    let bytes = sample_player().to_bytes();
    let err = decode_player_account(&bytes[..bytes.len() - 1]).unwrap_err();
    assert!(matches!(err, DecodeError::MalformedBuffer { needed: 8, .. }));

    assert!(matches!(
        decode_player_account(&PLAYER_DISCRIMINATOR),
        Err(DecodeError::MalformedBuffer { offset: 8, .. })
    ));
}

#[test]
fn bad_referrer_tag_is_rejected() {
    let mut bytes = sample_player().to_bytes();
    let tag_offset = 8 + 32 + 10 + MAX_CARDS * 6 + 1 + 16 + 16;
    assert_eq!(bytes[tag_offset], 1);
    bytes[tag_offset] = 7;
    assert!(matches!(
        decode_player_account(&bytes),
        Err(DecodeError::InvalidOptionTag { tag: 7, .. })
    ));
}

#[test]
fn player_serializes_with_base58_keys() {
    let player = sample_player();
    let json = serde_json::to_string(&player).unwrap();
    assert!(json.contains(&format!("\"owner\":\"{}\"", player.owner)));
    assert!(json.contains(&format!("\"last_acc_tokens_per_hashpower\":{}", 99u128 << 70)));
}

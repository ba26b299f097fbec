use crate::{
    consts::ACC_SCALE,
    state::{GlobalState, PlayerAccount},
};

/// Rewards `player` could claim at `current_slot`, in raw token units.
///
/// Uses the last recorded accumulator, so rewards accrued since the last
/// global update are not included. Returns 0 during the claim cooldown.
pub fn pending_rewards(player: &PlayerAccount, global: &GlobalState, current_slot: u64) -> u64 {
    if current_slot <= player.last_claim_slot {
        return 0;
    }

    let delta = global
        .acc_tokens_per_hashpower
        .saturating_sub(player.last_acc_tokens_per_hashpower);
    let pending = (player.total_hashpower as u128).saturating_mul(delta) / ACC_SCALE;

    pending.min(global.remaining_supply() as u128) as u64
}

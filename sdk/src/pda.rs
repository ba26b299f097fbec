use solana_program::pubkey::Pubkey;
use spl_associated_token_account::get_associated_token_address;

use crate::consts::{GLOBAL_STATE, PLAYER, REWARDS_VAULT};

/// Derives the global state PDA
/// Seeds: ["global_state", mint]
pub fn global_state_pda(program_id: &Pubkey, mint: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[GLOBAL_STATE, mint.as_ref()], program_id)
}

/// Derives a wallet's player PDA
/// Seeds: ["player", wallet, mint]
pub fn player_pda(program_id: &Pubkey, wallet: &Pubkey, mint: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[PLAYER, wallet.as_ref(), mint.as_ref()], program_id)
}

/// Derives the rewards vault PDA
/// Seeds: ["rewards_vault", mint]
pub fn rewards_vault_pda(program_id: &Pubkey, mint: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[REWARDS_VAULT, mint.as_ref()], program_id)
}

/// Every address one wallet's instructions reference.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlayerAccounts {
    pub program_id: Pubkey,
    pub token_mint: Pubkey,
    pub wallet: Pubkey,
    pub player: Pubkey,
    pub player_token_account: Pubkey,
    pub global_state: Pubkey,
    pub rewards_vault: Pubkey,
    pub fees_wallet: Pubkey,
    pub fees_token_account: Pubkey,
    pub referrer: Pubkey,
    pub referrer_token_account: Pubkey,
}

impl PlayerAccounts {
    /// Resolve addresses for `wallet`. Without an explicit referrer the fees
    /// wallet takes its place.
    pub fn derive(
        program_id: Pubkey,
        token_mint: Pubkey,
        fees_wallet: Pubkey,
        referrer: Option<Pubkey>,
        wallet: Pubkey,
    ) -> Self {
        let referrer = referrer.unwrap_or(fees_wallet);
        Self {
            program_id,
            token_mint,
            wallet,
            player: player_pda(&program_id, &wallet, &token_mint).0,
            player_token_account: get_associated_token_address(&wallet, &token_mint),
            global_state: global_state_pda(&program_id, &token_mint).0,
            rewards_vault: rewards_vault_pda(&program_id, &token_mint).0,
            fees_wallet,
            fees_token_account: get_associated_token_address(&fees_wallet, &token_mint),
            referrer,
            referrer_token_account: get_associated_token_address(&referrer, &token_mint),
        }
    }

    /// Same addresses with the referrer recorded on the player account.
    pub fn with_referrer(&self, referrer: Pubkey) -> Self {
        Self {
            referrer,
            referrer_token_account: get_associated_token_address(&referrer, &self.token_mint),
            ..self.clone()
        }
    }
}

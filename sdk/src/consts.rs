use solana_program::{pubkey, pubkey::Pubkey};

/// Mainnet deployment of the farming program.
pub const MAINNET_PROGRAM_ID: Pubkey = pubkey!("PNZdxJNSEFmp2UZ39pEekFHZf15emsrbkaHv36xjgtx");

/// Mainnet token mint.
pub const MAINNET_TOKEN_MINT: Pubkey = pubkey!("PNeZtT8TrKSkMCYamwymQsbENKvuiXu2kgqmNsXvQUT");

/// Devnet deployment of the farming program.
pub const DEVNET_PROGRAM_ID: Pubkey = pubkey!("pvbX31Yg4c5tapUPmcrMAMEM85G4QmUjHxdv9Kuct61");

/// Native system program, owner of every wallet account.
pub const SYSTEM_PROGRAM_ID: Pubkey = pubkey!("11111111111111111111111111111111");

// ========================
// PDA seeds
// ========================

pub const GLOBAL_STATE: &[u8] = b"global_state";
pub const PLAYER: &[u8] = b"player";
pub const REWARDS_VAULT: &[u8] = b"rewards_vault";

// ========================
// Instruction identifiers
// ========================

pub const PURCHASE_INITIAL_FARM: [u8; 8] = [0xe9, 0x3e, 0x31, 0x8a, 0xa4, 0xb5, 0x72, 0x45];
pub const STAKE_CARD: [u8; 8] = [0x61, 0x6f, 0xab, 0xba, 0xb3, 0xc6, 0x44, 0xac];
pub const UNSTAKE_CARD: [u8; 8] = [0xe4, 0xb2, 0x9f, 0xb7, 0x77, 0x01, 0xc5, 0xde];
pub const OPEN_BOOSTER_COMMIT: [u8; 8] = [0x07, 0xfc, 0x87, 0xdf, 0xf2, 0xec, 0xf2, 0x5d];
pub const SETTLE_OPEN_BOOSTER: [u8; 8] = [0xe4, 0x90, 0xc7, 0x38, 0x5e, 0xdf, 0x09, 0xe2];
pub const CLAIM_REWARDS: [u8; 8] = [0x04, 0x90, 0x84, 0x47, 0x74, 0x17, 0x97, 0x50];
pub const RECYCLE_CARDS_COMMIT: [u8; 8] = [0xc7, 0xd1, 0x60, 0xc7, 0xcd, 0x39, 0x42, 0xef];
pub const RECYCLE_CARDS_SETTLE: [u8; 8] = [0x2b, 0xbb, 0x21, 0xf9, 0xb8, 0xe1, 0x7f, 0x8f];
pub const UPGRADE_FARM: [u8; 8] = [0x6e, 0xef, 0xc1, 0x01, 0xa5, 0x65, 0x36, 0xc8];

// ========================
// Account discriminators
// ========================

pub const GLOBAL_STATE_DISCRIMINATOR: [u8; 8] = [0xa3, 0x2e, 0x4a, 0xa8, 0xd8, 0x7b, 0x85, 0x62];
pub const PLAYER_DISCRIMINATOR: [u8; 8] = [0xcd, 0xde, 0x70, 0x07, 0xa5, 0x9b, 0xce, 0xda];

/// Length of the leading account discriminator.
pub const DISCRIMINATOR_LEN: usize = 8;

// ========================
// Game limits
// ========================

/// Card slots in every player account.
pub const MAX_CARDS: usize = 128;

/// Highest farm tier.
pub const MAX_FARM_TYPE: u8 = 10;

/// Most raw indices a single recycle commit may carry.
pub const MAX_RECYCLE_BATCH: usize = 32;

/// Cost of one booster pack in raw token units.
pub const BOOSTER_PACK_COST: u64 = 100_000;

/// Decimals of the game token.
pub const TOKEN_DECIMALS: u8 = 6;

/// Fixed-point scale of the reward accumulators.
pub const ACC_SCALE: u128 = 1_000_000_000_000;

/// Rarity classes, lowest to highest.
pub const COMMON: u8 = 0;
pub const UNCOMMON: u8 = 1;
pub const RARE: u8 = 2;
pub const DOUBLE_RARE: u8 = 3;
pub const VERY_RARE: u8 = 4;
pub const SUPER_RARE: u8 = 5;
pub const MEGA_RARE: u8 = 6;

/// Human name for a rarity class.
pub fn rarity_name(rarity: u8) -> &'static str {
    match rarity {
        COMMON => "Common",
        UNCOMMON => "Uncommon",
        RARE => "Rare",
        DOUBLE_RARE => "Double Rare",
        VERY_RARE => "Very Rare",
        SUPER_RARE => "Super Rare",
        MEGA_RARE => "Mega Rare",
        _ => "Unknown",
    }
}

use num_enum::{IntoPrimitive, TryFromPrimitive};
use thiserror::Error;

/// Failure to read a fixed-layout account buffer.
///
/// None of these are retryable: the same bytes will fail the same way.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The buffer ends before the field being read
    #[error("Malformed buffer: need {needed} bytes at offset {offset}, buffer has {len}")]
    MalformedBuffer {
        offset: usize,
        needed: usize,
        len: usize,
    },

    /// An optional field carried a presence flag other than 0 or 1
    #[error("Invalid option tag {tag} at offset {offset}")]
    InvalidOptionTag { offset: usize, tag: u8 },

    /// The account does not belong to the expected record type
    #[error("Discriminator mismatch: expected {expected:02x?}, found {found:02x?}")]
    DiscriminatorMismatch { expected: [u8; 8], found: [u8; 8] },
}

/// Invalid arguments handed to an instruction builder.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("Recycle needs at least one card")]
    EmptyRecycle,

    #[error("Recycle of {len} cards exceeds the limit of {max}")]
    RecycleTooLarge { len: usize, max: usize },

    #[error("Invalid farm type {0}: must be 1-10")]
    InvalidFarmType(u8),
}

/// Custom error codes returned by the farming program.
///
/// Program errors start at the framework offset 6000; 3012 is the framework's
/// own "account not initialized" check.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum ProgramErrorCode {
    // ========================
    // Framework
    // ========================

    #[error("Account not initialized: purchase a farm first")]
    AccountNotInitialized = 3012,

    // ========================
    // Game rules
    // ========================

    #[error("Wallet age is less than 7 days")]
    WalletTooNew = 6000,

    #[error("Farm power capacity exceeded")]
    PowerCapacityExceeded = 6001,

    #[error("Farm card capacity exceeded")]
    CardCapacityExceeded = 6002,

    #[error("Insufficient token balance")]
    InsufficientTokens = 6003,

    #[error("Insufficient lamports")]
    InsufficientLamports = 6004,

    #[error("Cooldown not expired")]
    CooldownNotExpired = 6005,

    #[error("Production is disabled")]
    ProductionDisabled = 6006,

    #[error("Invalid card type")]
    InvalidCardType = 6007,

    #[error("Invalid farm type")]
    InvalidFarmType = 6008,

    #[error("Unauthorized access")]
    Unauthorized = 6009,

    #[error("Initial farm already purchased")]
    InitialFarmAlreadyPurchased = 6010,

    #[error("Invalid referrer")]
    InvalidReferrer = 6011,

    #[error("Invalid token mint")]
    InvalidTokenMint = 6012,

    #[error("New wallet restricted")]
    NewWalletRestricted = 6013,

    #[error("No pending reward")]
    NoPendingReward = 6014,

    #[error("Reward already claimed")]
    RewardAlreadyClaimed = 6015,

    #[error("Reward expired")]
    RewardExpired = 6016,

    #[error("Self-referral is not allowed")]
    SelfReferralNotAllowed = 6017,

    #[error("Invalid referral fee")]
    InvalidReferralFee = 6018,

    #[error("Invalid burn rate")]
    InvalidBurnRate = 6019,

    #[error("Invalid cooldown slots")]
    InvalidCooldownSlots = 6020,

    #[error("Invalid halving interval")]
    InvalidHalvingInterval = 6021,

    #[error("Invalid dust threshold divisor")]
    InvalidDustThresholdDivisor = 6022,

    #[error("Farm is not full: upgrade requires every card slot in use")]
    FarmNotFull = 6023,

    // ========================
    // Slot-hash randomness
    // ========================

    #[error("Randomness already revealed")]
    RandomnessAlreadyRevealed = 6024,

    #[error("Randomness not resolved: settle attempted too early")]
    RandomnessNotResolved = 6025,

    #[error("Randomness expired: commit is too old to settle")]
    RandomnessExpired = 6026,

    #[error("Invalid randomness account")]
    InvalidRandomnessAccount = 6027,

    #[error("No pending commit to settle")]
    NoPendingCommit = 6028,

    #[error("A commit is already pending")]
    AlreadyHasPendingCommit = 6029,
}

impl ProgramErrorCode {
    /// Extract the program error from a `custom program error: 0x..` message.
    pub fn from_message(message: &str) -> Option<Self> {
        const MARKER: &str = "custom program error: 0x";
        let start = message.find(MARKER)? + MARKER.len();
        let hex: String = message[start..]
            .chars()
            .take_while(|c| c.is_ascii_hexdigit())
            .collect();
        let code = u32::from_str_radix(&hex, 16).ok()?;
        Self::try_from(code).ok()
    }

    /// Whether this error means a settle was attempted before its randomness was available.
    pub fn is_not_ready(&self) -> bool {
        matches!(self, ProgramErrorCode::RandomnessNotResolved)
    }
}

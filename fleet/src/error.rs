use ponzimon_sdk::{BuildError, DecodeError, ProgramErrorCode};
use solana_sdk::{pubkey::Pubkey, signature::Signature};
use thiserror::Error;

/// Everything that can go wrong while driving wallets against the ledger.
#[derive(Debug, Error, Clone)]
pub enum FleetError {
    // ========================
    // Operation outcomes
    // ========================

    /// Account bytes could not be decoded
    #[error("Account unreadable: {0}")]
    MalformedBuffer(#[from] DecodeError),

    /// The transaction would fail on chain as built
    #[error("Simulation rejected: {0}")]
    SimulationRejected(String),

    /// Transient failure handing the transaction to the ledger
    #[error("Submit failed: {0}")]
    SubmitFailed(String),

    /// No confirmation within the wait window; the transaction may still land
    #[error("Unconfirmed: {0}")]
    ConfirmationTimeout(Signature),

    /// Settle attempted before its randomness is available
    #[error("Not ready: {0}")]
    NotReady(String),

    /// A balance or capacity precondition failed
    #[error("Insufficient resource: {0}")]
    InsufficientResource(String),

    // ========================
    // Transaction assembly
    // ========================

    #[error("Transaction too large: {size} bytes (limit {limit})")]
    TransactionTooLarge { size: usize, limit: usize },

    #[error("Transaction failed on chain: {0}")]
    TransactionFailed(String),

    #[error("Invalid instruction: {0}")]
    Build(#[from] BuildError),

    #[error("Signing error: {0}")]
    Signing(String),

    // ========================
    // Environment
    // ========================

    #[error("Account missing: {0}")]
    AccountMissing(Pubkey),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl FleetError {
    /// Only transient transport failures are worth repeating unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FleetError::SubmitFailed(_) | FleetError::Rpc(_))
    }

    /// Classify a failed simulation, naming the program error when there is one.
    pub fn from_simulation(message: String) -> Self {
        match ProgramErrorCode::from_message(&message) {
            Some(code) if code.is_not_ready() => FleetError::NotReady(code.to_string()),
            Some(code) => FleetError::SimulationRejected(format!("{code} ({message})")),
            None => FleetError::SimulationRejected(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_policy() {
        assert!(FleetError::SubmitFailed("503".into()).is_retryable());
        assert!(FleetError::Rpc("timeout".into()).is_retryable());
        assert!(!FleetError::SimulationRejected("x".into()).is_retryable());
        assert!(!FleetError::InsufficientResource("x".into()).is_retryable());
        assert!(!FleetError::ConfirmationTimeout(Signature::default()).is_retryable());
        assert!(!FleetError::TransactionTooLarge { size: 1300, limit: 1232 }.is_retryable());
    }

    #[test]
    fn simulation_messages_name_program_errors() {
        let err = FleetError::from_simulation(
            "Program log: failed: custom program error: 0x1775".to_string(),
        );
        match err {
            FleetError::SimulationRejected(msg) => assert!(msg.starts_with("Cooldown not expired")),
            other => panic!("unexpected {other:?}"),
        }

        let early = FleetError::from_simulation("custom program error: 0x1789".to_string());
        assert!(matches!(early, FleetError::NotReady(_)));
    }
}

//! The ledger seen from the fleet: account reads, slots, simulation,
//! submission and status polling.

use std::future::Future;

use ponzimon_sdk::{
    check_discriminator,
    consts::{GLOBAL_STATE_DISCRIMINATOR, PLAYER_DISCRIMINATOR},
    decode_global_state, decode_player_account, GlobalState, PlayerAccount,
};
use solana_sdk::{hash::Hash, pubkey::Pubkey, signature::Signature, transaction::Transaction};
use tracing::warn;

use crate::error::FleetError;

/// Where a submitted transaction stands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TxStatus {
    /// Landed at `slot` with at least confirmed commitment
    Confirmed { slot: u64 },
    /// Not seen yet
    Pending,
    /// Landed with an error
    Failed(String),
}

/// Result of a dry run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SimulationOutcome {
    Accepted { units_consumed: Option<u64> },
    Rejected(String),
}

/// Remote ledger operations the orchestrator depends on.
pub trait Ledger: Send + Sync {
    /// Raw account data, `None` when the account does not exist.
    fn get_account(
        &self,
        address: &Pubkey,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, FleetError>> + Send;

    fn get_slot(&self) -> impl Future<Output = Result<u64, FleetError>> + Send;

    /// Native balance in lamports; a missing account holds 0.
    fn get_balance(&self, address: &Pubkey) -> impl Future<Output = Result<u64, FleetError>> + Send;

    /// Token balance in raw units; a missing token account holds 0.
    fn get_token_balance(
        &self,
        token_account: &Pubkey,
    ) -> impl Future<Output = Result<u64, FleetError>> + Send;

    fn latest_blockhash(&self) -> impl Future<Output = Result<Hash, FleetError>> + Send;

    fn simulate(
        &self,
        tx: &Transaction,
    ) -> impl Future<Output = Result<SimulationOutcome, FleetError>> + Send;

    fn submit(&self, tx: &Transaction) -> impl Future<Output = Result<Signature, FleetError>> + Send;

    fn poll_status(
        &self,
        signature: &Signature,
    ) -> impl Future<Output = Result<TxStatus, FleetError>> + Send;
}

/// Fetch and decode a player account.
pub async fn load_player<L: Ledger>(
    ledger: &L,
    address: &Pubkey,
) -> Result<Option<PlayerAccount>, FleetError> {
    let Some(data) = ledger.get_account(address).await? else {
        return Ok(None);
    };
    check_discriminator(&data, PLAYER_DISCRIMINATOR)?;
    let player = decode_player_account(&data)?;

    let stray = player.staked_empty_slots();
    if stray != 0 {
        warn!("Player {} has staking bits on empty slots: {:#x}", address, stray);
    }
    Ok(Some(player))
}

/// Fetch and decode the global state.
pub async fn load_global_state<L: Ledger>(
    ledger: &L,
    address: &Pubkey,
) -> Result<GlobalState, FleetError> {
    let data = ledger
        .get_account(address)
        .await?
        .ok_or(FleetError::AccountMissing(*address))?;
    check_discriminator(&data, GLOBAL_STATE_DISCRIMINATOR)?;
    Ok(decode_global_state(&data)?)
}

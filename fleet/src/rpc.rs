use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::{
    commitment_config::CommitmentConfig, hash::Hash, pubkey::Pubkey, signature::Signature,
    transaction::Transaction,
};

use crate::{
    error::FleetError,
    ledger::{Ledger, SimulationOutcome, TxStatus},
    sender::{SendError, TxSender},
};

/// [`Ledger`] over a Solana JSON-RPC endpoint.
pub struct RpcLedger {
    client: RpcClient,
    sender: TxSender,
}

impl RpcLedger {
    pub fn new(rpc_url: &str) -> Self {
        Self {
            client: RpcClient::new_with_commitment(rpc_url.to_string(), CommitmentConfig::confirmed()),
            sender: TxSender::new(rpc_url.to_string()),
        }
    }
}

fn rpc_err(e: impl ToString) -> FleetError {
    FleetError::Rpc(e.to_string())
}

impl Ledger for RpcLedger {
    async fn get_account(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, FleetError> {
        let response = self
            .client
            .get_account_with_commitment(address, CommitmentConfig::confirmed())
            .await
            .map_err(rpc_err)?;
        Ok(response.value.map(|account| account.data))
    }

    async fn get_slot(&self) -> Result<u64, FleetError> {
        self.client.get_slot().await.map_err(rpc_err)
    }

    async fn get_balance(&self, address: &Pubkey) -> Result<u64, FleetError> {
        self.client.get_balance(address).await.map_err(rpc_err)
    }

    async fn get_token_balance(&self, token_account: &Pubkey) -> Result<u64, FleetError> {
        if self.get_account(token_account).await?.is_none() {
            return Ok(0);
        }
        let balance = self
            .client
            .get_token_account_balance(token_account)
            .await
            .map_err(rpc_err)?;
        balance.amount.parse::<u64>().map_err(rpc_err)
    }

    async fn latest_blockhash(&self) -> Result<Hash, FleetError> {
        self.client.get_latest_blockhash().await.map_err(rpc_err)
    }

    async fn simulate(&self, tx: &Transaction) -> Result<SimulationOutcome, FleetError> {
        let result = self
            .client
            .simulate_transaction(tx)
            .await
            .map_err(rpc_err)?
            .value;

        Ok(match result.err {
            None => SimulationOutcome::Accepted {
                units_consumed: result.units_consumed,
            },
            Some(err) => {
                // Program logs carry the custom error code in readable form
                let logs = result.logs.unwrap_or_default();
                let tail: Vec<&str> = logs.iter().rev().take(3).rev().map(String::as_str).collect();
                SimulationOutcome::Rejected(format!("{err}; {}", tail.join(" | ")))
            }
        })
    }

    async fn submit(&self, tx: &Transaction) -> Result<Signature, FleetError> {
        self.sender.send_rpc(tx).await.map_err(|e| match e {
            SendError::Serialize(msg) => FleetError::Signing(msg),
            other => FleetError::SubmitFailed(other.to_string()),
        })
    }

    async fn poll_status(&self, signature: &Signature) -> Result<TxStatus, FleetError> {
        self.sender
            .get_signature_status(signature)
            .await
            .map_err(|e| FleetError::Rpc(e.to_string()))
    }
}

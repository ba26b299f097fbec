//! Transaction sender module
//!
//! Submits transactions and reads their status over raw JSON-RPC

use std::{str::FromStr, time::Duration};

use base64::{engine::general_purpose::STANDARD, Engine};
use solana_sdk::{packet::PACKET_DATA_SIZE, signature::Signature, transaction::Transaction};
use tracing::debug;

use crate::ledger::TxStatus;

/// Transaction sender
pub struct TxSender {
    client: reqwest::Client,
    rpc_url: String,
}

impl TxSender {
    /// Maximum signatures per getSignatureStatuses RPC call (Solana limit is 256)
    const MAX_SIGNATURES_PER_BATCH: usize = 256;

    pub fn new(rpc_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { client, rpc_url }
    }

    async fn call(&self, body: serde_json::Value) -> Result<serde_json::Value, SendError> {
        let response = self
            .client
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| SendError::Network(e.to_string()))?;

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| SendError::Parse(e.to_string()))?;

        if let Some(error) = json.get("error") {
            return Err(SendError::RpcError(error.to_string()));
        }
        Ok(json)
    }

    /// Send a transaction via standard RPC (sendTransaction)
    ///
    /// Preflight is skipped: callers simulate before sending.
    pub async fn send_rpc(&self, tx: &Transaction) -> Result<Signature, SendError> {
        let tx_bytes = bincode::serialize(tx).map_err(|e| SendError::Serialize(e.to_string()))?;
        let tx_base64 = STANDARD.encode(&tx_bytes);

        debug!(
            "[Sender] tx: {} bytes (limit {})",
            tx_bytes.len(),
            PACKET_DATA_SIZE
        );

        let json = self
            .call(serde_json::json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "sendTransaction",
                "params": [
                    tx_base64,
                    {
                        "encoding": "base64",
                        "skipPreflight": true,
                        "maxRetries": 0
                    }
                ]
            }))
            .await?;

        let sig_str = json["result"]
            .as_str()
            .ok_or(SendError::Parse("No result in response".to_string()))?;

        Signature::from_str(sig_str).map_err(|e| SendError::Parse(e.to_string()))
    }

    /// Check transaction signature status for a single signature
    pub async fn get_signature_status(&self, signature: &Signature) -> Result<TxStatus, SendError> {
        let statuses = self.get_signature_statuses(&[*signature]).await?;
        Ok(statuses.into_iter().next().unwrap_or(TxStatus::Pending))
    }

    /// Check transaction signature statuses in batch, in request order
    pub async fn get_signature_statuses(
        &self,
        signatures: &[Signature],
    ) -> Result<Vec<TxStatus>, SendError> {
        let mut all_statuses = Vec::with_capacity(signatures.len());

        for chunk in signatures.chunks(Self::MAX_SIGNATURES_PER_BATCH) {
            let sig_strings: Vec<String> = chunk.iter().map(|s| s.to_string()).collect();

            let json = self
                .call(serde_json::json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "method": "getSignatureStatuses",
                    "params": [
                        sig_strings,
                        { "searchTransactionHistory": false }
                    ]
                }))
                .await?;

            let values = json["result"]["value"]
                .as_array()
                .ok_or(SendError::Parse("Expected array in result.value".to_string()))?;

            all_statuses.extend(values.iter().map(parse_status));
        }

        Ok(all_statuses)
    }
}

fn parse_status(value: &serde_json::Value) -> TxStatus {
    if value.is_null() {
        return TxStatus::Pending;
    }
    if let Some(err) = value.get("err").filter(|err| !err.is_null()) {
        return TxStatus::Failed(err.to_string());
    }
    let landed = matches!(
        value.get("confirmationStatus").and_then(|s| s.as_str()),
        Some("confirmed") | Some("finalized")
    );
    match value.get("slot").and_then(|s| s.as_u64()) {
        Some(slot) if landed => TxStatus::Confirmed { slot },
        _ => TxStatus::Pending,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("Serialization error: {0}")]
    Serialize(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("RPC error: {0}")]
    RpcError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_signature_statuses() {
        assert_eq!(parse_status(&json!(null)), TxStatus::Pending);
        assert_eq!(
            parse_status(&json!({"slot": 42, "err": null, "confirmationStatus": "confirmed"})),
            TxStatus::Confirmed { slot: 42 }
        );
        assert_eq!(
            parse_status(&json!({"slot": 42, "err": null, "confirmationStatus": "processed"})),
            TxStatus::Pending
        );
        assert!(matches!(
            parse_status(&json!({"slot": 42, "err": {"InstructionError": [2, {"Custom": 6005}]}})),
            TxStatus::Failed(_)
        ));
    }
}

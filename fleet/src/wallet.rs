use std::{path::Path, sync::Arc};

use ponzimon_sdk::PlayerAccounts;
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signer},
};

use crate::{config::NetworkConfig, error::FleetError};

/// A wallet the fleet signs for, with every address its instructions touch.
#[derive(Debug)]
pub struct WalletCredential {
    keypair: Keypair,
    accounts: PlayerAccounts,
}

impl WalletCredential {
    pub fn new(keypair: Keypair, network: &NetworkConfig) -> Self {
        let accounts = PlayerAccounts::derive(
            network.program_id,
            network.token_mint,
            network.fees_wallet,
            network.referrer,
            keypair.pubkey(),
        );
        Self { keypair, accounts }
    }

    /// Parse a base58-encoded 64-byte secret key.
    pub fn from_base58(secret: &str, network: &NetworkConfig) -> Result<Self, FleetError> {
        let bytes = bs58::decode(secret.trim())
            .into_vec()
            .map_err(|e| FleetError::Config(format!("invalid base58 secret: {e}")))?;
        let keypair =
            Keypair::try_from(bytes.as_slice()).map_err(|e| FleetError::Config(e.to_string()))?;
        Ok(Self::new(keypair, network))
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }

    pub fn accounts(&self) -> &PlayerAccounts {
        &self.accounts
    }
}

/// Load wallets from a JSON array of base58 secret keys, keeping file order
/// and dropping duplicates.
pub fn load_wallets(
    path: &Path,
    network: &NetworkConfig,
) -> Result<Vec<Arc<WalletCredential>>, FleetError> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| FleetError::Config(format!("{}: {e}", path.display())))?;
    let secrets: Vec<String> =
        serde_json::from_str(&data).map_err(|e| FleetError::Config(e.to_string()))?;

    let mut wallets: Vec<Arc<WalletCredential>> = Vec::with_capacity(secrets.len());
    for secret in &secrets {
        let wallet = WalletCredential::from_base58(secret, network)?;
        if wallets.iter().all(|w| w.pubkey() != wallet.pubkey()) {
            wallets.push(Arc::new(wallet));
        }
    }
    Ok(wallets)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network() -> NetworkConfig {
        NetworkConfig {
            rpc_url: "http://localhost:8899".to_string(),
            program_id: Pubkey::new_unique(),
            token_mint: Pubkey::new_unique(),
            fees_wallet: Pubkey::new_unique(),
            recipient: Pubkey::new_unique(),
            referrer: None,
        }
    }

    #[test]
    fn base58_secret_round_trip() {
        let keypair = Keypair::new();
        let secret = bs58::encode(keypair.to_bytes()).into_string();
        let wallet = WalletCredential::from_base58(&secret, &network()).unwrap();
        assert_eq!(wallet.pubkey(), keypair.pubkey());
        assert_eq!(wallet.accounts().wallet, keypair.pubkey());
    }

    #[test]
    fn truncated_secret_is_rejected() {
        let keypair = Keypair::new();
        let secret = bs58::encode(&keypair.to_bytes()[..32]).into_string();
        let err = WalletCredential::from_base58(&secret, &network()).unwrap_err();
        assert!(matches!(err, FleetError::Config(_)));
    }

    #[test]
    fn bad_secret_is_config_error() {
        let err = WalletCredential::from_base58("not-base58-0OIl", &network()).unwrap_err();
        assert!(matches!(err, FleetError::Config(_)));
    }
}

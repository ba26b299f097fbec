//! Configuration for the fleet client

use std::{path::PathBuf, time::Duration};

use clap::{Parser, Subcommand};
use ponzimon_sdk::consts::{MAINNET_PROGRAM_ID, MAINNET_TOKEN_MINT};
use solana_sdk::{pubkey::Pubkey, signature::Keypair};

use crate::{
    error::FleetError,
    orchestrator::{BatchSizes, FarmStrategy, Tuning},
};

/// Ponzimon wallet fleet
#[derive(Parser, Debug, Clone)]
#[command(name = "ponzimon-fleet")]
#[command(about = "Batch operations for a fleet of Ponzimon wallets", long_about = None)]
pub struct Config {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,

    /// RPC URL
    #[arg(long, env = "RPC_URL", default_value = "https://api.mainnet-beta.solana.com")]
    pub rpc_url: String,

    /// Farming program ID
    #[arg(long, env = "PROGRAM_ID", default_value_t = MAINNET_PROGRAM_ID)]
    pub program_id: Pubkey,

    /// Game token mint
    #[arg(long, env = "TOKEN_MINT", default_value_t = MAINNET_TOKEN_MINT)]
    pub token_mint: Pubkey,

    /// Wallet receiving the farm purchase fee
    #[arg(long, env = "FEES_WALLET")]
    pub fees_wallet: Pubkey,

    /// Wallet receiving swept tokens
    #[arg(long, env = "RECIPIENT")]
    pub recipient: Pubkey,

    /// Referrer for new farms (defaults to the fees wallet)
    #[arg(long, env = "REFERRER")]
    pub referrer: Option<Pubkey>,

    /// JSON array of base58 wallet secret keys
    #[arg(long, env = "WALLETS_FILE", default_value = "wallets.json")]
    pub wallets_file: PathBuf,

    /// Optional fee payer keypair (JSON byte array)
    #[arg(long, env = "MASTER_KEYPAIR")]
    pub master_keypair: Option<PathBuf>,

    /// Optional SQLite journal of submitted transactions
    #[arg(long, env = "JOURNAL_PATH")]
    pub journal_path: Option<PathBuf>,

    /// Priority fee in microlamports per compute unit
    #[arg(long, env = "PRIORITY_FEE", default_value = "200")]
    pub priority_fee: u64,

    /// Compute unit limit for ordinary transactions
    #[arg(long, env = "COMPUTE_UNIT_LIMIT", default_value = "1000000")]
    pub compute_unit_limit: u32,

    /// Batches in flight at once
    #[arg(long, env = "MAX_CONCURRENCY", default_value = "10")]
    pub max_concurrency: usize,

    /// Wallets per account creation transaction
    #[arg(long, env = "ACCOUNT_CREATION_BATCH_SIZE", default_value = "4")]
    pub account_creation_batch_size: usize,

    /// Wallets per claim transaction
    #[arg(long, env = "CLAIM_BATCH_SIZE", default_value = "5")]
    pub claim_batch_size: usize,

    /// Wallets per transfer transaction
    #[arg(long, env = "TRANSFER_BATCH_SIZE", default_value = "6")]
    pub transfer_batch_size: usize,

    /// Slots between a commit and its settle
    #[arg(long, env = "MIN_SETTLE_DELAY", default_value = "5")]
    pub min_settle_delay: u64,

    /// Settle readiness retries before a wallet is reported incomplete
    #[arg(long, env = "SETTLE_RETRIES", default_value = "3")]
    pub settle_retries: u32,

    /// Delay between settle readiness retries in milliseconds
    #[arg(long, env = "SETTLE_RETRY_DELAY_MS", default_value = "3000")]
    pub settle_retry_delay_ms: u64,

    /// Seconds to wait for a confirmation before reporting unconfirmed
    #[arg(long, env = "CONFIRM_TIMEOUT_SECS", default_value = "30")]
    pub confirm_timeout_secs: u64,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Decode and print every wallet's player account
    Query {
        /// Print JSON instead of log lines
        #[arg(long)]
        json: bool,
    },
    /// Decode and print the global state
    Global,
    /// Purchase the initial farm for wallets without one
    Init {
        /// What to do with the starter cards
        #[arg(long, value_enum, default_value = "stake12")]
        strategy: FarmStrategy,
    },
    /// Stake the card in a raw slot on every wallet
    Stake {
        #[arg(long)]
        raw_index: u8,
    },
    /// Unstake the card in a raw slot on every wallet
    Unstake {
        #[arg(long)]
        raw_index: u8,
    },
    /// Upgrade every farm one tier
    Upgrade,
    /// Open one booster pack per wallet
    OpenBoosters,
    /// Recycle cards in the given raw slots on every wallet
    Recycle {
        #[arg(long = "raw-index", required = true)]
        raw_indices: Vec<u8>,
    },
    /// Claim rewards, optionally sweeping tokens to the recipient afterwards
    Claim {
        #[arg(long)]
        transfer: bool,
    },
    /// Sweep every wallet's tokens to the recipient
    Transfer,
    /// Print journal totals and the most recent transactions
    History {
        /// Transactions to list
        #[arg(long, default_value = "20")]
        limit: i64,
        /// Print JSON instead of log lines
        #[arg(long)]
        json: bool,
    },
}

/// Network and program identifiers every component works against.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkConfig {
    pub rpc_url: String,
    pub program_id: Pubkey,
    pub token_mint: Pubkey,
    pub fees_wallet: Pubkey,
    pub recipient: Pubkey,
    pub referrer: Option<Pubkey>,
}

impl Config {
    pub fn network(&self) -> NetworkConfig {
        NetworkConfig {
            rpc_url: self.rpc_url.clone(),
            program_id: self.program_id,
            token_mint: self.token_mint,
            fees_wallet: self.fees_wallet,
            recipient: self.recipient,
            referrer: self.referrer,
        }
    }

    pub fn tuning(&self) -> Tuning {
        Tuning {
            compute_unit_limit: self.compute_unit_limit,
            priority_fee: self.priority_fee,
            max_concurrency: self.max_concurrency,
            min_settle_delay: self.min_settle_delay,
            settle_retries: self.settle_retries,
            settle_retry_delay: Duration::from_millis(self.settle_retry_delay_ms),
            confirm_timeout: Duration::from_secs(self.confirm_timeout_secs),
            ..Tuning::default()
        }
    }

    pub fn batch_sizes(&self) -> BatchSizes {
        BatchSizes {
            account_creation: self.account_creation_batch_size,
            claim: self.claim_batch_size,
            transfer: self.transfer_batch_size,
            ..BatchSizes::default()
        }
    }

    /// Load the fee payer keypair, if one is configured
    pub fn load_master_keypair(&self) -> Result<Option<Keypair>, FleetError> {
        let Some(path) = &self.master_keypair else {
            return Ok(None);
        };
        let keypair_data = std::fs::read_to_string(path)
            .map_err(|e| FleetError::Config(format!("{}: {e}", path.display())))?;
        let keypair_bytes: Vec<u8> =
            serde_json::from_str(&keypair_data).map_err(|e| FleetError::Config(e.to_string()))?;
        Keypair::try_from(keypair_bytes.as_slice())
            .map(Some)
            .map_err(|e| FleetError::Config(e.to_string()))
    }
}

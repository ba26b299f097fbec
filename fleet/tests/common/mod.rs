#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
    time::Duration,
};

use ponzimon_fleet::{
    config::NetworkConfig,
    error::FleetError,
    ledger::{Ledger, SimulationOutcome, TxStatus},
    orchestrator::{Orchestrator, Tuning},
    report::{OperationStatus, StatusSink},
    wallet::WalletCredential,
};
use ponzimon_sdk::{
    consts::{
        BOOSTER_PACK_COST, CLAIM_REWARDS, OPEN_BOOSTER_COMMIT, PURCHASE_INITIAL_FARM,
        RECYCLE_CARDS_COMMIT, RECYCLE_CARDS_SETTLE, SETTLE_OPEN_BOOSTER, STAKE_CARD,
        UNSTAKE_CARD, UPGRADE_FARM,
    },
    decode_player_account, Card, Farm, PlayerAccount, RawIndex,
};
use solana_sdk::{
    hash::Hash,
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    transaction::Transaction,
};

// ============================================================================
// Fixtures
// ============================================================================

/// Starter cards granted by a farm purchase: (id, rarity)
pub const STARTER_CARDS: [(u16, u8); 3] = [(179, 0), (175, 1), (147, 0)];

/// Card a recycle or booster settle draws
pub const DRAWN_CARD: Card = Card {
    id: 500,
    rarity: 4,
    hashpower: 40,
    berry_consumption: 3,
};

/// Tokens credited per claim
pub const CLAIM_AMOUNT: u64 = 25_000;

/// Commit slot to settle slot distance the program enforces
pub const SETTLE_DELAY: u64 = 5;

pub fn network() -> NetworkConfig {
    NetworkConfig {
        rpc_url: "http://localhost:8899".to_string(),
        program_id: Pubkey::new_unique(),
        token_mint: Pubkey::new_unique(),
        fees_wallet: Pubkey::new_unique(),
        recipient: Pubkey::new_unique(),
        referrer: None,
    }
}

pub fn wallets(network: &NetworkConfig, count: usize) -> Vec<Arc<WalletCredential>> {
    (0..count)
        .map(|_| Arc::new(WalletCredential::new(Keypair::new(), network)))
        .collect()
}

/// Tuning with every wait shortened for tests.
pub fn fast_tuning() -> Tuning {
    Tuning {
        settle_retry_delay: Duration::ZERO,
        retry_delay: Duration::ZERO,
        confirm_poll_interval: Duration::from_millis(1),
        confirm_timeout: Duration::from_millis(20),
        ..Tuning::default()
    }
}

pub fn orchestrator(ledger: &Arc<MockLedger>, network: &NetworkConfig) -> Orchestrator<MockLedger> {
    Orchestrator::new(ledger.clone(), network.clone(), fast_tuning())
}

pub fn starter_player(owner: Pubkey) -> PlayerAccount {
    let mut player = PlayerAccount::new(owner);
    player.farm = Farm {
        farm_type: 1,
        total_cards: 2,
        berry_capacity: 6,
    };
    for (slot, (id, rarity)) in STARTER_CARDS.iter().enumerate() {
        player.cards[slot] = Card {
            id: *id,
            rarity: *rarity,
            hashpower: 10,
            berry_consumption: 1,
        };
    }
    player.card_count = STARTER_CARDS.len() as u8;
    player
}

// ============================================================================
// Status sink
// ============================================================================

#[derive(Default)]
pub struct RecordingSink {
    pub updates: Mutex<Vec<(Pubkey, String, OperationStatus)>>,
}

impl StatusSink for RecordingSink {
    fn update(&self, wallet: &Pubkey, operation: &str, status: &OperationStatus) {
        self.updates
            .lock()
            .unwrap()
            .push((*wallet, operation.to_string(), status.clone()));
    }
}

// ============================================================================
// Mock ledger
// ============================================================================

/// One submitted transaction, as the mock saw it.
#[derive(Clone, Debug)]
pub struct Submission {
    pub signature: Signature,
    pub slot: u64,
    pub signers: Vec<Pubkey>,
    /// Program identifiers in instruction order, compute budget excluded
    pub instructions: Vec<[u8; 8]>,
    pub landed: bool,
}

impl Submission {
    pub fn carries(&self, identifier: [u8; 8]) -> bool {
        self.instructions.contains(&identifier)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CommitKind {
    Booster,
    Recycle,
}

#[derive(Clone, Debug)]
struct PendingCommit {
    kind: CommitKind,
    slot: u64,
    cards: Vec<u8>,
}

#[derive(Clone, Default)]
struct Chain {
    slot: u64,
    accounts: HashMap<Pubkey, Vec<u8>>,
    balances: HashMap<Pubkey, u64>,
    lamports: HashMap<Pubkey, u64>,
    commits: HashMap<Pubkey, PendingCommit>,
}

#[derive(Default)]
struct Controls {
    /// Slots added on every `get_slot`
    slot_step: u64,
    reject: HashSet<Pubkey>,
    transient_submit_failures: usize,
    never_confirm: bool,
    /// Recycle settles burn the cards without drawing a new one
    recycle_draws_nothing: bool,
    /// Account a purchase creates, in place of `starter_player`
    purchase_template: Option<PlayerAccount>,
}

/// In-memory ledger that runs the farming program's state changes.
pub struct MockLedger {
    program_id: Pubkey,
    mint: Pubkey,
    chain: Mutex<Chain>,
    controls: Mutex<Controls>,
    statuses: Mutex<HashMap<Signature, TxStatus>>,
    submissions: Mutex<Vec<Submission>>,
    slot_reads: Mutex<Vec<u64>>,
}

impl MockLedger {
    pub fn new(network: &NetworkConfig) -> Arc<Self> {
        Arc::new(Self {
            program_id: network.program_id,
            mint: network.token_mint,
            chain: Mutex::new(Chain {
                slot: 1_000,
                ..Chain::default()
            }),
            controls: Mutex::new(Controls::default()),
            statuses: Mutex::new(HashMap::new()),
            submissions: Mutex::new(Vec::new()),
            slot_reads: Mutex::new(Vec::new()),
        })
    }

    pub fn set_slot_step(&self, step: u64) {
        self.controls.lock().unwrap().slot_step = step;
    }

    /// Make every transaction signed by `wallet` fail simulation.
    pub fn reject(&self, wallet: Pubkey) {
        self.controls.lock().unwrap().reject.insert(wallet);
    }

    pub fn fail_next_submits(&self, count: usize) {
        self.controls.lock().unwrap().transient_submit_failures = count;
    }

    pub fn never_confirm(&self) {
        self.controls.lock().unwrap().never_confirm = true;
    }

    pub fn recycle_draws_nothing(&self) {
        self.controls.lock().unwrap().recycle_draws_nothing = true;
    }

    /// Have purchases create `template`, owned by the purchasing wallet.
    pub fn set_purchase_template(&self, template: PlayerAccount) {
        self.controls.lock().unwrap().purchase_template = Some(template);
    }

    pub fn set_lamports(&self, address: Pubkey, lamports: u64) {
        self.chain.lock().unwrap().lamports.insert(address, lamports);
    }

    pub fn put_player(&self, player: &PlayerAccount, address: Pubkey) {
        self.chain
            .lock()
            .unwrap()
            .accounts
            .insert(address, player.to_bytes());
    }

    pub fn put_raw_account(&self, address: Pubkey, data: Vec<u8>) {
        self.chain.lock().unwrap().accounts.insert(address, data);
    }

    pub fn set_balance(&self, token_account: Pubkey, amount: u64) {
        let mut chain = self.chain.lock().unwrap();
        chain.accounts.entry(token_account).or_insert_with(|| vec![0; 165]);
        chain.balances.insert(token_account, amount);
    }

    pub fn balance(&self, token_account: &Pubkey) -> u64 {
        self.chain
            .lock()
            .unwrap()
            .balances
            .get(token_account)
            .copied()
            .unwrap_or(0)
    }

    pub fn has_account(&self, address: &Pubkey) -> bool {
        self.chain.lock().unwrap().accounts.contains_key(address)
    }

    pub fn player(&self, address: &Pubkey) -> Option<PlayerAccount> {
        let chain = self.chain.lock().unwrap();
        chain
            .accounts
            .get(address)
            .map(|data| decode_player_account(data).unwrap())
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn landed_with(&self, identifier: [u8; 8]) -> Vec<Submission> {
        self.submissions()
            .into_iter()
            .filter(|s| s.landed && s.carries(identifier))
            .collect()
    }

    pub fn slot_reads(&self) -> Vec<u64> {
        self.slot_reads.lock().unwrap().clone()
    }

    fn signers(tx: &Transaction) -> Vec<Pubkey> {
        let required = tx.message.header.num_required_signatures as usize;
        tx.message.account_keys[..required].to_vec()
    }

    fn identifiers(&self, tx: &Transaction) -> Vec<[u8; 8]> {
        let keys = &tx.message.account_keys;
        tx.message
            .instructions
            .iter()
            .filter(|ix| keys[ix.program_id_index as usize] == self.program_id)
            .filter_map(|ix| ix.data.get(..8).and_then(|d| d.try_into().ok()))
            .collect()
    }

    /// Run every instruction of `tx` at `slot` against `chain`.
    fn execute(&self, chain: &mut Chain, tx: &Transaction, slot: u64) -> Result<(), String> {
        let keys = &tx.message.account_keys;
        for ix in &tx.message.instructions {
            let program = keys[ix.program_id_index as usize];
            let account = |i: usize| keys[ix.accounts[i] as usize];

            if program == spl_token::id() {
                // transfer_checked: [source, mint, destination, authority]
                if ix.data.first() != Some(&12) {
                    return Err("unexpected token instruction".to_string());
                }
                let amount = u64::from_le_bytes(ix.data[1..9].try_into().unwrap());
                let (source, destination) = (account(0), account(2));
                let available = chain.balances.get(&source).copied().unwrap_or(0);
                if available < amount {
                    return Err("insufficient funds".to_string());
                }
                if !chain.accounts.contains_key(&destination) {
                    return Err("destination token account missing".to_string());
                }
                chain.balances.insert(source, available - amount);
                *chain.balances.entry(destination).or_default() += amount;
                continue;
            }
            if program == spl_associated_token_account::id() {
                // create_idempotent: [payer, associated account, owner, mint, ...]
                chain.accounts.entry(account(1)).or_insert_with(|| vec![0; 165]);
                continue;
            }
            if program != self.program_id {
                // compute budget
                continue;
            }

            let identifier: [u8; 8] = ix.data[..8].try_into().unwrap();
            let (wallet, player_address) = (account(0), account(1));

            if identifier == PURCHASE_INITIAL_FARM {
                if chain.accounts.contains_key(&player_address) {
                    return Err("custom program error: 0x177a".to_string());
                }
                let player_token_account = account(6);
                let template = self.controls.lock().unwrap().purchase_template.clone();
                let player = match template {
                    Some(mut player) => {
                        player.owner = wallet;
                        player
                    }
                    None => starter_player(wallet),
                };
                chain.accounts.insert(player_address, player.to_bytes());
                chain
                    .accounts
                    .entry(player_token_account)
                    .or_insert_with(|| vec![0; 165]);
                continue;
            }

            let mut player = match chain.accounts.get(&player_address) {
                Some(data) => decode_player_account(data).map_err(|e| e.to_string())?,
                None => return Err("custom program error: 0xbc4".to_string()),
            };

            match identifier {
                id if id == STAKE_CARD || id == UNSTAKE_CARD => {
                    let raw = RawIndex::new(ix.data[8]).ok_or("bad index")?;
                    let view = player
                        .card(raw)
                        .ok_or_else(|| "custom program error: 0x1777".to_string())?;
                    if id == STAKE_CARD {
                        let staked = player.staked_cards_bitset.count_ones();
                        if view.is_staked || staked >= player.farm.total_cards as u32 {
                            return Err("custom program error: 0x1772".to_string());
                        }
                        player.staked_cards_bitset |= 1u128 << raw.get();
                        player.total_hashpower += view.card.hashpower as u64;
                    } else {
                        if !view.is_staked {
                            return Err("custom program error: 0x1777".to_string());
                        }
                        player.staked_cards_bitset &= !(1u128 << raw.get());
                        player.total_hashpower -= view.card.hashpower as u64;
                    }
                }
                id if id == RECYCLE_CARDS_COMMIT || id == OPEN_BOOSTER_COMMIT => {
                    if chain.commits.contains_key(&player_address) {
                        return Err("custom program error: 0x178d".to_string());
                    }
                    let commit = if id == RECYCLE_CARDS_COMMIT {
                        let count = u32::from_le_bytes(ix.data[8..12].try_into().unwrap()) as usize;
                        let cards = ix.data[12..12 + count].to_vec();
                        for index in &cards {
                            let raw = RawIndex::new(*index).ok_or("bad index")?;
                            match player.card(raw) {
                                Some(view) if !view.is_staked => {}
                                _ => return Err("custom program error: 0x1777".to_string()),
                            }
                        }
                        PendingCommit {
                            kind: CommitKind::Recycle,
                            slot,
                            cards,
                        }
                    } else {
                        let token_account = account(4);
                        let balance = chain.balances.get(&token_account).copied().unwrap_or(0);
                        if balance < BOOSTER_PACK_COST {
                            return Err("custom program error: 0x1773".to_string());
                        }
                        chain.balances.insert(token_account, balance - BOOSTER_PACK_COST);
                        PendingCommit {
                            kind: CommitKind::Booster,
                            slot,
                            cards: Vec::new(),
                        }
                    };
                    chain.commits.insert(player_address, commit);
                }
                id if id == RECYCLE_CARDS_SETTLE || id == SETTLE_OPEN_BOOSTER => {
                    let expected = if id == RECYCLE_CARDS_SETTLE {
                        CommitKind::Recycle
                    } else {
                        CommitKind::Booster
                    };
                    let commit = match chain.commits.get(&player_address) {
                        Some(commit) if commit.kind == expected => commit.clone(),
                        _ => return Err("custom program error: 0x178c".to_string()),
                    };
                    if slot < commit.slot + SETTLE_DELAY {
                        return Err("custom program error: 0x1789".to_string());
                    }
                    for index in &commit.cards {
                        player.cards[*index as usize] = Card::EMPTY;
                        player.card_count -= 1;
                    }
                    let burned = expected == CommitKind::Recycle
                        && self.controls.lock().unwrap().recycle_draws_nothing;
                    if burned {
                        chain.commits.remove(&player_address);
                        chain.accounts.insert(player_address, player.to_bytes());
                        continue;
                    }
                    let free = player
                        .cards
                        .iter()
                        .position(|card| card.is_empty())
                        .ok_or("custom program error: 0x1772")?;
                    player.cards[free] = DRAWN_CARD;
                    player.card_count += 1;
                    chain.commits.remove(&player_address);
                }
                id if id == CLAIM_REWARDS => {
                    let token_account = account(4);
                    *chain.balances.entry(token_account).or_default() += CLAIM_AMOUNT;
                    player.last_claim_slot = slot;
                    player.total_rewards += CLAIM_AMOUNT;
                }
                id if id == UPGRADE_FARM => {
                    player.farm.farm_type = ix.data[8];
                    player.farm.total_cards += 2;
                }
                _ => return Err("unknown instruction".to_string()),
            }
            chain.accounts.insert(player_address, player.to_bytes());
        }
        Ok(())
    }
}

impl Ledger for MockLedger {
    async fn get_account(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, FleetError> {
        Ok(self.chain.lock().unwrap().accounts.get(address).cloned())
    }

    async fn get_slot(&self) -> Result<u64, FleetError> {
        let step = self.controls.lock().unwrap().slot_step;
        let slot = {
            let mut chain = self.chain.lock().unwrap();
            chain.slot += step;
            chain.slot
        };
        self.slot_reads.lock().unwrap().push(slot);
        Ok(slot)
    }

    async fn get_balance(&self, address: &Pubkey) -> Result<u64, FleetError> {
        Ok(self
            .chain
            .lock()
            .unwrap()
            .lamports
            .get(address)
            .copied()
            .unwrap_or(0))
    }

    async fn get_token_balance(&self, token_account: &Pubkey) -> Result<u64, FleetError> {
        Ok(self.balance(token_account))
    }

    async fn latest_blockhash(&self) -> Result<Hash, FleetError> {
        Ok(Hash::new_unique())
    }

    async fn simulate(&self, tx: &Transaction) -> Result<SimulationOutcome, FleetError> {
        let rejected = {
            let controls = self.controls.lock().unwrap();
            Self::signers(tx).into_iter().find(|s| controls.reject.contains(s))
        };
        if let Some(signer) = rejected {
            return Ok(SimulationOutcome::Rejected(format!(
                "Error processing Instruction 2: custom program error: 0x1770 ({signer})"
            )));
        }

        let mut chain = self.chain.lock().unwrap().clone();
        let slot = chain.slot + 1;
        Ok(match self.execute(&mut chain, tx, slot) {
            Ok(()) => SimulationOutcome::Accepted {
                units_consumed: Some(50_000),
            },
            Err(e) => SimulationOutcome::Rejected(e),
        })
    }

    async fn submit(&self, tx: &Transaction) -> Result<Signature, FleetError> {
        {
            let mut controls = self.controls.lock().unwrap();
            if controls.transient_submit_failures > 0 {
                controls.transient_submit_failures -= 1;
                return Err(FleetError::SubmitFailed("connection reset".to_string()));
            }
        }

        let signature = tx.signatures[0];
        let (slot, result) = {
            let mut chain = self.chain.lock().unwrap();
            chain.slot += 1;
            let slot = chain.slot;
            let mut next = chain.clone();
            let result = self.execute(&mut next, tx, slot);
            if result.is_ok() {
                *chain = next;
            }
            (slot, result)
        };

        self.submissions.lock().unwrap().push(Submission {
            signature,
            slot,
            signers: Self::signers(tx),
            instructions: self.identifiers(tx),
            landed: result.is_ok(),
        });
        let status = match result {
            Ok(()) => TxStatus::Confirmed { slot },
            Err(e) => TxStatus::Failed(e),
        };
        self.statuses.lock().unwrap().insert(signature, status);
        Ok(signature)
    }

    async fn poll_status(&self, signature: &Signature) -> Result<TxStatus, FleetError> {
        if self.controls.lock().unwrap().never_confirm {
            return Ok(TxStatus::Pending);
        }
        Ok(self
            .statuses
            .lock()
            .unwrap()
            .get(signature)
            .cloned()
            .unwrap_or(TxStatus::Pending))
    }
}

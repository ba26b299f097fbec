//! Transaction assembly, submission and confirmation for one batch, plus
//! the per-wallet fallback when a batch fails.

use std::{
    fmt,
    sync::{atomic::Ordering, Arc},
    time::Instant,
};

use ponzimon_sdk::{instruction::create_token_account, PlayerAccounts};
use solana_sdk::{
    compute_budget::ComputeBudgetInstruction,
    instruction::Instruction,
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    transaction::Transaction,
};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use super::Orchestrator;
use crate::{
    error::FleetError,
    ledger::{Ledger, SimulationOutcome, TxStatus},
    report::{OperationStatus, Outcome, WalletResult},
    wallet::WalletCredential,
};

/// A transaction that made it on chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Landed {
    pub signature: Signature,
    pub slot: u64,
}

/// Where a batch ended up.
#[derive(Clone, Debug)]
pub enum BatchResult {
    Landed(Landed),
    /// Submitted, but neither confirmed nor failed within the timeout
    Unconfirmed(Signature),
    Failed(FleetError),
}

/// Batch lifecycle: `Preparing -> Submitted -> Confirmed | Failed`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BatchState {
    Preparing,
    Submitted(Signature),
    Confirmed(Landed),
    Failed(String),
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchState::Preparing => write!(f, "Preparing"),
            BatchState::Submitted(sig) => write!(f, "Submitted({sig})"),
            BatchState::Confirmed(landed) => write!(f, "Confirmed(slot {})", landed.slot),
            BatchState::Failed(reason) => write!(f, "Failed({reason})"),
        }
    }
}

struct BatchTracker<'a> {
    id: u64,
    label: &'a str,
    wallets: usize,
    state: BatchState,
}

impl<'a> BatchTracker<'a> {
    fn new(id: u64, label: &'a str, wallets: usize) -> Self {
        debug!("[Batch {}] {} Preparing ({} wallets)", id, label, wallets);
        Self {
            id,
            label,
            wallets,
            state: BatchState::Preparing,
        }
    }

    fn advance(&mut self, next: BatchState) {
        debug!("[Batch {}] {} {} -> {}", self.id, self.label, self.state, next);
        self.state = next;
    }
}

/// One wallet's share of a batch.
#[derive(Clone, Debug)]
pub(crate) struct Member {
    pub wallet: Arc<WalletCredential>,
    /// Addresses with the referrer recorded on the wallet's account
    pub accounts: PlayerAccounts,
    pub instructions: Vec<Instruction>,
}

impl Member {
    pub fn pubkey(&self) -> Pubkey {
        self.wallet.pubkey()
    }
}

/// Instructions a transaction starts with, built for whoever pays its fees.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum Prelude {
    #[default]
    Empty,
    /// Create `owner`'s token account for `mint` if it is missing
    CreateTokenAccount { owner: Pubkey, mint: Pubkey },
}

impl Prelude {
    pub fn instructions(&self, payer: &Pubkey) -> Vec<Instruction> {
        match self {
            Prelude::Empty => Vec::new(),
            Prelude::CreateTokenAccount { owner, mint } => {
                vec![create_token_account(payer, owner, mint)]
            }
        }
    }
}

pub(crate) fn wallet_result(wallet: Pubkey, result: &BatchResult) -> WalletResult {
    match result {
        BatchResult::Landed(landed) => WalletResult {
            wallet,
            outcome: Outcome::success(),
            signature: Some(landed.signature),
        },
        BatchResult::Unconfirmed(sig) => WalletResult {
            wallet,
            outcome: Outcome::Incomplete(FleetError::ConfirmationTimeout(*sig).to_string()),
            signature: Some(*sig),
        },
        BatchResult::Failed(e) => WalletResult {
            wallet,
            outcome: Outcome::Failed(e.to_string()),
            signature: None,
        },
    }
}

impl<L: Ledger> Orchestrator<L> {
    /// Send every member's instructions in one transaction. If that fails,
    /// send each member on its own, in order, isolating errors per wallet.
    ///
    /// Returns one result per member in member order. Callers keep holding
    /// the members' locks for the whole call.
    pub(crate) async fn send_with_fallback(
        &self,
        label: &str,
        members: &[Member],
        prelude: Prelude,
        compute_unit_limit: u32,
    ) -> Vec<BatchResult> {
        if members.is_empty() {
            return Vec::new();
        }
        if members.len() == 1 {
            return vec![
                self.send_individual(label, &members[0], prelude, compute_unit_limit)
                    .await,
            ];
        }

        let signers: Vec<&WalletCredential> = members.iter().map(|m| m.wallet.as_ref()).collect();
        let mut instructions = prelude.instructions(&self.payer_pubkey(&members[0].wallet));
        for member in members {
            instructions.extend(member.instructions.iter().cloned());
        }

        match self.execute(label, &signers, instructions, compute_unit_limit).await {
            BatchResult::Failed(e) => {
                warn!(
                    "[{}] batch of {} failed: {} | falling back to individual transactions",
                    label,
                    members.len(),
                    e
                );
                let mut results = Vec::with_capacity(members.len());
                for member in members {
                    results.push(
                        self.send_individual(label, member, prelude, compute_unit_limit)
                            .await,
                    );
                }
                results
            }
            shared => vec![shared; members.len()],
        }
    }

    /// One wallet, retried on transient errors.
    async fn send_individual(
        &self,
        label: &str,
        member: &Member,
        prelude: Prelude,
        compute_unit_limit: u32,
    ) -> BatchResult {
        let max = self.tuning.individual_retries.max(1);
        let mut instructions = prelude.instructions(&self.payer_pubkey(&member.wallet));
        instructions.extend(member.instructions.iter().cloned());

        let mut attempt = 1;
        loop {
            let result = self
                .execute(
                    label,
                    &[member.wallet.as_ref()],
                    instructions.clone(),
                    compute_unit_limit,
                )
                .await;
            match result {
                BatchResult::Failed(e) if e.is_retryable() && attempt < max => {
                    attempt += 1;
                    warn!("[{}] {} retrying ({}/{}): {}", label, member.pubkey(), attempt, max, e);
                    self.status.update(
                        &member.pubkey(),
                        label,
                        &OperationStatus::Retrying { attempt, max },
                    );
                    sleep(self.tuning.retry_delay).await;
                }
                other => return other,
            }
        }
    }

    /// Drive one transaction through its lifecycle.
    pub(crate) async fn execute(
        &self,
        label: &str,
        signers: &[&WalletCredential],
        instructions: Vec<Instruction>,
        compute_unit_limit: u32,
    ) -> BatchResult {
        let id = self.next_batch_id.fetch_add(1, Ordering::Relaxed);
        let mut tracker = BatchTracker::new(id, label, signers.len());

        let tx = match self.assemble(signers, &instructions, compute_unit_limit).await {
            Ok(tx) => tx,
            Err(e) => return self.fail(&mut tracker, e),
        };
        if let Err(e) = self.preflight(&tx).await {
            return self.fail(&mut tracker, e);
        }
        let signature = match self.submit_with_retries(&tx, &tracker).await {
            Ok(sig) => sig,
            Err(e) => return self.fail(&mut tracker, e),
        };
        tracker.advance(BatchState::Submitted(signature));
        if let Some(journal) = &self.journal {
            if let Err(e) = journal.record_sent(&signature, label, tracker.wallets).await {
                warn!("[Batch {}] journal write failed: {}", id, e);
            }
        }

        match self.confirm(&signature).await {
            Ok(slot) => {
                let landed = Landed { signature, slot };
                info!("[Batch {}] {} confirmed: {} (slot {})", id, label, signature, slot);
                tracker.advance(BatchState::Confirmed(landed));
                if let Some(journal) = &self.journal {
                    if let Err(e) = journal.mark_confirmed(&signature, slot).await {
                        warn!("[Batch {}] journal write failed: {}", id, e);
                    }
                }
                BatchResult::Landed(landed)
            }
            Err(FleetError::ConfirmationTimeout(signature)) => {
                warn!("[Batch {}] {} unconfirmed after {:?}: {}", id, label, self.tuning.confirm_timeout, signature);
                if let Some(journal) = &self.journal {
                    if let Err(e) = journal.mark_unconfirmed(&signature).await {
                        warn!("[Batch {}] journal write failed: {}", id, e);
                    }
                }
                BatchResult::Unconfirmed(signature)
            }
            Err(e) => {
                if let Some(journal) = &self.journal {
                    if let Err(je) = journal.mark_failed(&signature, &e.to_string()).await {
                        warn!("[Batch {}] journal write failed: {}", id, je);
                    }
                }
                self.fail(&mut tracker, e)
            }
        }
    }

    fn fail(&self, tracker: &mut BatchTracker<'_>, e: FleetError) -> BatchResult {
        error!("[Batch {}] {} failed: {}", tracker.id, tracker.label, e);
        tracker.advance(BatchState::Failed(e.to_string()));
        BatchResult::Failed(e)
    }

    /// The account paying fees: the master keypair if configured, otherwise
    /// the first signer.
    pub(crate) fn payer_pubkey(&self, first: &WalletCredential) -> Pubkey {
        match &self.fee_payer {
            Some(payer) => payer.pubkey(),
            None => first.pubkey(),
        }
    }

    async fn assemble(
        &self,
        signers: &[&WalletCredential],
        instructions: &[Instruction],
        compute_unit_limit: u32,
    ) -> Result<Transaction, FleetError> {
        let first = signers
            .first()
            .ok_or_else(|| FleetError::Signing("batch has no signers".to_string()))?;
        let payer: &Keypair = match &self.fee_payer {
            Some(payer) => payer.as_ref(),
            None => first.keypair(),
        };

        let mut all = Vec::with_capacity(instructions.len() + 2);
        all.push(ComputeBudgetInstruction::set_compute_unit_limit(compute_unit_limit));
        all.push(ComputeBudgetInstruction::set_compute_unit_price(self.tuning.priority_fee));
        all.extend_from_slice(instructions);

        let blockhash = self.ledger.latest_blockhash().await?;
        let mut tx = Transaction::new_with_payer(&all, Some(&payer.pubkey()));

        // Payer first, each identity once, and only those the message requires
        let required = tx.message.header.num_required_signatures as usize;
        let required = &tx.message.account_keys[..required];
        let mut keypairs: Vec<&Keypair> = vec![payer];
        for signer in signers {
            let pubkey = signer.pubkey();
            if required.contains(&pubkey) && keypairs.iter().all(|k| k.pubkey() != pubkey) {
                keypairs.push(signer.keypair());
            }
        }
        tx.try_sign(keypairs.as_slice(), blockhash)
            .map_err(|e| FleetError::Signing(e.to_string()))?;

        let size = bincode::serialized_size(&tx)
            .map_err(|e| FleetError::Signing(e.to_string()))? as usize;
        if size > self.tuning.max_transaction_size {
            return Err(FleetError::TransactionTooLarge {
                size,
                limit: self.tuning.max_transaction_size,
            });
        }
        Ok(tx)
    }

    async fn preflight(&self, tx: &Transaction) -> Result<(), FleetError> {
        match self.ledger.simulate(tx).await? {
            SimulationOutcome::Accepted { units_consumed } => {
                debug!("Simulation ok ({:?} CU)", units_consumed);
                Ok(())
            }
            SimulationOutcome::Rejected(message) => Err(FleetError::from_simulation(message)),
        }
    }

    async fn submit_with_retries(
        &self,
        tx: &Transaction,
        tracker: &BatchTracker<'_>,
    ) -> Result<Signature, FleetError> {
        let max = self.tuning.submit_retries.max(1);
        let mut attempt = 1;
        loop {
            match self.ledger.submit(tx).await {
                Ok(sig) => return Ok(sig),
                Err(e) if e.is_retryable() && attempt < max => {
                    warn!("[Batch {}] submit attempt {}/{} failed: {}", tracker.id, attempt, max, e);
                    sleep(self.tuning.retry_delay * attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Poll until the transaction lands or the timeout passes, then look once
    /// more. `ConfirmationTimeout` means the outcome is unknown.
    async fn confirm(&self, signature: &Signature) -> Result<u64, FleetError> {
        let deadline = Instant::now() + self.tuning.confirm_timeout;
        loop {
            match self.ledger.poll_status(signature).await {
                Ok(TxStatus::Confirmed { slot }) => return Ok(slot),
                Ok(TxStatus::Failed(err)) => return Err(FleetError::TransactionFailed(err)),
                Ok(TxStatus::Pending) => {}
                Err(e) => debug!("Status poll for {} failed: {}", signature, e),
            }
            if Instant::now() >= deadline {
                break;
            }
            sleep(self.tuning.confirm_poll_interval).await;
        }

        match self.ledger.poll_status(signature).await {
            Ok(TxStatus::Confirmed { slot }) => Ok(slot),
            Ok(TxStatus::Failed(err)) => Err(FleetError::TransactionFailed(err)),
            _ => Err(FleetError::ConfirmationTimeout(*signature)),
        }
    }
}

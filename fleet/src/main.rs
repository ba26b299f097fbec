//! Ponzimon Fleet
//!
//! Runs one operation over every wallet in the wallets file:
//! - query / global: decode and print accounts
//! - init: purchase farms, optionally staking and recycling starter cards
//! - stake / unstake / upgrade / open-boosters / recycle
//! - claim (optionally followed by a sweep) / transfer
//! - history: journal totals and recent transactions
//!
//! Wallets are batched into shared transactions; a batch that fails falls
//! back to one transaction per wallet.

use std::{sync::Arc, time::Duration};

use clap::Parser;
use ponzimon_fleet::{
    config::{Command, Config},
    error::FleetError,
    journal::{Journal, JournalEntry, JournalStats},
    ledger::{load_global_state, Ledger},
    orchestrator::{Intent, Orchestrator, WalletSnapshot},
    report::BatchReport,
    rpc::RpcLedger,
    wallet::{load_wallets, WalletCredential},
};
use ponzimon_sdk::{
    consts::{rarity_name, TOKEN_DECIMALS},
    pda::global_state_pda,
    pending_rewards, GlobalState, PlayerAccount, RawIndex,
};
use serde::Serialize;
use solana_sdk::{native_token::LAMPORTS_PER_SOL, pubkey::Pubkey, signature::Signer};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Pause between claiming and sweeping so balances reflect the claim
const SWEEP_DELAY: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging; stdout stays free for --json output
    let _subscriber = FmtSubscriber::builder()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    // Load .env file if present
    dotenvy::dotenv().ok();

    // Parse configuration
    let config = Config::parse();
    let network = config.network();

    info!("Ponzimon Fleet");
    info!("RPC URL: {}", config.rpc_url);
    info!("Program: {}", config.program_id);

    let ledger = Arc::new(RpcLedger::new(&config.rpc_url));

    if let Command::Global = config.command {
        let (address, _) = global_state_pda(&network.program_id, &network.token_mint);
        let global = load_global_state(ledger.as_ref(), &address).await?;
        print_global(&global);
        return Ok(());
    }

    if let Command::History { limit, json } = &config.command {
        let Some(path) = &config.journal_path else {
            return Err(FleetError::Config("history needs --journal-path".to_string()).into());
        };
        let journal = Journal::open(path).await?;
        history(&journal, *limit, *json).await?;
        return Ok(());
    }

    let wallets = load_wallets(&config.wallets_file, &network)?;
    info!("Loaded {} wallets from {}", wallets.len(), config.wallets_file.display());
    if wallets.is_empty() {
        warn!("No wallets to run");
        return Ok(());
    }

    let mut orchestrator = Orchestrator::new(ledger.clone(), network.clone(), config.tuning())
        .with_batch_sizes(config.batch_sizes());
    if let Some(master) = config.load_master_keypair()? {
        info!("Fee payer: {}", master.pubkey());
        orchestrator = orchestrator.with_fee_payer(master);
    }
    if let Some(path) = &config.journal_path {
        let journal = Journal::open(path).await?;
        info!("Journal: {}", path.display());
        orchestrator = orchestrator.with_journal(journal);
    }

    let report = match &config.command {
        Command::Query { json } => {
            let snapshots = orchestrator.snapshots(&wallets).await;
            query(&orchestrator, &snapshots, *json).await?;
            return Ok(());
        }
        Command::Global | Command::History { .. } => return Ok(()),
        Command::Init { strategy } => run(&orchestrator, Intent::InitAccount(*strategy), &wallets).await,
        Command::Stake { raw_index } => {
            run(&orchestrator, Intent::Stake(raw_index_arg(*raw_index)?), &wallets).await
        }
        Command::Unstake { raw_index } => {
            run(&orchestrator, Intent::Unstake(raw_index_arg(*raw_index)?), &wallets).await
        }
        Command::Upgrade => run(&orchestrator, Intent::UpgradeFarm, &wallets).await,
        Command::OpenBoosters => run(&orchestrator, Intent::OpenBooster, &wallets).await,
        Command::Recycle { raw_indices } => {
            let raws = raw_indices
                .iter()
                .map(|i| raw_index_arg(*i))
                .collect::<Result<Vec<_>, _>>()?;
            run(&orchestrator, Intent::Recycle(raws), &wallets).await
        }
        Command::Claim { transfer } => {
            let mut report = run(&orchestrator, Intent::ClaimRewards, &wallets).await;
            if *transfer {
                info!("Waiting {:?} before sweeping to {}", SWEEP_DELAY, network.recipient);
                tokio::time::sleep(SWEEP_DELAY).await;
                report.merge(run(&orchestrator, Intent::TransferAll, &wallets).await);
            }
            report
        }
        Command::Transfer => run(&orchestrator, Intent::TransferAll, &wallets).await,
    };

    if report.all_succeeded() {
        Ok(())
    } else {
        Err(format!(
            "{} failed, {} incomplete",
            report.failed_count, report.incomplete_count
        )
        .into())
    }
}

fn raw_index_arg(index: u8) -> Result<RawIndex, FleetError> {
    RawIndex::new(index)
        .ok_or_else(|| FleetError::Config(format!("raw index {index} out of range (0..128)")))
}

async fn run<L: Ledger>(
    orchestrator: &Orchestrator<L>,
    intent: Intent,
    wallets: &[Arc<WalletCredential>],
) -> BatchReport {
    info!("Running {} on {} wallets...", intent, wallets.len());
    let report = orchestrator.run_batch(&intent, wallets).await;

    for result in &report.results {
        match &result.signature {
            Some(sig) if result.outcome.is_success() => {
                info!("  {} {}: {}", result.outcome, result.wallet, sig)
            }
            _ if result.outcome.is_success() => info!("  {} {}", result.outcome, result.wallet),
            _ => error!("  {} {}", result.wallet, result.outcome),
        }
    }
    info!(
        "{} done: {} succeeded, {} failed, {} incomplete",
        intent, report.success_count, report.failed_count, report.incomplete_count
    );
    report
}

#[derive(Serialize)]
struct WalletView<'a> {
    wallet: String,
    lamports: Option<u64>,
    token_balance: Option<u64>,
    pending_rewards: Option<u64>,
    player: Option<&'a PlayerAccount>,
    error: Option<String>,
}

#[derive(Serialize)]
struct PayerView {
    address: String,
    lamports: Option<u64>,
    error: Option<String>,
}

#[derive(Serialize)]
struct QueryView<'a> {
    fee_payer: Option<PayerView>,
    wallets: Vec<WalletView<'a>>,
}

async fn query<L: Ledger>(
    orchestrator: &Orchestrator<L>,
    snapshots: &[WalletSnapshot],
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let network = orchestrator.network();
    let (address, _) = global_state_pda(&network.program_id, &network.token_mint);
    let global = match load_global_state(orchestrator.ledger(), &address).await {
        Ok(global) => Some(global),
        Err(e) => {
            warn!("Global state unavailable, pending rewards not shown: {}", e);
            None
        }
    };
    let slot = orchestrator.ledger().get_slot().await?;
    let fee_payer = match orchestrator.fee_payer() {
        Some(payer) => Some(payer_view(orchestrator.ledger(), payer).await),
        None => None,
    };

    let wallets: Vec<WalletView<'_>> = snapshots
        .iter()
        .map(|s| {
            let player = s.player.as_ref().ok().and_then(|p| p.as_ref());
            let error = match (&s.player, &s.token_balance, &s.lamports) {
                (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => Some(e.to_string()),
                _ => None,
            };
            WalletView {
                wallet: s.wallet.to_string(),
                lamports: s.lamports.as_ref().ok().copied(),
                token_balance: s.token_balance.as_ref().ok().copied(),
                pending_rewards: player
                    .zip(global.as_ref())
                    .map(|(player, global)| pending_rewards(player, global, slot)),
                player,
                error,
            }
        })
        .collect();

    if json {
        // to_string keeps u128 fields exact
        let view = QueryView { fee_payer, wallets };
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    if let Some(payer) = &fee_payer {
        match (payer.lamports, &payer.error) {
            (Some(lamports), _) => info!("Fee payer {}: {} SOL", payer.address, format_sol(lamports)),
            (None, Some(e)) => error!("Fee payer {}: ✗ {}", payer.address, e),
            (None, None) => {}
        }
    }
    for view in &wallets {
        info!("Wallet {}", view.wallet);
        if let Some(e) = &view.error {
            error!("  ✗ {}", e);
        }
        if let Some(lamports) = view.lamports {
            info!("  SOL: {}", format_sol(lamports));
        }
        if let Some(balance) = view.token_balance {
            info!("  Tokens: {}", format_tokens(balance));
        }
        let Some(player) = view.player else {
            info!("  No farm");
            continue;
        };
        info!(
            "  Farm: tier {} | {} card slots | {} berry capacity",
            player.farm.farm_type, player.farm.total_cards, player.farm.berry_capacity
        );
        info!(
            "  Hashpower: {} | Berries: {} | Total rewards: {}",
            player.total_hashpower,
            player.berries,
            format_tokens(player.total_rewards)
        );
        if let Some(pending) = view.pending_rewards {
            info!("  Pending rewards: {}", format_tokens(pending));
        }
        info!("  Cards ({}):", player.card_count);
        for card in player.cards() {
            info!(
                "    {:>4} id {:>4} {:<11} hp {:>4} berries {:>3}{}",
                card.raw_index.to_string(),
                card.card.id,
                rarity_name(card.card.rarity),
                card.card.hashpower,
                card.card.berry_consumption,
                if card.is_staked { " staked" } else { "" }
            );
        }
    }
    Ok(())
}

async fn payer_view<L: Ledger>(ledger: &L, payer: Pubkey) -> PayerView {
    let balance = ledger.get_balance(&payer).await;
    PayerView {
        address: payer.to_string(),
        lamports: balance.as_ref().ok().copied(),
        error: balance.err().map(|e| e.to_string()),
    }
}

#[derive(Serialize)]
struct HistoryView {
    stats: JournalStats,
    recent: Vec<JournalEntry>,
}

async fn history(journal: &Journal, limit: i64, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let stats = journal.stats().await?;
    let recent = journal.recent(limit).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&HistoryView { stats, recent })?);
        return Ok(());
    }

    info!(
        "Journal: {} sent | {} confirmed | {} failed | {} unconfirmed",
        stats.total_count, stats.confirmed_count, stats.failed_count, stats.unconfirmed_count
    );
    for entry in &recent {
        let slot = entry.slot.map(|s| format!(" slot {s}")).unwrap_or_default();
        match &entry.error_message {
            Some(e) => error!(
                "  {} {:<16} {} wallets {}{}: {}",
                entry.signature, entry.intent, entry.wallet_count, entry.status.as_str(), slot, e
            ),
            None => info!(
                "  {} {:<16} {} wallets {}{}",
                entry.signature, entry.intent, entry.wallet_count, entry.status.as_str(), slot
            ),
        }
    }
    Ok(())
}

fn print_global(global: &GlobalState) {
    info!("Global state");
    info!("  Authority: {}", global.authority);
    info!("  Mint: {}", global.token_mint);
    info!("  Fees wallet: {}", global.fees_wallet);
    info!("  Rewards vault: {}", global.rewards_vault);
    info!(
        "  Supply: {} total | {} rewarded | {} burned | {} remaining",
        format_tokens(global.total_supply),
        format_tokens(global.cumulative_rewards),
        format_tokens(global.burned_tokens),
        format_tokens(global.remaining_supply())
    );
    if !global.supply_invariant_holds() {
        warn!("  Supply counters are inconsistent");
    }
    info!(
        "  Reward rate: {} per slot | multiplier {} | production {}",
        global.reward_rate,
        global.reward_rate_multiplier,
        if global.production_enabled { "on" } else { "off" }
    );
    info!("  Acc tokens per hashpower: {}", global.acc_tokens_per_hashpower);
    info!(
        "  Hashpower: {} | Berries: {} | Boosters opened: {}",
        global.total_hashpower, global.total_berries, global.total_booster_packs_opened
    );
    info!(
        "  Recycling: {} attempts, {} successful",
        global.total_card_recycling_attempts, global.total_successful_card_recycling
    );
    info!(
        "  Booster cost: {} | Farm fee: {} lamports | Cooldown: {} slots",
        format_tokens(global.booster_pack_cost_microtokens),
        global.initial_farm_purchase_fee_lamports,
        global.cooldown_slots
    );
}

fn format_sol(lamports: u64) -> String {
    format!("{}.{:09}", lamports / LAMPORTS_PER_SOL, lamports % LAMPORTS_PER_SOL)
}

fn format_tokens(raw: u64) -> String {
    let scale = 10u64.pow(TOKEN_DECIMALS as u32);
    format!("{}.{:0width$}", raw / scale, raw % scale, width = TOKEN_DECIMALS as usize)
}

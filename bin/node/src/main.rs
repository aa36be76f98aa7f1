//! ACCROLLUP development node
//!
//! Runs a sequencer against an in-memory store and a mock parent chain:
//! - Produces a block every `BLOCK_TIME` seconds
//! - Mines one parent chain block per block time
//! - Confirms submitted blocks every `CONFIRMATION_INTERVAL` seconds
//! - Optionally feeds signed transfers from a treasury account (`DEMO_TRAFFIC`)

use std::sync::Arc;
use std::time::Duration;

use accrollup_core::tx::SoftTransfer;
use accrollup_core::{short_hex, SoftTransaction};
use accrollup_host::{Config, MemoryStore, MockParentChain, Sequencer};
use alloy_primitives::{address, Address};
use k256::ecdsa::SigningKey;
use tokio::time::interval;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

type NodeSequencer = Sequencer<MemoryStore, MockParentChain>;

/// Account 0, funded at startup
const TREASURY_ADDRESS: Address = address!("0000000000000000000000000000000000000001");

/// Account 1, receives demo transfers
const SINK_ADDRESS: Address = address!("0000000000000000000000000000000000000002");

/// Treasury initial balance
const TREASURY_BALANCE: u64 = 1_000_000_000;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting ACCROLLUP node...");

    let config = Config::from_env();
    info!("  Block time: {}s", config.block_time);
    info!("  Max soft transactions per block: {}", config.max_soft_transactions);
    info!("  Confirmation period: {} blocks", config.confirmation_period);
    info!("  State depth: {}", config.state_depth);

    let treasury = SigningKey::random(&mut rand::thread_rng());
    let treasury_signer = Address::from_private_key(&treasury);
    let chain = Arc::new(MockParentChain::new(config.confirmation_period));
    chain.create_account(TREASURY_ADDRESS, treasury_signer, TREASURY_BALANCE);
    chain.create_account(SINK_ADDRESS, treasury_signer, 0);
    info!("Treasury signer: 0x{}", hex::encode(treasury_signer));

    let block_time = config.block_time();
    let demo_traffic = std::env::var("DEMO_TRAFFIC")
        .map(|s| s == "true" || s == "1")
        .unwrap_or(true);

    let sequencer = Arc::new(Sequencer::new(config, MemoryStore::default(), chain.clone()));
    let confirmation = sequencer.clone().spawn_confirmation_task();

    let mut tasks = vec![
        tokio::spawn(block_production_loop(sequencer.clone(), block_time)),
        tokio::spawn(mine_parent_chain(chain, block_time)),
    ];
    if demo_traffic {
        tasks.push(tokio::spawn(transfer_loop(sequencer.clone(), treasury, block_time)));
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");

    for task in tasks {
        task.abort();
    }
    confirmation.shutdown().await;
    info!("Awaiting confirmation at shutdown: {}", sequencer.awaiting_confirmation().len());
    Ok(())
}

/// Block production loop - commits a block every block time
async fn block_production_loop(sequencer: Arc<NodeSequencer>, block_time: Duration) {
    let mut ticker = interval(block_time);

    loop {
        ticker.tick().await;

        match sequencer.process_block(None, true).await {
            Ok(block) => {
                info!(
                    "Block {} produced: txs={}, pending={}, state={}",
                    block.number(),
                    block.transactions.len(),
                    sequencer.queue().len(),
                    short_hex(&block.header.state_root),
                );
            }
            Err(e) => warn!("Block production failed: {}", e),
        }
    }
}

/// Advance the mock parent chain so submitted blocks become confirmable
async fn mine_parent_chain(chain: Arc<MockParentChain>, block_time: Duration) {
    let mut ticker = interval(block_time);
    loop {
        ticker.tick().await;
        chain.advance(1);
    }
}

/// Send one signed treasury transfer per block time and wait for it
async fn transfer_loop(sequencer: Arc<NodeSequencer>, treasury: SigningKey, block_time: Duration) {
    let mut ticker = interval(block_time);

    loop {
        ticker.tick().await;

        let nonce = match sequencer.latest_state().await {
            Ok(state) => match state.get_account(0) {
                Some(account) => account.nonce,
                None => continue,
            },
            Err(e) => {
                warn!("Failed to load latest state: {}", e);
                continue;
            }
        };

        let mut tx: SoftTransaction = SoftTransfer::new(0, 1, nonce, 1).into();
        if let Err(e) = tx.sign(&treasury) {
            warn!("Failed to sign transfer: {}", e);
            continue;
        }

        match sequencer.queue_transaction(tx.into()) {
            Ok(pending) => match pending.wait().await {
                Ok(root) => debug!("Transfer {} included, root {}", nonce, short_hex(&root)),
                Err(e) => warn!("Transfer {} rejected: {}", nonce, e),
            },
            Err(e) => warn!("Failed to queue transfer: {}", e),
        }
    }
}

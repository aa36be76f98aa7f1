//! Block production, submission and confirmation

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use accrollup_core::{
    short_hex, Block, BlockId, BlockParams, Hash, SoftOutcome, State, StateMachine, Transaction,
};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::HostError;
use crate::events::{BlockEvent, EVENT_CHANNEL_CAPACITY};
use crate::parent::ParentChain;
use crate::queue::{PendingTransaction, QueueError, TransactionQueue, TxRejected};
use crate::store::{Database, KeyValueStore};

/// Transactions per type that fit in a block's count metadata
const MAX_PER_TYPE: usize = u16::MAX as usize;

/// Produces blocks from queued soft transactions and parent chain hard
/// transactions, submits them and confirms them in submission order.
///
/// Block production is single-writer. The confirmation sweep runs
/// independently and only touches the awaiting queue and the parent chain.
pub struct Sequencer<S, P> {
    config: Config,
    db: Database<S>,
    parent_chain: Arc<P>,
    queue: TransactionQueue,
    production: tokio::sync::Mutex<()>,
    sweep: tokio::sync::Mutex<()>,
    awaiting: Mutex<VecDeque<Hash>>,
    /// Submitted block whose write to the store failed
    unstored: Mutex<Option<Block>>,
    events: broadcast::Sender<BlockEvent>,
}

impl<S: KeyValueStore, P: ParentChain> Sequencer<S, P> {
    /// Sequencer over `store` and `parent_chain`
    pub fn new(config: Config, store: S, parent_chain: Arc<P>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            db: Database::new(store, config.state_depth),
            queue: TransactionQueue::new(config.queue_capacity),
            config,
            parent_chain,
            production: tokio::sync::Mutex::new(()),
            sweep: tokio::sync::Mutex::new(()),
            awaiting: Mutex::new(VecDeque::new()),
            unstored: Mutex::new(None),
            events,
        }
    }

    /// Configuration
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Block and state storage
    pub const fn database(&self) -> &Database<S> {
        &self.db
    }

    /// Parent chain client
    pub const fn parent_chain(&self) -> &Arc<P> {
        &self.parent_chain
    }

    /// Soft transaction queue
    pub const fn queue(&self) -> &TransactionQueue {
        &self.queue
    }

    /// Subscribe to block lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<BlockEvent> {
        self.events.subscribe()
    }

    /// Queue a soft transaction for the next blocks
    pub fn queue_transaction(&self, tx: Transaction) -> Result<PendingTransaction, QueueError> {
        self.queue.queue_transaction(tx)
    }

    fn awaiting(&self) -> MutexGuard<'_, VecDeque<Hash>> {
        self.awaiting.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn unstored(&self) -> MutexGuard<'_, Option<Block>> {
        self.unstored.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write a submitted block that could not be stored earlier
    async fn store_submitted(&self) -> Result<(), HostError> {
        let Some(block) = self.unstored().clone() else {
            return Ok(());
        };
        let hash = block.hash();
        self.db.put_block(&block).await?;

        let mut unstored = self.unstored();
        if unstored.as_ref().is_some_and(|pending| pending.hash() == hash) {
            *unstored = None;
        }
        info!("Stored submitted block {} ({})", block.number(), short_hex(&hash));
        Ok(())
    }

    /// Hashes of submitted blocks not yet confirmed, oldest first
    pub fn awaiting_confirmation(&self) -> Vec<Hash> {
        self.awaiting().iter().copied().collect()
    }

    /// State at the latest stored block
    pub async fn latest_state(&self) -> Result<State, HostError> {
        let latest = self.db.get_block_or_default(None).await?;
        self.db.get_state(&latest.header.state_root).await
    }

    /// Build the block on top of `parent` (latest block if `None`).
    ///
    /// With `commit`, the block is stored, submitted and tracked until
    /// confirmed, and every soft transaction taken from the queue is
    /// resolved. Without it the block is only a preview and the queue is
    /// left as it was. Failures before submission also leave the queue as
    /// it was.
    ///
    /// Once the parent chain accepts a block it is tracked and its
    /// transactions resolved even if storing it fails. The write is retried
    /// before the next block is built and before the next confirmation.
    pub async fn process_block(
        &self,
        parent: Option<BlockId>,
        commit: bool,
    ) -> Result<Block, HostError> {
        let _guard = self.production.lock().await;
        self.store_submitted().await?;

        let parent = self.db.get_block_or_default(parent).await?;
        let state = self.db.get_state(&parent.header.state_root).await?;
        let hard_transactions = self
            .parent_chain
            .get_hard_transactions(
                parent.header.hard_transactions_count,
                self.config.max_hard_transactions.min(MAX_PER_TYPE),
            )
            .await
            .map_err(HostError::ParentChain)?;

        let taken = self.queue.take(self.config.max_soft_transactions.min(MAX_PER_TYPE));
        let params = BlockParams {
            parent: parent.header.clone(),
            hard_transactions,
            soft_transactions: taken.iter().map(|entry| entry.tx().clone()).collect(),
        };

        let mut machine = StateMachine::new(state);
        let execution = match machine.execute_block(params) {
            Ok(execution) => execution,
            Err(err) => {
                warn!("Block {} failed to execute: {}", parent.number() + 1, err);
                self.queue.requeue_front(taken);
                return Err(err.into());
            }
        };

        let mut block = execution.block;
        if !commit {
            self.queue.requeue_front(taken);
            return Ok(block);
        }

        let submission = async {
            self.db.put_state(machine.state()).await?;
            self.parent_chain.submit_block(&block).await.map_err(HostError::ParentChain)
        }
        .await;
        let submitted_at = match submission {
            Ok(submitted_at) => submitted_at,
            Err(err) => {
                self.queue.requeue_front(taken);
                return Err(err);
            }
        };

        block.commit(submitted_at);
        let hash = block.hash();
        self.awaiting().push_back(hash);
        for (entry, outcome) in taken.into_iter().zip(execution.outcomes) {
            entry.resolve(match outcome {
                SoftOutcome::Included { intermediate_state_root } => Ok(intermediate_state_root),
                SoftOutcome::Rejected(err) => Err(TxRejected::Invalid(err)),
            });
        }
        let _ = self.events.send(BlockEvent::Submitted(hash));
        info!(
            "Submitted block {} ({}) at {}, {} transactions",
            block.number(),
            short_hex(&hash),
            submitted_at,
            block.transactions.len()
        );

        if let Err(err) = self.db.put_block(&block).await {
            error!("Failed to store submitted block {}, will retry: {}", block.number(), err);
            *self.unstored() = Some(block.clone());
        }
        Ok(block)
    }

    /// Confirm the oldest submitted block if its confirmation period has
    /// elapsed. Returns its hash, or `None` if nothing was confirmed.
    ///
    /// On any failure the block stays at the head and is retried later.
    pub async fn confirm_next(&self) -> Result<Option<Hash>, HostError> {
        let _guard = self.sweep.lock().await;
        self.store_submitted().await?;

        let Some(hash) = self.awaiting().front().copied() else {
            return Ok(None);
        };
        let block = self
            .db
            .get_block(&hash)
            .await?
            .ok_or(HostError::BlockNotFound(BlockId::Hash(hash)))?;

        let current = self.parent_chain.current_block_number().await.map_err(HostError::ParentChain)?;
        let submitted_at = block.submitted_at().unwrap_or_default();
        if current <= submitted_at + self.config.confirmation_period {
            debug!("Block {} not yet confirmable at {}", block.number(), current);
            return Ok(None);
        }

        self.parent_chain.confirm_block(&block).await.map_err(HostError::ParentChain)?;

        if block.has_withdrawals() {
            let previous_number = block.number().saturating_sub(1);
            let previous = self
                .db
                .get_block_by_number(previous_number)
                .await?
                .ok_or(HostError::BlockNotFound(BlockId::Number(previous_number)))?;
            self.parent_chain
                .submit_withdrawals(&previous, &block)
                .await
                .map_err(HostError::ParentChain)?;
        }

        self.awaiting().pop_front();
        let _ = self.events.send(BlockEvent::Confirmed(hash));
        info!("Confirmed block {} ({})", block.number(), short_hex(&hash));
        Ok(Some(hash))
    }
}

impl<S, P> Sequencer<S, P>
where
    S: KeyValueStore + 'static,
    P: ParentChain + 'static,
{
    /// Run the confirmation sweep every `confirmation_interval` until the
    /// returned task is shut down or dropped
    pub fn spawn_confirmation_task(self: Arc<Self>) -> ConfirmationTask {
        let (shutdown, mut stopped) = watch::channel(false);
        let period = self.config.confirmation_interval();

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = stopped.changed() => break,
                }

                loop {
                    match self.confirm_next().await {
                        Ok(Some(_)) => continue,
                        Ok(None) => break,
                        Err(e) => {
                            error!("Confirmation sweep failed: {}", e);
                            break;
                        }
                    }
                }
            }
            debug!("Confirmation task stopped");
        });

        ConfirmationTask { shutdown, handle: Some(handle) }
    }
}

/// Handle to the background confirmation sweep
#[derive(Debug)]
pub struct ConfirmationTask {
    shutdown: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl ConfirmationTask {
    /// Stop the sweep after its current tick and wait for it
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for ConfirmationTask {
    fn drop(&mut self) {
        if let Some(handle) = &self.handle {
            handle.abort();
        }
    }
}

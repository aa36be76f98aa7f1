//! Parent chain interface and an in-memory mock

use std::sync::{Mutex, MutexGuard, PoisonError};

use accrollup_core::tx::{HardCreate, HardDeposit};
use accrollup_core::{AccountIndex, Address, Amount, Block, Hash, HardTransaction};
use anyhow::{anyhow, bail, ensure, Result};
use async_trait::async_trait;
use tracing::info;

/// Contract on the base chain that orders hard transactions and stores
/// block commitments
#[async_trait]
pub trait ParentChain: Send + Sync {
    /// Current base-chain block number
    async fn current_block_number(&self) -> Result<u64>;

    /// Prefixed encodings of up to `max` hard transactions, starting at
    /// index `from_index`
    async fn get_hard_transactions(&self, from_index: u64, max: usize) -> Result<Vec<Vec<u8>>>;

    /// Submit a block; returns the base-chain block number it landed in
    async fn submit_block(&self, block: &Block) -> Result<u64>;

    /// Confirm a submitted block once its confirmation period has passed.
    /// Confirming an already confirmed block succeeds.
    async fn confirm_block(&self, block: &Block) -> Result<()>;

    /// Release the withdrawals of a confirmed block
    async fn submit_withdrawals(&self, previous: &Block, block: &Block) -> Result<()>;
}

#[derive(Debug, Default)]
struct MockChain {
    block_number: u64,
    confirmation_period: u64,
    hard_transactions: Vec<HardTransaction>,
    /// Submitted block hashes with their submission height, in order
    submitted: Vec<(Hash, u64)>,
    confirmed: usize,
    withdrawals: Vec<(Hash, Hash)>,
    fail_submissions: usize,
}

/// In-memory [`ParentChain`] for tests and the development node
#[derive(Debug, Default)]
pub struct MockParentChain {
    chain: Mutex<MockChain>,
}

impl MockParentChain {
    /// Empty chain with the given confirmation period
    pub fn new(confirmation_period: u64) -> Self {
        Self {
            chain: Mutex::new(MockChain { confirmation_period, ..Default::default() }),
        }
    }

    fn chain(&self) -> MutexGuard<'_, MockChain> {
        self.chain.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a hard transaction, assigning the next index
    pub fn push_hard_transaction(&self, mut tx: HardTransaction) -> u64 {
        let mut chain = self.chain();
        let index = chain.hard_transactions.len() as u64;
        match &mut tx {
            HardTransaction::Create(tx) => tx.hard_transaction_index = index,
            HardTransaction::Deposit(tx) => tx.hard_transaction_index = index,
            HardTransaction::Withdraw(tx) => tx.hard_transaction_index = index,
            HardTransaction::AddSigner(tx) => tx.hard_transaction_index = index,
        }
        chain.hard_transactions.push(tx);
        index
    }

    /// Deposit to a new account
    pub fn create_account(&self, address: Address, signer: Address, value: Amount) -> u64 {
        self.push_hard_transaction(HardTransaction::Create(HardCreate {
            account_address: address,
            initial_signing_key: signer,
            value,
            ..Default::default()
        }))
    }

    /// Deposit to an existing account
    pub fn deposit(&self, account_index: AccountIndex, value: Amount) -> u64 {
        self.push_hard_transaction(HardTransaction::Deposit(HardDeposit {
            account_index,
            value,
            ..Default::default()
        }))
    }

    /// Mine `blocks` empty base-chain blocks
    pub fn advance(&self, blocks: u64) {
        self.chain().block_number += blocks;
    }

    /// Make the next `count` submissions fail
    pub fn fail_submissions(&self, count: usize) {
        self.chain().fail_submissions = count;
    }

    /// Hashes of submitted blocks, in submission order
    pub fn submitted_blocks(&self) -> Vec<Hash> {
        self.chain().submitted.iter().map(|(hash, _)| *hash).collect()
    }

    /// Number of confirmed blocks
    pub fn confirmed_count(&self) -> usize {
        self.chain().confirmed
    }

    /// `(previous, block)` hash pairs passed to [`ParentChain::submit_withdrawals`]
    pub fn withdrawals(&self) -> Vec<(Hash, Hash)> {
        self.chain().withdrawals.clone()
    }
}

#[async_trait]
impl ParentChain for MockParentChain {
    async fn current_block_number(&self) -> Result<u64> {
        Ok(self.chain().block_number)
    }

    async fn get_hard_transactions(&self, from_index: u64, max: usize) -> Result<Vec<Vec<u8>>> {
        let chain = self.chain();
        Ok(chain
            .hard_transactions
            .iter()
            .skip(from_index as usize)
            .take(max)
            .map(|tx| tx.encode(true))
            .collect())
    }

    async fn submit_block(&self, block: &Block) -> Result<u64> {
        let mut chain = self.chain();
        if chain.fail_submissions > 0 {
            chain.fail_submissions -= 1;
            bail!("submission rejected");
        }
        let expected = chain.submitted.len() as u64 + 1;
        ensure!(
            u64::from(block.number()) == expected,
            "expected block {expected}, got {}",
            block.number()
        );

        let submitted_at = chain.block_number;
        let mut committed = block.clone();
        committed.commit(submitted_at);
        chain.submitted.push((committed.hash(), submitted_at));
        chain.block_number += 1;
        info!("Mock chain stored block {} at {}", block.number(), submitted_at);
        Ok(submitted_at)
    }

    async fn confirm_block(&self, block: &Block) -> Result<()> {
        let mut chain = self.chain();
        let hash = block.hash();
        if chain.submitted[..chain.confirmed].iter().any(|(h, _)| *h == hash) {
            return Ok(());
        }

        let position = chain.confirmed;
        let (next, submitted_at) = *chain
            .submitted
            .get(position)
            .ok_or_else(|| anyhow!("no block awaiting confirmation"))?;
        ensure!(hash == next, "block {} is not next to confirm", block.number());
        ensure!(
            chain.block_number > submitted_at + chain.confirmation_period,
            "confirmation period has not elapsed"
        );
        chain.confirmed += 1;
        Ok(())
    }

    async fn submit_withdrawals(&self, previous: &Block, block: &Block) -> Result<()> {
        let mut chain = self.chain();
        let hash = block.hash();
        let confirmed = chain.submitted[..chain.confirmed].iter().any(|(h, _)| *h == hash);
        ensure!(confirmed, "block {} is not confirmed", block.number());
        ensure!(
            previous.number() + 1 == block.number(),
            "block {} does not follow {}",
            block.number(),
            previous.number()
        );
        chain.withdrawals.push((previous.hash(), hash));
        Ok(())
    }
}

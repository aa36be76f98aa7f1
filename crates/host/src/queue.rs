//! Soft transaction queue
//!
//! Bounded FIFO shared between submitters and block production. Each entry
//! carries a oneshot sender that is resolved once the transaction is either
//! included in a submitted block or dropped.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use accrollup_core::{Hash, SoftTransaction, Transaction, TxError};
use tokio::sync::oneshot;

/// Why a transaction could not be queued
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// Queue is at capacity
    #[error("transaction queue is full")]
    Full,
    /// Hard transactions only come from the parent chain
    #[error("only soft transactions can be queued")]
    NotSoft,
    /// Failed the stateless checks
    #[error("invalid transaction: {0}")]
    InvalidShape(#[from] TxError),
}

/// Why a queued transaction never made it into a block
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TxRejected {
    /// Rejected by the state machine
    #[error(transparent)]
    Invalid(TxError),
    /// Dropped without a verdict
    #[error("transaction abandoned before inclusion")]
    Abandoned,
}

type Completion = Result<Hash, TxRejected>;

/// A queued soft transaction and its completion sender
#[derive(Debug)]
pub struct QueuedTransaction {
    tx: SoftTransaction,
    responder: oneshot::Sender<Completion>,
}

impl QueuedTransaction {
    /// Queued transaction
    pub const fn tx(&self) -> &SoftTransaction {
        &self.tx
    }

    /// Notify the submitter. A submitter that stopped waiting is ignored.
    pub fn resolve(self, completion: Completion) {
        let _ = self.responder.send(completion);
    }
}

/// Handle returned to a submitter
#[derive(Debug)]
pub struct PendingTransaction {
    message_hash: Hash,
    receiver: oneshot::Receiver<Completion>,
}

impl PendingTransaction {
    /// Message hash of the queued transaction
    pub const fn message_hash(&self) -> Hash {
        self.message_hash
    }

    /// Wait for the intermediate state root of the transaction's inclusion
    pub async fn wait(self) -> Completion {
        self.receiver.await.unwrap_or(Err(TxRejected::Abandoned))
    }
}

/// Bounded FIFO of soft transactions
#[derive(Debug)]
pub struct TransactionQueue {
    entries: Mutex<VecDeque<QueuedTransaction>>,
    capacity: usize,
}

impl TransactionQueue {
    /// Empty queue holding at most `capacity` entries
    pub fn new(capacity: usize) -> Self {
        Self { entries: Mutex::new(VecDeque::new()), capacity }
    }

    fn entries(&self) -> MutexGuard<'_, VecDeque<QueuedTransaction>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Shape-check and enqueue a soft transaction
    pub fn queue_transaction(&self, tx: Transaction) -> Result<PendingTransaction, QueueError> {
        let Transaction::Soft(tx) = tx else {
            return Err(QueueError::NotSoft);
        };
        tx.validate_shape()?;

        let mut entries = self.entries();
        if entries.len() >= self.capacity {
            return Err(QueueError::Full);
        }

        let (responder, receiver) = oneshot::channel();
        let message_hash = tx.message_hash();
        entries.push_back(QueuedTransaction { tx, responder });
        Ok(PendingTransaction { message_hash, receiver })
    }

    /// Remove up to `max` entries from the head
    pub fn take(&self, max: usize) -> Vec<QueuedTransaction> {
        let mut entries = self.entries();
        let count = max.min(entries.len());
        entries.drain(..count).collect()
    }

    /// Put entries previously returned by [`Self::take`] back at the head,
    /// keeping their order
    pub fn requeue_front(&self, taken: Vec<QueuedTransaction>) {
        let mut entries = self.entries();
        for entry in taken.into_iter().rev() {
            entries.push_front(entry);
        }
    }

    /// Number of queued transactions
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Whether nothing is queued
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use accrollup_core::tx::{HardDeposit, SoftWithdrawal};
    use accrollup_core::{Address, SignatureBytes, MAX_VALUE};

    use super::*;

    fn withdrawal(nonce: u32) -> Transaction {
        let mut tx = SoftWithdrawal::new(0, Address::ZERO, nonce, 1);
        tx.signature = SignatureBytes::repeat_byte(1);
        tx.into()
    }

    fn nonces(entries: &[QueuedTransaction]) -> Vec<u32> {
        entries.iter().map(|e| e.tx().nonce()).collect()
    }

    #[test]
    fn test_fifo_and_requeue() {
        let queue = TransactionQueue::new(10);
        for nonce in 0..5 {
            queue.queue_transaction(withdrawal(nonce)).unwrap();
        }

        let first = queue.take(2);
        assert_eq!(nonces(&first), vec![0, 1]);
        assert_eq!(queue.len(), 3);

        queue.requeue_front(first);
        assert_eq!(nonces(&queue.take(10)), vec![0, 1, 2, 3, 4]);
        assert!(queue.is_empty());
        assert!(queue.take(3).is_empty());
    }

    #[test]
    fn test_admission() {
        let queue = TransactionQueue::new(1);
        let hard: Transaction = HardDeposit::default().into();
        assert_eq!(queue.queue_transaction(hard).unwrap_err(), QueueError::NotSoft);

        let unsigned: Transaction = SoftWithdrawal::new(0, Address::ZERO, 0, 1).into();
        assert_eq!(
            queue.queue_transaction(unsigned).unwrap_err(),
            QueueError::InvalidShape(TxError::MissingSignature)
        );

        let mut too_large = withdrawal(0);
        if let Transaction::Soft(SoftTransaction::Withdrawal(tx)) = &mut too_large {
            tx.value = MAX_VALUE + 1;
        }
        assert!(matches!(
            queue.queue_transaction(too_large).unwrap_err(),
            QueueError::InvalidShape(TxError::ValueTooLarge(_))
        ));

        queue.queue_transaction(withdrawal(0)).unwrap();
        assert_eq!(queue.queue_transaction(withdrawal(1)).unwrap_err(), QueueError::Full);
    }

    #[tokio::test]
    async fn test_resolution() {
        let queue = TransactionQueue::new(10);
        let included = queue.queue_transaction(withdrawal(0)).unwrap();
        let rejected = queue.queue_transaction(withdrawal(1)).unwrap();
        let abandoned = queue.queue_transaction(withdrawal(2)).unwrap();

        let mut taken = queue.take(3).into_iter();
        taken.next().unwrap().resolve(Ok([5u8; 32]));
        taken.next().unwrap().resolve(Err(TxRejected::Invalid(TxError::InvalidSignature)));
        drop(taken);

        assert_eq!(included.wait().await, Ok([5u8; 32]));
        assert_eq!(rejected.wait().await, Err(TxRejected::Invalid(TxError::InvalidSignature)));
        assert_eq!(abandoned.wait().await, Err(TxRejected::Abandoned));
    }
}

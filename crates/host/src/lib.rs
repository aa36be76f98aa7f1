//! Host side of the ACCROLLUP execution layer
//!
//! Queues soft transactions, produces blocks on top of stored parents,
//! submits them to the parent chain and confirms them in order.

pub mod config;
pub mod error;
pub mod events;
pub mod parent;
pub mod queue;
pub mod sequencer;
pub mod store;

pub use config::Config;
pub use error::HostError;
pub use events::BlockEvent;
pub use parent::{MockParentChain, ParentChain};
pub use queue::{PendingTransaction, QueueError, QueuedTransaction, TransactionQueue, TxRejected};
pub use sequencer::{ConfirmationTask, Sequencer};
pub use store::{Database, KeyValueStore, MemoryStore};

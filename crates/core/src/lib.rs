//! ACCROLLUP execution core
//!
//! Accounts, the merkle-committed state, the hard and soft transaction
//! family, blocks and the state machine that turns a parent block plus a
//! batch of transactions into the next block. Synchronous and free of I/O,
//! shared by the sequencer host and any verifier.

pub mod account;
pub mod block;
mod codec;
pub mod error;
pub mod executor;
pub mod state;
pub mod tx;
pub mod types;

pub use account::Account;
pub use block::{Block, BlockCommitment, BlockHeader, BlockId, BlockTransactions};
pub use error::{DecodeError, ExecutionError, StateError, TxError};
pub use executor::{BlockExecution, BlockParams, Execution, SoftOutcome, StateMachine};
pub use state::{State, StateSnapshot};
pub use tx::{HardTransaction, SoftTransaction, Transaction, TxType};
pub use types::*;

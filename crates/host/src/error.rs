//! Host error type

use accrollup_core::{BlockId, ExecutionError, Hash};

use crate::queue::QueueError;

/// Errors from block production and confirmation
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// Block could not be executed
    #[error(transparent)]
    Execution(#[from] ExecutionError),
    /// Store read or write failed
    #[error("store: {0:#}")]
    Store(anyhow::Error),
    /// Parent chain call failed
    #[error("parent chain: {0:#}")]
    ParentChain(anyhow::Error),
    /// No such block
    #[error("block {0:?} not found")]
    BlockNotFound(BlockId),
    /// No state stored for the root
    #[error("state 0x{} not found", hex::encode(.0))]
    StateNotFound(Hash),
    /// Stored value could not be (de)serialized
    #[error("codec: {0}")]
    Codec(#[from] bincode::Error),
    /// Transaction could not be queued
    #[error(transparent)]
    Queue(#[from] QueueError),
}

//! Durable storage of blocks and states

use std::collections::HashMap;

use accrollup_core::{Block, BlockId, BlockNumber, ExecutionError, Hash, State, StateSnapshot};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::RwLock;

use crate::error::HostError;

/// Raw key/value storage
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Value under `key`
    async fn get(&self, key: &[u8]) -> anyhow::Result<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any previous value
    async fn put(&self, key: &[u8], value: Vec<u8>) -> anyhow::Result<()>;
}

/// In-memory [`KeyValueStore`]
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<Vec<u8>, Vec<u8>>>,
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &[u8]) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &[u8], value: Vec<u8>) -> anyhow::Result<()> {
        self.entries.write().await.insert(key.to_vec(), value);
        Ok(())
    }
}

const LATEST_KEY: &[u8] = b"latest";

fn block_key(hash: &Hash) -> Vec<u8> {
    format!("b/{}", hex::encode(hash)).into_bytes()
}

fn number_key(number: BlockNumber) -> Vec<u8> {
    format!("n/{number}").into_bytes()
}

fn state_key(root: &Hash) -> Vec<u8> {
    format!("s/{}", hex::encode(root)).into_bytes()
}

/// Typed access to blocks and states over a [`KeyValueStore`].
///
/// Genesis is implicit: block 0 and the empty state resolve without ever
/// being written.
#[derive(Debug)]
pub struct Database<S> {
    store: S,
    depth: usize,
}

impl<S: KeyValueStore> Database<S> {
    /// Wrap `store`; `depth` is the account tree depth of the genesis state
    pub fn new(store: S, depth: usize) -> Self {
        Self { store, depth }
    }

    async fn get_value<T: DeserializeOwned>(&self, key: &[u8]) -> Result<Option<T>, HostError> {
        match self.store.get(key).await.map_err(HostError::Store)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn put_value<T: Serialize>(&self, key: &[u8], value: &T) -> Result<(), HostError> {
        let bytes = bincode::serialize(value)?;
        self.store.put(key, bytes).await.map_err(HostError::Store)
    }

    /// Block 0 over the empty state
    pub fn genesis(&self) -> Block {
        Block::genesis(&State::new(self.depth))
    }

    /// Block by hash
    pub async fn get_block(&self, hash: &Hash) -> Result<Option<Block>, HostError> {
        if let Some(block) = self.get_value(&block_key(hash)).await? {
            return Ok(Some(block));
        }
        let genesis = self.genesis();
        Ok((genesis.hash() == *hash).then_some(genesis))
    }

    /// Block by number
    pub async fn get_block_by_number(&self, number: BlockNumber) -> Result<Option<Block>, HostError> {
        match self.get_value::<Hash>(&number_key(number)).await? {
            Some(hash) => self.get_block(&hash).await,
            None if number == 0 => Ok(Some(self.genesis())),
            None => Ok(None),
        }
    }

    /// Store a block under its hash and number; it becomes the latest block
    /// unless a higher one is already stored
    pub async fn put_block(&self, block: &Block) -> Result<(), HostError> {
        let hash = block.hash();
        self.put_value(&block_key(&hash), block).await?;
        self.put_value(&number_key(block.number()), &hash).await?;

        let newer = match self.latest_block().await? {
            Some(latest) => block.number() >= latest.number(),
            None => true,
        };
        if newer {
            self.put_value(LATEST_KEY, &hash).await?;
        }
        Ok(())
    }

    /// Highest stored block, if any
    pub async fn latest_block(&self) -> Result<Option<Block>, HostError> {
        match self.get_value::<Hash>(LATEST_KEY).await? {
            Some(hash) => self.get_block(&hash).await,
            None => Ok(None),
        }
    }

    /// Resolve `id`; `None` means the latest block, or genesis before any block
    pub async fn get_block_or_default(&self, id: Option<BlockId>) -> Result<Block, HostError> {
        let Some(id) = id else {
            return Ok(self.latest_block().await?.unwrap_or_else(|| self.genesis()));
        };
        let block = match id {
            BlockId::Hash(hash) => self.get_block(&hash).await?,
            BlockId::Number(number) => self.get_block_by_number(number).await?,
        };
        block.ok_or(HostError::BlockNotFound(id))
    }

    /// Load the state committed by `root`
    pub async fn get_state(&self, root: &Hash) -> Result<State, HostError> {
        match self.get_value::<StateSnapshot>(&state_key(root)).await? {
            Some(snapshot) => {
                State::from_snapshot(snapshot, root)
                    .map_err(|e| HostError::Execution(ExecutionError::from(e)))
            }
            None => {
                let empty = State::new(self.depth);
                if empty.root_hash() == *root {
                    Ok(empty)
                } else {
                    Err(HostError::StateNotFound(*root))
                }
            }
        }
    }

    /// Store a state under its root
    pub async fn put_state(&self, state: &State) -> Result<(), HostError> {
        self.put_value(&state_key(&state.root_hash()), &state.snapshot()).await
    }
}

#[cfg(test)]
mod tests {
    use accrollup_core::{Account, Address, BlockHeader, BlockTransactions};

    use super::*;

    fn database() -> Database<MemoryStore> {
        Database::new(MemoryStore::default(), 8)
    }

    fn block(number: BlockNumber) -> Block {
        let mut block = Block::new(
            BlockHeader { block_number: number, ..Default::default() },
            BlockTransactions::default(),
        );
        block.commit(u64::from(number) * 10);
        block
    }

    #[tokio::test]
    async fn test_implicit_genesis() {
        let db = database();
        let genesis = db.genesis();

        assert!(db.latest_block().await.unwrap().is_none());
        assert_eq!(db.get_block_or_default(None).await.unwrap(), genesis);
        assert_eq!(db.get_block_by_number(0).await.unwrap(), Some(genesis.clone()));
        assert_eq!(db.get_block(&genesis.hash()).await.unwrap(), Some(genesis.clone()));

        let state = db.get_state(&genesis.header.state_root).await.unwrap();
        assert_eq!(state.size(), 0);
        assert_eq!(state.depth(), 8);
    }

    #[tokio::test]
    async fn test_blocks_by_hash_and_number() {
        let db = database();
        let (first, second) = (block(1), block(2));
        db.put_block(&second).await.unwrap();
        db.put_block(&first).await.unwrap();

        assert_eq!(db.get_block(&first.hash()).await.unwrap(), Some(first.clone()));
        assert_eq!(db.get_block_by_number(2).await.unwrap(), Some(second.clone()));
        assert_eq!(db.latest_block().await.unwrap(), Some(second.clone()));
        assert_eq!(db.get_block_or_default(Some(BlockId::Number(1))).await.unwrap(), first);

        assert!(matches!(
            db.get_block_or_default(Some(BlockId::Number(3))).await,
            Err(HostError::BlockNotFound(BlockId::Number(3)))
        ));
        assert!(matches!(
            db.get_block_or_default(Some(BlockId::Hash([1u8; 32]))).await,
            Err(HostError::BlockNotFound(BlockId::Hash(_)))
        ));
    }

    #[tokio::test]
    async fn test_states_by_root() {
        let db = database();
        let mut state = State::new(8);
        state.put_account(Account::new(Address::repeat_byte(1), Address::repeat_byte(2), 10)).unwrap();
        db.put_state(&state).await.unwrap();

        let loaded = db.get_state(&state.root_hash()).await.unwrap();
        assert_eq!(loaded.accounts(), state.accounts());
        assert!(matches!(db.get_state(&[3u8; 32]).await, Err(HostError::StateNotFound(_))));
    }
}

//! Account state committed by an indexed merkle tree

use std::collections::HashMap;

use accrollup_smt::{IndexedMerkleTree, MerkleProof, TreeError, DEFAULT_TREE_DEPTH};
use serde::{Deserialize, Serialize};

use crate::account::Account;
use crate::error::StateError;
use crate::types::{AccountIndex, Address, Hash};

/// Accounts in creation order, their merkle tree and an address index.
///
/// Account `i` always sits at leaf `i`, and the reverse index maps each
/// address to exactly one account.
#[derive(Clone, Debug)]
pub struct State {
    tree: IndexedMerkleTree,
    accounts: Vec<Account>,
    index: HashMap<Address, AccountIndex>,
}

impl State {
    /// Create an empty state with `2^depth` account slots
    pub fn new(depth: usize) -> Self {
        Self {
            tree: IndexedMerkleTree::new(depth),
            accounts: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Rebuild a state from its accounts in index order
    pub fn from_accounts(depth: usize, accounts: Vec<Account>) -> Result<Self, StateError> {
        let mut index = HashMap::with_capacity(accounts.len());
        for (i, account) in accounts.iter().enumerate() {
            if index.insert(account.address, i as AccountIndex).is_some() {
                return Err(StateError::DuplicateAddress(account.address));
            }
        }

        let leaves = accounts.iter().map(Account::hash).collect();
        let tree = IndexedMerkleTree::from_leaves(depth, leaves)?;
        Ok(Self { tree, accounts, index })
    }

    /// Rebuild a state from a snapshot, checking it commits to `root`
    pub fn from_snapshot(snapshot: StateSnapshot, root: &Hash) -> Result<Self, StateError> {
        let state = Self::from_accounts(snapshot.depth, snapshot.accounts)?;
        let actual = state.root_hash();
        if &actual != root {
            return Err(StateError::RootMismatch { expected: *root, actual });
        }
        Ok(state)
    }

    /// Serializable copy of the accounts
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot { depth: self.depth(), accounts: self.accounts.clone() }
    }

    /// Number of accounts
    pub fn size(&self) -> u64 {
        self.accounts.len() as u64
    }

    /// Depth of the account tree
    pub const fn depth(&self) -> usize {
        self.tree.depth()
    }

    /// Maximum number of accounts
    pub const fn capacity(&self) -> u64 {
        self.tree.capacity()
    }

    /// Append a new account, returning its index
    pub fn put_account(&mut self, account: Account) -> Result<AccountIndex, StateError> {
        if self.index.contains_key(&account.address) {
            return Err(StateError::DuplicateAddress(account.address));
        }

        let index = self.tree.push(account.hash())? as AccountIndex;
        self.index.insert(account.address, index);
        self.accounts.push(account);
        Ok(index)
    }

    /// Overwrite the account at `index`; its address cannot change
    pub fn update_account(&mut self, index: AccountIndex, account: Account) -> Result<(), StateError> {
        let slot = self
            .accounts
            .get_mut(index as usize)
            .ok_or(TreeError::IndexOutOfRange { index: u64::from(index), size: self.tree.len() })?;
        if slot.address != account.address {
            return Err(StateError::AddressMismatch {
                index,
                expected: slot.address,
                actual: account.address,
            });
        }

        self.tree.update(u64::from(index), account.hash())?;
        *slot = account;
        Ok(())
    }

    /// Account at `index`
    pub fn get_account(&self, index: AccountIndex) -> Option<&Account> {
        self.accounts.get(index as usize)
    }

    /// Index of the account registered under `address`
    pub fn get_account_index_by_address(&self, address: &Address) -> Option<AccountIndex> {
        self.index.get(address).copied()
    }

    /// Root of the account tree
    pub fn root_hash(&self) -> Hash {
        self.tree.root()
    }

    /// Inclusion proof for the account at `index`
    pub fn proof(&self, index: AccountIndex) -> Option<MerkleProof> {
        self.tree.proof(u64::from(index))
    }

    /// All accounts in index order
    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new(DEFAULT_TREE_DEPTH)
    }
}

/// Persisted form of a [`State`]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Account tree depth
    pub depth: usize,
    /// Accounts in index order
    pub accounts: Vec<Account>,
}

#[cfg(test)]
mod tests {
    use accrollup_smt::Keccak256Hasher;

    use super::*;

    fn account(byte: u8, balance: u64) -> Account {
        Account::new(Address::repeat_byte(byte), Address::repeat_byte(byte + 100), balance)
    }

    #[test]
    fn test_empty_root() {
        let state = State::new(4);
        assert_eq!(state.size(), 0);
        assert_eq!(state.root_hash(), Keccak256Hasher::zero_hashes(4)[4]);
    }

    #[test]
    fn test_put_and_lookup() {
        let mut state = State::new(4);
        assert_eq!(state.put_account(account(1, 10)).unwrap(), 0);
        assert_eq!(state.put_account(account(2, 20)).unwrap(), 1);

        assert_eq!(state.size(), 2);
        assert_eq!(state.get_account(1).unwrap().balance, 20);
        assert_eq!(state.get_account_index_by_address(&Address::repeat_byte(2)), Some(1));
        assert_eq!(state.get_account_index_by_address(&Address::repeat_byte(3)), None);
        assert!(state.get_account(2).is_none());

        assert_eq!(
            state.put_account(account(1, 5)),
            Err(StateError::DuplicateAddress(Address::repeat_byte(1)))
        );
        assert_eq!(state.size(), 2);
    }

    #[test]
    fn test_update_changes_root() {
        let mut state = State::new(4);
        state.put_account(account(1, 10)).unwrap();
        let before = state.root_hash();

        let mut updated = state.get_account(0).unwrap().clone();
        updated.balance = 11;
        state.update_account(0, updated).unwrap();
        assert_ne!(state.root_hash(), before);

        let proof = state.proof(0).unwrap();
        assert_eq!(proof.leaf, state.get_account(0).unwrap().hash());
        assert!(proof.verify(&state.root_hash()));
    }

    #[test]
    fn test_update_errors() {
        let mut state = State::new(4);
        state.put_account(account(1, 10)).unwrap();

        assert_eq!(
            state.update_account(3, account(1, 0)),
            Err(StateError::Tree(TreeError::IndexOutOfRange { index: 3, size: 1 }))
        );
        assert!(matches!(
            state.update_account(0, account(2, 0)),
            Err(StateError::AddressMismatch { index: 0, .. })
        ));
    }

    #[test]
    fn test_capacity() {
        let mut state = State::new(1);
        state.put_account(account(1, 0)).unwrap();
        state.put_account(account(2, 0)).unwrap();
        assert_eq!(
            state.put_account(account(3, 0)),
            Err(StateError::Tree(TreeError::CapacityExceeded { capacity: 2 }))
        );
    }

    #[test]
    fn test_snapshot_restore() {
        let mut state = State::new(8);
        for byte in 1..6 {
            state.put_account(account(byte, u64::from(byte))).unwrap();
        }
        let root = state.root_hash();

        let restored = State::from_snapshot(state.snapshot(), &root).unwrap();
        assert_eq!(restored.root_hash(), root);
        assert_eq!(restored.accounts(), state.accounts());
        assert_eq!(restored.get_account_index_by_address(&Address::repeat_byte(4)), Some(3));

        assert!(matches!(
            State::from_snapshot(state.snapshot(), &[0u8; 32]),
            Err(StateError::RootMismatch { .. })
        ));
    }

    #[test]
    fn test_snapshot_with_bad_depth() {
        let snapshot = StateSnapshot { depth: 40, accounts: vec![account(1, 10)] };
        assert_eq!(
            State::from_snapshot(snapshot, &[0u8; 32]).unwrap_err(),
            StateError::Tree(TreeError::DepthTooLarge { depth: 40, max: 32 })
        );
    }
}

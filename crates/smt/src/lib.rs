//! Indexed Merkle tree for the ACCROLLUP account state
//!
//! This crate provides a fixed-depth binary Merkle tree whose leaves are
//! addressed by a dense integer index. Key features:
//! - Fixed depth: the root always commits to `2^depth` leaf slots
//! - Zero padding: empty slots hash to precomputed empty-subtree roots
//! - Incremental: every write rehashes exactly one leaf-to-root path
//! - Inclusion proofs for account leaves and for block transaction lists

mod hasher;
mod list;
mod proof;
mod tree;

pub use hasher::Keccak256Hasher;
pub use list::{list_proof, list_root};
pub use proof::MerkleProof;
pub use tree::{IndexedMerkleTree, TreeError};

/// 32-byte hash type
pub type Hash = [u8; 32];

/// Value of an empty leaf
pub const ZERO_HASH: Hash = [0u8; 32];

/// Largest supported tree depth (leaf indices are 32-bit on the wire)
pub const MAX_TREE_DEPTH: usize = 32;

/// Default depth of the account tree
pub const DEFAULT_TREE_DEPTH: usize = 32;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_tree() {
        let tree = IndexedMerkleTree::new(4);
        assert_eq!(tree.root(), Keccak256Hasher::zero_hashes(4)[4]);
    }

    #[test]
    fn test_insert_and_proof() {
        let mut tree = IndexedMerkleTree::new(DEFAULT_TREE_DEPTH);

        let leaf = Keccak256Hasher::hash(b"account");
        let index = tree.push(leaf).unwrap();

        let proof = tree.proof(index).unwrap();
        assert!(proof.verify(&tree.root()));
    }
}

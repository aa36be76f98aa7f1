//! Merkle inclusion proofs

use serde::{Deserialize, Serialize};

use crate::{hasher::Keccak256Hasher, Hash};

/// Inclusion proof for the leaf at `index`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    /// Position of the leaf
    pub index: u64,
    /// The leaf hash being proven
    pub leaf: Hash,
    /// Sibling hashes from leaf to root
    pub siblings: Vec<Hash>,
}

impl MerkleProof {
    /// Verify this proof against a root hash
    pub fn verify(&self, root: &Hash) -> bool {
        if self.siblings.len() < 64 && self.index >> self.siblings.len() != 0 {
            return false;
        }
        self.compute_root() == *root
    }

    /// Compute root from proof
    pub fn compute_root(&self) -> Hash {
        let mut current_hash = self.leaf;

        for (height, sibling) in self.siblings.iter().enumerate() {
            let is_right = (self.index >> height) & 1 == 1;

            current_hash = if is_right {
                Keccak256Hasher::hash_pair(sibling, &current_hash)
            } else {
                Keccak256Hasher::hash_pair(&current_hash, sibling)
            };
        }

        current_hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_index_outside_tree() {
        let proof = MerkleProof {
            index: 4,
            leaf: [1u8; 32],
            siblings: vec![[0u8; 32]; 2],
        };
        let root = proof.compute_root();
        assert!(!proof.verify(&root));
    }

    #[test]
    fn test_sibling_order() {
        let leaf = [1u8; 32];
        let sibling = [2u8; 32];
        let left = MerkleProof { index: 0, leaf, siblings: vec![sibling] };
        let right = MerkleProof { index: 1, leaf, siblings: vec![sibling] };
        assert_eq!(left.compute_root(), Keccak256Hasher::hash_pair(&leaf, &sibling));
        assert_eq!(right.compute_root(), Keccak256Hasher::hash_pair(&sibling, &leaf));
    }
}

//! Indexed Merkle tree implementation

use crate::{hasher::Keccak256Hasher, proof::MerkleProof, Hash, MAX_TREE_DEPTH};

/// Errors returned by tree writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    /// Every leaf slot is already allocated
    #[error("tree capacity of {capacity} leaves exceeded")]
    CapacityExceeded {
        /// Number of leaf slots of the tree
        capacity: u64,
    },
    /// Write to a slot that has not been allocated
    #[error("leaf index {index} out of range (size {size})")]
    IndexOutOfRange {
        /// Requested index
        index: u64,
        /// Number of allocated leaves
        size: u64,
    },
    /// Requested depth is above [`MAX_TREE_DEPTH`]
    #[error("tree depth {depth} exceeds {max}")]
    DepthTooLarge {
        /// Requested depth
        depth: usize,
        /// Largest supported depth
        max: usize,
    },
}

/// Fixed-depth binary Merkle tree with densely packed leaves.
///
/// `levels[0]` holds the leaf hashes, `levels[h]` the nodes at height `h`
/// that cover at least one allocated leaf. Nodes outside the allocated
/// range are never stored: they are the empty-subtree root for their height.
#[derive(Clone, Debug)]
pub struct IndexedMerkleTree {
    depth: usize,
    levels: Vec<Vec<Hash>>,
    zero: Vec<Hash>,
}

impl IndexedMerkleTree {
    /// Create an empty tree with `2^depth` leaf slots
    ///
    /// # Panics
    ///
    /// Panics if `depth` is greater than [`MAX_TREE_DEPTH`]. Use
    /// [`Self::try_new`] for untrusted depths.
    pub fn new(depth: usize) -> Self {
        assert!(depth <= MAX_TREE_DEPTH, "tree depth {depth} exceeds {MAX_TREE_DEPTH}");
        Self {
            depth,
            levels: vec![Vec::new(); depth + 1],
            zero: Keccak256Hasher::zero_hashes(depth),
        }
    }

    /// Create an empty tree, rejecting depths above [`MAX_TREE_DEPTH`]
    pub fn try_new(depth: usize) -> Result<Self, TreeError> {
        if depth > MAX_TREE_DEPTH {
            return Err(TreeError::DepthTooLarge { depth, max: MAX_TREE_DEPTH });
        }
        Ok(Self::new(depth))
    }

    /// Build a tree from leaf hashes in index order
    pub fn from_leaves(depth: usize, leaves: Vec<Hash>) -> Result<Self, TreeError> {
        let mut tree = Self::try_new(depth)?;
        if leaves.len() as u64 > tree.capacity() {
            return Err(TreeError::CapacityExceeded { capacity: tree.capacity() });
        }

        tree.levels[0] = leaves;
        for height in 0..depth {
            let zero = tree.zero[height];
            let parents = tree.levels[height]
                .chunks(2)
                .map(|pair| Keccak256Hasher::hash_pair(&pair[0], pair.get(1).unwrap_or(&zero)))
                .collect();
            tree.levels[height + 1] = parents;
        }
        Ok(tree)
    }

    /// Tree depth
    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// Number of leaf slots
    pub const fn capacity(&self) -> u64 {
        1u64 << self.depth
    }

    /// Number of allocated leaves
    pub fn len(&self) -> u64 {
        self.levels[0].len() as u64
    }

    /// Whether no leaf has been allocated
    pub fn is_empty(&self) -> bool {
        self.levels[0].is_empty()
    }

    /// Get the root hash
    pub fn root(&self) -> Hash {
        self.levels[self.depth].first().copied().unwrap_or(self.zero[self.depth])
    }

    /// Leaf hash at `index`
    pub fn leaf(&self, index: u64) -> Option<Hash> {
        self.levels[0].get(usize::try_from(index).ok()?).copied()
    }

    /// Append a leaf, returning its index
    pub fn push(&mut self, leaf: Hash) -> Result<u64, TreeError> {
        let index = self.len();
        if index >= self.capacity() {
            return Err(TreeError::CapacityExceeded { capacity: self.capacity() });
        }
        self.levels[0].push(leaf);
        self.rehash_path(index as usize);
        Ok(index)
    }

    /// Replace the leaf at `index`
    pub fn update(&mut self, index: u64, leaf: Hash) -> Result<(), TreeError> {
        let size = self.len();
        if index >= size {
            return Err(TreeError::IndexOutOfRange { index, size });
        }
        let index = index as usize;
        self.levels[0][index] = leaf;
        self.rehash_path(index);
        Ok(())
    }

    /// Generate an inclusion proof for the leaf at `index`
    pub fn proof(&self, index: u64) -> Option<MerkleProof> {
        let leaf = self.leaf(index)?;
        let mut position = index as usize;
        let mut siblings = Vec::with_capacity(self.depth);

        for height in 0..self.depth {
            siblings.push(self.node(height, position ^ 1));
            position >>= 1;
        }

        Some(MerkleProof { index, leaf, siblings })
    }

    /// Node hash at `height` and `position`, falling back to the empty subtree
    fn node(&self, height: usize, position: usize) -> Hash {
        self.levels[height].get(position).copied().unwrap_or(self.zero[height])
    }

    /// Recompute the hashes on the path from leaf `index` to the root
    fn rehash_path(&mut self, index: usize) {
        let mut position = index;

        for height in 0..self.depth {
            let parent = position >> 1;
            let left = self.node(height, parent << 1);
            let right = self.node(height, (parent << 1) | 1);
            let hash = Keccak256Hasher::hash_pair(&left, &right);

            let nodes = &mut self.levels[height + 1];
            if parent < nodes.len() {
                nodes[parent] = hash;
            } else {
                nodes.push(hash);
            }
            position = parent;
        }
    }
}

impl Default for IndexedMerkleTree {
    fn default() -> Self {
        Self::new(crate::DEFAULT_TREE_DEPTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(n: u8) -> Hash {
        Keccak256Hasher::hash(&[n])
    }

    #[test]
    fn test_two_leaf_root() {
        let mut tree = IndexedMerkleTree::new(2);
        tree.push(leaf(1)).unwrap();
        tree.push(leaf(2)).unwrap();

        let zero = Keccak256Hasher::zero_hashes(2);
        let left = Keccak256Hasher::hash_pair(&leaf(1), &leaf(2));
        let expected = Keccak256Hasher::hash_pair(&left, &zero[1]);
        assert_eq!(tree.root(), expected);
    }

    #[test]
    fn test_capacity_exceeded() {
        let mut tree = IndexedMerkleTree::new(1);
        assert_eq!(tree.push(leaf(0)), Ok(0));
        assert_eq!(tree.push(leaf(1)), Ok(1));
        assert_eq!(tree.push(leaf(2)), Err(TreeError::CapacityExceeded { capacity: 2 }));
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_depth_limit() {
        let too_deep = MAX_TREE_DEPTH + 8;
        let expected = TreeError::DepthTooLarge { depth: too_deep, max: MAX_TREE_DEPTH };
        assert_eq!(IndexedMerkleTree::try_new(too_deep).unwrap_err(), expected);
        assert_eq!(IndexedMerkleTree::from_leaves(too_deep, vec![leaf(0)]).unwrap_err(), expected);
        assert_eq!(IndexedMerkleTree::try_new(MAX_TREE_DEPTH).unwrap().depth(), MAX_TREE_DEPTH);
    }

    #[test]
    fn test_update_out_of_range() {
        let mut tree = IndexedMerkleTree::new(3);
        tree.push(leaf(0)).unwrap();
        assert_eq!(
            tree.update(1, leaf(1)),
            Err(TreeError::IndexOutOfRange { index: 1, size: 1 })
        );
    }

    #[test]
    fn test_update_changes_root() {
        let mut tree = IndexedMerkleTree::new(3);
        tree.push(leaf(0)).unwrap();
        tree.push(leaf(1)).unwrap();
        let before = tree.root();

        tree.update(0, leaf(9)).unwrap();
        assert_ne!(tree.root(), before);

        tree.update(0, leaf(0)).unwrap();
        assert_eq!(tree.root(), before);
    }

    #[test]
    fn test_from_leaves_matches_incremental() {
        let mut incremental = IndexedMerkleTree::new(4);
        let leaves: Vec<_> = (0..5).map(leaf).collect();
        for l in &leaves {
            incremental.push(*l).unwrap();
        }
        let bulk = IndexedMerkleTree::from_leaves(4, leaves).unwrap();
        assert_eq!(bulk.root(), incremental.root());
        assert_eq!(bulk.len(), 5);
    }

    #[test]
    fn test_proofs_for_every_leaf() {
        let mut tree = IndexedMerkleTree::new(4);
        for n in 0..7 {
            tree.push(leaf(n)).unwrap();
        }
        let root = tree.root();
        for index in 0..7 {
            let proof = tree.proof(index).unwrap();
            assert_eq!(proof.siblings.len(), 4);
            assert!(proof.verify(&root));
        }
        assert!(tree.proof(7).is_none());
    }
}

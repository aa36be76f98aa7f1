//! Keccak256 hasher for the account tree

use tiny_keccak::{Hasher, Keccak};

use crate::Hash;

/// Keccak256 hasher
#[derive(Debug, Clone, Copy)]
pub struct Keccak256Hasher;

impl Keccak256Hasher {
    /// Hash two 32-byte nodes together
    pub fn hash_pair(left: &Hash, right: &Hash) -> Hash {
        Self::hash_parts(&[left.as_slice(), right.as_slice()])
    }

    /// Hash a single value
    pub fn hash(data: &[u8]) -> Hash {
        Self::hash_parts(&[data])
    }

    /// Hash several byte slices as if they were concatenated
    pub fn hash_parts(parts: &[&[u8]]) -> Hash {
        let mut hasher = Keccak::v256();
        for part in parts {
            hasher.update(part);
        }
        let mut output = [0u8; 32];
        hasher.finalize(&mut output);
        output
    }

    /// Roots of empty subtrees for heights `0..=depth`.
    ///
    /// Height 0 is the empty leaf (all zero bytes).
    pub fn zero_hashes(depth: usize) -> Vec<Hash> {
        let mut zero = Vec::with_capacity(depth + 1);
        zero.push(crate::ZERO_HASH);
        for height in 0..depth {
            let below = zero[height];
            zero.push(Self::hash_pair(&below, &below));
        }
        zero
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_pair() {
        let left = [1u8; 32];
        let right = [2u8; 32];
        let hash = Keccak256Hasher::hash_pair(&left, &right);
        assert_ne!(hash, [0u8; 32]);
        assert_ne!(hash, Keccak256Hasher::hash_pair(&right, &left));
    }

    #[test]
    fn test_hash_parts_matches_concatenation() {
        let joined = [[1u8; 3].as_slice(), [7u8; 5].as_slice()].concat();
        assert_eq!(
            Keccak256Hasher::hash_parts(&[[1u8; 3].as_slice(), [7u8; 5].as_slice()]),
            Keccak256Hasher::hash(&joined)
        );
    }

    #[test]
    fn test_empty_keccak() {
        // keccak256("")
        assert_eq!(
            hex::encode(Keccak256Hasher::hash(&[])),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_zero_hashes_chain() {
        let zero = Keccak256Hasher::zero_hashes(3);
        assert_eq!(zero.len(), 4);
        assert_eq!(zero[0], [0u8; 32]);
        assert_eq!(zero[2], Keccak256Hasher::hash_pair(&zero[1], &zero[1]));
    }
}

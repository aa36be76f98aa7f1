//! Merkle root over a variable-length list of byte strings.
//!
//! Leaves are hashed with keccak256, odd nodes are paired with [`ZERO_HASH`].
//! Used for the transactions root of a block.

use crate::{hasher::Keccak256Hasher, proof::MerkleProof, Hash, ZERO_HASH};

/// Root of the list. An empty list has the zero root.
pub fn list_root<T: AsRef<[u8]>>(leaves: &[T]) -> Hash {
    let mut layer: Vec<Hash> = leaves.iter().map(|l| Keccak256Hasher::hash(l.as_ref())).collect();
    if layer.is_empty() {
        return ZERO_HASH;
    }
    while layer.len() > 1 {
        layer = next_layer(&layer);
    }
    layer[0]
}

/// Inclusion proof of `leaves[index]` against [`list_root`]
pub fn list_proof<T: AsRef<[u8]>>(leaves: &[T], index: usize) -> Option<MerkleProof> {
    let leaf = Keccak256Hasher::hash(leaves.get(index)?.as_ref());
    let mut layer: Vec<Hash> = leaves.iter().map(|l| Keccak256Hasher::hash(l.as_ref())).collect();
    let mut position = index;
    let mut siblings = Vec::new();

    while layer.len() > 1 {
        siblings.push(layer.get(position ^ 1).copied().unwrap_or(ZERO_HASH));
        layer = next_layer(&layer);
        position >>= 1;
    }

    Some(MerkleProof { index: index as u64, leaf, siblings })
}

fn next_layer(layer: &[Hash]) -> Vec<Hash> {
    layer
        .chunks(2)
        .map(|pair| Keccak256Hasher::hash_pair(&pair[0], pair.get(1).unwrap_or(&ZERO_HASH)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_and_single() {
        assert_eq!(list_root::<Vec<u8>>(&[]), ZERO_HASH);
        assert_eq!(list_root(&[b"tx"]), Keccak256Hasher::hash(b"tx"));

        let proof = list_proof(&[b"tx"], 0).unwrap();
        assert!(proof.siblings.is_empty());
        assert!(proof.verify(&list_root(&[b"tx"])));
    }

    #[test]
    fn test_odd_list_proofs() {
        let leaves: Vec<Vec<u8>> = (0u8..5).map(|n| vec![n; 10]).collect();
        let root = list_root(&leaves);
        for index in 0..leaves.len() {
            let proof = list_proof(&leaves, index).unwrap();
            assert_eq!(proof.siblings.len(), 3);
            assert!(proof.verify(&root));
        }
        assert!(list_proof(&leaves, 5).is_none());
    }
}

//! Balanced binary SHA-256 hash tree over an ordered block sequence.
//!
//! Leaves hash the blocks; internal nodes hash the concatenation of their
//! children. When a level has an odd count the unpaired node is promoted to
//! the next level unchanged (not duplicated), so a carried node contributes
//! no step to an inclusion proof.
//!
//! The tree is stored as flat levels (`levels[0]` = leaves, last level =
//! root); sibling and parent positions are implicit in the indices, so no
//! node pointers are needed.

use serde::{Deserialize, Serialize};

use crate::error::StreamError;
use crate::hashing;

/// Hash tree over an ordered sequence of byte blocks.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    levels: Vec<Vec<[u8; 32]>>,
}

/// One step of an inclusion proof: the sibling hash and which side it is on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    #[serde(with = "hex_bytes")]
    pub hash: [u8; 32],
    pub is_left: bool,
}

/// Inclusion proof for a single leaf, with the sibling path in leaf-to-root
/// order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InclusionProof {
    pub leaf_hash: [u8; 32],
    pub path: Vec<ProofStep>,
}

impl MerkleTree {
    /// Build a tree over the given blocks. At least one block is required.
    pub fn build<B: AsRef<[u8]>>(blocks: &[B]) -> Result<Self, StreamError> {
        if blocks.is_empty() {
            return Err(StreamError::InvalidInput(
                "no data blocks provided".to_string(),
            ));
        }

        let leaves: Vec<[u8; 32]> = blocks
            .iter()
            .map(|block| hashing::sha256(block.as_ref()))
            .collect();

        let mut levels = vec![leaves];
        while levels.last().expect("levels is non-empty").len() > 1 {
            let prev = levels.last().expect("levels is non-empty");
            let mut next = Vec::with_capacity(prev.len().div_ceil(2));
            for pair in prev.chunks(2) {
                match pair {
                    [left, right] => next.push(hash_pair(left, right)),
                    // Odd node: carried up unchanged.
                    [lone] => next.push(*lone),
                    _ => unreachable!("chunks(2) yields one or two elements"),
                }
            }
            levels.push(next);
        }

        Ok(Self { levels })
    }

    /// The root hash.
    pub fn root(&self) -> [u8; 32] {
        self.levels.last().expect("levels is non-empty")[0]
    }

    /// Number of leaves the tree was built over.
    pub fn leaf_count(&self) -> usize {
        self.levels[0].len()
    }

    /// Generate the inclusion proof for leaf `leaf_index`.
    pub fn prove(&self, leaf_index: usize) -> Result<InclusionProof, StreamError> {
        if leaf_index >= self.leaf_count() {
            return Err(StreamError::InvalidIndex(leaf_index));
        }

        let mut path = Vec::new();
        let mut index = leaf_index;
        // Walk every level below the root; the sibling of index i is i ^ 1.
        for level in &self.levels[..self.levels.len() - 1] {
            let sibling = index ^ 1;
            if sibling < level.len() {
                path.push(ProofStep {
                    hash: level[sibling],
                    is_left: sibling < index,
                });
            }
            index /= 2;
        }

        Ok(InclusionProof {
            leaf_hash: self.levels[0][leaf_index],
            path,
        })
    }
}

impl InclusionProof {
    /// Fold the sibling path from the leaf hash and compare against
    /// `expected_root`.
    pub fn verify(&self, expected_root: &[u8; 32]) -> bool {
        let mut current = self.leaf_hash;
        for step in &self.path {
            current = if step.is_left {
                hash_pair(&step.hash, &current)
            } else {
                hash_pair(&current, &step.hash)
            };
        }
        &current == expected_root
    }
}

fn hash_pair(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut combined = [0u8; 64];
    combined[..32].copy_from_slice(left);
    combined[32..].copy_from_slice(right);
    hashing::sha256(&combined)
}

/// Hex (de)serialization for 32-byte hashes, so proof paths persist as
/// `[{"hash": "<hex>", "is_left": bool}, ...]`.
mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(deserializer)?;
        let raw = hex::decode(&s).map_err(serde::de::Error::custom)?;
        raw.try_into()
            .map_err(|_| serde::de::Error::custom("expected a 32-byte hash"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blocks(n: usize) -> Vec<Vec<u8>> {
        (0..n).map(|i| format!("block-{i}").into_bytes()).collect()
    }

    #[test]
    fn empty_input_is_rejected() {
        let empty: Vec<Vec<u8>> = Vec::new();
        assert!(matches!(
            MerkleTree::build(&empty),
            Err(StreamError::InvalidInput(_))
        ));
    }

    #[test]
    fn single_leaf_root_is_leaf_hash() {
        let tree = MerkleTree::build(&[b"only".to_vec()]).unwrap();
        assert_eq!(tree.root(), hashing::sha256(b"only"));

        let proof = tree.prove(0).unwrap();
        assert!(proof.path.is_empty());
        assert!(proof.verify(&tree.root()));
    }

    #[test]
    fn two_leaves_root_hashes_concatenation() {
        let tree = MerkleTree::build(&blocks(2)).unwrap();
        let left = hashing::sha256(b"block-0");
        let right = hashing::sha256(b"block-1");
        assert_eq!(tree.root(), hash_pair(&left, &right));
    }

    #[test]
    fn every_leaf_proof_verifies() {
        for n in 1..=17 {
            let tree = MerkleTree::build(&blocks(n)).unwrap();
            let root = tree.root();
            for i in 0..n {
                let proof = tree.prove(i).unwrap();
                assert!(proof.verify(&root), "proof failed for leaf {i} of {n}");
            }
        }
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let tree = MerkleTree::build(&blocks(4)).unwrap();
        assert!(matches!(tree.prove(4), Err(StreamError::InvalidIndex(4))));
    }

    #[test]
    fn tampered_leaf_fails_verification() {
        let tree = MerkleTree::build(&blocks(8)).unwrap();
        let root = tree.root();

        let mut proof = tree.prove(3).unwrap();
        proof.leaf_hash = hashing::sha256(b"forged");
        assert!(!proof.verify(&root));
    }

    #[test]
    fn wrong_root_fails_verification() {
        let tree = MerkleTree::build(&blocks(5)).unwrap();
        let proof = tree.prove(2).unwrap();
        assert!(!proof.verify(&hashing::sha256(b"not the root")));
    }

    #[test]
    fn unpaired_leaf_has_shorter_path() {
        // With seven leaves the last leaf is carried up unpaired at the
        // bottom level and pairs at the next, so its path is exactly one
        // step shorter than the longest path in the tree.
        let tree = MerkleTree::build(&blocks(7)).unwrap();
        let root = tree.root();

        let max_len = (0..7).map(|i| tree.prove(i).unwrap().path.len()).max().unwrap();
        let last = tree.prove(6).unwrap();
        assert_eq!(last.path.len(), max_len - 1);
        assert!(last.verify(&root));
    }

    #[test]
    fn proof_path_round_trips_through_json() {
        let tree = MerkleTree::build(&blocks(6)).unwrap();
        let proof = tree.prove(1).unwrap();

        let blob = serde_json::to_string(&proof.path).unwrap();
        assert!(blob.contains("\"is_left\""));

        let path: Vec<ProofStep> = serde_json::from_str(&blob).unwrap();
        let restored = InclusionProof {
            leaf_hash: proof.leaf_hash,
            path,
        };
        assert!(restored.verify(&tree.root()));
    }

    #[test]
    fn sibling_direction_is_recorded() {
        let tree = MerkleTree::build(&blocks(2)).unwrap();

        // Leaf 0 is a left child: its sibling sits on the right.
        assert!(!tree.prove(0).unwrap().path[0].is_left);
        // Leaf 1 is a right child: its sibling sits on the left.
        assert!(tree.prove(1).unwrap().path[0].is_left);
    }
}

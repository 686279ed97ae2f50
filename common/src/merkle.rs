//! Keccak-256 Merkle distribution over a ranked balances list.
//!
//! Leaves are `keccak256(lowercase(address) ":" balance)` in balances file
//! order. Each level hashes adjacent pairs `keccak256(left || right)`; a
//! trailing odd node is paired with itself. A proof lists sibling hashes
//! from the leaf level upwards and is folded with the bits of the leaf
//! index, bit `i` clear meaning the running hash is the left operand.

use crate::output::write_json_atomic;
use crate::snapshot::{AddressBalance, SnapshotError};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Number;
use sha3::{Digest, Keccak256};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

pub type Hash32 = [u8; 32];

fn keccak(data: &[u8]) -> Hash32 {
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&Keccak256::digest(data));
    hash
}

/// Leaf commitment for one address and its balance string
pub fn hash_leaf(address: &str, balance: &str) -> Hash32 {
    let leaf = format!("{}:{}", address.to_lowercase(), balance);
    keccak(leaf.as_bytes())
}

/// Parent of two adjacent nodes
pub fn hash_pair(left: &Hash32, right: &Hash32) -> Hash32 {
    let mut input = [0u8; 64];
    input[..32].copy_from_slice(left);
    input[32..].copy_from_slice(right);
    keccak(&input)
}

/// Fold an inclusion proof from `leaf` up to the root it commits to
pub fn compute_inclusion_root(leaf: Hash32, index: u64, proof: &[Hash32]) -> Hash32 {
    proof.iter().enumerate().fold(leaf, |node, (i, sibling)| {
        if (index >> i) & 1 == 0 {
            hash_pair(&node, sibling)
        } else {
            hash_pair(sibling, &node)
        }
    })
}

/// Complete tree, every level kept so proofs are cheap
#[derive(Debug, Clone)]
pub struct MerkleTree {
    levels: Vec<Vec<Hash32>>,
}

impl MerkleTree {
    pub fn build(balances: &[AddressBalance]) -> Result<Self, SnapshotError> {
        Self::from_leaves(balances.iter().map(|b| hash_leaf(&b.address, &b.balance)).collect())
    }

    pub fn from_leaves(leaves: Vec<Hash32>) -> Result<Self, SnapshotError> {
        if leaves.is_empty() {
            return Err(SnapshotError::EmptyDistribution);
        }

        let mut levels = vec![leaves];
        while let Some(level) = levels.last().filter(|level| level.len() > 1) {
            let parents = level
                .chunks(2)
                .map(|pair| hash_pair(&pair[0], pair.get(1).unwrap_or(&pair[0])))
                .collect();
            levels.push(parents);
        }

        Ok(Self { levels })
    }

    pub fn root(&self) -> Hash32 {
        // Construction guarantees a final level holding exactly one node
        self.levels[self.levels.len() - 1][0]
    }

    pub fn leaves(&self) -> &[Hash32] {
        &self.levels[0]
    }

    pub fn len(&self) -> usize {
        self.levels[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels[0].is_empty()
    }

    /// Sibling hashes from the leaf level up, `None` past the last leaf
    pub fn proof(&self, index: usize) -> Option<Vec<Hash32>> {
        if index >= self.len() {
            return None;
        }

        let mut position = index;
        let mut proof = Vec::with_capacity(self.levels.len() - 1);
        for level in &self.levels[..self.levels.len() - 1] {
            let sibling = position ^ 1;
            proof.push(*level.get(sibling).unwrap_or(&level[position]));
            position /= 2;
        }

        Some(proof)
    }
}

// -----------------------------------------------------------------------------
// Output documents
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleLeaf {
    pub address: String,
    /// JSON number carrying the balance digits verbatim
    pub balance: Number,
    /// Hex leaf hash, no prefix
    pub hash: String,
}

/// Contents of the merkle root file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleRootDocument {
    pub merkle_root: String,
    pub leaves: Vec<MerkleLeaf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InclusionBranches {
    pub index: u64,
    pub proof: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    pub address: String,
    pub balance: Number,
    /// `0x`-prefixed hex leaf hash
    pub leaf_hash: String,
    pub inclusion_branches: InclusionBranches,
}

impl MerkleProof {
    /// Check this proof against a hex root
    pub fn verify(&self, merkle_root: &str) -> bool {
        let Some(root) = decode_hash(merkle_root) else {
            return false;
        };
        let Some(proof) = self
            .inclusion_branches
            .proof
            .iter()
            .map(|h| decode_hash(h))
            .collect::<Option<Vec<_>>>()
        else {
            return false;
        };

        let leaf = hash_leaf(&self.address, &self.balance.to_string());
        compute_inclusion_root(leaf, self.inclusion_branches.index, &proof) == root
    }
}

/// Balance text as a JSON number; the text must already be one, exactly
fn balance_number(entry: &AddressBalance) -> Result<Number, SnapshotError> {
    let invalid = || SnapshotError::InvalidBalance {
        address: entry.address.clone(),
        value: entry.balance.clone(),
    };
    if entry.balance.trim() != entry.balance {
        return Err(invalid());
    }
    entry.balance.parse::<Number>().map_err(|_| invalid())
}

fn decode_hash(text: &str) -> Option<Hash32> {
    let bytes = hex::decode(text.trim_start_matches("0x")).ok()?;
    bytes.try_into().ok()
}

/// Root document plus one proof per leaf
#[derive(Debug, Clone)]
pub struct MerkleDistribution {
    pub root: MerkleRootDocument,
    pub proofs: Vec<MerkleProof>,
}

impl MerkleDistribution {
    pub fn build(balances: &[AddressBalance]) -> Result<Self, SnapshotError> {
        let tree = MerkleTree::build(balances)?;
        let merkle_root = hex::encode(tree.root());
        info!(
            "Built Merkle tree over {} balances, root {}",
            tree.len(),
            merkle_root
        );

        let mut leaves = Vec::with_capacity(tree.len());
        let mut proofs = Vec::with_capacity(tree.len());
        for (index, (entry, leaf)) in balances.iter().zip(tree.leaves()).enumerate() {
            let hash = hex::encode(leaf);
            let proof = tree.proof(index).unwrap_or_default();
            let balance = balance_number(entry)?;

            proofs.push(MerkleProof {
                address: entry.address.clone(),
                balance: balance.clone(),
                leaf_hash: format!("0x{hash}"),
                inclusion_branches: InclusionBranches {
                    index: index as u64,
                    proof: proof.iter().map(hex::encode).collect(),
                },
            });
            leaves.push(MerkleLeaf {
                address: entry.address.clone(),
                balance,
                hash,
            });
        }

        Ok(Self {
            root: MerkleRootDocument {
                merkle_root,
                leaves,
            },
            proofs,
        })
    }

    /// Write the root document and the address-keyed proofs document
    pub fn write(&self, root_path: &Path, proofs_path: &Path) -> Result<(), SnapshotError> {
        write_json_atomic(root_path, &self.root)?;
        let by_address = self.proofs_by_address();
        write_json_atomic(proofs_path, &ProofsByAddress(&by_address))?;

        info!(
            "Saved Merkle root to {} and {} proofs to {}",
            root_path.display(),
            by_address.len(),
            proofs_path.display()
        );
        Ok(())
    }

    /// One proof per address in leaf order. A repeated address keeps the
    /// position of its first leaf and the proof of its last.
    pub fn proofs_by_address(&self) -> Vec<&MerkleProof> {
        let mut slots: HashMap<&str, usize> = HashMap::new();
        let mut ordered: Vec<&MerkleProof> = Vec::with_capacity(self.proofs.len());

        for proof in &self.proofs {
            match slots.get(proof.address.as_str()) {
                Some(&slot) => {
                    warn!(
                        "Address {} appears more than once, keeping its last proof",
                        proof.address
                    );
                    ordered[slot] = proof;
                }
                None => {
                    slots.insert(&proof.address, ordered.len());
                    ordered.push(proof);
                }
            }
        }

        ordered
    }
}

/// Serializes proofs as an object keyed by address
struct ProofsByAddress<'a>(&'a [&'a MerkleProof]);

impl Serialize for ProofsByAddress<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|p| (&p.address, p)))
    }
}

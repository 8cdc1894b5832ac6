use chrono::{DateTime, Utc};
use sardis_types::OrgId;
use serde::{Deserialize, Serialize};

/// Merkle tree sealed over a contiguous window of one org's entry hashes.
///
/// The root can later be committed to an external immutable reference; the
/// ledger treats that reference as opaque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MerkleBatch {
    pub org_id: OrgId,
    pub first_seq: u64,
    pub last_seq: u64,
    pub root: String,
    pub leaves: Vec<String>,
    pub sealed_at: DateTime<Utc>,
    pub anchor_reference: Option<String>,
}

impl MerkleBatch {
    pub fn seal(org_id: OrgId, first_seq: u64, last_seq: u64, leaves: Vec<String>) -> Self {
        let root = merkle_root(&leaves);
        Self {
            org_id,
            first_seq,
            last_seq,
            root,
            leaves,
            sealed_at: Utc::now(),
            anchor_reference: None,
        }
    }

    pub fn contains_leaf(&self, entry_hash: &str) -> bool {
        self.leaves.iter().any(|leaf| leaf == entry_hash)
    }

    /// Recompute the root from stored leaves and compare.
    pub fn root_matches(&self) -> bool {
        merkle_root(&self.leaves) == self.root
    }
}

/// Standard pairwise tree; an odd node is promoted unchanged. Empty input
/// hashes the empty string so sealing a zero-width window is still defined.
pub fn merkle_root(leaves: &[String]) -> String {
    if leaves.is_empty() {
        return blake3::hash(b"").to_hex().to_string();
    }
    let mut level: Vec<String> = leaves.to_vec();
    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len() / 2 + 1);
        for pair in level.chunks(2) {
            if pair.len() == 2 {
                let mut hasher = blake3::Hasher::new();
                hasher.update(pair[0].as_bytes());
                hasher.update(pair[1].as_bytes());
                next.push(hasher.finalize().to_hex().to_string());
            } else {
                next.push(pair[0].clone());
            }
        }
        level = next;
    }
    level.remove(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hashes(n: usize) -> Vec<String> {
        (0..n)
            .map(|i| blake3::hash(format!("leaf-{i}").as_bytes()).to_hex().to_string())
            .collect()
    }

    #[test]
    fn single_leaf_root_is_the_leaf() {
        let leaves = hashes(1);
        assert_eq!(merkle_root(&leaves), leaves[0]);
    }

    #[test]
    fn root_is_order_sensitive() {
        let leaves = hashes(4);
        let mut reversed = leaves.clone();
        reversed.reverse();
        assert_ne!(merkle_root(&leaves), merkle_root(&reversed));
    }

    #[test]
    fn odd_leaf_counts_are_handled() {
        let root = merkle_root(&hashes(5));
        assert_eq!(root.len(), 64);
    }

    #[test]
    fn sealed_batch_verifies_and_detects_leaf_swap() {
        let batch = MerkleBatch::seal(OrgId::parse("org_m1").unwrap(), 0, 3, hashes(4));
        assert!(batch.root_matches());

        let mut tampered = batch.clone();
        tampered.leaves[2] = blake3::hash(b"forged").to_hex().to_string();
        assert!(!tampered.root_matches());
    }
}

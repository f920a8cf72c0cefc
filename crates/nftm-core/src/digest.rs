//! SHA-256 merkle commitment over ledger state.
//!
//! Each ledger contributes one domain-separated leaf per state entry; the
//! tree duplicates an odd trailing leaf and hashes a fixed sentinel for the
//! empty state, so the root is defined for every reachable state and two
//! equal states always commit to the same root.

use sha2::{Digest, Sha256};

const EMPTY_STATE_SENTINEL: &[u8] = b"nftm-empty-state";

/// Reduce pre-hashed leaves to a single root.
pub fn merkle_root(leaves: Vec<[u8; 32]>) -> [u8; 32] {
    if leaves.is_empty() {
        return Sha256::digest(EMPTY_STATE_SENTINEL).into();
    }
    let mut level = leaves;
    while level.len() > 1 {
        let mut parents = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            let right = pair.get(1).unwrap_or(&pair[0]);
            let mut hasher = Sha256::new();
            hasher.update(b"node");
            hasher.update(pair[0]);
            hasher.update(right);
            parents.push(hasher.finalize().into());
        }
        level = parents;
    }
    level[0]
}

/// Render a root for display or storage.
pub fn to_hex(root: &[u8; 32]) -> String {
    hex::encode(root)
}

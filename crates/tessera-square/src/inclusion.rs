//! Blob placement geometry and share commitments.
//!
//! A blob's share commitment is the simple Merkle root over the namespaced
//! roots of the subtrees that cover its shares once placed in the square.
//! Because subtree boundaries depend only on the blob length and the subtree
//! root threshold, the commitment can be computed before the square exists.

use crate::error::SquareError;
use crate::merkle;
use crate::nmt::NamespacedMerkleTree;
use crate::shares::{sparse_shares_needed, split_sparse};
use tessera_types::blob::Blob;

pub fn round_up_power_of_two(n: usize) -> usize {
    n.max(1).next_power_of_two()
}

fn round_down_power_of_two(n: usize) -> usize {
    if n == 0 {
        return 0;
    }
    1 << (usize::BITS - 1 - n.leading_zeros())
}

/// Side of the smallest square that could hold `share_count` shares.
pub fn blob_min_square_size(share_count: usize) -> usize {
    let mut side = 1usize;
    while side * side < share_count {
        side *= 2;
    }
    side
}

/// Width of the subtrees a blob of `share_count` shares is committed over.
pub fn subtree_width(share_count: usize, subtree_root_threshold: usize) -> usize {
    let threshold = subtree_root_threshold.max(1);
    let per_threshold = round_up_power_of_two(share_count.div_ceil(threshold));
    per_threshold.min(blob_min_square_size(share_count))
}

/// Decomposes `total` leaves into a sequence of perfect subtrees of at most
/// `max_tree_size` leaves, largest first (a Merkle mountain range).
pub fn merkle_mountain_range_sizes(total: usize, max_tree_size: usize) -> Vec<usize> {
    let mut sizes = Vec::new();
    let mut remaining = total;
    while remaining > 0 {
        let size = round_down_power_of_two(remaining).min(max_tree_size.max(1));
        sizes.push(size);
        remaining -= size;
    }
    sizes
}

/// Share commitment of one blob.
pub fn create_commitment(blob: &Blob, subtree_root_threshold: usize) -> Result<[u8; 32], SquareError> {
    blob.namespace.validate_for_blob()?;
    let shares = split_sparse(&blob.namespace, blob.share_version, &blob.data);
    debug_assert_eq!(shares.len(), sparse_shares_needed(blob.data.len()));

    let width = subtree_width(shares.len(), subtree_root_threshold);
    let mut subtree_roots = Vec::new();
    let mut cursor = 0usize;
    for size in merkle_mountain_range_sizes(shares.len(), width) {
        let mut tree = NamespacedMerkleTree::new();
        for share in &shares[cursor..cursor + size] {
            tree.push(blob.namespace, share.as_bytes())?;
        }
        subtree_roots.push(tree.root().to_bytes());
        cursor += size;
    }
    Ok(merkle::hash_from_byte_slices(&subtree_roots))
}

pub fn create_commitments(blobs: &[Blob], subtree_root_threshold: usize) -> Result<Vec<[u8; 32]>, SquareError> {
    blobs
        .iter()
        .map(|blob| create_commitment(blob, subtree_root_threshold))
        .collect()
}

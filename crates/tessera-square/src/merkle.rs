//! RFC-6962 style binary Merkle tree over byte slices.
//!
//! Leaves are hashed as `sha256(0x00 || leaf)` and inner nodes as
//! `sha256(0x01 || left || right)`; the split point is the largest power of
//! two strictly less than the number of items.

use sha2::{Digest, Sha256};

const LEAF_PREFIX: u8 = 0;
const INNER_PREFIX: u8 = 1;

pub fn empty_hash() -> [u8; 32] {
    Sha256::digest(b"").into()
}

pub fn leaf_hash(leaf: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update([LEAF_PREFIX]);
    hasher.update(leaf);
    hasher.finalize().into()
}

pub fn inner_hash(left: &[u8], right: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update([INNER_PREFIX]);
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// Largest power of two strictly less than `n` (n >= 2).
pub(crate) fn split_point(n: usize) -> usize {
    let mut k = 1usize;
    while k * 2 < n {
        k *= 2;
    }
    k
}

pub fn hash_from_byte_slices<T: AsRef<[u8]>>(items: &[T]) -> [u8; 32] {
    match items.len() {
        0 => empty_hash(),
        1 => leaf_hash(items[0].as_ref()),
        n => {
            let k = split_point(n);
            let left = hash_from_byte_slices(&items[..k]);
            let right = hash_from_byte_slices(&items[k..]);
            inner_hash(&left, &right)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_point() {
        assert_eq!(split_point(2), 1);
        assert_eq!(split_point(3), 2);
        assert_eq!(split_point(4), 2);
        assert_eq!(split_point(5), 4);
        assert_eq!(split_point(9), 8);
    }

    #[test]
    fn test_known_shapes() {
        let items: Vec<&[u8]> = vec![b"a", b"b", b"c"];
        let ab = inner_hash(&leaf_hash(b"a"), &leaf_hash(b"b"));
        let expected = inner_hash(&ab, &leaf_hash(b"c"));
        assert_eq!(hash_from_byte_slices(&items), expected);
        assert_eq!(hash_from_byte_slices::<&[u8]>(&[]), empty_hash());
    }

    #[test]
    fn test_leaf_and_inner_domains_differ() {
        // A single leaf equal to the concatenation of two leaf hashes must not
        // collide with the two-leaf tree.
        let l = leaf_hash(b"x");
        let r = leaf_hash(b"y");
        let mut concat = l.to_vec();
        concat.extend_from_slice(&r);
        assert_ne!(hash_from_byte_slices(&[concat]), hash_from_byte_slices(&[b"x", b"y"]));
    }
}

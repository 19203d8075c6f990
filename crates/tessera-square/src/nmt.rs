// NAMESPACED MERKLE TREE
// Every node carries the minimum and maximum namespace of the leaves below
// it, so a root commits to the namespace range of its subtree:
//
//   node = min_ns (29) || max_ns (29) || sha256 digest (32)   = 90 bytes
//   leaf = sha256(0x00 || ns || data)
//   inner = sha256(0x01 || left node || right node)
//
// With ignore-max-namespace enabled, parity shares (the maximum namespace)
// do not widen the max namespace of a subtree that also holds real data.
//
// SAFETY INVARIANTS:
// 1. Leaves must be pushed in non-decreasing namespace order
// 2. Tree shape matches the RFC-6962 simple Merkle tree

use crate::error::SquareError;
use crate::merkle::split_point;
use sha2::{Digest, Sha256};
use tessera_types::appconsts::NAMESPACE_SIZE;
use tessera_types::namespace::Namespace;

pub const NODE_SIZE: usize = 2 * NAMESPACE_SIZE + 32;

const LEAF_PREFIX: u8 = 0;
const INNER_PREFIX: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NmtNode {
    pub min: Namespace,
    pub max: Namespace,
    pub digest: [u8; 32],
}

impl NmtNode {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(NODE_SIZE);
        out.extend_from_slice(self.min.as_bytes());
        out.extend_from_slice(self.max.as_bytes());
        out.extend_from_slice(&self.digest);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SquareError> {
        if bytes.len() != NODE_SIZE {
            return Err(SquareError::InvalidHeader(format!(
                "namespaced root must be {} bytes, got {}",
                NODE_SIZE,
                bytes.len()
            )));
        }
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&bytes[2 * NAMESPACE_SIZE..]);
        Ok(NmtNode {
            min: Namespace::from_slice(&bytes[..NAMESPACE_SIZE])?,
            max: Namespace::from_slice(&bytes[NAMESPACE_SIZE..2 * NAMESPACE_SIZE])?,
            digest,
        })
    }

    fn empty() -> Self {
        let zero = Namespace::from_raw([0u8; NAMESPACE_SIZE]);
        NmtNode {
            min: zero,
            max: zero,
            digest: Sha256::digest(b"").into(),
        }
    }
}

pub struct NamespacedMerkleTree {
    leaves: Vec<NmtNode>,
    ignore_max_namespace: bool,
    last_namespace: Option<Namespace>,
}

impl Default for NamespacedMerkleTree {
    fn default() -> Self {
        Self::new()
    }
}

impl NamespacedMerkleTree {
    /// Tree with ignore-max-namespace enabled, as used for square rows/columns.
    pub fn new() -> Self {
        NamespacedMerkleTree {
            leaves: Vec::new(),
            ignore_max_namespace: true,
            last_namespace: None,
        }
    }

    pub fn with_ignore_max_namespace(ignore: bool) -> Self {
        NamespacedMerkleTree {
            ignore_max_namespace: ignore,
            ..Self::new()
        }
    }

    pub fn push(&mut self, namespace: Namespace, data: &[u8]) -> Result<(), SquareError> {
        if let Some(previous) = self.last_namespace {
            if namespace < previous {
                return Err(SquareError::NamespaceOrder {
                    previous,
                    next: namespace,
                });
            }
        }
        let mut hasher = Sha256::new();
        hasher.update([LEAF_PREFIX]);
        hasher.update(namespace.as_bytes());
        hasher.update(data);
        self.leaves.push(NmtNode {
            min: namespace,
            max: namespace,
            digest: hasher.finalize().into(),
        });
        self.last_namespace = Some(namespace);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    pub fn root(&self) -> NmtNode {
        if self.leaves.is_empty() {
            return NmtNode::empty();
        }
        self.compute(&self.leaves)
    }

    fn compute(&self, nodes: &[NmtNode]) -> NmtNode {
        if nodes.len() == 1 {
            return nodes[0];
        }
        let k = split_point(nodes.len());
        let left = self.compute(&nodes[..k]);
        let right = self.compute(&nodes[k..]);
        self.combine(&left, &right)
    }

    fn combine(&self, left: &NmtNode, right: &NmtNode) -> NmtNode {
        let min = left.min.min(right.min);
        let max = if self.ignore_max_namespace && left.min == Namespace::PARITY_SHARE {
            Namespace::PARITY_SHARE
        } else if self.ignore_max_namespace && right.min == Namespace::PARITY_SHARE {
            left.max
        } else {
            left.max.max(right.max)
        };

        let mut hasher = Sha256::new();
        hasher.update([INNER_PREFIX]);
        hasher.update(left.to_bytes());
        hasher.update(right.to_bytes());
        NmtNode {
            min,
            max,
            digest: hasher.finalize().into(),
        }
    }
}

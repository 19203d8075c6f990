// NAMESPACES
// Every share in the data square carries a 29-byte namespace: one version
// byte followed by a 28-byte id. Rows and columns of the square are ordered by
// namespace so that namespaced Merkle proofs can show completeness.
//
// SAFETY INVARIANTS:
// 1. Reserved namespaces sort before (primary) or after (secondary) all user namespaces
// 2. User blobs may only use version-0 namespaces with the zero prefix
// 3. Ordering is plain byte ordering of the 29 raw bytes

use crate::appconsts::{NAMESPACE_ID_SIZE, NAMESPACE_SIZE, NAMESPACE_VERSION_ZERO_PREFIX_SIZE};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NamespaceError {
    #[error("Namespace sub-id too long: {0} bytes (max 10)")]
    SubIdTooLong(usize),

    #[error("Invalid namespace length: {0}")]
    InvalidLength(usize),

    #[error("Unsupported namespace version {0}")]
    UnsupportedVersion(u8),

    #[error("Namespace id missing the version-0 zero prefix")]
    MissingZeroPrefix,

    #[error("Namespace {0} is reserved")]
    Reserved(Namespace),
}

pub const NAMESPACE_VERSION_ZERO: u8 = 0;
pub const NAMESPACE_VERSION_MAX: u8 = 0xFF;
const SUB_ID_SIZE: usize = NAMESPACE_ID_SIZE - NAMESPACE_VERSION_ZERO_PREFIX_SIZE;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Namespace([u8; NAMESPACE_SIZE]);

const fn primary_reserved(last: u8) -> Namespace {
    let mut raw = [0u8; NAMESPACE_SIZE];
    raw[NAMESPACE_SIZE - 1] = last;
    Namespace(raw)
}

const fn secondary_reserved(last: u8) -> Namespace {
    let mut raw = [0xFFu8; NAMESPACE_SIZE];
    raw[NAMESPACE_SIZE - 1] = last;
    Namespace(raw)
}

impl Namespace {
    /// Ordinary (non-blob) transactions.
    pub const TX: Namespace = primary_reserved(0x01);
    /// Transactions that pay for blobs, wrapped with their share indexes.
    pub const PAY_FOR_BLOB: Namespace = primary_reserved(0x04);
    /// Padding between the reserved compact shares and the first blob.
    pub const PRIMARY_RESERVED_PADDING: Namespace = primary_reserved(0xFF);
    pub const MAX_PRIMARY_RESERVED: Namespace = primary_reserved(0xFF);
    pub const MIN_SECONDARY_RESERVED: Namespace = secondary_reserved(0x00);
    /// Padding after the last blob up to the end of the square.
    pub const TAIL_PADDING: Namespace = secondary_reserved(0xFE);
    /// Erasure-coded parity shares.
    pub const PARITY_SHARE: Namespace = secondary_reserved(0xFF);

    pub const fn from_raw(raw: [u8; NAMESPACE_SIZE]) -> Self {
        Namespace(raw)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, NamespaceError> {
        let raw: [u8; NAMESPACE_SIZE] = bytes
            .try_into()
            .map_err(|_| NamespaceError::InvalidLength(bytes.len()))?;
        Ok(Namespace(raw))
    }

    /// Version-0 namespace from a user sub-id of at most 10 bytes,
    /// left-padded with zeros.
    pub fn new_v0(sub_id: &[u8]) -> Result<Self, NamespaceError> {
        if sub_id.len() > SUB_ID_SIZE {
            return Err(NamespaceError::SubIdTooLong(sub_id.len()));
        }
        let mut raw = [0u8; NAMESPACE_SIZE];
        let start = NAMESPACE_SIZE - sub_id.len();
        raw[start..].copy_from_slice(sub_id);
        Ok(Namespace(raw))
    }

    pub fn version(&self) -> u8 {
        self.0[0]
    }

    pub fn id(&self) -> &[u8] {
        &self.0[1..]
    }

    pub fn as_bytes(&self) -> &[u8; NAMESPACE_SIZE] {
        &self.0
    }

    pub fn is_primary_reserved(&self) -> bool {
        *self <= Self::MAX_PRIMARY_RESERVED
    }

    pub fn is_secondary_reserved(&self) -> bool {
        *self >= Self::MIN_SECONDARY_RESERVED
    }

    pub fn is_reserved(&self) -> bool {
        self.is_primary_reserved() || self.is_secondary_reserved()
    }

    pub fn is_parity(&self) -> bool {
        *self == Self::PARITY_SHARE
    }

    /// Checks that a blob may be posted under this namespace.
    pub fn validate_for_blob(&self) -> Result<(), NamespaceError> {
        if self.version() != NAMESPACE_VERSION_ZERO {
            return Err(NamespaceError::UnsupportedVersion(self.version()));
        }
        if self.id()[..NAMESPACE_VERSION_ZERO_PREFIX_SIZE]
            .iter()
            .any(|b| *b != 0)
        {
            return Err(NamespaceError::MissingZeroPrefix);
        }
        if self.is_reserved() {
            return Err(NamespaceError::Reserved(*self));
        }
        Ok(())
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Namespace({})", hex::encode(self.0))
    }
}

//! Protocol constants, some of which are fixed per protocol version.
//!
//! Anything a validator must agree on byte-for-byte (share geometry, gas
//! schedule, size limits) is defined here so that every subsystem reads the
//! same value for a given [`ProtocolVersion`].

use crate::version::ProtocolVersion;

/// Denomination fees and stake are paid in.
pub const BOND_DENOM: &str = "utsr";

// === Share geometry ===

pub const SHARE_SIZE: usize = 512;
pub const NAMESPACE_VERSION_SIZE: usize = 1;
pub const NAMESPACE_ID_SIZE: usize = 28;
pub const NAMESPACE_SIZE: usize = NAMESPACE_VERSION_SIZE + NAMESPACE_ID_SIZE;
/// Leading zero bytes required in a version-0 namespace id.
pub const NAMESPACE_VERSION_ZERO_PREFIX_SIZE: usize = 18;
pub const SHARE_INFO_BYTES: usize = 1;
pub const SEQUENCE_LEN_BYTES: usize = 4;
pub const COMPACT_SHARE_RESERVED_BYTES: usize = 4;
/// Length prefix written before each unit in a compact share sequence.
pub const UNIT_LEN_BYTES: usize = 4;
pub const SHARE_VERSION_ZERO: u8 = 0;
pub const MAX_SHARE_VERSION: u8 = 127;

pub const FIRST_COMPACT_SHARE_CONTENT_SIZE: usize = SHARE_SIZE
    - NAMESPACE_SIZE
    - SHARE_INFO_BYTES
    - SEQUENCE_LEN_BYTES
    - COMPACT_SHARE_RESERVED_BYTES;
pub const CONTINUATION_COMPACT_SHARE_CONTENT_SIZE: usize =
    SHARE_SIZE - NAMESPACE_SIZE - SHARE_INFO_BYTES - COMPACT_SHARE_RESERVED_BYTES;
pub const FIRST_SPARSE_SHARE_CONTENT_SIZE: usize =
    SHARE_SIZE - NAMESPACE_SIZE - SHARE_INFO_BYTES - SEQUENCE_LEN_BYTES;
pub const CONTINUATION_SPARSE_SHARE_CONTENT_SIZE: usize =
    SHARE_SIZE - NAMESPACE_SIZE - SHARE_INFO_BYTES;

// === Square bounds ===

pub const MIN_SQUARE_SIZE: usize = 1;
/// Hard upper bound independent of governance (GF(2^8) allows 256 shards per
/// codeword, so an original width of 128 is the largest extendable row).
pub const HARD_MAX_SQUARE_SIZE: usize = 128;
pub const DEFAULT_GOV_MAX_SQUARE_SIZE: u64 = 64;

// === Gas & fees ===

pub const DEFAULT_TX_SIZE_COST_PER_BYTE: u64 = 10;
pub const DEFAULT_GAS_PER_BLOB_BYTE: u32 = 8;
pub const ED25519_VERIFY_COST: u64 = 590;
pub const DEFAULT_TX_SIG_LIMIT: u64 = 7;
pub const DEFAULT_MAX_MEMO_CHARACTERS: u64 = 256;
pub const PRIORITY_SCALING_FACTOR: u128 = 1_000_000;
/// Network-wide floor (utsr per gas unit) expressed as numerator/denominator.
pub const DEFAULT_NETWORK_MIN_GAS_PRICE: (u128, u128) = (1, 1_000_000);

// === Upgrades ===

/// Seconds per block targeted by each version; used to express the upgrade
/// delay as roughly seven days of blocks.
const SEVEN_DAYS_SECS: u64 = 7 * 24 * 60 * 60;

pub fn square_size_upper_bound(_version: ProtocolVersion) -> usize {
    HARD_MAX_SQUARE_SIZE
}

pub fn subtree_root_threshold(_version: ProtocolVersion) -> usize {
    64
}

/// Serialized transaction size ceiling. Enforced from [`MAX_TX_SIZE_FROM`].
pub fn max_tx_size(_version: ProtocolVersion) -> u64 {
    2 * 1024 * 1024
}

pub const MAX_TX_SIZE_FROM: ProtocolVersion = ProtocolVersion::V3;

/// First version whose fee check includes the network-wide minimum gas price.
pub const NETWORK_MIN_GAS_PRICE_FROM: ProtocolVersion = ProtocolVersion::V2;

/// Number of blocks between reaching quorum and activating the new version.
pub fn upgrade_height_delay(version: ProtocolVersion) -> u64 {
    if version >= ProtocolVersion::V3 {
        SEVEN_DAYS_SECS / 6
    } else {
        SEVEN_DAYS_SECS / 12
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_share_content_sizes() {
        assert_eq!(FIRST_COMPACT_SHARE_CONTENT_SIZE, 474);
        assert_eq!(CONTINUATION_COMPACT_SHARE_CONTENT_SIZE, 478);
        assert_eq!(FIRST_SPARSE_SHARE_CONTENT_SIZE, 478);
        assert_eq!(CONTINUATION_SPARSE_SHARE_CONTENT_SIZE, 482);
    }

    #[test]
    fn test_upgrade_delay_per_version() {
        assert_eq!(upgrade_height_delay(ProtocolVersion::V2), 50_400);
        assert_eq!(upgrade_height_delay(ProtocolVersion::V3), 100_800);
    }
}

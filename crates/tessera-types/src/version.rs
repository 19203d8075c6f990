// PROTOCOL VERSION
// The ruleset identifier agreed by consensus. Distinct from any module's
// internal schema version.
//
// SAFETY INVARIANTS:
// 1. Protocol versions never decrease on a running chain
// 2. Version changes happen only at end-of-block boundaries
// 3. All validators execute the same version at the same height

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("Invalid version format: {0}")]
    InvalidFormat(String),

    #[error("Downgrade not allowed: {0} → {1}")]
    DowngradeNotAllowed(ProtocolVersion, ProtocolVersion),

    #[error("Version must be at least 1")]
    Zero,
}

/// Monotonic protocol version number.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct ProtocolVersion(pub u64);

impl ProtocolVersion {
    pub const V1: ProtocolVersion = ProtocolVersion(1);
    pub const V2: ProtocolVersion = ProtocolVersion(2);
    pub const V3: ProtocolVersion = ProtocolVersion(3);
    pub const LATEST: ProtocolVersion = ProtocolVersion::V3;

    pub const fn new(v: u64) -> Self {
        ProtocolVersion(v)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    pub const fn next(self) -> Self {
        ProtocolVersion(self.0 + 1)
    }

    /// Accepts `"3"` or `"v3"`.
    pub fn parse(s: &str) -> Result<Self, VersionError> {
        let digits = s.trim().trim_start_matches('v');
        let v: u64 = digits
            .parse()
            .map_err(|_| VersionError::InvalidFormat(s.to_string()))?;
        if v == 0 {
            return Err(VersionError::Zero);
        }
        Ok(ProtocolVersion(v))
    }

    /// Rejects transitions that would move the chain backwards.
    pub fn can_upgrade_from(self, previous: ProtocolVersion) -> Result<(), VersionError> {
        if self < previous {
            return Err(VersionError::DowngradeNotAllowed(previous, self));
        }
        Ok(())
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl From<u64> for ProtocolVersion {
    fn from(v: u64) -> Self {
        ProtocolVersion(v)
    }
}

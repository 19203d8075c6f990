//! Per-version set of accepted message type identifiers.
//!
//! Built once at startup from the messages each active module registers for
//! its version range and never mutated afterwards. The admission gate and
//! the delivery-time message router both consult it.

use crate::version::ProtocolVersion;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcceptedMessageSet {
    by_version: BTreeMap<ProtocolVersion, BTreeSet<String>>,
}

impl AcceptedMessageSet {
    pub fn new(by_version: BTreeMap<ProtocolVersion, BTreeSet<String>>) -> Self {
        AcceptedMessageSet { by_version }
    }

    pub fn is_supported(&self, version: ProtocolVersion) -> bool {
        self.by_version.contains_key(&version)
    }

    pub fn is_accepted(&self, version: ProtocolVersion, type_url: &str) -> bool {
        self.by_version
            .get(&version)
            .is_some_and(|set| set.contains(type_url))
    }

    pub fn messages(&self, version: ProtocolVersion) -> Option<&BTreeSet<String>> {
        self.by_version.get(&version)
    }

    pub fn versions(&self) -> impl Iterator<Item = ProtocolVersion> + '_ {
        self.by_version.keys().copied()
    }
}

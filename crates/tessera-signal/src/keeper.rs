// UPGRADE COORDINATOR
// Per-validator version signals, power-weighted tally and the single pending
// upgrade record.
//
// SAFETY INVARIANTS:
// 1. Tallies use last-committed power, never intra-block power
// 2. Quorum requires at least ceil(5/6) of last-committed total power
// 3. At most one pending upgrade; signalling is closed while it exists
// 4. A scheduled version is strictly greater than the current version
// 5. Reset clears every signal and the pending record together

use crate::error::SignalError;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tessera_types::address::Address;
use tessera_types::appconsts;
use tessera_types::codec;
use tessera_types::msgs::MsgSignalVersion;
use tessera_types::store::KvStore;
use tessera_types::version::ProtocolVersion;

const SIGNAL_PREFIX: &[u8] = b"signal/version/";
const PENDING_UPGRADE_KEY: &[u8] = b"signal/pending";

/// Voting power as of the last committed block.
pub trait PowerSource: Send + Sync {
    /// `None` when the validator is not in the last-committed bonded set.
    fn last_validator_power(&self, store: &dyn KvStore, validator: &Address) -> Option<u64>;

    fn last_total_power(&self, store: &dyn KvStore) -> u64;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingUpgrade {
    pub version: ProtocolVersion,
    pub activation_height: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionTally {
    pub voting_power: u64,
    pub threshold_power: u64,
    pub total_voting_power: u64,
}

/// Smallest power that is at least five sixths of `total`.
pub fn quorum_threshold(total: u64) -> u64 {
    let threshold = (total as u128 * 5).div_ceil(6);
    threshold as u64
}

fn signal_key(validator: &Address) -> Vec<u8> {
    [SIGNAL_PREFIX, validator.as_bytes()].concat()
}

pub struct Keeper {
    powers: Arc<dyn PowerSource>,
    /// Replaces the per-version activation delay when set.
    upgrade_delay: Option<u64>,
}

impl Keeper {
    pub fn new(powers: Arc<dyn PowerSource>) -> Self {
        Keeper {
            powers,
            upgrade_delay: None,
        }
    }

    pub fn with_upgrade_delay(mut self, delay: Option<u64>) -> Self {
        self.upgrade_delay = delay;
        self
    }

    pub fn upgrade_delay(&self, current: ProtocolVersion) -> u64 {
        self.upgrade_delay
            .unwrap_or_else(|| appconsts::upgrade_height_delay(current))
    }

    /// Records (or overwrites) a validator's signalled version.
    pub fn signal_version(
        &self,
        store: &mut dyn KvStore,
        current: ProtocolVersion,
        msg: &MsgSignalVersion,
    ) -> Result<(), SignalError> {
        self.ensure_no_pending(store)?;
        let signalled = ProtocolVersion(msg.version);
        if signalled < current {
            return Err(SignalError::VersionBelowCurrent { signalled, current });
        }
        if self
            .powers
            .last_validator_power(store, &msg.validator_address)
            .is_none()
        {
            return Err(SignalError::UnknownValidator(msg.validator_address));
        }
        store.set(&signal_key(&msg.validator_address), msg.version.to_be_bytes().to_vec());
        debug!("Validator {} signalled {}", msg.validator_address, signalled);
        Ok(())
    }

    /// Every recorded signal, in validator address order.
    pub fn signals(&self, store: &dyn KvStore) -> Vec<(Address, ProtocolVersion)> {
        store
            .prefix_entries(SIGNAL_PREFIX)
            .into_iter()
            .filter_map(|(key, value)| {
                let validator = Address::from_slice(&key[SIGNAL_PREFIX.len()..])?;
                let version = u64::from_be_bytes(value.as_slice().try_into().ok()?);
                Some((validator, ProtocolVersion(version)))
            })
            .collect()
    }

    /// Power behind `version` among validators that are still bonded.
    pub fn version_tally(&self, store: &dyn KvStore, version: ProtocolVersion) -> VersionTally {
        let total_voting_power = self.powers.last_total_power(store);
        let voting_power = self
            .signals(store)
            .into_iter()
            .filter(|(_, signalled)| *signalled == version)
            .filter_map(|(validator, _)| self.powers.last_validator_power(store, &validator))
            .fold(0u64, |acc, p| acc.saturating_add(p));
        VersionTally {
            voting_power,
            threshold_power: quorum_threshold(total_voting_power),
            total_voting_power,
        }
    }

    /// Sums power per signalled version, pruning signals from validators
    /// that left the bonded set. Returns the version at quorum, if any.
    fn tally(&self, store: &mut dyn KvStore) -> Option<ProtocolVersion> {
        let mut power_by_version: BTreeMap<ProtocolVersion, u64> = BTreeMap::new();
        for (validator, version) in self.signals(store) {
            match self.powers.last_validator_power(store, &validator) {
                Some(power) => {
                    let entry = power_by_version.entry(version).or_default();
                    *entry = entry.saturating_add(power);
                }
                None => {
                    debug!("Pruning signal of exited validator {}", validator);
                    store.delete(&signal_key(&validator));
                }
            }
        }
        let threshold = quorum_threshold(self.powers.last_total_power(store));
        power_by_version
            .into_iter()
            .find(|(_, power)| *power >= threshold && *power > 0)
            .map(|(version, _)| version)
    }

    /// Schedules an upgrade if a version has reached quorum. `Ok(None)` means
    /// no version has enough power yet.
    pub fn try_upgrade(
        &self,
        store: &mut dyn KvStore,
        current: ProtocolVersion,
        height: u64,
    ) -> Result<Option<PendingUpgrade>, SignalError> {
        self.ensure_no_pending(store)?;
        let Some(quorum) = self.tally(store) else {
            return Ok(None);
        };
        if quorum <= current {
            return Err(SignalError::VersionNotGreater { quorum, current });
        }
        let pending = PendingUpgrade {
            version: quorum,
            activation_height: height.saturating_add(self.upgrade_delay(current)),
        };
        store.set(PENDING_UPGRADE_KEY, codec::encode(&pending)?);
        info!(
            "Upgrade to {} scheduled at height {}",
            pending.version, pending.activation_height
        );
        Ok(Some(pending))
    }

    pub fn pending_upgrade(&self, store: &dyn KvStore) -> Result<Option<PendingUpgrade>, SignalError> {
        store
            .get(PENDING_UPGRADE_KEY)
            .map(|raw| codec::decode(&raw))
            .transpose()
            .map_err(SignalError::from)
    }

    /// Target version once the pending upgrade's activation height is reached.
    pub fn should_upgrade(&self, store: &dyn KvStore, height: u64) -> Option<ProtocolVersion> {
        match self.pending_upgrade(store) {
            Ok(Some(pending)) if height >= pending.activation_height => Some(pending.version),
            Ok(_) => None,
            Err(e) => {
                warn!("Unreadable pending upgrade record: {}", e);
                None
            }
        }
    }

    /// Clears all signals and the pending record. Called by the host after it
    /// has applied the version change.
    pub fn reset_tally(&self, store: &mut dyn KvStore) {
        for (key, _) in store.prefix_entries(SIGNAL_PREFIX) {
            store.delete(&key);
        }
        store.delete(PENDING_UPGRADE_KEY);
        info!("Upgrade tally reset");
    }

    fn ensure_no_pending(&self, store: &dyn KvStore) -> Result<(), SignalError> {
        match self.pending_upgrade(store)? {
            Some(pending) => Err(SignalError::UpgradePending {
                version: pending.version,
                activation_height: pending.activation_height,
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quorum_threshold_rounds_up() {
        assert_eq!(quorum_threshold(120), 100);
        assert_eq!(quorum_threshold(6), 5);
        assert_eq!(quorum_threshold(7), 6);
        assert_eq!(quorum_threshold(1), 1);
        assert_eq!(quorum_threshold(0), 0);
        assert_eq!(quorum_threshold(u64::MAX), (u64::MAX as u128 * 5).div_ceil(6) as u64);
    }
}

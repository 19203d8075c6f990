//! Signalling, quorum and activation against a fixed validator set.

use std::collections::BTreeMap;
use std::sync::Arc;
use tessera_signal::*;
use tessera_types::address::Address;
use tessera_types::msgs::MsgSignalVersion;
use tessera_types::store::{KvStore, MemStore};
use tessera_types::version::ProtocolVersion;

const V1: ProtocolVersion = ProtocolVersion::V1;
const V2: ProtocolVersion = ProtocolVersion::V2;
const V3: ProtocolVersion = ProtocolVersion::V3;

/// Power table read from the store, so tests can remove validators.
struct StoredPowers;

fn power_key(validator: &Address) -> Vec<u8> {
    [b"power/".as_slice(), validator.as_bytes()].concat()
}

impl PowerSource for StoredPowers {
    fn last_validator_power(&self, store: &dyn KvStore, validator: &Address) -> Option<u64> {
        store
            .get(&power_key(validator))
            .map(|raw| u64::from_be_bytes(raw.try_into().unwrap()))
    }

    fn last_total_power(&self, store: &dyn KvStore) -> u64 {
        store
            .prefix_entries(b"power/")
            .into_iter()
            .map(|(_, raw)| u64::from_be_bytes(raw.try_into().unwrap()))
            .sum()
    }
}

fn validator(i: u8) -> Address {
    Address([i; 20])
}

/// Four validators with powers 40, 1, 59 and 20 (total 120).
fn setup() -> (Keeper, MemStore, BTreeMap<u64, Address>) {
    let mut store = MemStore::new();
    let mut by_power = BTreeMap::new();
    for (i, power) in [40u64, 1, 59, 20].into_iter().enumerate() {
        let address = validator(i as u8 + 1);
        store.set(&power_key(&address), power.to_be_bytes().to_vec());
        by_power.insert(power, address);
    }
    (Keeper::new(Arc::new(StoredPowers)), store, by_power)
}

fn signal(validator: Address, version: u64) -> MsgSignalVersion {
    MsgSignalVersion {
        validator_address: validator,
        version,
    }
}

#[test_log::test]
fn test_quorum_boundary_and_activation() {
    let (keeper, mut store, by_power) = setup();
    let keeper = keeper.with_upgrade_delay(Some(10));

    keeper.signal_version(&mut store, V1, &signal(by_power[&59], 2)).unwrap();
    keeper.signal_version(&mut store, V1, &signal(by_power[&40], 2)).unwrap();

    let tally = keeper.version_tally(&store, V2);
    assert_eq!(
        tally,
        VersionTally {
            voting_power: 99,
            threshold_power: 100,
            total_voting_power: 120
        }
    );
    assert_eq!(keeper.try_upgrade(&mut store, V1, 50).unwrap(), None);
    assert_eq!(keeper.pending_upgrade(&store).unwrap(), None);

    keeper.signal_version(&mut store, V1, &signal(by_power[&1], 2)).unwrap();
    assert_eq!(keeper.version_tally(&store, V2).voting_power, 100);

    let pending = keeper.try_upgrade(&mut store, V1, 51).unwrap().unwrap();
    assert_eq!(
        pending,
        PendingUpgrade {
            version: V2,
            activation_height: 61
        }
    );

    assert_eq!(keeper.should_upgrade(&store, 60), None);
    assert_eq!(keeper.should_upgrade(&store, 61), Some(V2));

    keeper.reset_tally(&mut store);
    assert_eq!(keeper.pending_upgrade(&store).unwrap(), None);
    assert!(keeper.signals(&store).is_empty());
    assert_eq!(keeper.should_upgrade(&store, 100), None);
}

#[test]
fn test_pending_upgrade_closes_voting() {
    let (keeper, mut store, by_power) = setup();
    for power in [59, 40, 1] {
        keeper.signal_version(&mut store, V1, &signal(by_power[&power], 2)).unwrap();
    }
    keeper.try_upgrade(&mut store, V1, 1).unwrap().unwrap();

    assert!(matches!(
        keeper.signal_version(&mut store, V1, &signal(by_power[&20], 2)),
        Err(SignalError::UpgradePending { .. })
    ));
    assert!(matches!(
        keeper.try_upgrade(&mut store, V1, 2),
        Err(SignalError::UpgradePending { .. })
    ));
}

#[test]
fn test_default_delay_per_version() {
    let (keeper, mut store, by_power) = setup();
    for power in [59, 40, 1] {
        keeper.signal_version(&mut store, V2, &signal(by_power[&power], 3)).unwrap();
    }
    let pending = keeper.try_upgrade(&mut store, V2, 1_000).unwrap().unwrap();
    assert_eq!(pending.version, V3);
    assert_eq!(pending.activation_height, 1_000 + 50_400);
}

#[test]
fn test_signal_validation() {
    let (keeper, mut store, by_power) = setup();
    assert_eq!(
        keeper.signal_version(&mut store, V2, &signal(by_power[&40], 1)),
        Err(SignalError::VersionBelowCurrent {
            signalled: V1,
            current: V2
        })
    );
    assert_eq!(
        keeper.signal_version(&mut store, V1, &signal(validator(9), 2)),
        Err(SignalError::UnknownValidator(validator(9)))
    );
}

#[test]
fn test_resignal_overwrites() {
    let (keeper, mut store, by_power) = setup();
    keeper.signal_version(&mut store, V1, &signal(by_power[&59], 3)).unwrap();
    keeper.signal_version(&mut store, V1, &signal(by_power[&59], 2)).unwrap();
    assert_eq!(keeper.signals(&store), vec![(by_power[&59], V2)]);
    assert_eq!(keeper.version_tally(&store, V3).voting_power, 0);
}

#[test]
fn test_quorum_at_current_version_is_rejected() {
    let (keeper, mut store, by_power) = setup();
    for power in [59, 40, 1] {
        keeper.signal_version(&mut store, V2, &signal(by_power[&power], 2)).unwrap();
    }
    assert_eq!(
        keeper.try_upgrade(&mut store, V2, 5),
        Err(SignalError::VersionNotGreater {
            quorum: V2,
            current: V2
        })
    );
}

#[test]
fn test_exited_validators_are_pruned() {
    let (keeper, mut store, by_power) = setup();
    keeper.signal_version(&mut store, V1, &signal(by_power[&20], 2)).unwrap();
    keeper.signal_version(&mut store, V1, &signal(by_power[&59], 2)).unwrap();

    store.delete(&power_key(&by_power[&20]));
    assert_eq!(keeper.version_tally(&store, V2).voting_power, 59);
    assert_eq!(keeper.signals(&store).len(), 2);

    assert_eq!(keeper.try_upgrade(&mut store, V1, 1).unwrap(), None);
    assert_eq!(keeper.signals(&store), vec![(by_power[&59], V2)]);
}

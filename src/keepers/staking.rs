// VALIDATOR POWER
// Live power changes with delegations during a block; the last-committed
// power only moves at end of block, when pending changes become validator
// updates. Upgrade tallies read the last-committed view.
//
// SAFETY INVARIANTS:
// 1. Last-committed power changes only in `apply_updates`
// 2. The last-committed total equals the sum of last-committed powers

use super::bank::BankKeeper;
use super::{get_u64, key, module_address, set_u64};
use crate::error::AppError;
use log::info;
use serde::{Deserialize, Serialize};
use tessera_signal::PowerSource;
use tessera_types::abci::ValidatorUpdate;
use tessera_types::address::Address;
use tessera_types::appconsts::BOND_DENOM;
use tessera_types::codec;
use tessera_types::coin::Coin;
use tessera_types::store::KvStore;

const VALIDATOR_PREFIX: &[u8] = b"staking/validator/";
const LAST_POWER_PREFIX: &[u8] = b"staking/last_power/";
const CHANGED_PREFIX: &[u8] = b"staking/changed/";
const LAST_TOTAL_POWER_KEY: &[u8] = b"staking/last_total_power";

pub const BONDED_POOL: &str = "bonded_pool";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    pub operator: Address,
    pub pub_key: Vec<u8>,
    /// Live power
    pub power: u64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StakingKeeper;

impl StakingKeeper {
    pub fn validator(&self, store: &dyn KvStore, operator: &Address) -> Option<Validator> {
        store
            .get(&key(&[VALIDATOR_PREFIX, operator.as_bytes()]))
            .and_then(|raw| codec::decode(&raw).ok())
    }

    pub fn validators(&self, store: &dyn KvStore) -> Vec<Validator> {
        store
            .prefix_entries(VALIDATOR_PREFIX)
            .into_iter()
            .filter_map(|(_, raw)| codec::decode(&raw).ok())
            .collect()
    }

    fn set_validator(&self, store: &mut dyn KvStore, validator: &Validator) -> Result<(), AppError> {
        store.set(
            &key(&[VALIDATOR_PREFIX, validator.operator.as_bytes()]),
            codec::encode(validator)?,
        );
        store.set(&key(&[CHANGED_PREFIX, validator.operator.as_bytes()]), Vec::new());
        Ok(())
    }

    /// Registers a validator at genesis with its power already committed.
    pub fn create_genesis_validator(&self, store: &mut dyn KvStore, validator: &Validator) -> Result<ValidatorUpdate, AppError> {
        self.set_validator(store, validator)?;
        store.delete(&key(&[CHANGED_PREFIX, validator.operator.as_bytes()]));
        set_u64(store, &key(&[LAST_POWER_PREFIX, validator.operator.as_bytes()]), validator.power);
        let total = get_u64(store, LAST_TOTAL_POWER_KEY);
        set_u64(store, LAST_TOTAL_POWER_KEY, total + validator.power);
        Ok(ValidatorUpdate {
            pub_key: validator.pub_key.clone(),
            power: validator.power,
        })
    }

    /// Bonds `amount` from `delegator` to `operator`, raising live power.
    pub fn delegate(
        &self,
        store: &mut dyn KvStore,
        bank: &BankKeeper,
        delegator: &Address,
        operator: &Address,
        amount: &Coin,
    ) -> Result<(), AppError> {
        if amount.denom != BOND_DENOM {
            return Err(AppError::InvalidDenom(amount.denom.clone()));
        }
        let mut validator = self
            .validator(store, operator)
            .ok_or(AppError::UnknownValidator(*operator))?;
        bank.send(store, delegator, &module_address(BONDED_POOL), std::slice::from_ref(amount))?;
        validator.power = validator.power.saturating_add(amount.amount);
        self.set_validator(store, &validator)
    }

    /// Commits pending power changes and returns them as validator updates.
    pub fn apply_updates(&self, store: &mut dyn KvStore) -> Vec<ValidatorUpdate> {
        let mut updates = Vec::new();
        for (changed_key, _) in store.prefix_entries(CHANGED_PREFIX) {
            store.delete(&changed_key);
            let Some(operator) = Address::from_slice(&changed_key[CHANGED_PREFIX.len()..]) else {
                continue;
            };
            let Some(validator) = self.validator(store, &operator) else {
                continue;
            };
            let last_key = key(&[LAST_POWER_PREFIX, operator.as_bytes()]);
            let previous = get_u64(store, &last_key);
            if previous == validator.power {
                continue;
            }
            set_u64(store, &last_key, validator.power);
            let total = get_u64(store, LAST_TOTAL_POWER_KEY);
            set_u64(store, LAST_TOTAL_POWER_KEY, total - previous + validator.power);
            info!("Validator {} power {} -> {}", operator, previous, validator.power);
            updates.push(ValidatorUpdate {
                pub_key: validator.pub_key,
                power: validator.power,
            });
        }
        updates
    }
}

impl PowerSource for StakingKeeper {
    fn last_validator_power(&self, store: &dyn KvStore, validator: &Address) -> Option<u64> {
        let power = get_u64(store, &key(&[LAST_POWER_PREFIX, validator.as_bytes()]));
        (power > 0).then_some(power)
    }

    fn last_total_power(&self, store: &dyn KvStore) -> u64 {
        get_u64(store, LAST_TOTAL_POWER_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_types::store::MemStore;

    const OPERATOR: Address = Address([9; 20]);
    const DELEGATOR: Address = Address([1; 20]);

    fn genesis(store: &mut MemStore) {
        StakingKeeper
            .create_genesis_validator(
                store,
                &Validator {
                    operator: OPERATOR,
                    pub_key: vec![9; 32],
                    power: 10,
                },
            )
            .unwrap();
    }

    #[test]
    fn test_last_power_moves_only_at_apply() {
        let mut store = MemStore::new();
        genesis(&mut store);
        BankKeeper.mint(&mut store, &DELEGATOR, &[Coin::new(50, BOND_DENOM)]);

        StakingKeeper
            .delegate(&mut store, &BankKeeper, &DELEGATOR, &OPERATOR, &Coin::new(5, BOND_DENOM))
            .unwrap();
        assert_eq!(StakingKeeper.validator(&store, &OPERATOR).unwrap().power, 15);
        assert_eq!(StakingKeeper.last_validator_power(&store, &OPERATOR), Some(10));
        assert_eq!(StakingKeeper.last_total_power(&store), 10);

        let updates = StakingKeeper.apply_updates(&mut store);
        assert_eq!(updates, vec![ValidatorUpdate { pub_key: vec![9; 32], power: 15 }]);
        assert_eq!(StakingKeeper.last_total_power(&store), 15);
        assert!(StakingKeeper.apply_updates(&mut store).is_empty());
    }

    #[test]
    fn test_delegate_to_unknown_validator() {
        let mut store = MemStore::new();
        let result = StakingKeeper.delegate(
            &mut store,
            &BankKeeper,
            &DELEGATOR,
            &Address([3; 20]),
            &Coin::new(5, BOND_DENOM),
        );
        assert_eq!(result, Err(AppError::UnknownValidator(Address([3; 20]))));
    }
}

// BALANCES & FEES
// Integer balances per (address, denom), fee collection and fee allowances.
//
// SAFETY INVARIANTS:
// 1. A transfer either moves every coin or none
// 2. Balances never go negative

use super::{get_u64, key, module_address, set_u64};
use crate::error::AppError;
use log::debug;
use tessera_ante::{AnteError, FeeExecutor};
use tessera_types::address::{Address, ADDRESS_LEN};
use tessera_types::appconsts::BOND_DENOM;
use tessera_types::coin::{amount_of, format_coins, Coin};
use tessera_types::msgs::Msg;
use tessera_types::store::KvStore;

const BALANCE_PREFIX: &[u8] = b"bank/balance/";
const ALLOWANCE_PREFIX: &[u8] = b"feegrant/allowance/";

pub const FEE_COLLECTOR: &str = "fee_collector";

fn balance_key(address: &Address, denom: &str) -> Vec<u8> {
    key(&[BALANCE_PREFIX, address.as_bytes(), b"/", denom.as_bytes()])
}

fn allowance_key(granter: &Address, grantee: &Address) -> Vec<u8> {
    key(&[ALLOWANCE_PREFIX, granter.as_bytes(), grantee.as_bytes()])
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BankKeeper;

impl BankKeeper {
    pub fn balance(&self, store: &dyn KvStore, address: &Address, denom: &str) -> u64 {
        get_u64(store, &balance_key(address, denom))
    }

    pub fn mint(&self, store: &mut dyn KvStore, address: &Address, coins: &[Coin]) {
        for coin in coins {
            let balance = self.balance(store, address, &coin.denom);
            set_u64(store, &balance_key(address, &coin.denom), balance.saturating_add(coin.amount));
        }
    }

    pub fn send(&self, store: &mut dyn KvStore, from: &Address, to: &Address, coins: &[Coin]) -> Result<(), AppError> {
        for coin in coins {
            let required = amount_of(coins, &coin.denom);
            let available = self.balance(store, from, &coin.denom);
            if available < required {
                return Err(AppError::InsufficientFunds {
                    address: *from,
                    denom: coin.denom.clone(),
                    available,
                    required,
                });
            }
        }
        for coin in coins {
            let from_balance = self.balance(store, from, &coin.denom);
            set_u64(store, &balance_key(from, &coin.denom), from_balance - coin.amount);
            let to_balance = self.balance(store, to, &coin.denom);
            set_u64(store, &balance_key(to, &coin.denom), to_balance.saturating_add(coin.amount));
        }
        debug!("Sent {} from {} to {}", format_coins(coins), from, to);
        Ok(())
    }

    /// Every non-zero balance, in key order.
    pub fn balances(&self, store: &dyn KvStore) -> Vec<(Address, Coin)> {
        store
            .prefix_entries(BALANCE_PREFIX)
            .into_iter()
            .filter_map(|(raw_key, raw)| {
                let rest = &raw_key[BALANCE_PREFIX.len()..];
                let address = Address::from_slice(rest.get(..ADDRESS_LEN)?)?;
                let denom = String::from_utf8(rest.get(ADDRESS_LEN + 1..)?.to_vec()).ok()?;
                let amount = u64::from_le_bytes(raw.try_into().ok()?);
                (amount > 0).then(|| (address, Coin::new(amount, denom)))
            })
            .collect()
    }

    /// Lets `grantee` spend up to `limit` of the bond denomination on fees
    /// paid by `granter`.
    pub fn grant_allowance(&self, store: &mut dyn KvStore, granter: &Address, grantee: &Address, limit: u64) {
        set_u64(store, &allowance_key(granter, grantee), limit);
    }

    pub fn allowance(&self, store: &dyn KvStore, granter: &Address, grantee: &Address) -> Option<u64> {
        store
            .has(&allowance_key(granter, grantee))
            .then(|| get_u64(store, &allowance_key(granter, grantee)))
    }
}

impl FeeExecutor for BankKeeper {
    fn deduct_fee(&self, store: &mut dyn KvStore, payer: &Address, fee: &[Coin]) -> Result<(), AnteError> {
        self.send(store, payer, &module_address(FEE_COLLECTOR), fee)
            .map_err(|_| AnteError::InsufficientFunds {
                address: *payer,
                fee: format_coins(fee),
            })
    }

    fn use_grant(
        &self,
        store: &mut dyn KvStore,
        granter: &Address,
        grantee: &Address,
        fee: &[Coin],
        _msgs: &[Msg],
    ) -> Result<(), AnteError> {
        let remaining = self
            .allowance(store, granter, grantee)
            .ok_or_else(|| AnteError::FeeGrant(format!("{} has no allowance from {}", grantee, granter)))?;
        if fee.iter().any(|c| c.denom != BOND_DENOM) {
            return Err(AnteError::FeeGrant(format!(
                "allowance only covers {}, fee is {}",
                BOND_DENOM,
                format_coins(fee)
            )));
        }
        let spent = amount_of(fee, BOND_DENOM);
        if spent > remaining {
            return Err(AnteError::FeeGrant(format!(
                "fee {} exceeds remaining allowance {}{}",
                format_coins(fee),
                remaining,
                BOND_DENOM
            )));
        }
        self.grant_allowance(store, granter, grantee, remaining - spent);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_types::store::MemStore;

    const A: Address = Address([1; 20]);
    const B: Address = Address([2; 20]);

    #[test]
    fn test_send_is_all_or_nothing() {
        let mut store = MemStore::new();
        BankKeeper.mint(&mut store, &A, &[Coin::new(100, "utsr"), Coin::new(5, "stake")]);
        let result = BankKeeper.send(&mut store, &A, &B, &[Coin::new(50, "utsr"), Coin::new(6, "stake")]);
        assert!(matches!(result, Err(AppError::InsufficientFunds { required: 6, .. })));
        assert_eq!(BankKeeper.balance(&store, &A, "utsr"), 100);

        BankKeeper.send(&mut store, &A, &B, &[Coin::new(50, "utsr")]).unwrap();
        assert_eq!(BankKeeper.balance(&store, &A, "utsr"), 50);
        assert_eq!(BankKeeper.balance(&store, &B, "utsr"), 50);
    }

    #[test]
    fn test_fee_grant_is_spent() {
        let mut store = MemStore::new();
        BankKeeper.grant_allowance(&mut store, &A, &B, 100);
        let fee = [Coin::new(60, "utsr")];
        BankKeeper.use_grant(&mut store, &A, &B, &fee, &[]).unwrap();
        assert_eq!(BankKeeper.allowance(&store, &A, &B), Some(40));
        assert!(matches!(
            BankKeeper.use_grant(&mut store, &A, &B, &fee, &[]),
            Err(AnteError::FeeGrant(_))
        ));
        assert!(BankKeeper.use_grant(&mut store, &B, &A, &fee, &[]).is_err());
    }
}

// ACCOUNTS
// Account records keyed by address, with monotonically assigned account
// numbers.

use super::{get_u64, key, set_u64};
use log::warn;
use tessera_ante::{Account, AccountKeeper};
use tessera_types::address::Address;
use tessera_types::codec;
use tessera_types::store::KvStore;

const ACCOUNT_PREFIX: &[u8] = b"auth/account/";
const NEXT_NUMBER_KEY: &[u8] = b"auth/next_account_number";

#[derive(Debug, Clone, Copy, Default)]
pub struct AuthKeeper;

impl AuthKeeper {
    /// Returns the existing account or creates one with the next number.
    pub fn ensure_account(&self, store: &mut dyn KvStore, address: &Address) -> Account {
        if let Some(account) = self.get_account(store, address) {
            return account;
        }
        let account_number = get_u64(store, NEXT_NUMBER_KEY);
        set_u64(store, NEXT_NUMBER_KEY, account_number + 1);
        let account = Account {
            address: *address,
            account_number,
            sequence: 0,
            public_key: None,
        };
        self.set_account(store, &account);
        account
    }

    pub fn accounts(&self, store: &dyn KvStore) -> Vec<Account> {
        store
            .prefix_entries(ACCOUNT_PREFIX)
            .into_iter()
            .filter_map(|(_, raw)| codec::decode(&raw).ok())
            .collect()
    }
}

impl AccountKeeper for AuthKeeper {
    fn get_account(&self, store: &dyn KvStore, address: &Address) -> Option<Account> {
        let raw = store.get(&key(&[ACCOUNT_PREFIX, address.as_bytes()]))?;
        match codec::decode(&raw) {
            Ok(account) => Some(account),
            Err(e) => {
                warn!("Unreadable account record for {}: {}", address, e);
                None
            }
        }
    }

    fn set_account(&self, store: &mut dyn KvStore, account: &Account) {
        match codec::encode(account) {
            Ok(raw) => store.set(&key(&[ACCOUNT_PREFIX, account.address.as_bytes()]), raw),
            Err(e) => warn!("Failed to encode account {}: {}", account.address, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_types::store::MemStore;

    #[test]
    fn test_account_numbers_increase() {
        let mut store = MemStore::new();
        let a = AuthKeeper.ensure_account(&mut store, &Address([1; 20]));
        let b = AuthKeeper.ensure_account(&mut store, &Address([2; 20]));
        let again = AuthKeeper.ensure_account(&mut store, &Address([1; 20]));
        assert_eq!((a.account_number, b.account_number), (0, 1));
        assert_eq!(again, a);
        assert_eq!(AuthKeeper.accounts(&store).len(), 2);
    }
}

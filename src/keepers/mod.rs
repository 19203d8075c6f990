//! Store-backed keepers standing in for the chain's business logic.
//!
//! Each keeper is stateless; every method reads and writes the overlay it is
//! handed, so effects are scoped to the transaction or block being executed.

pub mod auth;
pub mod bank;
pub mod ibc;
pub mod params;
pub mod staking;

pub use auth::AuthKeeper;
pub use bank::BankKeeper;
pub use ibc::IbcKeeper;
pub use params::{AuthParams, BlobParams, MinFeeParams, ParamsKeeper};
pub use staking::{StakingKeeper, Validator};

use std::sync::Arc;
use tessera_types::address::Address;
use tessera_types::store::KvStore;

/// Address of a module-owned account.
pub fn module_address(name: &str) -> Address {
    Address::from_pubkey(format!("module/{}", name).as_bytes())
}

/// Reads a little-endian `u64`, treating absent or malformed values as 0.
pub(crate) fn get_u64(store: &dyn KvStore, key: &[u8]) -> u64 {
    store
        .get(key)
        .and_then(|raw| raw.try_into().ok())
        .map(u64::from_le_bytes)
        .unwrap_or(0)
}

pub(crate) fn set_u64(store: &mut dyn KvStore, key: &[u8], value: u64) {
    store.set(key, value.to_le_bytes().to_vec());
}

pub(crate) fn key(parts: &[&[u8]]) -> Vec<u8> {
    parts.concat()
}

#[derive(Clone)]
pub struct Keepers {
    pub auth: Arc<AuthKeeper>,
    pub bank: Arc<BankKeeper>,
    pub params: Arc<ParamsKeeper>,
    pub staking: Arc<StakingKeeper>,
    pub ibc: Arc<IbcKeeper>,
    pub signal: Arc<tessera_signal::Keeper>,
}

impl Keepers {
    pub fn new(upgrade_height_delay: Option<u64>) -> Self {
        let staking = Arc::new(StakingKeeper);
        Keepers {
            auth: Arc::new(AuthKeeper),
            bank: Arc::new(BankKeeper),
            params: Arc::new(ParamsKeeper),
            signal: Arc::new(tessera_signal::Keeper::new(staking.clone()).with_upgrade_delay(upgrade_height_delay)),
            staking,
            ibc: Arc::new(IbcKeeper),
        }
    }
}

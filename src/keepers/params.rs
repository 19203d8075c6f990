// ON-CHAIN PARAMETERS
// Governance-controlled parameters, grouped by the module that owns them.
// Absent groups read as their defaults.

use super::module_address;
use crate::error::AppError;
use num_rational::Ratio;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tessera_ante::{AnteParams, ParamsProvider};
use tessera_types::address::Address;
use tessera_types::appconsts;
use tessera_types::codec;
use tessera_types::coin::parse_decimal;
use tessera_types::store::KvStore;

const AUTH_PARAMS_KEY: &[u8] = b"params/auth";
const BLOB_PARAMS_KEY: &[u8] = b"params/blob";
const MINFEE_PARAMS_KEY: &[u8] = b"params/minfee";
const AUTHORITY_KEY: &[u8] = b"params/authority";

/// Module whose address is the default parameter authority.
pub const AUTHORITY_MODULE: &str = "gov";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthParams {
    pub max_memo_characters: u64,
    pub tx_sig_limit: u64,
    pub tx_size_cost_per_byte: u64,
}

impl Default for AuthParams {
    fn default() -> Self {
        AuthParams {
            max_memo_characters: appconsts::DEFAULT_MAX_MEMO_CHARACTERS,
            tx_sig_limit: appconsts::DEFAULT_TX_SIG_LIMIT,
            tx_size_cost_per_byte: appconsts::DEFAULT_TX_SIZE_COST_PER_BYTE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobParams {
    pub gas_per_blob_byte: u32,
    pub gov_max_square_size: u64,
}

impl Default for BlobParams {
    fn default() -> Self {
        BlobParams {
            gas_per_blob_byte: appconsts::DEFAULT_GAS_PER_BLOB_BYTE,
            gov_max_square_size: appconsts::DEFAULT_GOV_MAX_SQUARE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinFeeParams {
    pub network_min_gas_price: Ratio<u128>,
}

impl Default for MinFeeParams {
    fn default() -> Self {
        let (numer, denom) = appconsts::DEFAULT_NETWORK_MIN_GAS_PRICE;
        MinFeeParams {
            network_min_gas_price: Ratio::new(numer, denom),
        }
    }
}

fn load<T: DeserializeOwned + Default>(store: &dyn KvStore, key: &[u8]) -> T {
    store
        .get(key)
        .and_then(|raw| codec::decode(&raw).ok())
        .unwrap_or_default()
}

fn save<T: Serialize>(store: &mut dyn KvStore, key: &[u8], value: &T) -> Result<(), AppError> {
    store.set(key, codec::encode(value)?);
    Ok(())
}

fn parse_u64(subspace: &str, key: &str, value: &str) -> Result<u64, AppError> {
    value
        .parse()
        .map_err(|_| AppError::InvalidParam(format!("{}/{} = {:?}", subspace, key, value)))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ParamsKeeper;

impl ParamsKeeper {
    pub fn auth(&self, store: &dyn KvStore) -> AuthParams {
        load(store, AUTH_PARAMS_KEY)
    }

    pub fn set_auth(&self, store: &mut dyn KvStore, params: &AuthParams) -> Result<(), AppError> {
        save(store, AUTH_PARAMS_KEY, params)
    }

    pub fn blob(&self, store: &dyn KvStore) -> BlobParams {
        load(store, BLOB_PARAMS_KEY)
    }

    pub fn has_blob(&self, store: &dyn KvStore) -> bool {
        store.has(BLOB_PARAMS_KEY)
    }

    pub fn set_blob(&self, store: &mut dyn KvStore, params: &BlobParams) -> Result<(), AppError> {
        save(store, BLOB_PARAMS_KEY, params)
    }

    pub fn minfee(&self, store: &dyn KvStore) -> MinFeeParams {
        load(store, MINFEE_PARAMS_KEY)
    }

    pub fn set_minfee(&self, store: &mut dyn KvStore, params: &MinFeeParams) -> Result<(), AppError> {
        save(store, MINFEE_PARAMS_KEY, params)
    }

    /// Address allowed to submit parameter updates.
    pub fn authority(&self, store: &dyn KvStore) -> Address {
        store
            .get(AUTHORITY_KEY)
            .and_then(|raw| Address::from_slice(&raw))
            .unwrap_or_else(|| module_address(AUTHORITY_MODULE))
    }

    pub fn set_authority(&self, store: &mut dyn KvStore, authority: &Address) {
        store.set(AUTHORITY_KEY, authority.as_bytes().to_vec());
    }

    /// Applies one governance parameter change.
    pub fn apply_change(&self, store: &mut dyn KvStore, subspace: &str, key: &str, value: &str) -> Result<(), AppError> {
        match (subspace, key) {
            ("auth", "MaxMemoCharacters") => {
                let mut params = self.auth(store);
                params.max_memo_characters = parse_u64(subspace, key, value)?;
                self.set_auth(store, &params)
            }
            ("auth", "TxSigLimit") => {
                let mut params = self.auth(store);
                params.tx_sig_limit = parse_u64(subspace, key, value)?;
                self.set_auth(store, &params)
            }
            ("auth", "TxSizeCostPerByte") => {
                let mut params = self.auth(store);
                params.tx_size_cost_per_byte = parse_u64(subspace, key, value)?;
                self.set_auth(store, &params)
            }
            ("blob", "GasPerBlobByte") => {
                let mut params = self.blob(store);
                params.gas_per_blob_byte = parse_u64(subspace, key, value)?
                    .try_into()
                    .map_err(|_| AppError::InvalidParam(format!("{}/{} = {:?}", subspace, key, value)))?;
                self.set_blob(store, &params)
            }
            ("blob", "GovMaxSquareSize") => {
                let mut params = self.blob(store);
                params.gov_max_square_size = parse_u64(subspace, key, value)?;
                self.set_blob(store, &params)
            }
            ("minfee", "NetworkMinGasPrice") => {
                let price = parse_decimal(value)
                    .map_err(|e| AppError::InvalidParam(format!("{}/{}: {}", subspace, key, e)))?;
                self.set_minfee(store, &MinFeeParams { network_min_gas_price: price })
            }
            _ => Err(AppError::InvalidParam(format!("unknown parameter {}/{}", subspace, key))),
        }
    }
}

impl ParamsProvider for ParamsKeeper {
    fn ante_params(&self, store: &dyn KvStore) -> AnteParams {
        let auth = self.auth(store);
        let blob = self.blob(store);
        let minfee = self.minfee(store);
        AnteParams {
            max_memo_characters: auth.max_memo_characters,
            tx_sig_limit: auth.tx_sig_limit,
            tx_size_cost_per_byte: auth.tx_size_cost_per_byte,
            gas_per_blob_byte: blob.gas_per_blob_byte,
            gov_max_square_size: blob.gov_max_square_size,
            network_min_gas_price: minfee.network_min_gas_price,
        }
    }
}

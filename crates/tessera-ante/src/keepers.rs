// COLLABORATORS
// Narrow interfaces through which admission reaches account, fee, parameter
// and relay state. Implementations read and write the overlay passed in, so
// every effect is scoped to the transaction being admitted.

use crate::error::AnteError;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use num_rational::Ratio;
use serde::{Deserialize, Serialize};
use tessera_types::address::Address;
use tessera_types::appconsts;
use tessera_types::coin::{Coin, DecCoin};
use tessera_types::msgs::Msg;
use tessera_types::store::KvStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub address: Address,
    pub account_number: u64,
    pub sequence: u64,
    /// Set the first time the account signs
    pub public_key: Option<Vec<u8>>,
}

pub trait AccountKeeper: Send + Sync {
    fn get_account(&self, store: &dyn KvStore, address: &Address) -> Option<Account>;

    fn set_account(&self, store: &mut dyn KvStore, account: &Account);
}

pub trait FeeExecutor: Send + Sync {
    /// Moves `fee` from `payer` to the fee collector.
    fn deduct_fee(&self, store: &mut dyn KvStore, payer: &Address, fee: &[Coin]) -> Result<(), AnteError>;

    /// Spends `fee` from the allowance `granter` gave `grantee` for `msgs`.
    fn use_grant(
        &self,
        store: &mut dyn KvStore,
        granter: &Address,
        grantee: &Address,
        fee: &[Coin],
        msgs: &[Msg],
    ) -> Result<(), AnteError>;
}

pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, public_key: &[u8], message: &[u8], signature: &[u8]) -> bool;
}

/// Ed25519 verification.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Verifier;

impl SignatureVerifier for Ed25519Verifier {
    fn verify(&self, public_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
        let Ok(key_bytes) = <[u8; 32]>::try_from(public_key) else {
            return false;
        };
        let Ok(key) = VerifyingKey::from_bytes(&key_bytes) else {
            return false;
        };
        let Ok(signature) = Signature::from_slice(signature) else {
            return false;
        };
        key.verify(message, &signature).is_ok()
    }
}

/// On-chain parameters admission depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnteParams {
    pub max_memo_characters: u64,
    pub tx_sig_limit: u64,
    pub tx_size_cost_per_byte: u64,
    pub gas_per_blob_byte: u32,
    pub gov_max_square_size: u64,
    /// Network-wide floor, in the bond denomination
    pub network_min_gas_price: Ratio<u128>,
}

impl Default for AnteParams {
    fn default() -> Self {
        let (numer, denom) = appconsts::DEFAULT_NETWORK_MIN_GAS_PRICE;
        AnteParams {
            max_memo_characters: appconsts::DEFAULT_MAX_MEMO_CHARACTERS,
            tx_sig_limit: appconsts::DEFAULT_TX_SIG_LIMIT,
            tx_size_cost_per_byte: appconsts::DEFAULT_TX_SIZE_COST_PER_BYTE,
            gas_per_blob_byte: appconsts::DEFAULT_GAS_PER_BLOB_BYTE,
            gov_max_square_size: appconsts::DEFAULT_GOV_MAX_SQUARE_SIZE,
            network_min_gas_price: Ratio::new(numer, denom),
        }
    }
}

impl AnteParams {
    pub fn network_min_gas_price_coin(&self) -> DecCoin {
        DecCoin::new(self.network_min_gas_price, appconsts::BOND_DENOM)
    }
}

pub trait ParamsProvider: Send + Sync {
    fn ante_params(&self, store: &dyn KvStore) -> AnteParams;
}

/// Cross-chain relay bookkeeping used to reject replays.
pub trait RelayTracker: Send + Sync {
    fn packet_received(&self, store: &dyn KvStore, channel: &str, sequence: u64) -> bool;

    fn client_height(&self, store: &dyn KvStore, client_id: &str) -> Option<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};

    #[test]
    fn test_ed25519_verifier() {
        let key = SigningKey::from_bytes(&[3u8; 32]);
        let sig = key.sign(b"payload").to_bytes();
        let pk = key.verifying_key().to_bytes();
        assert!(Ed25519Verifier.verify(&pk, b"payload", &sig));
        assert!(!Ed25519Verifier.verify(&pk, b"other", &sig));
        assert!(!Ed25519Verifier.verify(&pk[..31], b"payload", &sig));
        assert!(!Ed25519Verifier.verify(&pk, b"payload", &sig[..10]));
    }
}

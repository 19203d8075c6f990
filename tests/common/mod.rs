//! Shared fixtures: deterministic keys, a funded genesis and signed
//! transaction builders.

#![allow(dead_code)]

use ed25519_dalek::SigningKey;
use std::collections::BTreeMap;
use tessera::keepers::Validator;
use tessera::modules::{AuthGenesis, Balance, BankGenesis, StakingGenesis, AUTH, BANK, STAKING};
use tessera::{App, AppConfig, GenesisDoc};
use tessera_square::create_commitment;
use tessera_types::address::Address;
use tessera_types::appconsts::{self, BOND_DENOM};
use tessera_types::blob::{Blob, BlobTx};
use tessera_types::coin::Coin;
use tessera_types::msgs::{Msg, MsgPayForBlobs, MsgSend};
use tessera_types::namespace::Namespace;
use tessera_types::tx::{Fee, SignerInfo, Tx};
use tessera_types::version::ProtocolVersion;

pub const CHAIN_ID: &str = "tessera-test";
pub const GAS_LIMIT: u64 = 200_000;
/// Covers the default 0.002utsr mempool floor at `GAS_LIMIT`.
pub const FEE: u64 = 400;
pub const INITIAL_BALANCE: u64 = 1_000_000_000;
pub const VALIDATOR_POWER: u64 = 100;

pub struct TestAccount {
    pub key: SigningKey,
    pub address: Address,
    pub account_number: u64,
    pub sequence: u64,
}

impl TestAccount {
    pub fn new(seed: u8, account_number: u64) -> Self {
        let key = SigningKey::from_bytes(&[seed; 32]);
        let address = Address::from_pubkey(key.verifying_key().as_bytes());
        TestAccount {
            key,
            address,
            account_number,
            sequence: 0,
        }
    }

    pub fn public_key(&self) -> Vec<u8> {
        self.key.verifying_key().to_bytes().to_vec()
    }

    /// Signs `msgs` at the account's current sequence, then advances it.
    pub fn sign(&mut self, msgs: Vec<Msg>, fee: u64) -> Tx {
        let mut tx = Tx::new(
            msgs,
            Fee {
                amount: vec![Coin::new(fee, BOND_DENOM)],
                gas_limit: GAS_LIMIT,
                payer: None,
                granter: None,
            },
            vec![SignerInfo {
                public_key: self.public_key(),
                sequence: self.sequence,
            }],
        );
        tx.sign(CHAIN_ID, &[(&self.key, self.account_number)]).unwrap();
        self.sequence += 1;
        tx
    }

    pub fn send(&mut self, to: &Address, amount: u64) -> Vec<u8> {
        let msg = Msg::Send(MsgSend {
            from_address: self.address,
            to_address: *to,
            amount: vec![Coin::new(amount, BOND_DENOM)],
        });
        self.sign(vec![msg], FEE).encode().unwrap()
    }

    /// A blob transaction paying for one blob of `data` under `sub_id`.
    pub fn blob(&mut self, sub_id: &[u8], data: Vec<u8>, version: ProtocolVersion) -> Vec<u8> {
        let blob = Blob::new(Namespace::new_v0(sub_id).unwrap(), data);
        let commitment = create_commitment(&blob, appconsts::subtree_root_threshold(version)).unwrap();
        let msg = Msg::PayForBlobs(MsgPayForBlobs {
            signer: self.address,
            namespaces: vec![blob.namespace],
            blob_sizes: vec![blob.data.len() as u32],
            share_commitments: vec![commitment.to_vec()],
            share_versions: vec![blob.share_version as u32],
        });
        let tx = self.sign(vec![msg], FEE);
        BlobTx {
            tx: tx.encode().unwrap(),
            blobs: vec![blob],
        }
        .marshal()
        .unwrap()
    }
}

/// `users` funded accounts followed by `validators` validator operators,
/// numbered in that order.
pub struct Network {
    pub users: Vec<TestAccount>,
    pub validators: Vec<TestAccount>,
}

impl Network {
    pub fn new(users: u8, validators: u8) -> Self {
        let users: Vec<TestAccount> = (0..users).map(|i| TestAccount::new(i + 1, i as u64)).collect();
        let offset = users.len() as u64;
        let validators = (0..validators)
            .map(|i| TestAccount::new(100 + i, offset + i as u64))
            .collect();
        Network { users, validators }
    }

    fn all(&self) -> impl Iterator<Item = &TestAccount> {
        self.users.iter().chain(self.validators.iter())
    }

    pub fn genesis(&self, version: ProtocolVersion) -> GenesisDoc {
        let auth = AuthGenesis {
            params: Default::default(),
            accounts: self.all().map(|a| a.address).collect(),
        };
        let bank = BankGenesis {
            balances: self
                .all()
                .map(|a| Balance {
                    address: a.address,
                    coins: vec![Coin::new(INITIAL_BALANCE, BOND_DENOM)],
                })
                .collect(),
        };
        let staking = StakingGenesis {
            validators: self
                .validators
                .iter()
                .map(|v| Validator {
                    operator: v.address,
                    pub_key: v.public_key(),
                    power: VALIDATOR_POWER,
                })
                .collect(),
        };

        let mut app_state = BTreeMap::new();
        app_state.insert(AUTH.to_string(), serde_json::to_value(auth).unwrap());
        app_state.insert(BANK.to_string(), serde_json::to_value(bank).unwrap());
        app_state.insert(STAKING.to_string(), serde_json::to_value(staking).unwrap());
        GenesisDoc {
            chain_id: CHAIN_ID.to_string(),
            app_version: version,
            app_state,
        }
    }
}

pub fn config() -> AppConfig {
    AppConfig {
        chain_id: CHAIN_ID.to_string(),
        ..AppConfig::default()
    }
}

pub fn new_app(network: &Network, version: ProtocolVersion, config: AppConfig) -> App {
    let mut app = App::new(config).unwrap();
    app.init_chain(&network.genesis(version)).unwrap();
    app
}

/// Prepares, validates, executes and commits one block; returns the
/// prepared proposal and the committed app hash.
pub fn run_block(app: &mut App, txs: &[Vec<u8>]) -> (tessera::PreparedProposal, [u8; 32]) {
    let height = app.last_height() + 1;
    let prepared = app.prepare_proposal(txs, u64::MAX, height).unwrap();
    let status = app.process_proposal(&tessera::ProcessProposal {
        height,
        proposer: Address::default(),
        txs: prepared.txs.clone(),
        square_size: prepared.square_size,
        data_root: prepared.data_root,
    });
    assert_eq!(status, tessera::ProposalStatus::Accept);

    app.begin_block(height).unwrap();
    for raw in &prepared.txs {
        app.deliver_tx(raw).unwrap();
    }
    app.end_block().unwrap();
    let commit = app.commit().unwrap();
    (prepared, commit.app_hash)
}

// APPLICATION
// The state machine behind the host consensus engine's callbacks. Owns the
// committed store, the module manager, the admission pipeline and the
// upgrade coordinator.
//
// SAFETY INVARIANTS:
// 1. Block execution runs on a block-scoped overlay merged only by `commit`
// 2. The protocol version changes only at end of block
// 3. Mempool admission never touches the block overlay or committed state
// 4. A module consistency violation halts the node

use crate::config::AppConfig;
use crate::error::AppError;
use crate::keepers::{self, Keepers};
use crate::modules;
use crate::router::MsgRouter;
use log::info;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tessera_ante::{Account, AccountKeeper, AnteContext, AnteDeps, AnteHandler, AnteOutcome, Ed25519Verifier, ExecMode};
use tessera_modules::{store_version_map, Configurator, ManagerError, ModuleContext, ModuleManager};
use tessera_signal::PendingUpgrade;
use tessera_square::validate_blob_tx;
use tessera_types::abci::{Event, ValidatorUpdate};
use tessera_types::accepted::AcceptedMessageSet;
use tessera_types::address::Address;
use tessera_types::appconsts;
use tessera_types::blob::{unmarshal_blob_tx, BlobTx};
use tessera_types::coin::DecCoin;
use tessera_types::store::{BlockStore, CacheStore, Changeset, KvStore, MemStore};
use tessera_types::tx::Tx;
use tessera_types::version::ProtocolVersion;

const APP_VERSION_KEY: &[u8] = b"app/version";
const APP_HEIGHT_KEY: &[u8] = b"app/height";

/// Chain genesis as handed over by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenesisDoc {
    pub chain_id: String,
    #[serde(default = "initial_version")]
    pub app_version: ProtocolVersion,
    /// Module name → module genesis state
    #[serde(default)]
    pub app_state: BTreeMap<String, Value>,
}

fn initial_version() -> ProtocolVersion {
    ProtocolVersion::V1
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutcome {
    pub gas_wanted: u64,
    pub gas_used: u64,
    pub priority: u64,
    pub events: Vec<Event>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndBlockResponse {
    pub events: Vec<Event>,
    pub validator_updates: Vec<ValidatorUpdate>,
    /// Version the next block runs
    pub app_version: ProtocolVersion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitResponse {
    pub height: u64,
    pub app_hash: [u8; 32],
}

/// A transaction decoded from its raw block bytes.
pub(crate) struct DecodedTx {
    pub tx: Tx,
    pub blob_tx: Option<BlobTx>,
    /// Bytes of the signed transaction, excluding attached blobs
    pub size: u64,
}

pub(crate) fn decode_tx(raw: &[u8]) -> Result<DecodedTx, AppError> {
    match unmarshal_blob_tx(raw)? {
        Some(blob_tx) => Ok(DecodedTx {
            tx: Tx::decode(&blob_tx.tx)?,
            size: blob_tx.tx.len() as u64,
            blob_tx: Some(blob_tx),
        }),
        None => {
            let tx = Tx::decode(raw)?;
            if tx.pay_for_blobs().next().is_some() {
                return Err(AppError::UnexpectedPayForBlobs);
            }
            Ok(DecodedTx {
                tx,
                blob_tx: None,
                size: raw.len() as u64,
            })
        }
    }
}

/// Manager failures are ordinary errors except a double validator-set update,
/// after which no honest execution can continue.
fn halt_on_conflict<T>(result: Result<T, ManagerError>) -> Result<T, AppError> {
    match result {
        Err(ManagerError::ValidatorUpdateConflict { first, second }) => {
            panic!(
                "modules {} and {} both returned validator updates; halting",
                first, second
            )
        }
        other => other.map_err(AppError::from),
    }
}

struct BlockState {
    store: BlockStore,
    height: u64,
}

pub struct App {
    pub(crate) config: AppConfig,
    min_gas_prices: Vec<DecCoin>,
    pub(crate) manager: ModuleManager,
    configurator: Configurator,
    accepted: Arc<AcceptedMessageSet>,
    ante: AnteHandler,
    pub(crate) keepers: Keepers,
    router: MsgRouter,
    pub(crate) committed: Arc<MemStore>,
    check_state: Mutex<BlockStore>,
    block: Option<BlockState>,
    last_height: u64,
    pub(crate) version: ProtocolVersion,
    initialized: bool,
}

impl App {
    pub fn new(config: AppConfig) -> Result<Self, AppError> {
        let min_gas_prices = config
            .min_gas_prices()
            .map_err(|e| AppError::Config(e.to_string()))?;
        let manager = modules::module_manager()?;
        let configurator = modules::configurator()?;
        let accepted = Arc::new(manager.accepted_messages());
        let keepers = Keepers::new(config.upgrade_height_delay);

        let ante = AnteHandler::standard(AnteDeps {
            accepted: accepted.clone(),
            accounts: keepers.auth.clone(),
            fees: keepers.bank.clone(),
            verifier: Arc::new(Ed25519Verifier),
            params: keepers.params.clone(),
            relays: keepers.ibc.clone(),
        });
        let router = MsgRouter::new(accepted.clone(), keepers.clone());
        let committed = Arc::new(MemStore::new());

        info!(
            "Tessera app for {} supporting versions {:?}",
            config.chain_id,
            manager.supported_versions()
        );
        Ok(App {
            check_state: Mutex::new(BlockStore::new(committed.clone())),
            config,
            min_gas_prices,
            manager,
            configurator,
            accepted,
            ante,
            keepers,
            router,
            committed,
            block: None,
            last_height: 0,
            version: ProtocolVersion::V1,
            initialized: false,
        })
    }

    // ==================== QUERIES ====================

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    pub fn last_height(&self) -> u64 {
        self.last_height
    }

    pub fn state_hash(&self) -> [u8; 32] {
        self.committed.root_hash()
    }

    pub fn accepted_messages(&self) -> &AcceptedMessageSet {
        &self.accepted
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.ante.stage_names()
    }

    pub fn account(&self, address: &Address) -> Option<Account> {
        self.keepers.auth.get_account(&*self.committed, address)
    }

    pub fn balance(&self, address: &Address, denom: &str) -> u64 {
        self.keepers.bank.balance(&*self.committed, address, denom)
    }

    pub fn pending_upgrade(&self) -> Result<Option<PendingUpgrade>, AppError> {
        Ok(self.keepers.signal.pending_upgrade(&*self.committed)?)
    }

    pub fn export_genesis(&self) -> Result<GenesisDoc, AppError> {
        Ok(GenesisDoc {
            chain_id: self.config.chain_id.clone(),
            app_version: self.version,
            app_state: self.manager.export_genesis(&*self.committed, self.version)?,
        })
    }

    // ==================== ADMISSION ====================

    /// Runs the admission pipeline for `decoded` against `store`.
    pub(crate) fn admit(
        &self,
        store: &mut dyn KvStore,
        decoded: &DecodedTx,
        height: u64,
        version: ProtocolVersion,
        mode: ExecMode,
    ) -> Result<AnteOutcome, AppError> {
        if let Some(blob_tx) = &decoded.blob_tx {
            validate_blob_tx(&decoded.tx, &blob_tx.blobs, appconsts::subtree_root_threshold(version))?;
        }
        let mut ctx = AnteContext::new(store, &self.config.chain_id, height, version, mode, decoded.size)
            .with_min_gas_prices(&self.min_gas_prices);
        Ok(self.ante.run(&mut ctx, &decoded.tx)?)
    }

    /// Mempool admission. Accepted transactions update the mempool's view
    /// of state so that follow-up sequences are admitted.
    pub fn check_tx(&self, raw: &[u8], recheck: bool) -> Result<AnteOutcome, AppError> {
        let decoded = decode_tx(raw)?;
        let mode = if recheck { ExecMode::ReCheck } else { ExecMode::Check };
        let mut state = self.check_state.lock();
        let mut cache = CacheStore::new(&*state);
        let outcome = self.admit(&mut cache, &decoded, self.last_height + 1, self.version, mode)?;
        let changes = cache.into_changeset();
        changes.write_to(&mut *state);
        Ok(outcome)
    }

    // ==================== BLOCK EXECUTION ====================

    pub fn init_chain(&mut self, genesis: &GenesisDoc) -> Result<Vec<ValidatorUpdate>, AppError> {
        if self.initialized {
            return Err(AppError::AlreadyInitialized);
        }
        if genesis.chain_id != self.config.chain_id {
            return Err(AppError::InvalidGenesis(format!(
                "chain id {} does not match configured {}",
                genesis.chain_id, self.config.chain_id
            )));
        }
        let version = genesis.app_version;
        if !self.manager.is_supported(version) {
            return Err(AppError::UnsupportedVersion(version));
        }

        let mut store = BlockStore::new(self.committed.clone());
        let mut ctx = ModuleContext::new(&mut store, 0, version);
        let updates = halt_on_conflict(self.manager.init_genesis(&mut ctx, &genesis.app_state))?;
        store_version_map(&mut store, &self.manager.version_map(version))?;
        keepers::set_u64(&mut store, APP_VERSION_KEY, version.get());

        self.apply(store.into_changeset());
        self.version = version;
        self.initialized = true;
        info!(
            "Initialized chain {} at {} with {} validators",
            genesis.chain_id,
            version,
            updates.len()
        );
        Ok(updates)
    }

    pub fn begin_block(&mut self, height: u64) -> Result<Vec<Event>, AppError> {
        if let Some(block) = &self.block {
            return Err(AppError::BlockInProgress(block.height));
        }
        if height != self.last_height + 1 {
            return Err(AppError::UnexpectedHeight {
                expected: self.last_height + 1,
                got: height,
            });
        }
        let mut store = BlockStore::new(self.committed.clone());
        let mut ctx = ModuleContext::new(&mut store, height, self.version);
        let events = halt_on_conflict(self.manager.begin_block(&mut ctx))?;
        self.block = Some(BlockState { store, height });
        Ok(events)
    }

    /// Executes one transaction of the current block. Admission effects (fee,
    /// sequence) persist even when a message then fails.
    pub fn deliver_tx(&mut self, raw: &[u8]) -> Result<TxOutcome, AppError> {
        let mut block = self.block.take().ok_or(AppError::NoBlockInProgress)?;
        let result = self.execute_tx(&mut block, raw);
        self.block = Some(block);
        result
    }

    fn execute_tx(&self, block: &mut BlockState, raw: &[u8]) -> Result<TxOutcome, AppError> {
        let decoded = decode_tx(raw)?;

        let mut ante_cache = CacheStore::new(&block.store);
        let outcome = self.admit(&mut ante_cache, &decoded, block.height, self.version, ExecMode::Deliver)?;
        ante_cache.into_changeset().write_to(&mut block.store);

        let signers = decoded.tx.signers();
        let mut msg_cache = CacheStore::new(&block.store);
        let mut ctx = ModuleContext::new(&mut msg_cache, block.height, self.version);
        for msg in &decoded.tx.body.messages {
            self.router.route(&mut ctx, msg, &signers)?;
        }
        let events = ctx.take_events();
        msg_cache.into_changeset().write_to(&mut block.store);

        Ok(TxOutcome {
            gas_wanted: outcome.gas_wanted,
            gas_used: outcome.gas_used,
            priority: outcome.priority,
            events,
        })
    }

    pub fn end_block(&mut self) -> Result<EndBlockResponse, AppError> {
        let mut block = self.block.take().ok_or(AppError::NoBlockInProgress)?;
        let result = self.finish_block(&mut block);
        self.block = Some(block);
        result
    }

    fn finish_block(&mut self, block: &mut BlockState) -> Result<EndBlockResponse, AppError> {
        let height = block.height;
        let mut ctx = ModuleContext::new(&mut block.store, height, self.version);
        let end = halt_on_conflict(self.manager.end_block(&mut ctx))?;
        let mut events = end.events;

        let target = if self.version == ProtocolVersion::V1 {
            self.config
                .v2_upgrade_height
                .filter(|upgrade_height| height >= *upgrade_height)
                .map(|_| ProtocolVersion::V2)
        } else {
            self.keepers.signal.should_upgrade(&block.store, height)
        };
        if let Some(next) = target {
            events.extend(self.upgrade(block, next)?);
        }

        Ok(EndBlockResponse {
            events,
            validator_updates: end.validator_updates,
            app_version: self.version,
        })
    }

    /// Migrates module state to `next`, then reopens upgrade voting.
    fn upgrade(&mut self, block: &mut BlockState, next: ProtocolVersion) -> Result<Vec<Event>, AppError> {
        let from = self.version;
        if !self.manager.is_supported(next) {
            panic!("chain agreed on {} but this binary has no modules for it", next);
        }
        let mut ctx = ModuleContext::new(&mut block.store, block.height, next);
        let map = halt_on_conflict(self.manager.run_migrations(&mut ctx, &self.configurator, from, next))?;
        let mut events = ctx.take_events();

        store_version_map(&mut block.store, &map)?;
        keepers::set_u64(&mut block.store, APP_VERSION_KEY, next.get());
        self.keepers.signal.reset_tally(&mut block.store);
        self.version = next;

        info!("Protocol version {} -> {} at height {}", from, next, block.height);
        events.push(
            Event::new("upgrade")
                .with_attr("from", from)
                .with_attr("to", next)
                .with_attr("height", block.height),
        );
        Ok(events)
    }

    pub fn commit(&mut self) -> Result<CommitResponse, AppError> {
        let mut block = self.block.take().ok_or(AppError::NoBlockInProgress)?;
        keepers::set_u64(&mut block.store, APP_HEIGHT_KEY, block.height);
        self.apply(block.store.into_changeset());
        self.last_height = block.height;
        let app_hash = self.state_hash();
        info!("Committed height {} app hash {}", block.height, hex::encode(app_hash));
        Ok(CommitResponse {
            height: block.height,
            app_hash,
        })
    }

    /// Merges a changeset into committed state and resets the mempool view.
    fn apply(&mut self, changes: Changeset) {
        let check_state = self.check_state.get_mut();
        // Release the mempool's handle so the merge happens in place.
        *check_state = BlockStore::new(Arc::new(MemStore::new()));
        Arc::make_mut(&mut self.committed).apply(changes);
        *check_state = BlockStore::new(self.committed.clone());
    }
}

// APPLICATION MODULES
// The concrete module set and the version ranges it is mounted for. Business
// logic lives in the keepers; modules expose genesis, end-block and message
// registration to the manager.
//
//   module   versions   schema
//   auth     v1..       1
//   bank     v1..       1
//   staking  v1..       1
//   gov      v1..       1
//   authz    v1..       1
//   crisis   v1..=v2    1
//   blob     v1         1
//   blob     v2..       2
//   ibc      v1..       1
//   minfee   v2..       1
//   signal   v2..       1

use crate::keepers::params::AUTHORITY_MODULE;
use crate::keepers::{module_address, AuthKeeper, AuthParams, BankKeeper, BlobParams, MinFeeParams, ParamsKeeper, StakingKeeper, Validator};
use log::info;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tessera_modules::{
    AppModule, Configurator, HasEndBlocker, HasGenesis, ManagerError, ModuleContext, ModuleError, ModuleManager,
    VersionedModule,
};
use tessera_types::abci::{Event, ValidatorUpdate};
use tessera_types::address::Address;
use tessera_types::coin::Coin;
use tessera_types::msgs::type_urls;
use tessera_types::store::KvStore;
use tessera_types::version::ProtocolVersion;

pub const AUTH: &str = "auth";
pub const BANK: &str = "bank";
pub const STAKING: &str = "staking";
pub const GOV: &str = "gov";
pub const AUTHZ: &str = "authz";
pub const CRISIS: &str = "crisis";
pub const BLOB: &str = "blob";
pub const IBC: &str = "ibc";
pub const MINFEE: &str = "minfee";
pub const SIGNAL: &str = "signal";

fn parse_genesis<T: DeserializeOwned>(module: &str, genesis: &Value) -> Result<T, ModuleError> {
    serde_json::from_value(genesis.clone()).map_err(|e| ModuleError::InvalidGenesis {
        module: module.to_string(),
        reason: e.to_string(),
    })
}

fn to_json<T: Serialize>(module: &str, state: &T) -> Result<Value, ModuleError> {
    serde_json::to_value(state).map_err(|e| ModuleError::Handler {
        module: module.to_string(),
        reason: e.to_string(),
    })
}

fn handler_error(module: &str, e: impl ToString) -> ModuleError {
    ModuleError::Handler {
        module: module.to_string(),
        reason: e.to_string(),
    }
}

// ==================== AUTH ====================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthGenesis {
    #[serde(default)]
    pub params: AuthParams,
    #[serde(default)]
    pub accounts: Vec<Address>,
}

pub struct AuthModule;

impl AppModule for AuthModule {
    fn name(&self) -> &'static str {
        AUTH
    }

    fn consensus_version(&self) -> u64 {
        1
    }

    fn as_genesis(&self) -> Option<&dyn HasGenesis> {
        Some(self)
    }
}

impl HasGenesis for AuthModule {
    fn default_genesis(&self) -> Value {
        serde_json::to_value(AuthGenesis::default()).unwrap_or(Value::Null)
    }

    fn init_genesis(&self, ctx: &mut ModuleContext<'_>, genesis: &Value) -> Result<Vec<ValidatorUpdate>, ModuleError> {
        let state: AuthGenesis = parse_genesis(AUTH, genesis)?;
        ParamsKeeper
            .set_auth(&mut *ctx.store, &state.params)
            .map_err(|e| handler_error(AUTH, e))?;
        for address in &state.accounts {
            AuthKeeper.ensure_account(&mut *ctx.store, address);
        }
        Ok(Vec::new())
    }

    fn export_genesis(&self, store: &dyn KvStore) -> Result<Value, ModuleError> {
        let state = AuthGenesis {
            params: ParamsKeeper.auth(store),
            accounts: AuthKeeper.accounts(store).into_iter().map(|a| a.address).collect(),
        };
        to_json(AUTH, &state)
    }
}

// ==================== BANK ====================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub address: Address,
    pub coins: Vec<Coin>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankGenesis {
    #[serde(default)]
    pub balances: Vec<Balance>,
}

pub struct BankModule;

impl AppModule for BankModule {
    fn name(&self) -> &'static str {
        BANK
    }

    fn consensus_version(&self) -> u64 {
        1
    }

    fn message_types(&self) -> Vec<&'static str> {
        vec![type_urls::MSG_SEND]
    }

    fn as_genesis(&self) -> Option<&dyn HasGenesis> {
        Some(self)
    }
}

impl HasGenesis for BankModule {
    fn default_genesis(&self) -> Value {
        serde_json::to_value(BankGenesis::default()).unwrap_or(Value::Null)
    }

    fn init_genesis(&self, ctx: &mut ModuleContext<'_>, genesis: &Value) -> Result<Vec<ValidatorUpdate>, ModuleError> {
        let state: BankGenesis = parse_genesis(BANK, genesis)?;
        for balance in &state.balances {
            AuthKeeper.ensure_account(&mut *ctx.store, &balance.address);
            BankKeeper.mint(&mut *ctx.store, &balance.address, &balance.coins);
        }
        Ok(Vec::new())
    }

    fn export_genesis(&self, store: &dyn KvStore) -> Result<Value, ModuleError> {
        let mut balances: Vec<Balance> = Vec::new();
        for (address, coin) in BankKeeper.balances(store) {
            match balances.last_mut() {
                Some(last) if last.address == address => last.coins.push(coin),
                _ => balances.push(Balance {
                    address,
                    coins: vec![coin],
                }),
            }
        }
        to_json(BANK, &BankGenesis { balances })
    }
}

// ==================== STAKING ====================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakingGenesis {
    #[serde(default)]
    pub validators: Vec<Validator>,
}

pub struct StakingModule;

impl AppModule for StakingModule {
    fn name(&self) -> &'static str {
        STAKING
    }

    fn consensus_version(&self) -> u64 {
        1
    }

    fn message_types(&self) -> Vec<&'static str> {
        vec![type_urls::MSG_DELEGATE]
    }

    fn as_genesis(&self) -> Option<&dyn HasGenesis> {
        Some(self)
    }

    fn as_end_blocker(&self) -> Option<&dyn HasEndBlocker> {
        Some(self)
    }
}

impl HasGenesis for StakingModule {
    fn default_genesis(&self) -> Value {
        serde_json::to_value(StakingGenesis::default()).unwrap_or(Value::Null)
    }

    fn init_genesis(&self, ctx: &mut ModuleContext<'_>, genesis: &Value) -> Result<Vec<ValidatorUpdate>, ModuleError> {
        let state: StakingGenesis = parse_genesis(STAKING, genesis)?;
        let mut updates = Vec::with_capacity(state.validators.len());
        for validator in &state.validators {
            if validator.power == 0 {
                return Err(ModuleError::InvalidGenesis {
                    module: STAKING.to_string(),
                    reason: format!("validator {} has zero power", validator.operator),
                });
            }
            let update = StakingKeeper
                .create_genesis_validator(&mut *ctx.store, validator)
                .map_err(|e| handler_error(STAKING, e))?;
            updates.push(update);
        }
        Ok(updates)
    }

    fn export_genesis(&self, store: &dyn KvStore) -> Result<Value, ModuleError> {
        to_json(
            STAKING,
            &StakingGenesis {
                validators: StakingKeeper.validators(store),
            },
        )
    }
}

impl HasEndBlocker for StakingModule {
    fn end_block(&self, ctx: &mut ModuleContext<'_>) -> Result<Vec<ValidatorUpdate>, ModuleError> {
        let updates = StakingKeeper.apply_updates(&mut *ctx.store);
        for update in &updates {
            ctx.emit(
                Event::new("validator_power")
                    .with_attr("pub_key", hex::encode(&update.pub_key))
                    .with_attr("power", update.power),
            );
        }
        Ok(updates)
    }
}

// ==================== GOV ====================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovGenesis {
    /// Signer allowed to update parameters
    pub authority: Address,
}

impl Default for GovGenesis {
    fn default() -> Self {
        GovGenesis {
            authority: module_address(AUTHORITY_MODULE),
        }
    }
}

pub struct GovModule;

impl AppModule for GovModule {
    fn name(&self) -> &'static str {
        GOV
    }

    fn consensus_version(&self) -> u64 {
        1
    }

    fn message_types(&self) -> Vec<&'static str> {
        vec![
            type_urls::MSG_SUBMIT_PROPOSAL,
            type_urls::MSG_VOTE,
            type_urls::MSG_UPDATE_PARAMS,
        ]
    }

    fn as_genesis(&self) -> Option<&dyn HasGenesis> {
        Some(self)
    }
}

impl HasGenesis for GovModule {
    fn default_genesis(&self) -> Value {
        serde_json::to_value(GovGenesis::default()).unwrap_or(Value::Null)
    }

    fn init_genesis(&self, ctx: &mut ModuleContext<'_>, genesis: &Value) -> Result<Vec<ValidatorUpdate>, ModuleError> {
        let state: GovGenesis = parse_genesis(GOV, genesis)?;
        ParamsKeeper.set_authority(&mut *ctx.store, &state.authority);
        Ok(Vec::new())
    }

    fn export_genesis(&self, store: &dyn KvStore) -> Result<Value, ModuleError> {
        to_json(
            GOV,
            &GovGenesis {
                authority: ParamsKeeper.authority(store),
            },
        )
    }
}

// ==================== MESSAGE-ONLY MODULES ====================

/// A module that only registers message types.
pub struct RouteModule {
    name: &'static str,
    messages: Vec<&'static str>,
}

impl AppModule for RouteModule {
    fn name(&self) -> &'static str {
        self.name
    }

    fn consensus_version(&self) -> u64 {
        1
    }

    fn message_types(&self) -> Vec<&'static str> {
        self.messages.clone()
    }
}

pub fn authz_module() -> RouteModule {
    RouteModule {
        name: AUTHZ,
        messages: vec![type_urls::MSG_EXEC],
    }
}

pub fn crisis_module() -> RouteModule {
    RouteModule {
        name: CRISIS,
        messages: vec![type_urls::MSG_VERIFY_INVARIANT],
    }
}

pub fn ibc_module() -> RouteModule {
    RouteModule {
        name: IBC,
        messages: vec![type_urls::MSG_RECV_PACKET, type_urls::MSG_UPDATE_CLIENT],
    }
}

pub fn signal_module() -> RouteModule {
    RouteModule {
        name: SIGNAL,
        messages: vec![type_urls::MSG_SIGNAL_VERSION, type_urls::MSG_TRY_UPGRADE],
    }
}

// ==================== BLOB ====================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobGenesis {
    #[serde(default)]
    pub params: BlobParams,
}

pub struct BlobModule {
    schema: u64,
}

impl BlobModule {
    pub fn new(schema: u64) -> Self {
        BlobModule { schema }
    }
}

impl AppModule for BlobModule {
    fn name(&self) -> &'static str {
        BLOB
    }

    fn consensus_version(&self) -> u64 {
        self.schema
    }

    fn message_types(&self) -> Vec<&'static str> {
        vec![type_urls::MSG_PAY_FOR_BLOBS]
    }

    fn as_genesis(&self) -> Option<&dyn HasGenesis> {
        Some(self)
    }
}

impl HasGenesis for BlobModule {
    fn default_genesis(&self) -> Value {
        serde_json::to_value(BlobGenesis::default()).unwrap_or(Value::Null)
    }

    fn init_genesis(&self, ctx: &mut ModuleContext<'_>, genesis: &Value) -> Result<Vec<ValidatorUpdate>, ModuleError> {
        let state: BlobGenesis = parse_genesis(BLOB, genesis)?;
        ParamsKeeper
            .set_blob(&mut *ctx.store, &state.params)
            .map_err(|e| handler_error(BLOB, e))?;
        Ok(Vec::new())
    }

    fn export_genesis(&self, store: &dyn KvStore) -> Result<Value, ModuleError> {
        to_json(
            BLOB,
            &BlobGenesis {
                params: ParamsKeeper.blob(store),
            },
        )
    }
}

/// Blob schema 1 → 2: the params record becomes mandatory, so chains that
/// never stored one get the defaults written out.
fn migrate_blob_1_to_2(ctx: &mut ModuleContext<'_>) -> Result<(), ModuleError> {
    if !ParamsKeeper.has_blob(&*ctx.store) {
        ParamsKeeper
            .set_blob(&mut *ctx.store, &BlobParams::default())
            .map_err(|e| ModuleError::Migration {
                module: BLOB.to_string(),
                reason: e.to_string(),
            })?;
    }
    let params = ParamsKeeper.blob(&*ctx.store);
    ctx.emit(
        Event::new("blob_migrated")
            .with_attr("gov_max_square_size", params.gov_max_square_size)
            .with_attr("gas_per_blob_byte", params.gas_per_blob_byte),
    );
    Ok(())
}

// ==================== MINFEE ====================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinFeeGenesis {
    #[serde(default)]
    pub params: MinFeeParams,
}

pub struct MinFeeModule;

impl AppModule for MinFeeModule {
    fn name(&self) -> &'static str {
        MINFEE
    }

    fn consensus_version(&self) -> u64 {
        1
    }

    fn as_genesis(&self) -> Option<&dyn HasGenesis> {
        Some(self)
    }
}

impl HasGenesis for MinFeeModule {
    fn default_genesis(&self) -> Value {
        serde_json::to_value(MinFeeGenesis::default()).unwrap_or(Value::Null)
    }

    fn init_genesis(&self, ctx: &mut ModuleContext<'_>, genesis: &Value) -> Result<Vec<ValidatorUpdate>, ModuleError> {
        let state: MinFeeGenesis = parse_genesis(MINFEE, genesis)?;
        ParamsKeeper
            .set_minfee(&mut *ctx.store, &state.params)
            .map_err(|e| handler_error(MINFEE, e))?;
        Ok(Vec::new())
    }

    fn export_genesis(&self, store: &dyn KvStore) -> Result<Value, ModuleError> {
        to_json(
            MINFEE,
            &MinFeeGenesis {
                params: ParamsKeeper.minfee(store),
            },
        )
    }
}

// ==================== REGISTRY ====================

/// Every module with the protocol versions it is mounted for.
pub fn module_entries() -> Vec<VersionedModule> {
    use ProtocolVersion as V;
    let latest = V::LATEST;
    vec![
        VersionedModule::new(Arc::new(AuthModule), V::V1, latest),
        VersionedModule::new(Arc::new(BankModule), V::V1, latest),
        VersionedModule::new(Arc::new(StakingModule), V::V1, latest),
        VersionedModule::new(Arc::new(GovModule), V::V1, latest),
        VersionedModule::new(Arc::new(authz_module()), V::V1, latest),
        VersionedModule::new(Arc::new(crisis_module()), V::V1, V::V2),
        VersionedModule::new(Arc::new(BlobModule::new(1)), V::V1, V::V1),
        VersionedModule::new(Arc::new(BlobModule::new(2)), V::V2, latest),
        VersionedModule::new(Arc::new(ibc_module()), V::V1, latest),
        VersionedModule::new(Arc::new(MinFeeModule), V::V2, latest),
        VersionedModule::new(Arc::new(signal_module()), V::V2, latest),
    ]
}

/// Builds the manager with the application's dispatch orders.
pub fn module_manager() -> Result<ModuleManager, ManagerError> {
    let mut manager = ModuleManager::new(module_entries())?;
    // Accounts must exist before balances, and params before anything reads them.
    manager.set_order_init_genesis(vec![AUTH, BANK, BLOB, MINFEE, STAKING, GOV, AUTHZ, CRISIS, IBC, SIGNAL])?;
    manager.set_order_export_genesis(vec![AUTH, BANK, BLOB, MINFEE, STAKING, GOV, AUTHZ, CRISIS, IBC, SIGNAL])?;
    manager.set_order_end_blockers(vec![CRISIS, GOV, STAKING, AUTH, BANK, AUTHZ, BLOB, IBC, MINFEE, SIGNAL])?;
    Ok(manager)
}

pub fn configurator() -> Result<Configurator, ManagerError> {
    let mut configurator = Configurator::new();
    configurator.register_migration(BLOB, 1, migrate_blob_1_to_2)?;
    info!("Registered schema migrations");
    Ok(configurator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_types::store::MemStore;

    #[test]
    fn test_module_sets_per_version() {
        let manager = module_manager().unwrap();
        assert_eq!(
            manager.supported_versions(),
            vec![ProtocolVersion::V1, ProtocolVersion::V2, ProtocolVersion::V3]
        );
        assert!(manager.module_names(ProtocolVersion::V2).contains(&CRISIS));
        assert!(!manager.module_names(ProtocolVersion::V3).contains(&CRISIS));
        assert!(!manager.module_names(ProtocolVersion::V1).contains(&SIGNAL));
        assert_eq!(manager.version_map(ProtocolVersion::V1)[BLOB], 1);
        assert_eq!(manager.version_map(ProtocolVersion::V2)[BLOB], 2);
    }

    #[test]
    fn test_accepted_messages() {
        let accepted = module_manager().unwrap().accepted_messages();
        assert!(!accepted.is_accepted(ProtocolVersion::V1, type_urls::MSG_SIGNAL_VERSION));
        assert!(accepted.is_accepted(ProtocolVersion::V2, type_urls::MSG_SIGNAL_VERSION));
        assert!(accepted.is_accepted(ProtocolVersion::V2, type_urls::MSG_VERIFY_INVARIANT));
        assert!(!accepted.is_accepted(ProtocolVersion::V3, type_urls::MSG_VERIFY_INVARIANT));
    }

    #[test]
    fn test_blob_migration_materializes_params() {
        let configurator = configurator().unwrap();
        let mut store = MemStore::new();
        let mut ctx = ModuleContext::new(&mut store, 10, ProtocolVersion::V2);
        configurator.migrate(BLOB, 1, 2, &mut ctx).unwrap();
        assert_eq!(ctx.events().len(), 1);
        assert!(ParamsKeeper.has_blob(&store));
    }
}

// VERSIONED MODULE MANAGER
// Resolves, per protocol version, which modules are mounted and dispatches
// genesis, block and migration calls to them in a fixed order.
//
// SAFETY INVARIANTS:
// 1. from_version >= 1 and from_version <= to_version for every entry
// 2. At most one module per name per protocol version
// 3. A module's schema version never decreases as the protocol version increases
// 4. At most one module returns validator updates per call
// 5. A request for a version with no mounted modules halts the node

use crate::configurator::Configurator;
use crate::error::ManagerError;
use crate::module::{AppModule, ModuleContext, VersionedModule};
use log::{info, warn};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tessera_types::abci::{Event, ValidatorUpdate};
use tessera_types::accepted::AcceptedMessageSet;
use tessera_types::codec;
use tessera_types::store::KvStore;
use tessera_types::version::ProtocolVersion;

/// Module name → schema version.
pub type VersionMap = BTreeMap<String, u64>;

const VERSION_MAP_PREFIX: &[u8] = b"modules/schema/";

type ModuleSet = BTreeMap<&'static str, Arc<dyn AppModule>>;

/// Output of an end-block dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndBlockResult {
    pub events: Vec<Event>,
    pub validator_updates: Vec<ValidatorUpdate>,
}

pub struct ModuleManager {
    versioned: BTreeMap<ProtocolVersion, ModuleSet>,
    /// Every module name in registration order
    names: Vec<&'static str>,
    order_init_genesis: Vec<&'static str>,
    order_export_genesis: Vec<&'static str>,
    order_begin_blockers: Vec<&'static str>,
    order_end_blockers: Vec<&'static str>,
    order_migrations: Vec<&'static str>,
}

impl ModuleManager {
    pub fn new(entries: Vec<VersionedModule>) -> Result<Self, ManagerError> {
        if entries.is_empty() {
            return Err(ManagerError::NoModules);
        }

        let mut versioned: BTreeMap<ProtocolVersion, ModuleSet> = BTreeMap::new();
        let mut names: Vec<&'static str> = Vec::new();
        for entry in &entries {
            let name = entry.name();
            if entry.from_version.get() < 1 || entry.from_version > entry.to_version {
                return Err(ManagerError::InvalidVersionRange {
                    module: name.to_string(),
                    from: entry.from_version,
                    to: entry.to_version,
                });
            }
            for v in entry.from_version.get()..=entry.to_version.get() {
                let set = versioned.entry(ProtocolVersion(v)).or_default();
                if set.insert(name, entry.module.clone()).is_some() {
                    return Err(ManagerError::DuplicateModule {
                        module: name.to_string(),
                        version: ProtocolVersion(v),
                    });
                }
            }
            if !names.contains(&name) {
                names.push(name);
            }
        }

        let mut last_schema: BTreeMap<&'static str, u64> = BTreeMap::new();
        for (version, set) in &versioned {
            for (name, module) in set {
                let schema = module.consensus_version();
                if let Some(previous) = last_schema.insert(name, schema) {
                    if schema < previous {
                        return Err(ManagerError::SchemaRegression {
                            module: name.to_string(),
                            version: *version,
                            previous,
                            next: schema,
                        });
                    }
                }
            }
        }

        Ok(ModuleManager {
            versioned,
            order_init_genesis: names.clone(),
            order_export_genesis: names.clone(),
            order_begin_blockers: names.clone(),
            order_end_blockers: names.clone(),
            order_migrations: names.clone(),
            names,
        })
    }

    fn validate_order(&self, kind: &'static str, order: &[&'static str]) -> Result<(), ManagerError> {
        let mut seen = BTreeSet::new();
        for name in order {
            if !self.names.contains(name) || !seen.insert(*name) {
                return Err(ManagerError::InvalidOrder {
                    kind,
                    module: name.to_string(),
                });
            }
        }
        let missing: Vec<String> = self
            .names
            .iter()
            .filter(|n| !seen.contains(*n))
            .map(|n| n.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ManagerError::IncompleteOrder { kind, missing });
        }
        Ok(())
    }

    pub fn set_order_init_genesis(&mut self, order: Vec<&'static str>) -> Result<(), ManagerError> {
        self.validate_order("init genesis", &order)?;
        self.order_init_genesis = order;
        Ok(())
    }

    pub fn set_order_export_genesis(&mut self, order: Vec<&'static str>) -> Result<(), ManagerError> {
        self.validate_order("export genesis", &order)?;
        self.order_export_genesis = order;
        Ok(())
    }

    pub fn set_order_begin_blockers(&mut self, order: Vec<&'static str>) -> Result<(), ManagerError> {
        self.validate_order("begin blockers", &order)?;
        self.order_begin_blockers = order;
        Ok(())
    }

    pub fn set_order_end_blockers(&mut self, order: Vec<&'static str>) -> Result<(), ManagerError> {
        self.validate_order("end blockers", &order)?;
        self.order_end_blockers = order;
        Ok(())
    }

    pub fn set_order_migrations(&mut self, order: Vec<&'static str>) -> Result<(), ManagerError> {
        self.validate_order("migrations", &order)?;
        self.order_migrations = order;
        Ok(())
    }

    fn modules_at(&self, version: ProtocolVersion) -> &ModuleSet {
        match self.versioned.get(&version) {
            Some(set) => set,
            None => panic!("no modules mounted for protocol version {}", version),
        }
    }

    pub fn is_supported(&self, version: ProtocolVersion) -> bool {
        self.versioned.contains_key(&version)
    }

    pub fn supported_versions(&self) -> Vec<ProtocolVersion> {
        self.versioned.keys().copied().collect()
    }

    pub fn module_names(&self, version: ProtocolVersion) -> Vec<&'static str> {
        self.modules_at(version).keys().copied().collect()
    }

    pub fn module(&self, version: ProtocolVersion, name: &str) -> Option<&Arc<dyn AppModule>> {
        self.versioned.get(&version).and_then(|set| set.get(name))
    }

    pub fn version_map(&self, version: ProtocolVersion) -> VersionMap {
        self.modules_at(version)
            .iter()
            .map(|(name, module)| (name.to_string(), module.consensus_version()))
            .collect()
    }

    /// Messages each version accepts: the union of what its modules serve.
    pub fn accepted_messages(&self) -> AcceptedMessageSet {
        let by_version = self
            .versioned
            .iter()
            .map(|(version, set)| {
                let messages = set
                    .values()
                    .flat_map(|m| m.message_types())
                    .map(str::to_string)
                    .collect();
                (*version, messages)
            })
            .collect();
        AcceptedMessageSet::new(by_version)
    }

    /// Initializes every genesis-capable module at `ctx.version`. Exactly one
    /// module must supply the initial validator set.
    pub fn init_genesis(
        &self,
        ctx: &mut ModuleContext<'_>,
        genesis: &BTreeMap<String, Value>,
    ) -> Result<Vec<ValidatorUpdate>, ManagerError> {
        let modules = self.modules_at(ctx.version);
        let mut updates: Option<(&'static str, Vec<ValidatorUpdate>)> = None;

        for name in &self.order_init_genesis {
            let Some(module) = modules.get(name) else {
                continue;
            };
            let Some(genesis_module) = module.as_genesis() else {
                continue;
            };
            let state = genesis
                .get(*name)
                .cloned()
                .unwrap_or_else(|| genesis_module.default_genesis());
            let module_updates = genesis_module.init_genesis(ctx, &state)?;
            if module_updates.is_empty() {
                continue;
            }
            if let Some((first, _)) = &updates {
                return Err(ManagerError::ValidatorUpdateConflict {
                    first: first.to_string(),
                    second: name.to_string(),
                });
            }
            updates = Some((*name, module_updates));
        }

        match updates {
            Some((name, updates)) => {
                info!("Genesis validator set of {} validators from {}", updates.len(), name);
                Ok(updates)
            }
            None => panic!("validator set is empty after init genesis; a chain cannot start without validators"),
        }
    }

    pub fn export_genesis(
        &self,
        store: &dyn KvStore,
        version: ProtocolVersion,
    ) -> Result<BTreeMap<String, Value>, ManagerError> {
        let modules = self.modules_at(version);
        let mut exported = BTreeMap::new();
        for name in &self.order_export_genesis {
            if let Some(genesis) = modules.get(name).and_then(|m| m.as_genesis()) {
                exported.insert(name.to_string(), genesis.export_genesis(store)?);
            }
        }
        Ok(exported)
    }

    /// Runs begin blockers; returns only the events emitted during this call.
    pub fn begin_block(&self, ctx: &mut ModuleContext<'_>) -> Result<Vec<Event>, ManagerError> {
        let modules = self.modules_at(ctx.version);
        let outer = ctx.take_events();
        for name in &self.order_begin_blockers {
            if let Some(blocker) = modules.get(name).and_then(|m| m.as_begin_blocker()) {
                blocker.begin_block(ctx)?;
            }
        }
        let events = ctx.take_events();
        restore_events(ctx, outer);
        Ok(events)
    }

    /// Runs end blockers. At most one module may return validator updates.
    pub fn end_block(&self, ctx: &mut ModuleContext<'_>) -> Result<EndBlockResult, ManagerError> {
        let modules = self.modules_at(ctx.version);
        let outer = ctx.take_events();
        let mut updates: Option<(&'static str, Vec<ValidatorUpdate>)> = None;

        for name in &self.order_end_blockers {
            let Some(blocker) = modules.get(name).and_then(|m| m.as_end_blocker()) else {
                continue;
            };
            let module_updates = blocker.end_block(ctx)?;
            if module_updates.is_empty() {
                continue;
            }
            if let Some((first, _)) = &updates {
                return Err(ManagerError::ValidatorUpdateConflict {
                    first: first.to_string(),
                    second: name.to_string(),
                });
            }
            updates = Some((*name, module_updates));
        }

        let events = ctx.take_events();
        restore_events(ctx, outer);
        Ok(EndBlockResult {
            events,
            validator_updates: updates.map(|(_, u)| u).unwrap_or_default(),
        })
    }

    /// Moves module state from `from` to `to`. Modules present in both run
    /// their schema migrations step by step; modules new at `to` start from
    /// their default genesis.
    pub fn run_migrations(
        &self,
        ctx: &mut ModuleContext<'_>,
        configurator: &Configurator,
        from: ProtocolVersion,
        to: ProtocolVersion,
    ) -> Result<VersionMap, ManagerError> {
        let from_modules = self.modules_at(from);
        let to_modules = self.modules_at(to);

        for name in &self.order_migrations {
            match (from_modules.get(name), to_modules.get(name)) {
                (Some(old), Some(new)) => {
                    let (from_schema, to_schema) = (old.consensus_version(), new.consensus_version());
                    if from_schema < to_schema {
                        configurator.migrate(name, from_schema, to_schema, ctx)?;
                    }
                }
                (None, Some(new)) => {
                    if let Some(genesis) = new.as_genesis() {
                        let updates = genesis.init_genesis(ctx, &genesis.default_genesis())?;
                        if !updates.is_empty() {
                            return Err(ManagerError::ValidatorUpdatesOnMigration(name.to_string()));
                        }
                    }
                    info!("Module {} added at version {}", name, to);
                }
                (Some(_), None) => warn!("Module {} removed at version {}", name, to),
                (None, None) => {}
            }
        }
        Ok(self.version_map(to))
    }
}

fn restore_events(ctx: &mut ModuleContext<'_>, outer: Vec<Event>) {
    for event in outer {
        ctx.emit(event);
    }
}

pub fn store_version_map(store: &mut dyn KvStore, map: &VersionMap) -> Result<(), ManagerError> {
    for (key, _) in store.prefix_entries(VERSION_MAP_PREFIX) {
        store.delete(&key);
    }
    for (name, schema) in map {
        let key = [VERSION_MAP_PREFIX, name.as_bytes()].concat();
        store.set(&key, codec::encode(schema)?);
    }
    Ok(())
}

pub fn load_version_map(store: &dyn KvStore) -> Result<VersionMap, ManagerError> {
    store
        .prefix_entries(VERSION_MAP_PREFIX)
        .into_iter()
        .map(|(key, value)| -> Result<(String, u64), ManagerError> {
            let name = String::from_utf8_lossy(&key[VERSION_MAP_PREFIX.len()..]).into_owned();
            Ok((name, codec::decode::<u64>(&value)?))
        })
        .collect()
}

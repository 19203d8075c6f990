// MODULES & CAPABILITIES
// A module is a named unit of business logic with a schema version and the
// message types it serves. What else it does is expressed through optional
// capabilities that the manager queries before dispatching.

use crate::error::ModuleError;
use serde_json::Value;
use std::sync::Arc;
use tessera_types::abci::{Event, ValidatorUpdate};
use tessera_types::store::KvStore;
use tessera_types::version::ProtocolVersion;

/// State and event sink handed to module handlers.
pub struct ModuleContext<'a> {
    pub store: &'a mut dyn KvStore,
    pub height: u64,
    pub version: ProtocolVersion,
    events: Vec<Event>,
}

impl<'a> ModuleContext<'a> {
    pub fn new(store: &'a mut dyn KvStore, height: u64, version: ProtocolVersion) -> Self {
        ModuleContext {
            store,
            height,
            version,
            events: Vec::new(),
        }
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }
}

pub trait AppModule: Send + Sync {
    fn name(&self) -> &'static str;

    /// Version of the module's state schema, distinct from the protocol version.
    fn consensus_version(&self) -> u64;

    /// Type identifiers of the messages this module handles.
    fn message_types(&self) -> Vec<&'static str> {
        Vec::new()
    }

    fn as_genesis(&self) -> Option<&dyn HasGenesis> {
        None
    }

    fn as_begin_blocker(&self) -> Option<&dyn HasBeginBlocker> {
        None
    }

    fn as_end_blocker(&self) -> Option<&dyn HasEndBlocker> {
        None
    }
}

pub trait HasGenesis {
    fn default_genesis(&self) -> Value;

    fn init_genesis(&self, ctx: &mut ModuleContext<'_>, genesis: &Value) -> Result<Vec<ValidatorUpdate>, ModuleError>;

    fn export_genesis(&self, store: &dyn KvStore) -> Result<Value, ModuleError>;
}

pub trait HasBeginBlocker {
    fn begin_block(&self, ctx: &mut ModuleContext<'_>) -> Result<(), ModuleError>;
}

pub trait HasEndBlocker {
    fn end_block(&self, ctx: &mut ModuleContext<'_>) -> Result<Vec<ValidatorUpdate>, ModuleError>;
}

/// A module mounted for an inclusive range of protocol versions.
#[derive(Clone)]
pub struct VersionedModule {
    pub module: Arc<dyn AppModule>,
    pub from_version: ProtocolVersion,
    pub to_version: ProtocolVersion,
}

impl VersionedModule {
    pub fn new(module: Arc<dyn AppModule>, from_version: ProtocolVersion, to_version: ProtocolVersion) -> Self {
        VersionedModule {
            module,
            from_version,
            to_version,
        }
    }

    pub fn name(&self) -> &'static str {
        self.module.name()
    }
}

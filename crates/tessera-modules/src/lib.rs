//! Versioned module management.
//!
//! Modules are mounted for inclusive protocol-version ranges. The
//! [`ModuleManager`] resolves the active set for a version, dispatches
//! genesis and block hooks in configurable orders, and drives schema
//! migrations registered on a [`Configurator`] when the chain upgrades.

pub mod configurator;
pub mod error;
pub mod manager;
pub mod module;

pub use configurator::{Configurator, MigrationHandler};
pub use error::{ManagerError, ModuleError};
pub use manager::{load_version_map, store_version_map, EndBlockResult, ModuleManager, VersionMap};
pub use module::{AppModule, HasBeginBlocker, HasEndBlocker, HasGenesis, ModuleContext, VersionedModule};

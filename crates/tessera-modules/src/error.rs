use tessera_types::codec::CodecError;
use tessera_types::version::ProtocolVersion;
use thiserror::Error;

/// Failure inside one module's handler.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModuleError {
    #[error("Invalid genesis for {module}: {reason}")]
    InvalidGenesis { module: String, reason: String },

    #[error("Migration of {module} failed: {reason}")]
    Migration { module: String, reason: String },

    #[error("Module {module} failed: {reason}")]
    Handler { module: String, reason: String },

    #[error(transparent)]
    Codec(#[from] CodecError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ManagerError {
    #[error("No modules registered")]
    NoModules,

    #[error("Invalid version range for {module}: {from}..={to}")]
    InvalidVersionRange {
        module: String,
        from: ProtocolVersion,
        to: ProtocolVersion,
    },

    #[error("Module {module} registered twice for version {version}")]
    DuplicateModule {
        module: String,
        version: ProtocolVersion,
    },

    #[error("Schema version of {module} decreases from {previous} to {next} at version {version}")]
    SchemaRegression {
        module: String,
        version: ProtocolVersion,
        previous: u64,
        next: u64,
    },

    #[error("{kind} order is missing modules: {missing:?}")]
    IncompleteOrder { kind: &'static str, missing: Vec<String> },

    #[error("{kind} order names unknown or repeated module {module}")]
    InvalidOrder { kind: &'static str, module: String },

    #[error("Both {first} and {second} returned validator updates")]
    ValidatorUpdateConflict { first: String, second: String },

    #[error("Module {0} added by an upgrade returned validator updates")]
    ValidatorUpdatesOnMigration(String),

    #[error("Migration for {module} from schema {from_schema} is already registered")]
    DuplicateMigration { module: String, from_schema: u64 },

    #[error("No migration registered for {module} from schema {from_schema}")]
    MissingMigration { module: String, from_schema: u64 },

    #[error(transparent)]
    Module(#[from] ModuleError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

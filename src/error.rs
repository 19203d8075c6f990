use tessera_ante::AnteError;
use tessera_modules::{ManagerError, ModuleError};
use tessera_signal::SignalError;
use tessera_square::SquareError;
use tessera_types::address::Address;
use tessera_types::codec::CodecError;
use tessera_types::version::ProtocolVersion;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AppError {
    #[error("Protocol version {0} has no mounted modules")]
    UnsupportedVersion(ProtocolVersion),

    #[error("Invalid genesis: {0}")]
    InvalidGenesis(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Chain already initialized")]
    AlreadyInitialized,

    #[error("No block in progress")]
    NoBlockInProgress,

    #[error("Block {0} already in progress")]
    BlockInProgress(u64),

    #[error("Unexpected height {got}, expected {expected}")]
    UnexpectedHeight { expected: u64, got: u64 },

    #[error("Message {type_url} is not accepted at version {version}")]
    MessageNotAccepted {
        type_url: String,
        version: ProtocolVersion,
    },

    #[error("Plain transaction carries MsgPayForBlobs")]
    UnexpectedPayForBlobs,

    #[error("Insufficient funds: {address} has {available}{denom}, needs {required}{denom}")]
    InsufficientFunds {
        address: Address,
        denom: String,
        available: u64,
        required: u64,
    },

    #[error("Invalid parameter: {0}")]
    InvalidParam(String),

    #[error("Unsupported denomination {0}")]
    InvalidDenom(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Unknown validator {0}")]
    UnknownValidator(Address),

    #[error("Invalid proposal: {0}")]
    InvalidProposal(String),

    #[error(transparent)]
    Ante(#[from] AnteError),

    #[error(transparent)]
    Manager(#[from] ManagerError),

    #[error(transparent)]
    Module(#[from] ModuleError),

    #[error(transparent)]
    Signal(#[from] SignalError),

    #[error(transparent)]
    Square(#[from] SquareError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

use tessera_types::address::Address;
use tessera_types::codec::CodecError;
use tessera_types::error::TxError;
use tessera_types::version::ProtocolVersion;
use thiserror::Error;

/// Admission failures. Messages name the violated policy so that a client
/// submitting the transaction can act on them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AnteError {
    #[error("Panic during admission: {0}")]
    Panic(String),

    #[error("Protocol version {0} is not supported")]
    UnsupportedVersion(ProtocolVersion),

    #[error("Message {type_url} is not supported in protocol version {version}")]
    MessageNotSupported {
        type_url: String,
        version: ProtocolVersion,
    },

    #[error("Out of gas in {descriptor}: limit {limit}, required {required}")]
    OutOfGas {
        descriptor: &'static str,
        limit: u64,
        required: u64,
    },

    #[error("Transaction size {size} exceeds maximum {max}")]
    TxTooLarge { size: u64, max: u64 },

    #[error("Extension options are not allowed")]
    ExtensionOptionsNotAllowed,

    #[error("Invalid transaction: {0}")]
    InvalidTx(#[from] TxError),

    #[error("Transaction timed out: timeout height {timeout}, current height {height}")]
    TxTimeout { timeout: u64, height: u64 },

    #[error("Memo too long: {len} characters, maximum {max}")]
    MemoTooLong { len: u64, max: u64 },

    #[error("Insufficient fee for {threshold} minimum gas price: required {required}, provided {provided}")]
    InsufficientFee {
        threshold: &'static str,
        required: String,
        provided: String,
    },

    #[error("Insufficient funds in {address} to pay fee {fee}")]
    InsufficientFunds { address: Address, fee: String },

    #[error("Fee grant rejected: {0}")]
    FeeGrant(String),

    #[error("Too many signatures: {count}, limit {limit}")]
    TooManySignatures { count: u64, limit: u64 },

    #[error("Unknown account {0}")]
    UnknownAccount(Address),

    #[error("Public key does not match account {0}")]
    PubKeyMismatch(Address),

    #[error("Account sequence mismatch: expected {expected}, got {got}")]
    SequenceMismatch { expected: u64, got: u64 },

    #[error("Account sequence of {0} cannot advance further")]
    SequenceOverflow(Address),

    #[error("Signature verification failed for {0}")]
    InvalidSignature(Address),

    #[error("Insufficient gas for blobs: required {required}, limit {limit}")]
    InsufficientGasForBlobs { required: u64, limit: u64 },

    #[error("Total blob size {size} exceeds maximum {max}")]
    BlobsTooLarge { size: u64, max: u64 },

    #[error("Blobs occupy {shares} shares, maximum {max}")]
    TooManyBlobShares { shares: u64, max: u64 },

    #[error("Proposal must contain at least one message")]
    EmptyProposal,

    #[error("Parameter {subspace}/{key} can only be changed by a hardfork")]
    ParamChangeBlocked { subspace: String, key: String },

    #[error("Redundant relay: {0}")]
    RedundantRelay(String),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
}

use thiserror::Error;

/// Stateless validation failures of a transaction or one of its messages.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TxError {
    #[error("Transaction carries no messages")]
    NoMessages,

    #[error("Transaction has no signers")]
    NoSigners,

    #[error("Wrong number of signatures; expected {expected}, got {got}")]
    SignatureCountMismatch { expected: usize, got: usize },

    #[error("Gas limit must be positive")]
    ZeroGas,

    #[error("Invalid fee: {0}")]
    InvalidFee(String),

    #[error("Invalid message: {0}")]
    InvalidMsg(String),

    #[error("Messages nested deeper than {max} levels")]
    NestingTooDeep { max: usize },

    #[error("Codec error: {0}")]
    Codec(#[from] crate::codec::CodecError),
}

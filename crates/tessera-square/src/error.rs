use tessera_types::codec::CodecError;
use tessera_types::namespace::{Namespace, NamespaceError};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SquareError {
    #[error("Content does not fit in a square of size {max_square_size}")]
    DoesNotFit { max_square_size: usize },

    #[error("Invalid square size {0}: must be a power of two between 1 and the maximum")]
    InvalidSquareSize(usize),

    #[error("Namespaces out of order: {previous} then {next}")]
    NamespaceOrder { previous: Namespace, next: Namespace },

    #[error("Erasure coding failed: {0}")]
    ErasureCoding(String),

    #[error("Malformed share: {0}")]
    MalformedShare(String),

    #[error("Invalid blob transaction: {0}")]
    InvalidBlobTx(String),

    #[error("Invalid data availability header: {0}")]
    InvalidHeader(String),

    #[error(transparent)]
    Namespace(#[from] NamespaceError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl From<reed_solomon_erasure::Error> for SquareError {
    fn from(e: reed_solomon_erasure::Error) -> Self {
        SquareError::ErasureCoding(format!("{:?}", e))
    }
}

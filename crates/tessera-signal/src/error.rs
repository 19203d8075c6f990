use tessera_types::address::Address;
use tessera_types::codec::CodecError;
use tessera_types::version::ProtocolVersion;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignalError {
    #[error("Upgrade to {version} already pending at height {activation_height}")]
    UpgradePending {
        version: ProtocolVersion,
        activation_height: u64,
    },

    #[error("Signalled version {signalled} is below the current version {current}")]
    VersionBelowCurrent {
        signalled: ProtocolVersion,
        current: ProtocolVersion,
    },

    #[error("Quorum version {quorum} is not greater than the current version {current}")]
    VersionNotGreater {
        quorum: ProtocolVersion,
        current: ProtocolVersion,
    },

    #[error("Validator {0} is not in the bonded set")]
    UnknownValidator(Address),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

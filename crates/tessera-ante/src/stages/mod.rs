//! The standard admission stages, in the order the handler runs them.

mod basic;
mod blob;
mod fee;
mod gate;
mod proposal;
mod relay;
mod sigverify;

pub use basic::{ConsumeTxSizeGas, MaxTxSize, SetUpGasMeter, StructuralChecks};
pub use blob::{max_total_blob_size, BlobChecks};
pub use fee::{check_fee, tx_priority, DeductFee};
pub use gate::MessageGate;
pub use proposal::{is_blocked_param, ProposalFilter, BLOCKED_PARAMS};
pub use relay::RedundantRelay;
pub use sigverify::SigVerification;

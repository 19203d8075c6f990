//! Transaction admission ("ante") pipeline.
//!
//! An [`AnteHandler`] runs an ordered list of [`AnteStage`]s over each
//! transaction against a transaction-scoped store overlay. The first failing
//! stage aborts admission; effects of earlier stages live in the overlay and
//! are kept or dropped by the caller.

pub mod context;
pub mod error;
pub mod gas;
pub mod handler;
pub mod keepers;
pub mod stages;

pub use context::{AnteContext, ExecMode};
pub use error::AnteError;
pub use gas::GasMeter;
pub use handler::{AnteDeps, AnteHandler, AnteOutcome, AnteStage};
pub use keepers::{
    Account, AccountKeeper, AnteParams, Ed25519Verifier, FeeExecutor, ParamsProvider, RelayTracker,
    SignatureVerifier,
};

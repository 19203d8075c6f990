//! Tessera application state machine.
//!
//! [`App`] exposes the callbacks a consensus engine drives: chain
//! initialization, mempool admission, proposal preparation and validation,
//! block execution and commit. Modules are resolved per protocol version and
//! the chain moves between versions through validator signalling.

pub mod app;
pub mod config;
pub mod error;
pub mod keepers;
pub mod modules;
pub mod proposal;
pub mod router;

pub use app::{App, CommitResponse, EndBlockResponse, GenesisDoc, TxOutcome};
pub use crate::config::AppConfig;
pub use error::AppError;
pub use proposal::{PreparedProposal, ProcessProposal, ProposalStatus};

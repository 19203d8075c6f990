//! Upgrade coordination by validator signalling.
//!
//! Validators signal the protocol version they are ready to run. Once the
//! last-committed voting power behind a single version reaches five sixths of
//! the total, anyone may submit `TryUpgrade`, which schedules the transition
//! a fixed number of blocks later. The host polls [`Keeper::should_upgrade`]
//! at every end of block and calls [`Keeper::reset_tally`] after switching.

pub mod error;
pub mod keeper;

pub use error::SignalError;
pub use keeper::{quorum_threshold, Keeper, PendingUpgrade, PowerSource, VersionTally};

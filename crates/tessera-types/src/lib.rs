//! Shared vocabulary of the Tessera state machine.
//!
//! Everything that more than one subsystem needs to agree on lives here:
//! per-version protocol constants, the transaction and message model, blob
//! envelopes, namespaces, the deterministic codec and the key-value store
//! overlays that scope state changes to a transaction or a block.

pub mod abci;
pub mod accepted;
pub mod address;
pub mod appconsts;
pub mod blob;
pub mod codec;
pub mod coin;
pub mod error;
pub mod msgs;
pub mod namespace;
pub mod store;
pub mod tx;
pub mod version;

pub use abci::{Event, ValidatorUpdate};
pub use accepted::AcceptedMessageSet;
pub use address::Address;
pub use blob::{Blob, BlobTx, IndexWrapper};
pub use codec::CodecError;
pub use coin::{Coin, DecCoin};
pub use error::TxError;
pub use msgs::Msg;
pub use namespace::Namespace;
pub use store::{BlockStore, CacheStore, Changeset, KvStore, MemStore};
pub use tx::{AuthInfo, Fee, SignerInfo, Tx, TxBody};
pub use version::ProtocolVersion;

//! Block data layout: the data square, its erasure extension and the data
//! availability header committed to by every block.
//!
//! The proposer builds a square from the admitted transactions with
//! [`Builder`]; every validator rebuilds it from the proposed list with
//! [`construct`] and compares [`DataAvailabilityHeader::hash`] with the
//! claimed data root.

pub mod blobtx;
pub mod builder;
pub mod dah;
pub mod eds;
pub mod error;
pub mod inclusion;
pub mod merkle;
pub mod nmt;
pub mod shares;

pub use blobtx::validate_blob_tx;
pub use builder::{construct, max_square_size, Builder, Layout, Square};
pub use dah::DataAvailabilityHeader;
pub use eds::ExtendedDataSquare;
pub use error::SquareError;
pub use inclusion::create_commitment;
pub use shares::Share;

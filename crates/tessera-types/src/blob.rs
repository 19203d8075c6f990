// BLOB ENVELOPES
// A blob-carrying transaction travels as a `BlobTx` envelope: the signed
// transaction (containing exactly one MsgPayForBlobs) plus the blobs it pays
// for. Inside the data square the signed transaction is stored as an
// `IndexWrapper` recording the share index where each blob starts.
//
// Envelopes are tagged by a 4-byte marker so that detection never depends on
// a plain transaction failing to decode.

use crate::codec::{self, CodecError};
use crate::namespace::Namespace;
use serde::{Deserialize, Serialize};

pub const BLOB_TX_MARKER: &[u8; 4] = b"BLOB";
pub const INDEX_WRAPPER_MARKER: &[u8; 4] = b"INDX";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blob {
    pub namespace: Namespace,
    pub data: Vec<u8>,
    pub share_version: u8,
}

impl Blob {
    pub fn new(namespace: Namespace, data: Vec<u8>) -> Self {
        Blob {
            namespace,
            data,
            share_version: crate::appconsts::SHARE_VERSION_ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobTx {
    /// Encoded signed [`crate::tx::Tx`]
    pub tx: Vec<u8>,
    pub blobs: Vec<Blob>,
}

impl BlobTx {
    pub fn marshal(&self) -> Result<Vec<u8>, CodecError> {
        tagged(BLOB_TX_MARKER, self)
    }
}

/// Returns `Ok(None)` for bytes that are not a blob envelope, `Err` for an
/// envelope whose body does not decode.
pub fn unmarshal_blob_tx(raw: &[u8]) -> Result<Option<BlobTx>, CodecError> {
    untag(BLOB_TX_MARKER, raw)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexWrapper {
    pub tx: Vec<u8>,
    pub share_indexes: Vec<u32>,
}

impl IndexWrapper {
    pub fn marshal(&self) -> Result<Vec<u8>, CodecError> {
        tagged(INDEX_WRAPPER_MARKER, self)
    }

    /// Encoded length for a wrapper around `tx_len` bytes with `blob_count`
    /// indexes. Independent of the index values (fixed-width encoding).
    pub fn encoded_len(tx_len: usize, blob_count: usize) -> usize {
        // marker + vec length prefix + tx + vec length prefix + u32 per index
        INDEX_WRAPPER_MARKER.len() + 8 + tx_len + 8 + 4 * blob_count
    }
}

pub fn unmarshal_index_wrapper(raw: &[u8]) -> Result<Option<IndexWrapper>, CodecError> {
    untag(INDEX_WRAPPER_MARKER, raw)
}

fn tagged<T: Serialize>(marker: &[u8; 4], value: &T) -> Result<Vec<u8>, CodecError> {
    let body = codec::encode(value)?;
    let mut out = Vec::with_capacity(marker.len() + body.len());
    out.extend_from_slice(marker);
    out.extend_from_slice(&body);
    Ok(out)
}

fn untag<T: serde::de::DeserializeOwned>(marker: &[u8; 4], raw: &[u8]) -> Result<Option<T>, CodecError> {
    match raw.strip_prefix(marker.as_slice()) {
        Some(body) => codec::decode(body).map(Some),
        None => Ok(None),
    }
}

// SHARES
// A share is a fixed 512-byte cell of the data square:
//
//   namespace (29) | info byte (1) | [sequence length (4), first share only] | ...
//
// Compact shares hold a stream of length-delimited units (transactions or
// index wrappers) and reserve 4 bytes recording where the first unit that
// starts in the share begins. Sparse shares hold one blob each, zero padded.
//
// SAFETY INVARIANTS:
// 1. Every share is exactly SHARE_SIZE bytes
// 2. Share counts for a given payload are a pure function of its length
// 3. Splitting then parsing a compact sequence yields the original units

use crate::error::SquareError;
use tessera_types::appconsts::{
    COMPACT_SHARE_RESERVED_BYTES, CONTINUATION_COMPACT_SHARE_CONTENT_SIZE,
    CONTINUATION_SPARSE_SHARE_CONTENT_SIZE, FIRST_COMPACT_SHARE_CONTENT_SIZE,
    FIRST_SPARSE_SHARE_CONTENT_SIZE, NAMESPACE_SIZE, SEQUENCE_LEN_BYTES, SHARE_INFO_BYTES,
    SHARE_SIZE, SHARE_VERSION_ZERO, UNIT_LEN_BYTES,
};
use tessera_types::namespace::Namespace;

#[derive(Clone, PartialEq, Eq)]
pub struct Share(Vec<u8>);

impl Share {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, SquareError> {
        if bytes.len() != SHARE_SIZE {
            return Err(SquareError::MalformedShare(format!(
                "share must be {} bytes, got {}",
                SHARE_SIZE,
                bytes.len()
            )));
        }
        Ok(Share(bytes))
    }

    pub fn namespace(&self) -> Namespace {
        let mut raw = [0u8; NAMESPACE_SIZE];
        raw.copy_from_slice(&self.0[..NAMESPACE_SIZE]);
        Namespace::from_raw(raw)
    }

    pub fn info_byte(&self) -> u8 {
        self.0[NAMESPACE_SIZE]
    }

    pub fn share_version(&self) -> u8 {
        self.info_byte() >> 1
    }

    pub fn is_sequence_start(&self) -> bool {
        self.info_byte() & 1 == 1
    }

    /// Declared length of the sequence; only meaningful on a sequence start.
    pub fn sequence_len(&self) -> u32 {
        let at = NAMESPACE_SIZE + SHARE_INFO_BYTES;
        read_u32(&self.0[at..at + SEQUENCE_LEN_BYTES])
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl std::fmt::Debug for Share {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Share({}, info={:#04x})", self.namespace(), self.info_byte())
    }
}

pub fn info_byte(share_version: u8, sequence_start: bool) -> u8 {
    (share_version << 1) | sequence_start as u8
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[..4]);
    u32::from_be_bytes(buf)
}

fn header(namespace: &Namespace, share_version: u8, sequence_start: bool) -> Vec<u8> {
    let mut share = Vec::with_capacity(SHARE_SIZE);
    share.extend_from_slice(namespace.as_bytes());
    share.push(info_byte(share_version, sequence_start));
    share
}

// ==================== SHARE COUNTS ====================

/// Shares needed for a compact sequence of `sequence_len` bytes
/// (units plus their delimiters).
pub fn compact_shares_needed(sequence_len: usize) -> usize {
    if sequence_len == 0 {
        return 0;
    }
    if sequence_len <= FIRST_COMPACT_SHARE_CONTENT_SIZE {
        return 1;
    }
    let rest = sequence_len - FIRST_COMPACT_SHARE_CONTENT_SIZE;
    1 + rest.div_ceil(CONTINUATION_COMPACT_SHARE_CONTENT_SIZE)
}

/// Shares needed for one blob of `blob_len` bytes.
pub fn sparse_shares_needed(blob_len: usize) -> usize {
    if blob_len <= FIRST_SPARSE_SHARE_CONTENT_SIZE {
        return 1;
    }
    let rest = blob_len - FIRST_SPARSE_SHARE_CONTENT_SIZE;
    1 + rest.div_ceil(CONTINUATION_SPARSE_SHARE_CONTENT_SIZE)
}

/// Bytes a unit occupies in a compact sequence.
pub fn delimited_len(unit_len: usize) -> usize {
    UNIT_LEN_BYTES + unit_len
}

// ==================== COMPACT SHARES ====================

/// Splits length-delimited units into compact shares of `namespace`.
pub fn split_compact(namespace: &Namespace, units: &[Vec<u8>]) -> Vec<Share> {
    if units.is_empty() {
        return Vec::new();
    }

    let mut stream = Vec::new();
    let mut unit_starts = Vec::with_capacity(units.len());
    for unit in units {
        unit_starts.push(stream.len());
        stream.extend_from_slice(&(unit.len() as u32).to_be_bytes());
        stream.extend_from_slice(unit);
    }

    let mut shares = Vec::with_capacity(compact_shares_needed(stream.len()));
    let mut offset = 0usize;
    while offset < stream.len() {
        let first = offset == 0;
        let capacity = if first {
            FIRST_COMPACT_SHARE_CONTENT_SIZE
        } else {
            CONTINUATION_COMPACT_SHARE_CONTENT_SIZE
        };
        let end = (offset + capacity).min(stream.len());

        let mut share = header(namespace, SHARE_VERSION_ZERO, first);
        if first {
            share.extend_from_slice(&(stream.len() as u32).to_be_bytes());
        }
        let content_start = share.len() + COMPACT_SHARE_RESERVED_BYTES;
        // Offset inside this share of the first unit that begins here.
        let reserved = unit_starts
            .iter()
            .find(|start| **start >= offset && **start < end)
            .map(|start| (content_start + start - offset) as u32)
            .unwrap_or(0);
        share.extend_from_slice(&reserved.to_be_bytes());
        share.extend_from_slice(&stream[offset..end]);
        share.resize(SHARE_SIZE, 0);

        shares.push(Share(share));
        offset = end;
    }
    shares
}

/// Recovers the units of a compact sequence.
pub fn parse_compact(shares: &[Share]) -> Result<Vec<Vec<u8>>, SquareError> {
    let Some(first) = shares.first() else {
        return Ok(Vec::new());
    };
    if !first.is_sequence_start() {
        return Err(SquareError::MalformedShare("compact sequence does not start".into()));
    }
    let sequence_len = first.sequence_len() as usize;

    let mut stream = Vec::with_capacity(sequence_len);
    for (i, share) in shares.iter().enumerate() {
        let content_at = if i == 0 {
            NAMESPACE_SIZE + SHARE_INFO_BYTES + SEQUENCE_LEN_BYTES + COMPACT_SHARE_RESERVED_BYTES
        } else {
            NAMESPACE_SIZE + SHARE_INFO_BYTES + COMPACT_SHARE_RESERVED_BYTES
        };
        stream.extend_from_slice(&share.as_bytes()[content_at..]);
    }
    if stream.len() < sequence_len {
        return Err(SquareError::MalformedShare(format!(
            "sequence declares {} bytes but shares hold {}",
            sequence_len,
            stream.len()
        )));
    }
    stream.truncate(sequence_len);

    let mut units = Vec::new();
    let mut at = 0usize;
    while at < stream.len() {
        if at + UNIT_LEN_BYTES > stream.len() {
            return Err(SquareError::MalformedShare("truncated unit delimiter".into()));
        }
        let len = read_u32(&stream[at..]) as usize;
        at += UNIT_LEN_BYTES;
        if at + len > stream.len() {
            return Err(SquareError::MalformedShare("truncated unit".into()));
        }
        units.push(stream[at..at + len].to_vec());
        at += len;
    }
    Ok(units)
}

// ==================== SPARSE SHARES ====================

/// Splits one blob into sparse shares.
pub fn split_sparse(namespace: &Namespace, share_version: u8, data: &[u8]) -> Vec<Share> {
    let mut shares = Vec::with_capacity(sparse_shares_needed(data.len()));
    let mut offset = 0usize;
    loop {
        let first = offset == 0;
        let capacity = if first {
            FIRST_SPARSE_SHARE_CONTENT_SIZE
        } else {
            CONTINUATION_SPARSE_SHARE_CONTENT_SIZE
        };
        let end = (offset + capacity).min(data.len());

        let mut share = header(namespace, share_version, first);
        if first {
            share.extend_from_slice(&(data.len() as u32).to_be_bytes());
        }
        share.extend_from_slice(&data[offset..end]);
        share.resize(SHARE_SIZE, 0);
        shares.push(Share(share));

        offset = end;
        if offset >= data.len() {
            break;
        }
    }
    shares
}

// ==================== PADDING ====================

/// A padding share: a sequence start declaring zero bytes.
pub fn padding_share(namespace: &Namespace) -> Share {
    let mut share = header(namespace, SHARE_VERSION_ZERO, true);
    share.extend_from_slice(&0u32.to_be_bytes());
    share.resize(SHARE_SIZE, 0);
    Share(share)
}

pub fn padding_shares(namespace: &Namespace, count: usize) -> Vec<Share> {
    vec![padding_share(namespace); count]
}

// SQUARE BUILDER
// Lays out one block's data as a k×k square of shares:
//
//   [ TX compact shares ][ PAY_FOR_BLOB compact shares ][ pad ][ blob ][ pad ][ blob ] ... [ tail padding ]
//
// Blobs are ordered by namespace (stable, so ties keep transaction order)
// and each starts at an aligned index. The alignment rule depends on the
// protocol version's layout family.
//
// SAFETY INVARIANTS:
// 1. Identical input yields an identical square
// 2. k is the smallest power of two whose layout fits, never above the maximum
// 3. Namespaces are non-decreasing in row-major order
// 4. Index wrappers record the share index where each of their blobs starts

use crate::error::SquareError;
use crate::inclusion::{blob_min_square_size, subtree_width};
use crate::shares::{
    compact_shares_needed, delimited_len, padding_share, sparse_shares_needed, split_compact,
    split_sparse, Share,
};
use log::debug;
use tessera_types::appconsts::{self, HARD_MAX_SQUARE_SIZE, MIN_SQUARE_SIZE};
use tessera_types::blob::{unmarshal_blob_tx, Blob, BlobTx, IndexWrapper};
use tessera_types::namespace::Namespace;
use tessera_types::version::ProtocolVersion;

/// Blob alignment family, selected by protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Blobs start at a multiple of their minimum square size.
    Legacy,
    /// Blobs start at a multiple of their commitment subtree width.
    Inclusion,
}

impl Layout {
    pub fn for_version(version: ProtocolVersion) -> Self {
        if version >= ProtocolVersion::V2 {
            Layout::Inclusion
        } else {
            Layout::Legacy
        }
    }

    fn alignment(self, share_count: usize, square_size: usize, subtree_root_threshold: usize) -> usize {
        let width = match self {
            Layout::Legacy => blob_min_square_size(share_count),
            Layout::Inclusion => subtree_width(share_count, subtree_root_threshold),
        };
        width.min(square_size).max(1)
    }
}

/// Largest square side allowed for `version` under the governance ceiling.
pub fn max_square_size(version: ProtocolVersion, gov_max_square_size: u64) -> usize {
    let bound = appconsts::square_size_upper_bound(version).min(HARD_MAX_SQUARE_SIZE);
    let gov = usize::try_from(gov_max_square_size).unwrap_or(usize::MAX).max(1);
    let capped = gov.min(bound);
    // Round down to a power of two.
    1 << (usize::BITS - 1 - capped.leading_zeros())
}

/// The original (non-extended) data square.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Square {
    size: usize,
    shares: Vec<Share>,
}

impl Square {
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn shares(&self) -> &[Share] {
        &self.shares
    }

    pub fn share(&self, row: usize, col: usize) -> &Share {
        &self.shares[row * self.size + col]
    }

    /// Square with no transactions: a single tail-padding share.
    pub fn empty() -> Self {
        Square {
            size: 1,
            shares: vec![padding_share(&Namespace::TAIL_PADDING)],
        }
    }
}

#[derive(Debug, Clone)]
struct PfbElement {
    tx: Vec<u8>,
    blobs: Vec<Blob>,
}

/// Positions of every blob, in placement (namespace) order.
struct Placement {
    square_size: usize,
    /// (pfb index, blob index, start share index)
    blobs: Vec<(usize, usize, usize)>,
}

/// Accumulates square content. Share counts are kept as running totals and
/// the blob order is maintained on insert, so an append only re-places blobs
/// when the reserved compact shares or the blob set change.
pub struct Builder {
    max_square_size: usize,
    subtree_root_threshold: usize,
    layout: Layout,
    txs: Vec<Vec<u8>>,
    pfbs: Vec<PfbElement>,
    /// Delimited bytes of all plain transactions
    tx_units_len: usize,
    /// Delimited bytes of all index wrappers
    pfb_units_len: usize,
    /// (pfb index, blob index) sorted by namespace, ties in insertion order
    blob_order: Vec<(usize, usize)>,
    /// Smallest square side the current content fits in
    square_size: usize,
}

impl Builder {
    pub fn new(max_square_size: usize, subtree_root_threshold: usize, layout: Layout) -> Result<Self, SquareError> {
        if max_square_size == 0
            || !max_square_size.is_power_of_two()
            || max_square_size > HARD_MAX_SQUARE_SIZE
        {
            return Err(SquareError::InvalidSquareSize(max_square_size));
        }
        Ok(Builder {
            max_square_size,
            subtree_root_threshold,
            layout,
            txs: Vec::new(),
            pfbs: Vec::new(),
            tx_units_len: 0,
            pfb_units_len: 0,
            blob_order: Vec::new(),
            square_size: MIN_SQUARE_SIZE,
        })
    }

    pub fn for_version(version: ProtocolVersion, gov_max_square_size: u64) -> Result<Self, SquareError> {
        Builder::new(
            max_square_size(version, gov_max_square_size),
            appconsts::subtree_root_threshold(version),
            Layout::for_version(version),
        )
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn max_square_size(&self) -> usize {
        self.max_square_size
    }

    /// Adds a plain transaction if the square still fits; returns whether it
    /// was added.
    pub fn append_tx(&mut self, tx: Vec<u8>) -> bool {
        let tx_units_len = self.tx_units_len + delimited_len(tx.len());
        let reserved = compact_shares_needed(tx_units_len) + compact_shares_needed(self.pfb_units_len);
        if reserved != self.reserved_shares() {
            match self.fit(reserved, &self.blob_order) {
                Some(size) => self.square_size = size,
                None => return false,
            }
        }
        self.tx_units_len = tx_units_len;
        self.txs.push(tx);
        true
    }

    /// Adds a blob transaction (its inner tx plus blobs) if the square still
    /// fits; returns whether it was added.
    pub fn append_blob_tx(&mut self, blob_tx: BlobTx) -> bool {
        let pfb_units_len = self.pfb_units_len
            + delimited_len(IndexWrapper::encoded_len(blob_tx.tx.len(), blob_tx.blobs.len()));
        let reserved = compact_shares_needed(self.tx_units_len) + compact_shares_needed(pfb_units_len);

        let p = self.pfbs.len();
        self.pfbs.push(PfbElement {
            tx: blob_tx.tx,
            blobs: blob_tx.blobs,
        });
        let mut order = self.blob_order.clone();
        for b in 0..self.pfbs[p].blobs.len() {
            let namespace = self.blob(p, b).namespace;
            let at = order.partition_point(|(q, c)| self.blob(*q, *c).namespace <= namespace);
            order.insert(at, (p, b));
        }

        match self.fit(reserved, &order) {
            Some(size) => {
                self.square_size = size;
                self.pfb_units_len = pfb_units_len;
                self.blob_order = order;
                true
            }
            None => {
                self.pfbs.pop();
                false
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.txs.is_empty() && self.pfbs.is_empty()
    }

    /// Side of the square the current content needs.
    pub fn square_size(&self) -> usize {
        self.square_size
    }

    fn blob(&self, p: usize, b: usize) -> &Blob {
        &self.pfbs[p].blobs[b]
    }

    fn reserved_shares(&self) -> usize {
        compact_shares_needed(self.tx_units_len) + compact_shares_needed(self.pfb_units_len)
    }

    /// Smallest square, no smaller than the current one, that holds
    /// `reserved` compact shares followed by blobs in `order`. Content only
    /// grows, so no smaller square can fit.
    fn fit(&self, reserved: usize, order: &[(usize, usize)]) -> Option<usize> {
        let mut size = self.square_size;
        while size <= self.max_square_size {
            if self.place(size, reserved, order).is_some() {
                return Some(size);
            }
            size *= 2;
        }
        None
    }

    fn place(&self, size: usize, reserved: usize, order: &[(usize, usize)]) -> Option<Placement> {
        let capacity = size * size;
        if reserved > capacity {
            return None;
        }
        let mut cursor = reserved;
        let mut blobs = Vec::with_capacity(order.len());
        for (p, b) in order {
            let share_count = sparse_shares_needed(self.blob(*p, *b).data.len());
            let align = self.layout.alignment(share_count, size, self.subtree_root_threshold);
            let start = cursor.div_ceil(align) * align;
            cursor = start + share_count;
            if cursor > capacity {
                return None;
            }
            blobs.push((*p, *b, start));
        }
        Some(Placement {
            square_size: size,
            blobs,
        })
    }

    /// Lays out the shares of the current content.
    pub fn export(&self) -> Result<Square, SquareError> {
        if self.is_empty() {
            return Ok(Square::empty());
        }
        let placement = self
            .place(self.square_size, self.reserved_shares(), &self.blob_order)
            .ok_or(SquareError::DoesNotFit {
                max_square_size: self.max_square_size,
            })?;
        let size = placement.square_size;

        let mut share_indexes: Vec<Vec<u32>> = self
            .pfbs
            .iter()
            .map(|pfb| vec![0u32; pfb.blobs.len()])
            .collect();
        for (p, b, start) in &placement.blobs {
            share_indexes[*p][*b] = *start as u32;
        }

        let mut wrappers = Vec::with_capacity(self.pfbs.len());
        for (pfb, indexes) in self.pfbs.iter().zip(share_indexes) {
            wrappers.push(
                IndexWrapper {
                    tx: pfb.tx.clone(),
                    share_indexes: indexes,
                }
                .marshal()?,
            );
        }

        let mut shares = split_compact(&Namespace::TX, &self.txs);
        let pfb_shares = split_compact(&Namespace::PAY_FOR_BLOB, &wrappers);
        debug_assert_eq!(pfb_shares.len(), compact_shares_needed(self.pfb_units_len));
        shares.extend(pfb_shares);

        let mut padding_namespace = Namespace::PRIMARY_RESERVED_PADDING;
        for (p, b, start) in &placement.blobs {
            let blob = &self.pfbs[*p].blobs[*b];
            if shares.len() < *start {
                shares.resize(*start, padding_share(&padding_namespace));
            }
            shares.extend(split_sparse(&blob.namespace, blob.share_version, &blob.data));
            padding_namespace = blob.namespace;
        }
        shares.resize(size * size, padding_share(&Namespace::TAIL_PADDING));

        debug!(
            "Built {}x{} square: {} txs, {} blob txs, {} blobs",
            size,
            size,
            self.txs.len(),
            self.pfbs.len(),
            placement.blobs.len()
        );
        Ok(Square { size, shares })
    }
}

/// Rebuilds the square for an already-ordered transaction list. Unlike
/// [`Builder::append_tx`], content that does not fit is an error. Bytes
/// carrying the blob marker but no decodable envelope are laid out as an
/// ordinary transaction.
pub fn construct(
    txs: &[Vec<u8>],
    version: ProtocolVersion,
    gov_max_square_size: u64,
) -> Result<Square, SquareError> {
    let mut builder = Builder::for_version(version, gov_max_square_size)?;
    for raw in txs {
        let added = match unmarshal_blob_tx(raw) {
            Ok(Some(blob_tx)) => builder.append_blob_tx(blob_tx),
            Ok(None) | Err(_) => builder.append_tx(raw.clone()),
        };
        if !added {
            return Err(SquareError::DoesNotFit {
                max_square_size: builder.max_square_size(),
            });
        }
    }
    builder.export()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shares::parse_compact;
    use tessera_types::blob::unmarshal_index_wrapper;

    fn ns(id: &[u8]) -> Namespace {
        Namespace::new_v0(id).unwrap()
    }

    fn blob_tx(tx: &[u8], blobs: Vec<(Namespace, usize)>) -> BlobTx {
        BlobTx {
            tx: tx.to_vec(),
            blobs: blobs
                .into_iter()
                .map(|(n, len)| Blob::new(n, vec![0xAB; len]))
                .collect(),
        }
    }

    #[test]
    fn test_max_square_size() {
        assert_eq!(max_square_size(ProtocolVersion::V1, 64), 64);
        assert_eq!(max_square_size(ProtocolVersion::V1, 1000), 128);
        assert_eq!(max_square_size(ProtocolVersion::V1, 100), 64);
        assert_eq!(max_square_size(ProtocolVersion::V1, 0), 1);
    }

    #[test]
    fn test_empty_square() {
        let square = construct(&[], ProtocolVersion::V2, 64).unwrap();
        assert_eq!(square, Square::empty());
        assert_eq!(square.share(0, 0).namespace(), Namespace::TAIL_PADDING);
    }

    #[test]
    fn test_txs_only() {
        let txs = vec![vec![1u8; 100], vec![2u8; 900]];
        let square = construct(&txs, ProtocolVersion::V2, 64).unwrap();
        // 104 + 904 bytes need 3 compact shares, so the square is 2x2.
        assert_eq!(square.size(), 2);
        assert_eq!(parse_compact(&square.shares()[..3]).unwrap(), txs);
        assert_eq!(square.shares()[3].namespace(), Namespace::TAIL_PADDING);
    }

    #[test]
    fn test_blobs_sorted_and_indexed() {
        let mut builder = Builder::for_version(ProtocolVersion::V2, 64).unwrap();
        assert!(builder.append_tx(vec![7u8; 50]));
        assert!(builder.append_blob_tx(blob_tx(b"pfb-1", vec![(ns(b"zzzz"), 100)])));
        assert!(builder.append_blob_tx(blob_tx(b"pfb-2", vec![(ns(b"aaaa"), 600)])));
        let square = builder.export().unwrap();

        let namespaces: Vec<Namespace> = square.shares().iter().map(Share::namespace).collect();
        let mut sorted = namespaces.clone();
        sorted.sort();
        assert_eq!(namespaces, sorted);

        // tx share, pfb share, then "aaaa" (2 shares, width 1) and "zzzz".
        assert_eq!(namespaces[0], Namespace::TX);
        assert_eq!(namespaces[1], Namespace::PAY_FOR_BLOB);
        assert_eq!(namespaces[2], ns(b"aaaa"));
        assert_eq!(namespaces[3], ns(b"aaaa"));
        assert_eq!(namespaces[4], ns(b"zzzz"));

        let wrappers = parse_compact(&square.shares()[1..2]).unwrap();
        let first = unmarshal_index_wrapper(&wrappers[0]).unwrap().unwrap();
        let second = unmarshal_index_wrapper(&wrappers[1]).unwrap().unwrap();
        assert_eq!(first.tx, b"pfb-1".to_vec());
        assert_eq!(first.share_indexes, vec![4]);
        assert_eq!(second.share_indexes, vec![2]);
    }

    #[test]
    fn test_legacy_alignment_pads_to_min_square() {
        // A 5-share blob must start at a multiple of 4 under the legacy rules.
        let mut builder = Builder::new(8, 64, Layout::Legacy).unwrap();
        assert!(builder.append_blob_tx(blob_tx(b"pfb", vec![(ns(b"rollup"), 2000)])));
        let square = builder.export().unwrap();
        let shares = square.shares();
        assert_eq!(shares[0].namespace(), Namespace::PAY_FOR_BLOB);
        assert_eq!(shares[1].namespace(), Namespace::PRIMARY_RESERVED_PADDING);
        assert_eq!(shares[3].namespace(), Namespace::PRIMARY_RESERVED_PADDING);
        assert_eq!(shares[4].namespace(), ns(b"rollup"));
        assert!(shares[4].is_sequence_start());

        let mut inclusion = Builder::new(8, 64, Layout::Inclusion).unwrap();
        assert!(inclusion.append_blob_tx(blob_tx(b"pfb", vec![(ns(b"rollup"), 2000)])));
        let square = inclusion.export().unwrap();
        assert_eq!(square.shares()[1].namespace(), ns(b"rollup"));
    }

    #[test]
    fn test_prepare_drops_what_does_not_fit() {
        let mut builder = Builder::new(1, 64, Layout::Inclusion).unwrap();
        assert!(builder.append_tx(vec![1u8; 200]));
        assert!(!builder.append_tx(vec![2u8; 400]));
        assert!(builder.append_tx(vec![3u8; 10]));
        assert_eq!(builder.square_size(), 1);
    }

    #[test]
    fn test_square_grows_with_content() {
        let mut builder = Builder::new(8, 64, Layout::Inclusion).unwrap();
        assert_eq!(builder.square_size(), 1);
        // Small txs share one compact share until it overflows.
        for _ in 0..4 {
            assert!(builder.append_tx(vec![1u8; 100]));
        }
        assert_eq!(builder.square_size(), 1);
        assert!(builder.append_tx(vec![2u8; 100]));
        assert_eq!(builder.square_size(), 2);

        // tx shares + pfb share + 5 blob shares exceed a 2x2 square.
        assert!(builder.append_blob_tx(blob_tx(b"pfb", vec![(ns(b"rollup"), 2000)])));
        assert_eq!(builder.square_size(), 4);
        let square = builder.export().unwrap();
        assert_eq!(square.size(), 4);
        assert_eq!(square.shares()[3].namespace(), ns(b"rollup"));

        // A rejected blob tx leaves the layout untouched.
        assert!(!builder.append_blob_tx(blob_tx(b"big", vec![(ns(b"aaaa"), 64 * 482)])));
        assert_eq!(builder.export().unwrap(), square);
    }

    #[test]
    fn test_construct_is_strict() {
        let txs = vec![vec![1u8; 300], vec![2u8; 300]];
        // Two txs need two shares; a 1x1 ceiling cannot hold them.
        assert!(matches!(
            construct(&txs, ProtocolVersion::V2, 1),
            Err(SquareError::DoesNotFit { max_square_size: 1 })
        ));
        assert_eq!(construct(&txs, ProtocolVersion::V2, 2).unwrap().size(), 2);
    }

    #[test]
    fn test_construct_treats_corrupt_envelope_as_tx() {
        let corrupt = b"BLOBnot an envelope".to_vec();
        let square = construct(&[corrupt.clone()], ProtocolVersion::V1, 64).unwrap();
        assert_eq!(square.size(), 1);
        assert_eq!(square.shares()[0].namespace(), Namespace::TX);
        assert_eq!(parse_compact(square.shares()).unwrap(), vec![corrupt]);
    }

    #[test]
    fn test_construct_reads_blob_envelopes() {
        let envelope = blob_tx(b"pfb", vec![(ns(b"rollup"), 10)]).marshal().unwrap();
        let square = construct(&[envelope], ProtocolVersion::V2, 64).unwrap();
        assert_eq!(square.size(), 2);
        assert_eq!(square.shares()[1].namespace(), ns(b"rollup"));
    }
}

//! Two-dimensional Reed-Solomon extension of a data square.
//!
//! Each of the k original rows is extended to 2k shares, then each of the
//! 2k columns is extended from its first k cells, giving a 2k×2k square
//! whose every row and column is a codeword.

use crate::builder::Square;
use crate::error::SquareError;
use crate::nmt::{NamespacedMerkleTree, NmtNode};
use reed_solomon_erasure::galois_8::ReedSolomon;
use tessera_types::appconsts::{NAMESPACE_SIZE, SHARE_SIZE};
use tessera_types::namespace::Namespace;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedDataSquare {
    original_width: usize,
    cells: Vec<Vec<u8>>,
}

impl ExtendedDataSquare {
    pub fn extend(square: &Square) -> Result<Self, SquareError> {
        let k = square.size();
        let width = 2 * k;
        let codec = ReedSolomon::new(k, k)?;

        let mut cells = vec![Vec::new(); width * width];
        for row in 0..k {
            let mut shards: Vec<Vec<u8>> = (0..k)
                .map(|col| square.share(row, col).as_bytes().to_vec())
                .collect();
            shards.resize(width, vec![0u8; SHARE_SIZE]);
            codec.encode(&mut shards)?;
            for (col, shard) in shards.into_iter().enumerate() {
                cells[row * width + col] = shard;
            }
        }

        for col in 0..width {
            let mut shards: Vec<Vec<u8>> = (0..k).map(|row| cells[row * width + col].clone()).collect();
            shards.resize(width, vec![0u8; SHARE_SIZE]);
            codec.encode(&mut shards)?;
            for (row, shard) in shards.into_iter().enumerate().skip(k) {
                cells[row * width + col] = shard;
            }
        }

        Ok(ExtendedDataSquare {
            original_width: k,
            cells,
        })
    }

    pub fn original_width(&self) -> usize {
        self.original_width
    }

    pub fn width(&self) -> usize {
        2 * self.original_width
    }

    pub fn cell(&self, row: usize, col: usize) -> &[u8] {
        &self.cells[row * self.width() + col]
    }

    /// Namespace a cell is committed under: its own for the original
    /// quadrant, the parity namespace everywhere else.
    fn cell_namespace(&self, row: usize, col: usize) -> Result<Namespace, SquareError> {
        if row < self.original_width && col < self.original_width {
            Ok(Namespace::from_slice(&self.cell(row, col)[..NAMESPACE_SIZE])?)
        } else {
            Ok(Namespace::PARITY_SHARE)
        }
    }

    fn axis_root(&self, cells: impl Iterator<Item = (usize, usize)>) -> Result<NmtNode, SquareError> {
        let mut tree = NamespacedMerkleTree::new();
        for (row, col) in cells {
            tree.push(self.cell_namespace(row, col)?, self.cell(row, col))?;
        }
        Ok(tree.root())
    }

    pub fn row_roots(&self) -> Result<Vec<Vec<u8>>, SquareError> {
        let width = self.width();
        (0..width)
            .map(|row| self.axis_root((0..width).map(move |col| (row, col))).map(|n| n.to_bytes()))
            .collect()
    }

    pub fn column_roots(&self) -> Result<Vec<Vec<u8>>, SquareError> {
        let width = self.width();
        (0..width)
            .map(|col| self.axis_root((0..width).map(move |row| (row, col))).map(|n| n.to_bytes()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::construct;
    use tessera_types::version::ProtocolVersion;

    #[test]
    fn test_extension_is_systematic() {
        let txs = vec![vec![1u8; 300], vec![2u8; 300], vec![3u8; 300]];
        let square = construct(&txs, ProtocolVersion::V2, 64).unwrap();
        let eds = ExtendedDataSquare::extend(&square).unwrap();
        assert_eq!(eds.width(), 2 * square.size());
        for row in 0..square.size() {
            for col in 0..square.size() {
                assert_eq!(eds.cell(row, col), square.share(row, col).as_bytes());
            }
        }
    }

    #[test]
    fn test_rows_and_columns_are_codewords() {
        let txs = vec![vec![9u8; 1500]];
        let square = construct(&txs, ProtocolVersion::V2, 64).unwrap();
        let eds = ExtendedDataSquare::extend(&square).unwrap();
        let k = eds.original_width();
        let codec = ReedSolomon::new(k, k).unwrap();
        for i in 0..eds.width() {
            let row: Vec<Vec<u8>> = (0..eds.width()).map(|c| eds.cell(i, c).to_vec()).collect();
            assert!(codec.verify(&row).unwrap());
            let col: Vec<Vec<u8>> = (0..eds.width()).map(|r| eds.cell(r, i).to_vec()).collect();
            assert!(codec.verify(&col).unwrap());
        }
    }

    #[test]
    fn test_parity_rows_use_parity_namespace() {
        let square = construct(&[vec![1u8; 10]], ProtocolVersion::V2, 64).unwrap();
        let eds = ExtendedDataSquare::extend(&square).unwrap();
        let roots = eds.row_roots().unwrap();
        let last = NmtNode::from_bytes(roots.last().unwrap()).unwrap();
        assert_eq!(last.min, Namespace::PARITY_SHARE);
        let first = NmtNode::from_bytes(&roots[0]).unwrap();
        assert_eq!(first.min, Namespace::TX);
        assert_eq!(first.max, Namespace::TX);
    }
}

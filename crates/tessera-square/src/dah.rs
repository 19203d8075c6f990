// DATA AVAILABILITY HEADER
// The row and column namespaced roots of the extended square. The simple
// Merkle root over all row roots followed by all column roots is the block's
// data root.
//
// SAFETY INVARIANTS:
// 1. Row and column root counts are equal and are twice a power of two
// 2. Every root is a well-formed 90-byte namespaced node

use crate::builder::Square;
use crate::eds::ExtendedDataSquare;
use crate::error::SquareError;
use crate::merkle;
use crate::nmt::NmtNode;
use serde::{Deserialize, Serialize};
use tessera_types::appconsts::HARD_MAX_SQUARE_SIZE;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataAvailabilityHeader {
    pub row_roots: Vec<Vec<u8>>,
    pub column_roots: Vec<Vec<u8>>,
}

impl DataAvailabilityHeader {
    pub fn from_eds(eds: &ExtendedDataSquare) -> Result<Self, SquareError> {
        Ok(DataAvailabilityHeader {
            row_roots: eds.row_roots()?,
            column_roots: eds.column_roots()?,
        })
    }

    /// Extends `square` and commits to it.
    pub fn from_square(square: &Square) -> Result<Self, SquareError> {
        Self::from_eds(&ExtendedDataSquare::extend(square)?)
    }

    /// Header of an empty block (a 1x1 square of tail padding).
    pub fn min() -> Result<Self, SquareError> {
        Self::from_square(&Square::empty())
    }

    pub fn hash(&self) -> [u8; 32] {
        let roots: Vec<&[u8]> = self
            .row_roots
            .iter()
            .chain(self.column_roots.iter())
            .map(Vec::as_slice)
            .collect();
        merkle::hash_from_byte_slices(&roots)
    }

    /// Side of the original (non-extended) square.
    pub fn square_size(&self) -> usize {
        self.row_roots.len() / 2
    }

    pub fn validate_basic(&self) -> Result<(), SquareError> {
        let rows = self.row_roots.len();
        if rows != self.column_roots.len() {
            return Err(SquareError::InvalidHeader(format!(
                "{} row roots but {} column roots",
                rows,
                self.column_roots.len()
            )));
        }
        let original = rows / 2;
        if rows % 2 != 0 || original == 0 || !original.is_power_of_two() || original > HARD_MAX_SQUARE_SIZE {
            return Err(SquareError::InvalidHeader(format!(
                "invalid extended width {}",
                rows
            )));
        }
        for root in self.row_roots.iter().chain(self.column_roots.iter()) {
            NmtNode::from_bytes(root)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::construct;
    use tessera_types::version::ProtocolVersion;

    #[test]
    fn test_min_header() {
        let min = DataAvailabilityHeader::min().unwrap();
        assert_eq!(min.square_size(), 1);
        assert_eq!(min.row_roots.len(), 2);
        assert!(min.validate_basic().is_ok());
        assert_eq!(min, DataAvailabilityHeader::from_square(&construct(&[], ProtocolVersion::V1, 64).unwrap()).unwrap());
    }

    #[test]
    fn test_hash_changes_with_content() {
        let a = DataAvailabilityHeader::from_square(&construct(&[vec![1u8; 10]], ProtocolVersion::V2, 64).unwrap()).unwrap();
        let b = DataAvailabilityHeader::from_square(&construct(&[vec![2u8; 10]], ProtocolVersion::V2, 64).unwrap()).unwrap();
        assert_ne!(a.hash(), b.hash());
        assert_ne!(a.hash(), DataAvailabilityHeader::min().unwrap().hash());
    }

    #[test]
    fn test_validate_basic_rejects_malformed() {
        let mut dah = DataAvailabilityHeader::min().unwrap();
        dah.column_roots.pop();
        assert!(dah.validate_basic().is_err());

        let mut dah = DataAvailabilityHeader::min().unwrap();
        dah.row_roots[0].truncate(10);
        assert!(dah.validate_basic().is_err());

        let empty = DataAvailabilityHeader { row_roots: vec![], column_roots: vec![] };
        assert!(empty.validate_basic().is_err());
    }
}

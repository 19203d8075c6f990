// PROPOSAL PIPELINE
// Builds a block's data square from mempool candidates and validates squares
// proposed by others. Both sides replay admission in the same order over a
// fresh block overlay, so they agree on every sequence effect.
//
// SAFETY INVARIANTS:
// 1. A proposal is accepted only if every transaction is admissible and the
//    recomputed square size and data root match the claimed ones
// 2. Validation never crashes the node; panics become rejections
// 3. Neither side merges its overlay into committed state

use crate::app::{decode_tx, App};
use crate::error::AppError;
use log::{debug, error, info, warn};
use std::panic::{self, AssertUnwindSafe};
use tessera_ante::ExecMode;
use tessera_square::{construct, Builder, DataAvailabilityHeader};
use tessera_types::address::Address;
use tessera_types::store::{BlockStore, CacheStore};
use tessera_types::version::ProtocolVersion;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedProposal {
    pub txs: Vec<Vec<u8>>,
    pub square_size: usize,
    pub data_root: [u8; 32],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessProposal {
    pub height: u64,
    pub proposer: Address,
    pub txs: Vec<Vec<u8>>,
    pub square_size: usize,
    pub data_root: [u8; 32],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposalStatus {
    Accept,
    Reject,
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Runs `verify` with panics contained, logging the proposer and cause of
/// any rejection.
fn verdict<F>(proposal: &ProcessProposal, verify: F) -> ProposalStatus
where
    F: FnOnce() -> Result<(), AppError>,
{
    match panic::catch_unwind(AssertUnwindSafe(verify)) {
        Ok(Ok(())) => ProposalStatus::Accept,
        Ok(Err(e)) => {
            error!(
                "Rejecting proposal at height {} from {}: {}",
                proposal.height, proposal.proposer, e
            );
            ProposalStatus::Reject
        }
        Err(payload) => {
            error!(
                "Rejecting proposal at height {} from {}: validation panicked: {}",
                proposal.height,
                proposal.proposer,
                panic_message(payload.as_ref())
            );
            ProposalStatus::Reject
        }
    }
}

impl App {
    /// Filters and orders `txs` into a square for the block at `height`.
    /// Plain transactions come first, then blob transactions, each group in
    /// submission order.
    pub fn prepare_proposal(
        &self,
        txs: &[Vec<u8>],
        max_bytes: u64,
        height: u64,
    ) -> Result<PreparedProposal, AppError> {
        let version = self.version;
        let gov_max = self.keepers.params.blob(&*self.committed).gov_max_square_size;
        let mut builder = Builder::for_version(version, gov_max)?;
        let mut store = BlockStore::new(self.committed.clone());

        let mut plain = Vec::new();
        let mut blob = Vec::new();
        for raw in txs {
            match decode_tx(raw) {
                Ok(decoded) if decoded.blob_tx.is_some() => blob.push((raw, decoded)),
                Ok(decoded) => plain.push((raw, decoded)),
                Err(e) => debug!("Dropping undecodable candidate: {}", e),
            }
        }

        let mut included = Vec::new();
        let mut used_bytes = 0u64;
        for (raw, decoded) in plain.into_iter().chain(blob) {
            let size = raw.len() as u64;
            if used_bytes.saturating_add(size) > max_bytes {
                debug!("Candidate of {} bytes exceeds the remaining byte budget", size);
                continue;
            }

            let mut cache = CacheStore::new(&store);
            if let Err(e) = self.admit(&mut cache, &decoded, height, version, ExecMode::Prepare) {
                debug!("Dropping inadmissible candidate: {}", e);
                continue;
            }
            let changes = cache.into_changeset();
            changes.write_to(&mut store);

            let added = match decoded.blob_tx {
                Some(blob_tx) => builder.append_blob_tx(blob_tx),
                None => builder.append_tx(raw.clone()),
            };
            if !added {
                // Admission effects stay applied.
                debug!("Square is full; dropping candidate");
                continue;
            }
            used_bytes += size;
            included.push(raw.clone());
        }

        let square = builder.export()?;
        let dah = DataAvailabilityHeader::from_square(&square)?;
        info!(
            "Prepared proposal at height {}: {} of {} txs in a {}x{} square",
            height,
            included.len(),
            txs.len(),
            square.size(),
            square.size()
        );
        Ok(PreparedProposal {
            txs: included,
            square_size: square.size(),
            data_root: dah.hash(),
        })
    }

    pub fn process_proposal(&self, proposal: &ProcessProposal) -> ProposalStatus {
        verdict(proposal, || self.verify_proposal(proposal))
    }

    fn verify_proposal(&self, proposal: &ProcessProposal) -> Result<(), AppError> {
        let version = self.version;
        let mut store = BlockStore::new(self.committed.clone());

        for (index, raw) in proposal.txs.iter().enumerate() {
            let decoded = match decode_tx(raw) {
                Ok(decoded) => decoded,
                Err(AppError::UnexpectedPayForBlobs) => return Err(AppError::UnexpectedPayForBlobs),
                Err(e) if version == ProtocolVersion::V1 => {
                    warn!("Tolerating undecodable transaction {} at {}: {}", index, version, e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            let mut cache = CacheStore::new(&store);
            self.admit(&mut cache, &decoded, proposal.height, version, ExecMode::Process)
                .map_err(|e| AppError::InvalidProposal(format!("transaction {}: {}", index, e)))?;
            let changes = cache.into_changeset();
            changes.write_to(&mut store);
        }

        let gov_max = self.keepers.params.blob(&*self.committed).gov_max_square_size;
        let square = construct(&proposal.txs, version, gov_max)?;
        if square.size() != proposal.square_size {
            return Err(AppError::InvalidProposal(format!(
                "square size {} does not match claimed {}",
                square.size(),
                proposal.square_size
            )));
        }
        let data_root = DataAvailabilityHeader::from_square(&square)?.hash();
        if data_root != proposal.data_root {
            return Err(AppError::InvalidProposal(format!(
                "data root {} does not match claimed {}",
                hex::encode(data_root),
                hex::encode(proposal.data_root)
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proposal() -> ProcessProposal {
        ProcessProposal {
            height: 7,
            proposer: Address([4; 20]),
            txs: vec![],
            square_size: 1,
            data_root: [0; 32],
        }
    }

    #[test_log::test]
    fn test_validation_panic_becomes_rejection() {
        let status = verdict(&proposal(), || -> Result<(), AppError> {
            panic!("share index 3 out of range for a 1x1 square")
        });
        assert_eq!(status, ProposalStatus::Reject);

        // The node keeps validating afterwards.
        assert_eq!(verdict(&proposal(), || Ok(())), ProposalStatus::Accept);
        assert_eq!(
            verdict(&proposal(), || Err(AppError::InvalidProposal("bad root".into()))),
            ProposalStatus::Reject
        );
    }

    #[test]
    fn test_panic_message_extraction() {
        let payload = panic::catch_unwind(|| panic!("square overflow")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "square overflow");
        let payload = panic::catch_unwind(|| panic!("row {}", 3)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "row 3");
    }
}

// BLOB ADMISSION
// Only transactions carrying MsgPayForBlobs are affected:
//   - the gas limit must cover the shares the blobs will occupy
//   - up to V1, total blob bytes are capped by what a maximal square can hold
//   - from V2, blob shares must fit the governance square beside one PFB share

use crate::context::AnteContext;
use crate::error::AnteError;
use crate::handler::AnteStage;
use crate::keepers::ParamsProvider;
use std::sync::Arc;
use tessera_square::builder::max_square_size;
use tessera_square::shares::sparse_shares_needed;
use tessera_types::appconsts::{
    CONTINUATION_SPARSE_SHARE_CONTENT_SIZE, FIRST_SPARSE_SHARE_CONTENT_SIZE, SHARE_SIZE,
};
use tessera_types::tx::Tx;
use tessera_types::version::ProtocolVersion;

/// Most blob bytes that `share_count` sparse shares can carry.
fn available_bytes_from_sparse_shares(share_count: u64) -> u64 {
    match share_count {
        0 => 0,
        n => FIRST_SPARSE_SHARE_CONTENT_SIZE as u64 + (n - 1) * CONTINUATION_SPARSE_SHARE_CONTENT_SIZE as u64,
    }
}

/// V1 cap on the total blob bytes of one transaction.
pub fn max_total_blob_size(square_size: u64) -> u64 {
    // One share is always taken by the PFB transaction itself.
    let blob_shares = (square_size * square_size).saturating_sub(1);
    available_bytes_from_sparse_shares(blob_shares)
}

pub struct BlobChecks {
    params: Arc<dyn ParamsProvider>,
}

impl BlobChecks {
    pub fn new(params: Arc<dyn ParamsProvider>) -> Self {
        BlobChecks { params }
    }
}

impl AnteStage for BlobChecks {
    fn name(&self) -> &'static str {
        "blob_checks"
    }

    fn check(&self, ctx: &mut AnteContext<'_>, tx: &Tx) -> Result<(), AnteError> {
        let pfbs: Vec<_> = tx.pay_for_blobs().collect();
        if pfbs.is_empty() {
            return Ok(());
        }
        let params = self.params.ante_params(&*ctx.store);

        let shares: u64 = pfbs
            .iter()
            .flat_map(|pfb| pfb.blob_sizes.iter())
            .map(|size| sparse_shares_needed(*size as usize) as u64)
            .sum();

        let required = shares * SHARE_SIZE as u64 * params.gas_per_blob_byte as u64;
        let limit = ctx.gas_meter.limit();
        if required > limit {
            return Err(AnteError::InsufficientGasForBlobs { required, limit });
        }

        let square_size = max_square_size(ctx.version, params.gov_max_square_size) as u64;
        if ctx.version <= ProtocolVersion::V1 {
            let size: u64 = pfbs.iter().map(|pfb| pfb.total_blob_size()).sum();
            let max = max_total_blob_size(square_size);
            if size > max {
                return Err(AnteError::BlobsTooLarge { size, max });
            }
        } else {
            let max = (square_size * square_size).saturating_sub(1);
            if shares > max {
                return Err(AnteError::TooManyBlobShares { shares, max });
            }
        }
        Ok(())
    }
}

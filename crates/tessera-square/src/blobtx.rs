use crate::error::SquareError;
use crate::inclusion::create_commitment;
use tessera_types::blob::Blob;
use tessera_types::msgs::Msg;
use tessera_types::tx::Tx;

/// Structural validation of a blob transaction: the inner transaction holds
/// exactly one MsgPayForBlobs, and every blob matches the namespace, size,
/// share version and commitment that message pays for.
pub fn validate_blob_tx(tx: &Tx, blobs: &[Blob], subtree_root_threshold: usize) -> Result<(), SquareError> {
    let pfb = match tx.body.messages.as_slice() {
        [Msg::PayForBlobs(pfb)] => pfb,
        _ => {
            return Err(SquareError::InvalidBlobTx(
                "blob transaction must contain exactly one MsgPayForBlobs".into(),
            ))
        }
    };
    pfb.validate_basic()
        .map_err(|e| SquareError::InvalidBlobTx(e.to_string()))?;

    if !tx.signers().contains(&pfb.signer) {
        return Err(SquareError::InvalidBlobTx(format!(
            "MsgPayForBlobs signer {} did not sign the transaction",
            pfb.signer
        )));
    }
    if blobs.is_empty() {
        return Err(SquareError::InvalidBlobTx("no blobs attached".into()));
    }
    if blobs.len() != pfb.namespaces.len() {
        return Err(SquareError::InvalidBlobTx(format!(
            "{} blobs attached but {} paid for",
            blobs.len(),
            pfb.namespaces.len()
        )));
    }

    for (i, blob) in blobs.iter().enumerate() {
        blob.namespace.validate_for_blob()?;
        if blob.namespace != pfb.namespaces[i] {
            return Err(SquareError::InvalidBlobTx(format!("blob {} namespace mismatch", i)));
        }
        if blob.data.len() as u64 != pfb.blob_sizes[i] as u64 {
            return Err(SquareError::InvalidBlobTx(format!(
                "blob {} is {} bytes but {} were paid for",
                i,
                blob.data.len(),
                pfb.blob_sizes[i]
            )));
        }
        if blob.share_version as u32 != pfb.share_versions[i] {
            return Err(SquareError::InvalidBlobTx(format!("blob {} share version mismatch", i)));
        }
        let commitment = create_commitment(blob, subtree_root_threshold)?;
        if commitment.as_slice() != pfb.share_commitments[i].as_slice() {
            return Err(SquareError::InvalidBlobTx(format!(
                "blob {} commitment mismatch: expected {}",
                i,
                hex::encode(commitment)
            )));
        }
    }
    Ok(())
}

// SIGNATURE VERIFICATION
// Bounds the signature count, checks each signer's sequence and signature,
// charges verification gas, then advances every signer's sequence.
//
// SAFETY INVARIANTS:
// 1. Sequences advance only after every signature of the transaction verified
// 2. Each signer's sequence advances exactly once per admitted transaction
// 3. An account's public key, once set, never changes

use crate::context::{AnteContext, ExecMode};
use crate::error::AnteError;
use crate::handler::AnteStage;
use crate::keepers::{Account, AccountKeeper, ParamsProvider, SignatureVerifier};
use std::sync::Arc;
use tessera_types::appconsts::ED25519_VERIFY_COST;
use tessera_types::tx::Tx;

pub struct SigVerification {
    accounts: Arc<dyn AccountKeeper>,
    verifier: Arc<dyn SignatureVerifier>,
    params: Arc<dyn ParamsProvider>,
}

impl SigVerification {
    pub fn new(
        accounts: Arc<dyn AccountKeeper>,
        verifier: Arc<dyn SignatureVerifier>,
        params: Arc<dyn ParamsProvider>,
    ) -> Self {
        SigVerification {
            accounts,
            verifier,
            params,
        }
    }
}

impl AnteStage for SigVerification {
    fn name(&self) -> &'static str {
        "sig_verification"
    }

    fn check(&self, ctx: &mut AnteContext<'_>, tx: &Tx) -> Result<(), AnteError> {
        let limit = self.params.ante_params(&*ctx.store).tx_sig_limit;
        let count = tx.signatures.len() as u64;
        if count > limit {
            return Err(AnteError::TooManySignatures { count, limit });
        }

        let mut verified: Vec<Account> = Vec::with_capacity(tx.signatures.len());
        for (info, signature) in tx.auth_info.signer_infos.iter().zip(&tx.signatures) {
            let address = info.address();
            let mut account = self
                .accounts
                .get_account(&*ctx.store, &address)
                .ok_or(AnteError::UnknownAccount(address))?;

            match &account.public_key {
                Some(existing) if *existing != info.public_key => {
                    return Err(AnteError::PubKeyMismatch(address));
                }
                Some(_) => {}
                None => account.public_key = Some(info.public_key.clone()),
            }

            if info.sequence != account.sequence {
                return Err(AnteError::SequenceMismatch {
                    expected: account.sequence,
                    got: info.sequence,
                });
            }

            ctx.gas_meter
                .consume(ED25519_VERIFY_COST, "signature verification")?;

            if ctx.mode != ExecMode::Simulate {
                let sign_bytes = tx.sign_bytes(ctx.chain_id, account.account_number)?;
                if !self.verifier.verify(&info.public_key, &sign_bytes, signature) {
                    return Err(AnteError::InvalidSignature(address));
                }
            }
            account.sequence = account
                .sequence
                .checked_add(1)
                .ok_or(AnteError::SequenceOverflow(address))?;
            verified.push(account);
        }

        for account in verified {
            self.accounts.set_account(&mut *ctx.store, &account);
        }
        Ok(())
    }
}

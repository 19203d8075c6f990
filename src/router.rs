// MESSAGE ROUTER
// Executes the messages of an admitted transaction. The router is also the
// delivery-time circuit breaker: a message type outside the current
// version's accepted set is refused even if it reached a block.
//
// SAFETY INVARIANTS:
// 1. Every message, nested or not, is checked against the accepted set
// 2. A message acting for an address requires that address's signature

use crate::error::AppError;
use crate::keepers::Keepers;
use log::debug;
use std::sync::Arc;
use tessera_modules::ModuleContext;
use tessera_types::abci::Event;
use tessera_types::accepted::AcceptedMessageSet;
use tessera_types::address::Address;
use tessera_types::msgs::Msg;

pub struct MsgRouter {
    accepted: Arc<AcceptedMessageSet>,
    keepers: Keepers,
}

fn require_signer(signers: &[Address], address: &Address) -> Result<(), AppError> {
    if signers.contains(address) {
        Ok(())
    } else {
        Err(AppError::Unauthorized(format!("{} did not sign the transaction", address)))
    }
}

impl MsgRouter {
    pub fn new(accepted: Arc<AcceptedMessageSet>, keepers: Keepers) -> Self {
        MsgRouter { accepted, keepers }
    }

    pub fn route(&self, ctx: &mut ModuleContext<'_>, msg: &Msg, signers: &[Address]) -> Result<(), AppError> {
        if !self.accepted.is_accepted(ctx.version, msg.type_url()) {
            return Err(AppError::MessageNotAccepted {
                type_url: msg.type_url().to_string(),
                version: ctx.version,
            });
        }
        debug!("Routing {}", msg.type_url());

        match msg {
            Msg::Send(send) => {
                require_signer(signers, &send.from_address)?;
                self.keepers
                    .bank
                    .send(&mut *ctx.store, &send.from_address, &send.to_address, &send.amount)?;
            }
            Msg::Delegate(delegate) => {
                require_signer(signers, &delegate.delegator_address)?;
                self.keepers.staking.delegate(
                    &mut *ctx.store,
                    &self.keepers.bank,
                    &delegate.delegator_address,
                    &delegate.validator_address,
                    &delegate.amount,
                )?;
            }
            Msg::UpdateParams(update) => {
                require_signer(signers, &update.authority)?;
                let authority = self.keepers.params.authority(&*ctx.store);
                if update.authority != authority {
                    return Err(AppError::Unauthorized(format!(
                        "{} is not the parameter authority",
                        update.authority
                    )));
                }
                for change in &update.changes {
                    self.keepers
                        .params
                        .apply_change(&mut *ctx.store, &change.subspace, &change.key, &change.value)?;
                }
            }
            Msg::Exec(exec) => {
                require_signer(signers, &exec.grantee)?;
                let grantee = [exec.grantee];
                for inner in &exec.msgs {
                    self.route(ctx, inner, &grantee)?;
                }
            }
            Msg::SignalVersion(signal) => {
                require_signer(signers, &signal.validator_address)?;
                self.keepers
                    .signal
                    .signal_version(&mut *ctx.store, ctx.version, signal)?;
                ctx.emit(
                    Event::new("signal_version")
                        .with_attr("validator", signal.validator_address)
                        .with_attr("version", signal.version),
                );
            }
            Msg::TryUpgrade(_) => {
                let scheduled = self
                    .keepers
                    .signal
                    .try_upgrade(&mut *ctx.store, ctx.version, ctx.height)?;
                if let Some(pending) = scheduled {
                    ctx.emit(
                        Event::new("upgrade_scheduled")
                            .with_attr("version", pending.version)
                            .with_attr("activation_height", pending.activation_height),
                    );
                }
            }
            Msg::RecvPacket(recv) => {
                self.keepers.ibc.record_packet(&mut *ctx.store, &recv.packet);
            }
            Msg::UpdateClient(update) => {
                self.keepers
                    .ibc
                    .update_client(&mut *ctx.store, &update.client_id, update.header_height);
            }
            Msg::PayForBlobs(pfb) => {
                require_signer(signers, &pfb.signer)?;
                ctx.emit(
                    Event::new("pay_for_blobs")
                        .with_attr("signer", pfb.signer)
                        .with_attr("total_size", pfb.total_blob_size()),
                );
            }
            // Proposal tallying and invariant checks are handled outside the
            // state machine core.
            Msg::SubmitProposal(_) | Msg::Vote(_) | Msg::VerifyInvariant(_) => {
                ctx.emit(Event::new("message").with_attr("action", msg.type_url()));
            }
        }
        Ok(())
    }
}

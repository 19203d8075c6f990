use crate::context::AnteContext;
use crate::error::AnteError;
use crate::handler::AnteStage;
use crate::keepers::RelayTracker;
use std::sync::Arc;
use tessera_types::msgs::Msg;
use tessera_types::tx::Tx;

/// Rejects packet receipts that were already processed and client updates
/// that do not advance the client.
pub struct RedundantRelay {
    relays: Arc<dyn RelayTracker>,
}

impl RedundantRelay {
    pub fn new(relays: Arc<dyn RelayTracker>) -> Self {
        RedundantRelay { relays }
    }
}

impl AnteStage for RedundantRelay {
    fn name(&self) -> &'static str {
        "redundant_relay"
    }

    fn check(&self, ctx: &mut AnteContext<'_>, tx: &Tx) -> Result<(), AnteError> {
        for msg in &tx.body.messages {
            match msg {
                Msg::RecvPacket(recv) => {
                    let packet = &recv.packet;
                    if self
                        .relays
                        .packet_received(&*ctx.store, &packet.destination_channel, packet.sequence)
                    {
                        return Err(AnteError::RedundantRelay(format!(
                            "packet {} on {} already received",
                            packet.sequence, packet.destination_channel
                        )));
                    }
                }
                Msg::UpdateClient(update) => {
                    if let Some(height) = self.relays.client_height(&*ctx.store, &update.client_id) {
                        if update.header_height <= height {
                            return Err(AnteError::RedundantRelay(format!(
                                "client {} already at height {}",
                                update.client_id, height
                            )));
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}

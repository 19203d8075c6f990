use crate::context::AnteContext;
use crate::error::AnteError;
use crate::handler::AnteStage;
use std::sync::Arc;
use tessera_types::accepted::AcceptedMessageSet;
use tessera_types::tx::Tx;

/// Rejects messages the current protocol version does not accept, looking
/// through authz exec and proposal wrappers at every depth.
pub struct MessageGate {
    accepted: Arc<AcceptedMessageSet>,
}

impl MessageGate {
    pub fn new(accepted: Arc<AcceptedMessageSet>) -> Self {
        MessageGate { accepted }
    }
}

impl AnteStage for MessageGate {
    fn name(&self) -> &'static str {
        "message_gate"
    }

    fn check(&self, ctx: &mut AnteContext<'_>, tx: &Tx) -> Result<(), AnteError> {
        let version = ctx.version;
        if !self.accepted.is_supported(version) {
            return Err(AnteError::UnsupportedVersion(version));
        }
        for msg in &tx.body.messages {
            msg.walk(&mut |m| {
                if self.accepted.is_accepted(version, m.type_url()) {
                    Ok(())
                } else {
                    Err(AnteError::MessageNotSupported {
                        type_url: m.type_url().to_string(),
                        version,
                    })
                }
            })?;
        }
        Ok(())
    }
}

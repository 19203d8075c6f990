use crate::context::AnteContext;
use crate::error::AnteError;
use crate::handler::AnteStage;
use tessera_types::msgs::Msg;
use tessera_types::tx::Tx;

/// Parameters that only a coordinated upgrade may change.
pub const BLOCKED_PARAMS: &[(&str, &str)] = &[
    ("bank", "SendEnabled"),
    ("staking", "BondDenom"),
    ("staking", "UnbondingTime"),
    ("consensus", "ValidatorPubKeyTypes"),
];

pub fn is_blocked_param(subspace: &str, key: &str) -> bool {
    BLOCKED_PARAMS
        .iter()
        .any(|(s, k)| *s == subspace && *k == key)
}

/// Rejects empty proposals and hardfork-only parameter changes anywhere in
/// the message tree.
#[derive(Default)]
pub struct ProposalFilter;

impl ProposalFilter {
    pub fn new() -> Self {
        ProposalFilter
    }
}

impl AnteStage for ProposalFilter {
    fn name(&self) -> &'static str {
        "proposal_filter"
    }

    fn check(&self, _ctx: &mut AnteContext<'_>, tx: &Tx) -> Result<(), AnteError> {
        for msg in &tx.body.messages {
            msg.walk(&mut |m| match m {
                Msg::SubmitProposal(proposal) if proposal.messages.is_empty() => Err(AnteError::EmptyProposal),
                Msg::UpdateParams(update) => {
                    match update
                        .changes
                        .iter()
                        .find(|c| is_blocked_param(&c.subspace, &c.key))
                    {
                        Some(change) => Err(AnteError::ParamChangeBlocked {
                            subspace: change.subspace.clone(),
                            key: change.key.clone(),
                        }),
                        None => Ok(()),
                    }
                }
                _ => Ok(()),
            })?;
        }
        Ok(())
    }
}

// MESSAGES
// The message categories recognized at the admission boundary. Value,
// staking and governance messages are opaque to this crate beyond what the
// admission policies inspect; wrapper messages (authz exec, proposal
// submission) carry nested messages which policy checks unwrap recursively.
//
// SAFETY INVARIANTS:
// 1. No decoded message nests deeper than MAX_MSG_NESTING_DEPTH levels, so
//    decoding and every recursive walk stay within a bounded stack

use crate::address::Address;
use crate::appconsts::SHARE_VERSION_ZERO;
use crate::coin::Coin;
use crate::error::TxError;
use crate::namespace::Namespace;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::cell::Cell;

/// Message levels a transaction may carry through exec and proposal
/// wrappers, counting the outermost message.
pub const MAX_MSG_NESTING_DEPTH: usize = 10;

/// Canonical type identifiers.
pub mod type_urls {
    pub const MSG_SEND: &str = "/cosmos.bank.v1beta1.MsgSend";
    pub const MSG_DELEGATE: &str = "/cosmos.staking.v1beta1.MsgDelegate";
    pub const MSG_SUBMIT_PROPOSAL: &str = "/cosmos.gov.v1.MsgSubmitProposal";
    pub const MSG_VOTE: &str = "/cosmos.gov.v1.MsgVote";
    pub const MSG_UPDATE_PARAMS: &str = "/cosmos.params.v1beta1.MsgUpdateParams";
    pub const MSG_EXEC: &str = "/cosmos.authz.v1beta1.MsgExec";
    pub const MSG_VERIFY_INVARIANT: &str = "/cosmos.crisis.v1beta1.MsgVerifyInvariant";
    pub const MSG_PAY_FOR_BLOBS: &str = "/tessera.blob.v1.MsgPayForBlobs";
    pub const MSG_SIGNAL_VERSION: &str = "/tessera.signal.v1.MsgSignalVersion";
    pub const MSG_TRY_UPGRADE: &str = "/tessera.signal.v1.MsgTryUpgrade";
    pub const MSG_RECV_PACKET: &str = "/ibc.core.channel.v1.MsgRecvPacket";
    pub const MSG_UPDATE_CLIENT: &str = "/ibc.core.client.v1.MsgUpdateClient";
}

use type_urls::*;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgSend {
    pub from_address: Address,
    pub to_address: Address,
    pub amount: Vec<Coin>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgDelegate {
    pub delegator_address: Address,
    pub validator_address: Address,
    pub amount: Coin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgSubmitProposal {
    pub proposer: Address,
    pub messages: Vec<Msg>,
    pub initial_deposit: Vec<Coin>,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgVote {
    pub proposal_id: u64,
    pub voter: Address,
    pub option: u8,
}

/// One parameter assignment inside a parameter-update message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamChange {
    pub subspace: String,
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgUpdateParams {
    pub authority: Address,
    pub changes: Vec<ParamChange>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgExec {
    pub grantee: Address,
    pub msgs: Vec<Msg>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgVerifyInvariant {
    pub sender: Address,
    pub invariant_module_name: String,
    pub invariant_route: String,
}

/// Pays for the inclusion of one or more blobs carried alongside the
/// transaction in a [`crate::blob::BlobTx`] envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgPayForBlobs {
    pub signer: Address,
    pub namespaces: Vec<Namespace>,
    pub blob_sizes: Vec<u32>,
    pub share_commitments: Vec<Vec<u8>>,
    pub share_versions: Vec<u32>,
}

impl MsgPayForBlobs {
    pub fn total_blob_size(&self) -> u64 {
        self.blob_sizes.iter().map(|s| *s as u64).sum()
    }

    pub fn validate_basic(&self) -> Result<(), TxError> {
        let n = self.namespaces.len();
        if n == 0 {
            return Err(TxError::InvalidMsg("no blobs in MsgPayForBlobs".into()));
        }
        if self.blob_sizes.len() != n
            || self.share_commitments.len() != n
            || self.share_versions.len() != n
        {
            return Err(TxError::InvalidMsg(format!(
                "mismatched MsgPayForBlobs lengths: namespaces {}, sizes {}, commitments {}, share versions {}",
                n,
                self.blob_sizes.len(),
                self.share_commitments.len(),
                self.share_versions.len()
            )));
        }
        for ns in &self.namespaces {
            ns.validate_for_blob()
                .map_err(|e| TxError::InvalidMsg(e.to_string()))?;
        }
        for size in &self.blob_sizes {
            if *size == 0 {
                return Err(TxError::InvalidMsg("zero blob size".into()));
            }
        }
        for version in &self.share_versions {
            if *version != SHARE_VERSION_ZERO as u32 {
                return Err(TxError::InvalidMsg(format!(
                    "unsupported share version {}",
                    version
                )));
            }
        }
        for commitment in &self.share_commitments {
            if commitment.len() != 32 {
                return Err(TxError::InvalidMsg(format!(
                    "share commitment must be 32 bytes, got {}",
                    commitment.len()
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgSignalVersion {
    pub validator_address: Address,
    pub version: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgTryUpgrade {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    pub sequence: u64,
    pub source_channel: String,
    pub destination_channel: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgRecvPacket {
    pub packet: Packet,
    pub signer: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgUpdateClient {
    pub client_id: String,
    pub header_height: u64,
    pub signer: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(remote = "Self")]
pub enum Msg {
    Send(MsgSend),
    Delegate(MsgDelegate),
    SubmitProposal(MsgSubmitProposal),
    Vote(MsgVote),
    UpdateParams(MsgUpdateParams),
    Exec(MsgExec),
    VerifyInvariant(MsgVerifyInvariant),
    PayForBlobs(MsgPayForBlobs),
    SignalVersion(MsgSignalVersion),
    TryUpgrade(MsgTryUpgrade),
    RecvPacket(MsgRecvPacket),
    UpdateClient(MsgUpdateClient),
}

// ==================== Bounded Decoding ====================

thread_local! {
    static DECODE_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Holds one level of message nesting for the duration of a decode call.
struct DepthGuard;

impl DepthGuard {
    fn enter() -> Option<Self> {
        DECODE_DEPTH.with(|depth| {
            let next = depth.get() + 1;
            if next > MAX_MSG_NESTING_DEPTH {
                return None;
            }
            depth.set(next);
            Some(DepthGuard)
        })
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        DECODE_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

impl Serialize for Msg {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Msg::serialize(self, serializer)
    }
}

impl<'de> Deserialize<'de> for Msg {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let _guard = DepthGuard::enter().ok_or_else(|| {
            <D::Error as de::Error>::custom(TxError::NestingTooDeep {
                max: MAX_MSG_NESTING_DEPTH,
            })
        })?;
        Msg::deserialize(deserializer)
    }
}

// ==================== Inspection ====================

impl Msg {
    pub fn type_url(&self) -> &'static str {
        match self {
            Msg::Send(_) => MSG_SEND,
            Msg::Delegate(_) => MSG_DELEGATE,
            Msg::SubmitProposal(_) => MSG_SUBMIT_PROPOSAL,
            Msg::Vote(_) => MSG_VOTE,
            Msg::UpdateParams(_) => MSG_UPDATE_PARAMS,
            Msg::Exec(_) => MSG_EXEC,
            Msg::VerifyInvariant(_) => MSG_VERIFY_INVARIANT,
            Msg::PayForBlobs(_) => MSG_PAY_FOR_BLOBS,
            Msg::SignalVersion(_) => MSG_SIGNAL_VERSION,
            Msg::TryUpgrade(_) => MSG_TRY_UPGRADE,
            Msg::RecvPacket(_) => MSG_RECV_PACKET,
            Msg::UpdateClient(_) => MSG_UPDATE_CLIENT,
        }
    }

    /// Messages carried inside a wrapper message, if any.
    pub fn nested(&self) -> &[Msg] {
        match self {
            Msg::Exec(exec) => &exec.msgs,
            Msg::SubmitProposal(proposal) => &proposal.messages,
            _ => &[],
        }
    }

    /// Visits this message and every message nested inside it, depth first.
    /// Fails without descending further once nesting exceeds
    /// [`MAX_MSG_NESTING_DEPTH`].
    pub fn walk<'a, E: From<TxError>>(
        &'a self,
        f: &mut dyn FnMut(&'a Msg) -> Result<(), E>,
    ) -> Result<(), E> {
        self.walk_at(1, f)
    }

    fn walk_at<'a, E: From<TxError>>(
        &'a self,
        depth: usize,
        f: &mut dyn FnMut(&'a Msg) -> Result<(), E>,
    ) -> Result<(), E> {
        if depth > MAX_MSG_NESTING_DEPTH {
            return Err(TxError::NestingTooDeep {
                max: MAX_MSG_NESTING_DEPTH,
            }
            .into());
        }
        f(self)?;
        for inner in self.nested() {
            inner.walk_at(depth + 1, f)?;
        }
        Ok(())
    }

    pub fn validate_basic(&self) -> Result<(), TxError> {
        match self {
            Msg::Send(send) => {
                if send.amount.is_empty() || send.amount.iter().any(|c| c.amount == 0 || !c.is_valid()) {
                    return Err(TxError::InvalidMsg(format!(
                        "invalid send amount: {}",
                        crate::coin::format_coins(&send.amount)
                    )));
                }
                Ok(())
            }
            Msg::Delegate(delegate) => {
                if delegate.amount.amount == 0 {
                    return Err(TxError::InvalidMsg("zero delegation".into()));
                }
                Ok(())
            }
            Msg::PayForBlobs(pfb) => pfb.validate_basic(),
            Msg::SignalVersion(signal) => {
                if signal.version == 0 {
                    return Err(TxError::InvalidMsg("version must be at least 1".into()));
                }
                Ok(())
            }
            Msg::Exec(exec) => {
                if exec.msgs.is_empty() {
                    return Err(TxError::InvalidMsg("MsgExec carries no messages".into()));
                }
                exec.msgs.iter().try_for_each(Msg::validate_basic)
            }
            Msg::UpdateParams(update) => {
                if update.changes.is_empty() {
                    return Err(TxError::InvalidMsg("no parameter changes".into()));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn send() -> Msg {
        Msg::Send(MsgSend {
            from_address: Address([1; 20]),
            to_address: Address([2; 20]),
            amount: vec![Coin::new(10, "utsr")],
        })
    }

    #[test]
    fn test_walk_visits_nested_messages() {
        let msg = Msg::Exec(MsgExec {
            grantee: Address([3; 20]),
            msgs: vec![Msg::SubmitProposal(MsgSubmitProposal {
                proposer: Address([3; 20]),
                messages: vec![send()],
                initial_deposit: vec![],
                title: "nested".into(),
            })],
        });
        let mut seen = Vec::new();
        msg.walk::<TxError>(&mut |m| {
            seen.push(m.type_url());
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, vec![MSG_EXEC, MSG_SUBMIT_PROPOSAL, MSG_SEND]);
    }

    /// `depth` levels of exec wrappers around a send, counting the send.
    fn nested_exec(depth: usize) -> Msg {
        (1..depth).fold(send(), |inner, _| {
            Msg::Exec(MsgExec {
                grantee: Address([3; 20]),
                msgs: vec![inner],
            })
        })
    }

    #[test]
    fn test_decode_bounds_nesting() {
        let at_limit = nested_exec(MAX_MSG_NESTING_DEPTH);
        let bytes = crate::codec::encode(&at_limit).unwrap();
        assert_eq!(crate::codec::decode::<Msg>(&bytes).unwrap(), at_limit);

        let too_deep = crate::codec::encode(&nested_exec(MAX_MSG_NESTING_DEPTH + 1)).unwrap();
        let err = crate::codec::decode::<Msg>(&too_deep).unwrap_err();
        assert!(err.to_string().contains("nested deeper"));

        // A failed decode leaves no depth behind for the next one.
        assert_eq!(crate::codec::decode::<Msg>(&bytes).unwrap(), at_limit);
    }

    #[test]
    fn test_walk_bounds_nesting() {
        let mut visited = 0;
        let result = nested_exec(MAX_MSG_NESTING_DEPTH + 1).walk::<TxError>(&mut |_| {
            visited += 1;
            Ok(())
        });
        assert_eq!(
            result,
            Err(TxError::NestingTooDeep {
                max: MAX_MSG_NESTING_DEPTH
            })
        );
        assert_eq!(visited, MAX_MSG_NESTING_DEPTH);
        assert!(nested_exec(MAX_MSG_NESTING_DEPTH)
            .walk::<TxError>(&mut |_| Ok(()))
            .is_ok());
    }

    #[test]
    fn test_pfb_validate_basic() {
        let ns = Namespace::new_v0(b"app").unwrap();
        let mut pfb = MsgPayForBlobs {
            signer: Address([1; 20]),
            namespaces: vec![ns],
            blob_sizes: vec![100],
            share_commitments: vec![vec![0; 32]],
            share_versions: vec![0],
        };
        assert!(pfb.validate_basic().is_ok());
        pfb.blob_sizes.push(5);
        assert!(pfb.validate_basic().is_err());
        pfb.blob_sizes.pop();
        pfb.namespaces = vec![Namespace::TX];
        assert!(pfb.validate_basic().is_err());
    }

    #[test]
    fn test_send_rejects_zero_amount() {
        let msg = Msg::Send(MsgSend {
            from_address: Address([1; 20]),
            to_address: Address([2; 20]),
            amount: vec![Coin::new(0, "utsr")],
        });
        assert!(msg.validate_basic().is_err());
    }
}

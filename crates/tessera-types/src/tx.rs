// TRANSACTIONS
// Signed transaction model: body (messages, memo, timeout), auth info (signer
// public keys + sequences, fee) and one signature per signer.
//
// SAFETY INVARIANTS:
// 1. Sign bytes commit to the body, the auth info (incl. sequences), the chain id
//    and the signer's account number
// 2. Encoding is deterministic (see crate::codec)

use crate::address::Address;
use crate::codec::{self, CodecError};
use crate::coin::Coin;
use crate::error::TxError;
use crate::msgs::{Msg, MsgPayForBlobs};
use ed25519_dalek::{Signer, SigningKey};
use serde::{Deserialize, Serialize};

/// Non-critical extension carried in the body; rejected by admission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionOption {
    pub type_url: String,
    pub value: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxBody {
    pub messages: Vec<Msg>,
    pub memo: String,
    /// Block height after which the transaction is no longer valid (0 = none)
    pub timeout_height: u64,
    pub extension_options: Vec<ExtensionOption>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerInfo {
    /// Ed25519 public key of the signer
    pub public_key: Vec<u8>,

    /// Account sequence this signature is valid for
    pub sequence: u64,
}

impl SignerInfo {
    pub fn address(&self) -> Address {
        Address::from_pubkey(&self.public_key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fee {
    pub amount: Vec<Coin>,
    pub gas_limit: u64,
    /// Explicit payer; defaults to the first signer
    pub payer: Option<Address>,
    /// Account whose fee allowance pays instead of the payer
    pub granter: Option<Address>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthInfo {
    pub signer_infos: Vec<SignerInfo>,
    pub fee: Fee,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tx {
    pub body: TxBody,
    pub auth_info: AuthInfo,
    pub signatures: Vec<Vec<u8>>,
}

#[derive(Serialize)]
struct SignDoc<'a> {
    body: &'a TxBody,
    auth_info: &'a AuthInfo,
    chain_id: &'a str,
    account_number: u64,
}

impl Tx {
    pub fn new(messages: Vec<Msg>, fee: Fee, signer_infos: Vec<SignerInfo>) -> Self {
        Tx {
            body: TxBody {
                messages,
                memo: String::new(),
                timeout_height: 0,
                extension_options: Vec::new(),
            },
            auth_info: AuthInfo { signer_infos, fee },
            signatures: Vec::new(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        codec::encode(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        codec::decode(bytes)
    }

    /// Bytes each signer signs over.
    pub fn sign_bytes(&self, chain_id: &str, account_number: u64) -> Result<Vec<u8>, CodecError> {
        codec::encode(&SignDoc {
            body: &self.body,
            auth_info: &self.auth_info,
            chain_id,
            account_number,
        })
    }

    /// Fills `signatures`, one per `(key, account_number)` in signer order.
    pub fn sign(&mut self, chain_id: &str, signers: &[(&SigningKey, u64)]) -> Result<(), CodecError> {
        let mut signatures = Vec::with_capacity(signers.len());
        for (key, account_number) in signers {
            let bytes = self.sign_bytes(chain_id, *account_number)?;
            signatures.push(key.sign(&bytes).to_bytes().to_vec());
        }
        self.signatures = signatures;
        Ok(())
    }

    pub fn signers(&self) -> Vec<Address> {
        self.auth_info
            .signer_infos
            .iter()
            .map(SignerInfo::address)
            .collect()
    }

    pub fn fee(&self) -> &Fee {
        &self.auth_info.fee
    }

    /// The account the fee is charged to before any fee grant applies.
    pub fn fee_payer(&self) -> Option<Address> {
        self.auth_info
            .fee
            .payer
            .or_else(|| self.auth_info.signer_infos.first().map(SignerInfo::address))
    }

    /// Top-level MsgPayForBlobs messages.
    pub fn pay_for_blobs(&self) -> impl Iterator<Item = &MsgPayForBlobs> {
        self.body.messages.iter().filter_map(|m| match m {
            Msg::PayForBlobs(pfb) => Some(pfb),
            _ => None,
        })
    }

    pub fn validate_basic(&self) -> Result<(), TxError> {
        if self.body.messages.is_empty() {
            return Err(TxError::NoMessages);
        }
        if self.auth_info.signer_infos.is_empty() {
            return Err(TxError::NoSigners);
        }
        if self.signatures.len() != self.auth_info.signer_infos.len() {
            return Err(TxError::SignatureCountMismatch {
                expected: self.auth_info.signer_infos.len(),
                got: self.signatures.len(),
            });
        }
        if self.auth_info.fee.gas_limit == 0 {
            return Err(TxError::ZeroGas);
        }
        if let Some(coin) = self.auth_info.fee.amount.iter().find(|c| !c.is_valid()) {
            return Err(TxError::InvalidFee(coin.to_string()));
        }
        for msg in &self.body.messages {
            msg.walk::<TxError>(&mut |_| Ok(()))?;
            msg.validate_basic()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msgs::MsgSend;
    use ed25519_dalek::{Signature, Verifier};

    fn sample(key: &SigningKey, sequence: u64) -> Tx {
        let from = Address::from_pubkey(key.verifying_key().as_bytes());
        Tx::new(
            vec![Msg::Send(MsgSend {
                from_address: from,
                to_address: Address([9; 20]),
                amount: vec![Coin::new(1, "utsr")],
            })],
            Fee {
                amount: vec![Coin::new(200, "utsr")],
                gas_limit: 100_000,
                payer: None,
                granter: None,
            },
            vec![SignerInfo {
                public_key: key.verifying_key().as_bytes().to_vec(),
                sequence,
            }],
        )
    }

    #[test]
    fn test_sign_and_verify() {
        let key = SigningKey::from_bytes(&[1u8; 32]);
        let mut tx = sample(&key, 0);
        tx.sign("test-chain", &[(&key, 0)]).unwrap();
        assert!(tx.validate_basic().is_ok());

        let bytes = tx.sign_bytes("test-chain", 0).unwrap();
        let sig = Signature::from_slice(&tx.signatures[0]).unwrap();
        assert!(key.verifying_key().verify(&bytes, &sig).is_ok());

        // A different chain id yields different sign bytes.
        assert_ne!(bytes, tx.sign_bytes("other-chain", 0).unwrap());
    }

    #[test]
    fn test_sequence_is_committed_by_signature() {
        let key = SigningKey::from_bytes(&[1u8; 32]);
        let a = sample(&key, 0).sign_bytes("c", 0).unwrap();
        let b = sample(&key, 1).sign_bytes("c", 0).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_encode_decode() {
        let key = SigningKey::from_bytes(&[2u8; 32]);
        let mut tx = sample(&key, 3);
        tx.sign("c", &[(&key, 7)]).unwrap();
        let bytes = tx.encode().unwrap();
        assert_eq!(Tx::decode(&bytes).unwrap(), tx);
        assert!(Tx::decode(&bytes[..bytes.len() - 1]).is_err());
    }

    #[test]
    fn test_decode_rejects_unbounded_exec_nesting() {
        // One body message, then 200k levels of `Exec { grantee, msgs: [..] }`
        // at 32 bytes each. Decoding must stop at the nesting limit instead of
        // recursing through every level.
        let mut bytes = 1u64.to_le_bytes().to_vec();
        for _ in 0..200_000 {
            bytes.extend_from_slice(&5u32.to_le_bytes());
            bytes.extend_from_slice(&[7u8; 20]);
            bytes.extend_from_slice(&1u64.to_le_bytes());
        }
        let handle = std::thread::Builder::new()
            .stack_size(1024 * 1024)
            .spawn(move || Tx::decode(&bytes))
            .unwrap();
        let result = handle.join().expect("decode must not overflow the stack");
        assert!(matches!(result, Err(CodecError::Decode(msg)) if msg.contains("nested deeper")));
    }

    #[test]
    fn test_validate_basic_signature_count() {
        let key = SigningKey::from_bytes(&[1u8; 32]);
        let tx = sample(&key, 0);
        assert_eq!(
            tx.validate_basic(),
            Err(TxError::SignatureCountMismatch { expected: 1, got: 0 })
        );
    }

    #[test]
    fn test_fee_payer_defaults_to_first_signer() {
        let key = SigningKey::from_bytes(&[1u8; 32]);
        let mut tx = sample(&key, 0);
        assert_eq!(tx.fee_payer(), Some(tx.signers()[0]));
        tx.auth_info.fee.payer = Some(Address([5; 20]));
        assert_eq!(tx.fee_payer(), Some(Address([5; 20])));
    }
}

//! Function-call transactions, borsh-encoded the way the node expects them.

use {
    anyhow::{Context, Result},
    base64::{Engine, engine::general_purpose::STANDARD},
    borsh::BorshSerialize,
    sha2::{Digest, Sha256},
};

use crate::keys::{KeyPair, PublicKey};

/// 30 Tgas, enough for a small state write.
pub const DEFAULT_FUNCTION_CALL_GAS: u64 = 30_000_000_000_000;

/// Borsh variant index of `FunctionCall` in the node's `Action` enum.
const FUNCTION_CALL_ACTION: u8 = 2;

/// Signature-type tag for ed25519.
const ED25519_SIGNATURE_TYPE: u8 = 0;

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize)]
pub struct FunctionCall {
    pub method_name: String,
    pub args: Vec<u8>,
    pub gas: u64,
    pub deposit: u128,
}

impl FunctionCall {
    /// A call with JSON-encoded arguments, default gas and no deposit.
    pub fn json<T: serde::Serialize>(method_name: &str, args: &T) -> Result<Self> {
        Ok(Self {
            method_name: method_name.to_string(),
            args: serde_json::to_vec(args).context("failed to encode call arguments")?,
            gas: DEFAULT_FUNCTION_CALL_GAS,
            deposit: 0,
        })
    }
}

/// Only function calls are ever sent, so the action list holds those directly
/// and the enum tag is written by hand.
struct Action<'a>(&'a FunctionCall);

impl BorshSerialize for Action<'_> {
    fn serialize<W: std::io::Write>(&self, writer: &mut W) -> std::io::Result<()> {
        FUNCTION_CALL_ACTION.serialize(writer)?;
        self.0.serialize(writer)
    }
}

#[derive(Debug, Clone)]
pub struct Transaction {
    pub signer_id: String,
    pub public_key: PublicKey,
    pub nonce: u64,
    pub receiver_id: String,
    pub block_hash: [u8; 32],
    pub actions: Vec<FunctionCall>,
}

impl BorshSerialize for Transaction {
    fn serialize<W: std::io::Write>(&self, writer: &mut W) -> std::io::Result<()> {
        self.signer_id.serialize(writer)?;
        self.public_key.serialize(writer)?;
        self.nonce.serialize(writer)?;
        self.receiver_id.serialize(writer)?;
        self.block_hash.serialize(writer)?;
        let actions: Vec<Action<'_>> = self.actions.iter().map(Action).collect();
        actions.serialize(writer)
    }
}

impl Transaction {
    /// Decode a base58 block hash as returned by `view_access_key`.
    pub fn decode_block_hash(hash: &str) -> Result<[u8; 32]> {
        let bytes = bs58::decode(hash)
            .into_vec()
            .with_context(|| format!("invalid block hash: {hash}"))?;
        bytes
            .try_into()
            .map_err(|b: Vec<u8>| anyhow::anyhow!("block hash must be 32 bytes, got {}", b.len()))
    }

    /// SHA-256 of the borsh encoding; this is what gets signed.
    pub fn hash(&self) -> Result<[u8; 32]> {
        let bytes = borsh::to_vec(self).context("failed to encode transaction")?;
        Ok(Sha256::digest(&bytes).into())
    }

    pub fn sign(self, key: &KeyPair) -> Result<SignedTransaction> {
        let signature = key.sign(&self.hash()?);
        Ok(SignedTransaction {
            transaction: self,
            signature,
        })
    }
}

#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub transaction: Transaction,
    pub signature: [u8; 64],
}

impl BorshSerialize for SignedTransaction {
    fn serialize<W: std::io::Write>(&self, writer: &mut W) -> std::io::Result<()> {
        self.transaction.serialize(writer)?;
        ED25519_SIGNATURE_TYPE.serialize(writer)?;
        self.signature.serialize(writer)
    }
}

impl SignedTransaction {
    /// Base64 of the borsh encoding, the `broadcast_tx_*` parameter format.
    pub fn to_base64(&self) -> Result<String> {
        let bytes = borsh::to_vec(self).context("failed to encode signed transaction")?;
        Ok(STANDARD.encode(bytes))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use ed25519_dalek::{Signature, Verifier, VerifyingKey};

    use super::*;

    #[derive(serde::Serialize)]
    struct Color {
        r: i64,
        g: i64,
        b: i64,
    }

    fn sample(key: &KeyPair) -> Transaction {
        Transaction {
            signer_id: "alice.testnet".into(),
            public_key: key.public_key(),
            nonce: 7,
            receiver_id: "paint.testnet".into(),
            block_hash: [9u8; 32],
            actions: vec![
                FunctionCall::json("set", &Color { r: 1, g: 2, b: 3 }).unwrap(),
            ],
        }
    }

    #[test]
    fn borsh_layout() {
        let key = KeyPair::random();
        let tx = sample(&key);
        let bytes = borsh::to_vec(&tx).unwrap();

        let mut expected = Vec::new();
        expected.extend_from_slice(&13u32.to_le_bytes());
        expected.extend_from_slice(b"alice.testnet");
        expected.push(0);
        expected.extend_from_slice(key.public_key().as_bytes());
        expected.extend_from_slice(&7u64.to_le_bytes());
        expected.extend_from_slice(&13u32.to_le_bytes());
        expected.extend_from_slice(b"paint.testnet");
        expected.extend_from_slice(&[9u8; 32]);
        expected.extend_from_slice(&1u32.to_le_bytes());
        expected.push(2);
        expected.extend_from_slice(&3u32.to_le_bytes());
        expected.extend_from_slice(b"set");
        let args = br#"{"r":1,"g":2,"b":3}"#;
        expected.extend_from_slice(&(args.len() as u32).to_le_bytes());
        expected.extend_from_slice(args);
        expected.extend_from_slice(&DEFAULT_FUNCTION_CALL_GAS.to_le_bytes());
        expected.extend_from_slice(&0u128.to_le_bytes());

        assert_eq!(bytes, expected);
    }

    #[test]
    fn signature_covers_transaction_hash() {
        let key = KeyPair::random();
        let tx = sample(&key);
        let hash = tx.hash().unwrap();
        let signed = tx.sign(&key).unwrap();

        let verifying = VerifyingKey::from_bytes(key.public_key().as_bytes()).unwrap();
        assert!(
            verifying
                .verify(&hash, &Signature::from_bytes(&signed.signature))
                .is_ok()
        );

        let encoded = STANDARD.decode(signed.to_base64().unwrap()).unwrap();
        let unsigned = borsh::to_vec(&signed.transaction).unwrap();
        assert_eq!(&encoded[..unsigned.len()], unsigned.as_slice());
        assert_eq!(encoded[unsigned.len()], 0);
        assert_eq!(&encoded[unsigned.len() + 1..], signed.signature.as_slice());
    }

    #[test]
    fn block_hash_decoding() {
        let hash = bs58::encode([5u8; 32]).into_string();
        assert_eq!(Transaction::decode_block_hash(&hash).unwrap(), [5u8; 32]);
        assert!(Transaction::decode_block_hash("abc").is_err());
    }
}

//! ed25519 access keys in the ledger's `ed25519:<base58>` text form.

use std::{fmt, str::FromStr};

use {
    anyhow::{Context, Result, bail},
    borsh::BorshSerialize,
    ed25519_dalek::{Signer, SigningKey},
    rand::RngCore,
};

const ED25519_PREFIX: &str = "ed25519:";

/// Key-type tag used in borsh encodings.
const ED25519_KEY_TYPE: u8 = 0;

/// An ed25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; 32]);

impl PublicKey {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{ED25519_PREFIX}{}", bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({self})")
    }
}

impl FromStr for PublicKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = decode_ed25519(s)?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| anyhow::anyhow!("public key must be 32 bytes, got {}", b.len()))?;
        Ok(Self(bytes))
    }
}

impl BorshSerialize for PublicKey {
    fn serialize<W: std::io::Write>(&self, writer: &mut W) -> std::io::Result<()> {
        ED25519_KEY_TYPE.serialize(writer)?;
        self.0.serialize(writer)
    }
}

/// An ed25519 signing key with its public half.
#[derive(Clone)]
pub struct KeyPair {
    signing: SigningKey,
}

impl KeyPair {
    /// Generate a fresh random key pair.
    pub fn random() -> Self {
        let mut seed = [0u8; 32];
        rand::rng().fill_bytes(&mut seed);
        Self {
            signing: SigningKey::from_bytes(&seed),
        }
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.signing.verifying_key().to_bytes())
    }

    /// `ed25519:<base58 of secret||public>`, as stored in the key store.
    pub fn secret_key_string(&self) -> String {
        format!(
            "{ED25519_PREFIX}{}",
            bs58::encode(self.signing.to_keypair_bytes()).into_string()
        )
    }

    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing.sign(message).to_bytes()
    }
}

impl FromStr for KeyPair {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = decode_ed25519(s)?;
        let signing = match bytes.len() {
            64 => {
                let bytes: [u8; 64] = bytes
                    .try_into()
                    .map_err(|_| anyhow::anyhow!("secret key must be 64 bytes"))?;
                SigningKey::from_keypair_bytes(&bytes).context("secret and public halves differ")?
            },
            32 => {
                let bytes: [u8; 32] = bytes
                    .try_into()
                    .map_err(|_| anyhow::anyhow!("seed must be 32 bytes"))?;
                SigningKey::from_bytes(&bytes)
            },
            n => bail!("secret key must be 32 or 64 bytes, got {n}"),
        };
        Ok(Self { signing })
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

fn decode_ed25519(s: &str) -> Result<Vec<u8>> {
    let encoded = match s.split_once(':') {
        Some(("ed25519", rest)) => rest,
        Some((other, _)) => bail!("unsupported key type: {other}"),
        None => s,
    };
    bs58::decode(encoded)
        .into_vec()
        .with_context(|| format!("invalid base58 key: {s}"))
}

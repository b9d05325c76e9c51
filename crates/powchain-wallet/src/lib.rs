//! Bitcoin-style wallet helpers: secp256k1 keys, legacy P2PKH addresses and
//! message signatures.
//!
//! The primitives (SHA-256, RIPEMD-160, ECDSA, Base58Check) come from their crates.
//! Secret keys are drawn from the OS-seeded thread RNG.

use ripemd::Ripemd160;
use secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1, SecretKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{
    fmt,
    time::{SystemTime, UNIX_EPOCH},
};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WalletError {
    #[error("invalid hex in {field}: {reason}")]
    InvalidHex { field: &'static str, reason: String },

    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid signature: {0}")]
    InvalidSignature(String),
}

pub type Result<T> = std::result::Result<T, WalletError>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    /// P2PKH version byte prepended to the public key hash.
    pub fn p2pkh_version(self) -> u8 {
        match self {
            Network::Mainnet => 0x00,
            Network::Testnet => 0x6f,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => f.write_str("mainnet"),
            Network::Testnet => f.write_str("testnet"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Wallet {
    pub label: Option<String>,
    pub network: Network,
    secret_key: SecretKey,
    public_key: PublicKey,
    pub created_at: u64,
}

impl Wallet {
    /// Fresh random keypair.
    pub fn generate(label: Option<String>, network: Network) -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut secp256k1::rand::thread_rng());
        let wallet = Self::assemble(label, network, secret_key, public_key);
        debug!(network = %network, address = %wallet.address_p2pkh(), "wallet generated");
        wallet
    }

    /// Rebuild a wallet from a hex-encoded 32-byte secret key.
    pub fn from_private_key_hex(
        private_key_hex: &str,
        label: Option<String>,
        network: Network,
    ) -> Result<Self> {
        let secret_key = parse_secret_key(private_key_hex)?;
        let public_key = PublicKey::from_secret_key(&Secp256k1::new(), &secret_key);
        Ok(Self::assemble(label, network, secret_key, public_key))
    }

    fn assemble(
        label: Option<String>,
        network: Network,
        secret_key: SecretKey,
        public_key: PublicKey,
    ) -> Self {
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        Self {
            label,
            network,
            secret_key,
            public_key,
            created_at,
        }
    }

    pub fn secret_key(&self) -> &SecretKey {
        &self.secret_key
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn private_key_hex(&self) -> String {
        hex::encode(self.secret_key.secret_bytes())
    }

    pub fn public_key_compressed_hex(&self) -> String {
        hex::encode(self.public_key.serialize())
    }

    pub fn public_key_uncompressed_hex(&self) -> String {
        hex::encode(self.public_key.serialize_uncompressed())
    }

    pub fn address_p2pkh(&self) -> String {
        p2pkh_address(&self.public_key.serialize(), self.network)
    }

    pub fn sign(&self, message: &str) -> String {
        sign_message(message, &self.secret_key)
    }
}

/// RIPEMD160(SHA256(data)).
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let sha = Sha256::digest(data);
    let digest = Ripemd160::digest(sha);
    let mut out = [0u8; 20];
    out.copy_from_slice(&digest[..]);
    out
}

/// Base58Check(version || hash160(pubkey)).
pub fn p2pkh_address(public_key: &[u8], network: Network) -> String {
    let mut payload = Vec::with_capacity(21);
    payload.push(network.p2pkh_version());
    payload.extend_from_slice(&hash160(public_key));
    bs58::encode(payload).with_check().into_string()
}

fn message_digest(message: &str) -> Message {
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&Sha256::digest(message.as_bytes()));
    Message::from_digest(digest)
}

fn decode_hex(field: &'static str, value: &str) -> Result<Vec<u8>> {
    hex::decode(value.trim()).map_err(|e| WalletError::InvalidHex {
        field,
        reason: e.to_string(),
    })
}

fn parse_secret_key(private_key_hex: &str) -> Result<SecretKey> {
    let bytes = decode_hex("privateKeyHex", private_key_hex)?;
    SecretKey::from_slice(&bytes).map_err(|e| WalletError::InvalidPrivateKey(e.to_string()))
}

/// ECDSA over SHA256(UTF-8 message). Returns the 64-byte compact `r || s` as hex.
pub fn sign_message(message: &str, secret_key: &SecretKey) -> String {
    let secp = Secp256k1::signing_only();
    let signature = secp.sign_ecdsa(&message_digest(message), secret_key);
    hex::encode(signature.serialize_compact())
}

pub fn sign_message_hex(message: &str, private_key_hex: &str) -> Result<String> {
    Ok(sign_message(message, &parse_secret_key(private_key_hex)?))
}

/// Check a compact signature from [`sign_message`] against a compressed or
/// uncompressed public key.
///
/// Malformed inputs are errors; a well-formed signature that does not match
/// yields `Ok(false)`.
pub fn verify_signature(message: &str, signature_hex: &str, public_key_hex: &str) -> Result<bool> {
    let sig_bytes = decode_hex("signatureHex", signature_hex)?;
    let key_bytes = decode_hex("publicKeyHex", public_key_hex)?;
    let signature = Signature::from_compact(&sig_bytes)
        .map_err(|e| WalletError::InvalidSignature(e.to_string()))?;
    let public_key =
        PublicKey::from_slice(&key_bytes).map_err(|e| WalletError::InvalidPublicKey(e.to_string()))?;
    let secp = Secp256k1::verification_only();
    Ok(secp
        .verify_ecdsa(&message_digest(message), &signature, &public_key)
        .is_ok())
}

use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use secp256k1::{ecdsa::Signature, All, Message, PublicKey, Secp256k1, SecretKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use std::fmt;
use std::str::FromStr;

/// Shared secp256k1 context. Built once and only ever read.
static SECP_CONTEXT: Lazy<Secp256k1<All>> = Lazy::new(Secp256k1::new);

/// Errors that can occur during cryptographic operations
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Invalid signature format: {0}")]
    InvalidSignatureFormat(String),

    #[error("Invalid digest: {0}")]
    InvalidDigest(String),
}

/// Represents a wallet address (hex-encoded secp256k1 public key)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address(pub String);

impl Address {
    /// Creates a new address from a public key, using the uncompressed SEC1 encoding
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        Address(hex::encode(public_key.serialize_uncompressed()))
    }

    /// Converts the address back to a curve point.
    ///
    /// Both compressed (33 byte) and uncompressed (65 byte) encodings are accepted.
    pub fn to_public_key(&self) -> Result<PublicKey, CryptoError> {
        let bytes = hex::decode(&self.0).map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;

        PublicKey::from_slice(&bytes).map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Address {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let address = Address(s.to_string());
        address.to_public_key()?;
        Ok(address)
    }
}

/// Represents a digital signature (hex-encoded DER ECDSA signature)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigitalSignature(pub String);

impl DigitalSignature {
    /// Creates a new digital signature from a signature
    pub fn from_signature(signature: &Signature) -> Self {
        DigitalSignature(hex::encode(&*signature.serialize_der()))
    }

    /// Converts the digital signature to a signature
    ///
    /// The returned signature is normalized to low-S form, which is what
    /// libsecp256k1 requires for verification.
    pub fn to_signature(&self) -> Result<Signature, CryptoError> {
        let bytes =
            hex::decode(&self.0).map_err(|e| CryptoError::InvalidSignatureFormat(e.to_string()))?;

        let mut signature = Signature::from_der(&bytes)
            .map_err(|e| CryptoError::InvalidSignatureFormat(e.to_string()))?;
        signature.normalize_s();

        Ok(signature)
    }
}

/// Represents a wallet with a secp256k1 keypair
#[derive(Debug, Clone)]
pub struct Wallet {
    secret_key: SecretKey,
    public_key: PublicKey,
    address: Address,
}

impl Wallet {
    /// Creates a new wallet with a random keypair
    pub fn new() -> Self {
        let secret_key = SecretKey::new(&mut OsRng);
        Self::from_key(secret_key)
    }

    /// Creates a wallet from an existing secret key
    ///
    /// # Arguments
    ///
    /// * `secret_key_bytes` - The raw 32-byte secret scalar
    ///
    /// # Returns
    ///
    /// The wallet, or `InvalidPrivateKey` if the bytes are not a valid scalar
    pub fn from_secret_key(secret_key_bytes: &[u8]) -> Result<Self, CryptoError> {
        let secret_key = SecretKey::from_slice(secret_key_bytes)
            .map_err(|e| CryptoError::InvalidPrivateKey(e.to_string()))?;

        Ok(Self::from_key(secret_key))
    }

    /// Creates a wallet from a hex-encoded secret key
    pub fn from_secret_hex(secret_key_hex: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(secret_key_hex)
            .map_err(|e| CryptoError::InvalidPrivateKey(e.to_string()))?;

        Self::from_secret_key(&bytes)
    }

    fn from_key(secret_key: SecretKey) -> Self {
        let public_key = PublicKey::from_secret_key(&SECP_CONTEXT, &secret_key);
        let address = Address::from_public_key(&public_key);

        Wallet {
            secret_key,
            public_key,
            address,
        }
    }

    /// Gets the wallet's address
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Gets the wallet's public key
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Signs a hex-encoded 256-bit digest with the wallet's private key
    ///
    /// # Arguments
    ///
    /// * `digest` - 64 hex characters, as produced by the transaction hash
    ///
    /// # Returns
    ///
    /// The DER-encoded signature
    pub fn sign_digest(&self, digest: &str) -> Result<DigitalSignature, CryptoError> {
        let message = digest_to_message(digest)?;
        let signature = SECP_CONTEXT.sign_ecdsa(&message, &self.secret_key);

        Ok(DigitalSignature::from_signature(&signature))
    }

    /// Exports the wallet's secret key as bytes
    pub fn export_secret_key(&self) -> Vec<u8> {
        self.secret_key.secret_bytes().to_vec()
    }
}

impl Default for Wallet {
    fn default() -> Self {
        Self::new()
    }
}

fn digest_to_message(digest: &str) -> Result<Message, CryptoError> {
    let bytes = hex::decode(digest).map_err(|e| CryptoError::InvalidDigest(e.to_string()))?;
    let bytes: [u8; 32] = bytes.try_into().map_err(|bytes: Vec<u8>| {
        CryptoError::InvalidDigest(format!("expected 32 bytes, got {}", bytes.len()))
    })?;

    Ok(Message::from_digest(bytes))
}

/// Verifies a signature over a digest against an address
///
/// # Returns
///
/// `Ok(true)` if the signature was produced by the key behind `address`,
/// `Ok(false)` if it is well formed but does not match. Malformed inputs are
/// reported as errors rather than as a failed match.
pub fn verify_signature(
    address: &Address,
    digest: &str,
    signature: &DigitalSignature,
) -> Result<bool, CryptoError> {
    let public_key = address.to_public_key()?;
    let message = digest_to_message(digest)?;
    let signature = signature.to_signature()?;

    Ok(SECP_CONTEXT.verify_ecdsa(&message, &signature, &public_key).is_ok())
}

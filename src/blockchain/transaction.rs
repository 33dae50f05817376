use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::crypto::{verify_signature, Address, CryptoError, DigitalSignature, Wallet};

/// Errors that can occur during transaction operations
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("Cannot sign transactions for other wallets")]
    UnauthorizedSigner,

    #[error("No signature in this transaction")]
    MissingSignature,

    #[error("Crypto error: {0}")]
    CryptoError(#[from] CryptoError),
}

/// Represents a value transfer between two addresses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Sender's address, `None` for a mining reward
    pub from_address: Option<Address>,

    /// Recipient's address
    pub to_address: Address,

    /// Amount being transferred
    pub amount: f64,

    /// DER signature over the transaction digest
    #[serde(default)]
    pub signature: Option<DigitalSignature>,
}

impl Transaction {
    /// Creates a new unsigned transaction
    ///
    /// # Arguments
    ///
    /// * `from_address` - The address of the sender
    /// * `to_address` - The address of the recipient
    /// * `amount` - The amount to transfer
    pub fn new(from_address: Address, to_address: Address, amount: f64) -> Self {
        Transaction {
            from_address: Some(from_address),
            to_address,
            amount,
            signature: None,
        }
    }

    /// Creates a new reward transaction minted by the system
    pub fn new_reward(to_address: Address, amount: f64) -> Self {
        Transaction {
            from_address: None,
            to_address,
            amount,
            signature: None,
        }
    }

    /// Checks if the transaction is a mining reward
    pub fn is_reward(&self) -> bool {
        self.from_address.is_none()
    }

    /// Calculates the digest of the transaction content
    ///
    /// The signature is not part of the digest; only sender, recipient and amount are.
    /// They are hashed as a JSON object so field boundaries cannot shift.
    pub fn calculate_hash(&self) -> String {
        let content = json!({
            "from": self.from_address.as_ref().map(Address::as_str),
            "to": self.to_address.as_str(),
            "amount": self.amount,
        });

        let mut hasher = Sha256::new();
        hasher.update(content.to_string().as_bytes());

        format!("{:x}", hasher.finalize())
    }

    /// Signs the transaction with a wallet
    ///
    /// Signing again replaces any earlier signature.
    ///
    /// # Arguments
    ///
    /// * `wallet` - The wallet to sign with; its address must be the sender
    pub fn sign(&mut self, wallet: &Wallet) -> Result<(), TransactionError> {
        if self.from_address.as_ref() != Some(wallet.address()) {
            return Err(TransactionError::UnauthorizedSigner);
        }

        let signature = wallet.sign_digest(&self.calculate_hash())?;
        self.signature = Some(signature);

        Ok(())
    }

    /// Checks the transaction's signature
    ///
    /// # Returns
    ///
    /// `Ok(true)` for reward transactions and correctly signed transfers,
    /// `Ok(false)` if the signature belongs to someone else or to other content.
    /// Unsigned transfers and undecodable signatures are errors.
    pub fn is_valid(&self) -> Result<bool, TransactionError> {
        let from_address = match &self.from_address {
            Some(address) => address,
            None => return Ok(true),
        };

        let signature = match &self.signature {
            Some(sig) if !sig.0.is_empty() => sig,
            _ => return Err(TransactionError::MissingSignature),
        };

        Ok(verify_signature(from_address, &self.calculate_hash(), signature)?)
    }
}

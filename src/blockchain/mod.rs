// Blockchain module
//
// This module contains the core ledger implementation including:
// - Block structure and proof of work
// - Blockchain (ledger) structure
// - Transaction structure
// - Cryptography utilities (secp256k1)
// - Optional sled-backed block storage

pub mod block;
pub mod chain;
pub mod crypto;
pub mod storage;
pub mod transaction;

// Re-export main components for easier access
pub use block::{Block, MiningControl, MiningError};
pub use chain::{Blockchain, BlockchainError, ChainValidationError, ValidationFailure};
pub use crypto::{verify_signature, Address, CryptoError, DigitalSignature, Wallet};
pub use transaction::{Transaction, TransactionError};

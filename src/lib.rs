//! A single-process proof-of-work ledger.
//!
//! Transfers are signed with secp256k1 keys, batched into blocks, mined
//! against a leading-zero difficulty target and linked by hash. Balances and
//! chain validity are recomputed by scanning the chain.

#![forbid(unsafe_code)]

pub mod blockchain;
pub mod config;

pub use blockchain::{Address, Block, Blockchain, BlockchainError, Transaction, Wallet};
pub use config::LedgerConfig;

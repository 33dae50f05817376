use chrono::{DateTime, TimeZone, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use thiserror::Error;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use super::transaction::Transaction;

/// How many hash attempts run between deadline checks
const DEADLINE_CHECK_INTERVAL: u64 = 1024;

/// Errors that can stop a proof-of-work search early
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MiningError {
    #[error("Mining cancelled after {attempts} attempts")]
    Cancelled { attempts: u64 },

    #[error("Mining deadline exceeded after {attempts} attempts")]
    DeadlineExceeded { attempts: u64 },
}

/// Optional stop conditions for [`Block::mine_with`]
#[derive(Debug, Clone, Default)]
pub struct MiningControl {
    cancel: Option<Arc<AtomicBool>>,
    deadline: Option<Instant>,
}

impl MiningControl {
    /// No cancellation and no deadline; equivalent to [`Block::mine`]
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Stops the search once `flag` is set to `true` by any thread
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    fn check(&self, attempts: u64) -> Result<(), MiningError> {
        if let Some(flag) = &self.cancel {
            if flag.load(Ordering::Relaxed) {
                return Err(MiningError::Cancelled { attempts });
            }
        }

        if let Some(deadline) = self.deadline {
            if attempts % DEADLINE_CHECK_INTERVAL == 0 && Instant::now() >= deadline {
                return Err(MiningError::DeadlineExceeded { attempts });
            }
        }

        Ok(())
    }
}

/// Fixed creation time of every genesis block
pub fn genesis_timestamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2022, 5, 9, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Represents a block in the blockchain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Timestamp when the block was created
    pub timestamp: DateTime<Utc>,

    /// List of transactions included in this block
    pub transactions: Vec<Transaction>,

    /// Hash of the previous block, empty for genesis
    pub previous_hash: String,

    /// Hash of the current block, empty until mined
    pub hash: String,

    /// Proof of work counter
    pub nonce: u64,
}

impl Block {
    /// Creates a new, unmined block
    ///
    /// # Arguments
    ///
    /// * `timestamp` - The creation time of the block
    /// * `transactions` - The list of transactions to include in the block
    /// * `previous_hash` - The hash of the previous block
    pub fn new(timestamp: DateTime<Utc>, transactions: Vec<Transaction>, previous_hash: String) -> Self {
        Block {
            timestamp,
            transactions,
            previous_hash,
            hash: String::new(),
            nonce: 0,
        }
    }

    /// Calculates the hash of the block
    ///
    /// Every field except `hash` is serialized to JSON, transactions in full,
    /// so altering any transaction field changes the block hash.
    ///
    /// # Returns
    ///
    /// The SHA-256 hash of the block as a hexadecimal string
    pub fn calculate_hash(&self) -> String {
        let block_data = json!({
            "previous_hash": self.previous_hash,
            "timestamp": self.timestamp.timestamp_millis(),
            "transactions": self.transactions,
            "nonce": self.nonce,
        });

        let mut hasher = Sha256::new();
        hasher.update(block_data.to_string().as_bytes());

        format!("{:x}", hasher.finalize())
    }

    /// Checks whether the stored hash starts with `difficulty` zero characters
    pub fn meets_difficulty(&self, difficulty: usize) -> bool {
        hash_meets_difficulty(&self.hash, difficulty)
    }

    /// Runs proof of work until the hash satisfies `difficulty`
    ///
    /// Blocks the caller until a nonce is found. Cost grows roughly as
    /// 16^difficulty attempts.
    ///
    /// # Returns
    ///
    /// The number of hashes computed
    pub fn mine(&mut self, difficulty: usize) -> u64 {
        let mut attempts = 0;
        loop {
            self.hash = self.calculate_hash();
            attempts += 1;

            if self.meets_difficulty(difficulty) {
                debug!("Block mined: {} (nonce {}, {} attempts)", self.hash, self.nonce, attempts);
                return attempts;
            }

            self.nonce += 1;
        }
    }

    /// Runs proof of work, giving up when `control` says so
    ///
    /// On success the block is in the same state [`Block::mine`] would leave it.
    /// On failure the hash is cleared so the block is never mistaken for a mined one.
    pub fn mine_with(&mut self, difficulty: usize, control: &MiningControl) -> Result<u64, MiningError> {
        let mut attempts = 0;
        loop {
            if let Err(err) = control.check(attempts) {
                warn!("{}", err);
                self.hash.clear();
                return Err(err);
            }

            self.hash = self.calculate_hash();
            attempts += 1;

            if self.meets_difficulty(difficulty) {
                debug!("Block mined: {} (nonce {}, {} attempts)", self.hash, self.nonce, attempts);
                return Ok(attempts);
            }

            self.nonce += 1;
        }
    }

    /// Checks that every transaction in the block carries a valid signature
    ///
    /// Unsigned or undecodable transactions count as invalid.
    pub fn has_valid_transactions(&self) -> bool {
        self.transactions
            .iter()
            .all(|tx| matches!(tx.is_valid(), Ok(true)))
    }
}

fn hash_meets_difficulty(hash: &str, difficulty: usize) -> bool {
    hash.len() >= difficulty && hash.bytes().take(difficulty).all(|b| b == b'0')
}

use std::path::Path;

use log::warn;
use sled::{Db, Tree};
use thiserror::Error;

use super::block::Block;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    #[error("Item not found: {0}")]
    NotFound(String),

    #[error("Inconsistent storage: {0}")]
    Inconsistent(String),
}

/// Durable block storage
///
/// Blocks are keyed by their height in big-endian form so that iterating the
/// tree yields them in chain order.
pub struct BlockchainStorage {
    db: Db,
    blocks: Tree,
    metadata: Tree,
}

impl std::fmt::Debug for BlockchainStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockchainStorage")
            .field("blocks", &self.blocks.len())
            .finish()
    }
}

impl BlockchainStorage {
    /// Opens (or creates) block storage at `path`
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path)?;

        let blocks = db.open_tree("blocks")?;
        let metadata = db.open_tree("metadata")?;

        Ok(Self {
            db,
            blocks,
            metadata,
        })
    }

    /// Saves a block at the given height
    ///
    /// # Arguments
    ///
    /// * `height` - Position of the block in the chain, 0 for genesis
    /// * `block` - The block to save
    pub fn save_block(&self, height: u64, block: &Block) -> Result<(), StorageError> {
        let value = bincode::serialize(block)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;

        self.blocks.insert(height.to_be_bytes(), value)?;

        self.metadata.insert("latest_block_hash", block.hash.as_bytes())?;

        let height_bytes = bincode::serialize(&height)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;
        self.metadata.insert("block_height", height_bytes)?;

        Ok(())
    }

    /// Gets all blocks in chain order
    ///
    /// Unlike a lookup of a single block, a record that fails to decode here is
    /// fatal: skipping it would silently produce a chain with a hole.
    pub fn get_all_blocks(&self) -> Result<Vec<Block>, StorageError> {
        let mut blocks = Vec::with_capacity(self.blocks.len());

        for result in self.blocks.iter() {
            let (key, value) = result?;
            let block = bincode::deserialize::<Block>(&value).map_err(|e| {
                warn!("Failed to deserialize block at key {:?}: {}", key.as_ref(), e);
                StorageError::DeserializationError(e.to_string())
            })?;
            blocks.push(block);
        }

        Ok(blocks)
    }

    /// Gets the hash of the most recently saved block
    pub fn get_latest_block_hash(&self) -> Result<String, StorageError> {
        if let Some(value) = self.metadata.get("latest_block_hash")? {
            Ok(String::from_utf8_lossy(&value).to_string())
        } else {
            Err(StorageError::NotFound("Latest block hash not found".to_string()))
        }
    }

    /// Gets the height of the most recently saved block, `None` when empty
    pub fn get_block_height(&self) -> Result<Option<u64>, StorageError> {
        match self.metadata.get("block_height")? {
            Some(value) => {
                let height: u64 = bincode::deserialize(&value)
                    .map_err(|e| StorageError::DeserializationError(e.to_string()))?;
                Ok(Some(height))
            }
            None => Ok(None),
        }
    }

    /// Records the difficulty the stored chain was mined at
    pub fn save_difficulty(&self, difficulty: usize) -> Result<(), StorageError> {
        let value = bincode::serialize(&(difficulty as u64))
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;

        self.metadata.insert("difficulty", value)?;
        Ok(())
    }

    /// Gets the difficulty the stored chain was mined at, `None` if never recorded
    pub fn get_difficulty(&self) -> Result<Option<usize>, StorageError> {
        match self.metadata.get("difficulty")? {
            Some(value) => {
                let difficulty: u64 = bincode::deserialize(&value)
                    .map_err(|e| StorageError::DeserializationError(e.to_string()))?;
                Ok(Some(difficulty as usize))
            }
            None => Ok(None),
        }
    }

    /// Loads every block and checks it against the latest-block metadata
    ///
    /// The recorded height must point at the last block and the recorded hash
    /// must be that block's hash. An empty store must have no height recorded.
    pub fn load_chain(&self) -> Result<Vec<Block>, StorageError> {
        let blocks = self.get_all_blocks()?;
        let height = self.get_block_height()?;

        let tip = match blocks.last() {
            Some(tip) => tip,
            None if height.is_none() => return Ok(blocks),
            None => {
                return Err(StorageError::Inconsistent(
                    "block height recorded but no blocks stored".to_string(),
                ))
            }
        };

        let expected_height = (blocks.len() - 1) as u64;
        if height != Some(expected_height) {
            return Err(StorageError::Inconsistent(format!(
                "recorded height {:?} but last stored block is at {}",
                height, expected_height
            )));
        }

        let latest_hash = self.get_latest_block_hash()?;
        if latest_hash != tip.hash {
            return Err(StorageError::Inconsistent(format!(
                "recorded latest hash {} but last stored block is {}",
                latest_hash, tip.hash
            )));
        }

        Ok(blocks)
    }

    /// Flushes all pending writes to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }
}

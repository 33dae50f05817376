use chrono::Utc;
use log::{debug, error, info, warn};
use thiserror::Error;

use std::fmt;
use std::path::Path;

use super::block::{genesis_timestamp, Block, MiningControl, MiningError};
use super::crypto::Address;
use super::storage::{BlockchainStorage, StorageError};
use super::transaction::Transaction;
use crate::config::{ConfigError, LedgerConfig};

/// Errors that can occur during blockchain operations
#[derive(Debug, Error)]
pub enum BlockchainError {
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("Invalid block: {0}")]
    InvalidBlock(String),

    #[error("The chain has no genesis block yet")]
    EmptyChain,

    #[error("Genesis block already mined")]
    GenesisAlreadyMined,

    #[error("Mining error: {0}")]
    MiningError(#[from] MiningError),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Config error: {0}")]
    ConfigError(#[from] ConfigError),

    #[error("Stored chain is corrupt: {0}")]
    CorruptStorage(#[from] ChainValidationError),
}

/// Why a block failed chain validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationFailure {
    /// At least one transaction is unsigned or carries a bad signature
    InvalidTransactions,
    /// The stored hash does not match the block content
    HashMismatch,
    /// The stored hash does not satisfy the ledger difficulty
    InsufficientWork,
    /// `previous_hash` does not match the preceding block
    BrokenLink,
}

/// First inconsistency found by [`Blockchain::validate_chain`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("block {index} is invalid: {reason}")]
pub struct ChainValidationError {
    pub index: usize,
    pub reason: ValidationFailure,
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ValidationFailure::InvalidTransactions => "contains invalid transactions",
            ValidationFailure::HashMismatch => "stored hash does not match content",
            ValidationFailure::InsufficientWork => "hash does not meet difficulty",
            ValidationFailure::BrokenLink => "previous hash does not match preceding block",
        };
        f.write_str(text)
    }
}

/// Represents the blockchain
///
/// All mutation goes through `&mut self`, so at most one caller can add
/// transactions or mine at a time. Blocks and pending transactions are only
/// handed out as shared slices.
#[derive(Debug)]
pub struct Blockchain {
    /// The chain of blocks, index 0 is genesis
    chain: Vec<Block>,

    /// Transactions to be included in the next block
    pending_transactions: Vec<Transaction>,

    /// Mining difficulty (number of leading zeros required in hash)
    difficulty: usize,

    /// Mining reward
    mining_reward: f64,

    /// Storage for blockchain data
    storage: Option<BlockchainStorage>,
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new()
    }
}

impl Blockchain {
    /// Creates an empty in-memory blockchain with difficulty 2 and reward 100
    pub fn new() -> Self {
        let config = LedgerConfig::default();
        Blockchain {
            chain: Vec::new(),
            pending_transactions: Vec::new(),
            difficulty: config.difficulty,
            mining_reward: config.mining_reward,
            storage: None,
        }
    }

    /// Creates a blockchain from configuration
    ///
    /// Uses sled storage when `config.storage_path` is set, otherwise stays in memory.
    pub fn with_config(config: &LedgerConfig) -> Result<Self, BlockchainError> {
        config.validate()?;

        match &config.storage_path {
            Some(path) => Self::with_storage(path, config),
            None => Ok(Blockchain {
                difficulty: config.difficulty,
                mining_reward: config.mining_reward,
                ..Self::new()
            }),
        }
    }

    /// Creates a blockchain backed by persistent storage
    ///
    /// # Arguments
    ///
    /// * `storage_path` - The path to the storage directory
    /// * `config` - Difficulty and reward to use for new blocks
    ///
    /// A stored chain keeps the difficulty it was mined at, whatever
    /// `config.difficulty` says.
    ///
    /// # Returns
    ///
    /// The stored chain, or an empty chain if nothing was stored yet.
    /// `CorruptStorage` if the stored chain fails validation.
    pub fn with_storage<P: AsRef<Path>>(
        storage_path: P,
        config: &LedgerConfig,
    ) -> Result<Self, BlockchainError> {
        config.validate()?;
        let storage = BlockchainStorage::new(storage_path)?;
        let chain = storage.load_chain()?;

        if chain.is_empty() {
            info!("No existing blockchain found in storage");
        } else {
            info!("Loaded {} blocks from storage", chain.len());
        }

        let difficulty = match storage.get_difficulty()? {
            Some(stored) if !chain.is_empty() => {
                if stored != config.difficulty {
                    warn!(
                        "Stored chain was mined at difficulty {}, ignoring configured {}",
                        stored, config.difficulty
                    );
                }
                stored
            }
            _ => config.difficulty,
        };

        let blockchain = Blockchain {
            chain,
            pending_transactions: Vec::new(),
            difficulty,
            mining_reward: config.mining_reward,
            storage: Some(storage),
        };

        blockchain.validate_chain().map_err(|err| {
            error!("Stored chain failed validation: {}", err);
            err
        })?;

        Ok(blockchain)
    }

    /// Mines the genesis block, paying the mining reward to `reward_address`
    pub fn mine_genesis_block(&mut self, reward_address: &Address) -> Result<&Block, BlockchainError> {
        if !self.chain.is_empty() {
            return Err(BlockchainError::GenesisAlreadyMined);
        }

        let reward = Transaction::new_reward(reward_address.clone(), self.mining_reward);
        let mut block = Block::new(genesis_timestamp(), vec![reward], String::new());
        let attempts = block.mine(self.difficulty);

        info!("Genesis block mined: {} ({} attempts)", block.hash, attempts);
        self.append(block)
    }

    /// Gets the last block in the chain
    pub fn latest_block(&self) -> Result<&Block, BlockchainError> {
        self.chain.last().ok_or(BlockchainError::EmptyChain)
    }

    /// Adds a new transaction to the pending transactions
    ///
    /// Only the signature is checked; balances are not, so an address can
    /// spend more than it holds.
    ///
    /// # Arguments
    ///
    /// * `transaction` - A transfer carrying both addresses and a signature
    pub fn add_transaction(&mut self, transaction: Transaction) -> Result<(), BlockchainError> {
        self.latest_block()?;

        let from_missing = transaction.from_address.as_ref().map_or(true, |a| a.0.is_empty());
        if from_missing || transaction.to_address.0.is_empty() {
            warn!("Rejected transaction without sender or recipient");
            return Err(BlockchainError::InvalidTransaction(
                "Transaction must include to and from addresses".to_string(),
            ));
        }

        match transaction.is_valid() {
            Ok(true) => {}
            Ok(false) => {
                warn!("Rejected transaction {}: bad signature", transaction.calculate_hash());
                return Err(BlockchainError::InvalidTransaction(
                    "Signature does not match sender".to_string(),
                ));
            }
            Err(err) => {
                warn!("Rejected transaction {}: {}", transaction.calculate_hash(), err);
                return Err(BlockchainError::InvalidTransaction(err.to_string()));
            }
        }

        debug!("Accepted transaction {}", transaction.calculate_hash());
        self.pending_transactions.push(transaction);
        Ok(())
    }

    /// Mines a new block with the pending transactions
    ///
    /// Afterwards the pool holds a single reward to `reward_address`, which is
    /// paid out when the next block is mined.
    pub fn mine_pending_transactions(&mut self, reward_address: &Address) -> Result<&Block, BlockchainError> {
        self.mine_pending_transactions_with(reward_address, &MiningControl::unbounded())
    }

    /// Like [`Blockchain::mine_pending_transactions`], but can be cancelled
    ///
    /// If mining stops early nothing is appended and the pool is left as it was.
    pub fn mine_pending_transactions_with(
        &mut self,
        reward_address: &Address,
        control: &MiningControl,
    ) -> Result<&Block, BlockchainError> {
        let previous_hash = self.latest_block()?.hash.clone();

        let mut block = Block::new(Utc::now(), self.pending_transactions.clone(), previous_hash);
        let attempts = block.mine_with(self.difficulty, control)?;
        info!("Block successfully mined: {} ({} attempts)", block.hash, attempts);

        self.append(block)?;
        self.pending_transactions = vec![Transaction::new_reward(reward_address.clone(), self.mining_reward)];

        self.latest_block()
    }

    /// Links a caller-built block to the tip, mines it and appends it
    pub fn add_block(&mut self, mut block: Block) -> Result<&Block, BlockchainError> {
        block.previous_hash = self.latest_block()?.hash.clone();

        if !block.has_valid_transactions() {
            return Err(BlockchainError::InvalidBlock(
                "Block contains invalid transactions".to_string(),
            ));
        }

        let attempts = block.mine(self.difficulty);
        info!("Block added: {} ({} attempts)", block.hash, attempts);
        self.append(block)
    }

    /// Stores then appends a mined block
    fn append(&mut self, block: Block) -> Result<&Block, BlockchainError> {
        if let Some(storage) = &self.storage {
            if self.chain.is_empty() {
                storage.save_difficulty(self.difficulty)?;
            }
            storage.save_block(self.chain.len() as u64, &block)?;
            storage.flush()?;
        }

        self.chain.push(block);
        self.latest_block()
    }

    /// Computes the balance of `address` from every transaction in the chain
    pub fn get_balance(&self, address: &Address) -> f64 {
        let mut balance = 0.0;

        for block in &self.chain {
            for tx in &block.transactions {
                if &tx.to_address == address {
                    balance += tx.amount;
                }
                if tx.from_address.as_ref() == Some(address) {
                    balance -= tx.amount;
                }
            }
        }

        balance
    }

    /// Validates the whole chain, reporting the first bad block
    ///
    /// Every block, genesis included, must have valid transactions, a hash
    /// matching its content and enough work. Every block after genesis must
    /// point at its predecessor's hash.
    pub fn validate_chain(&self) -> Result<(), ChainValidationError> {
        for (index, block) in self.chain.iter().enumerate() {
            let fail = |reason: ValidationFailure| -> Result<(), ChainValidationError> {
                Err(ChainValidationError { index, reason })
            };

            if !block.has_valid_transactions() {
                return fail(ValidationFailure::InvalidTransactions);
            }

            if block.hash != block.calculate_hash() {
                return fail(ValidationFailure::HashMismatch);
            }

            if !block.meets_difficulty(self.difficulty) {
                return fail(ValidationFailure::InsufficientWork);
            }

            if index > 0 && block.previous_hash != self.chain[index - 1].hash {
                return fail(ValidationFailure::BrokenLink);
            }
        }

        Ok(())
    }

    /// Checks whether the chain is internally consistent
    pub fn is_chain_valid(&self) -> bool {
        match self.validate_chain() {
            Ok(()) => true,
            Err(err) => {
                debug!("Chain validation failed: {}", err);
                false
            }
        }
    }

    /// Gets the chain of blocks
    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    /// Gets all pending transactions
    pub fn pending_transactions(&self) -> &[Transaction] {
        &self.pending_transactions
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    pub fn mining_reward(&self) -> f64 {
        self.mining_reward
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::crypto::Wallet;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    fn addr(s: &str) -> Address {
        Address(s.to_string())
    }

    fn signed_transfer(from: &Wallet, to: &Address, amount: f64) -> Transaction {
        let mut tx = Transaction::new(from.address().clone(), to.clone(), amount);
        tx.sign(from).unwrap();
        tx
    }

    /// Genesis to `wallet`, then one block carrying a signed transfer
    fn populated_chain(wallet: &Wallet) -> Blockchain {
        let mut blockchain = Blockchain::new();
        blockchain.mine_genesis_block(wallet.address()).unwrap();
        blockchain
            .add_transaction(signed_transfer(wallet, &addr("addrB"), 10.0))
            .unwrap();
        blockchain.mine_pending_transactions(&addr("addrC")).unwrap();
        blockchain.mine_pending_transactions(&addr("addrC")).unwrap();
        blockchain
    }

    #[test]
    fn test_new_blockchain() {
        let blockchain = Blockchain::new();

        assert!(blockchain.is_empty());
        assert_eq!(blockchain.difficulty(), 2);
        assert_eq!(blockchain.mining_reward(), 100.0);
        assert!(matches!(blockchain.latest_block(), Err(BlockchainError::EmptyChain)));
        assert!(blockchain.is_chain_valid());
    }

    #[test]
    fn test_mine_genesis_block() {
        let mut blockchain = Blockchain::new();
        let genesis = blockchain.mine_genesis_block(&addr("addrA")).unwrap().clone();

        assert_eq!(blockchain.len(), 1);
        assert!(genesis.previous_hash.is_empty());
        assert!(genesis.hash.starts_with("00"));
        assert_eq!(genesis.timestamp, genesis_timestamp());
        assert_eq!(genesis.transactions, vec![Transaction::new_reward(addr("addrA"), 100.0)]);
        assert!(blockchain.pending_transactions().is_empty());
    }

    #[test]
    fn test_genesis_only_once() {
        let mut blockchain = Blockchain::new();
        blockchain.mine_genesis_block(&addr("addrA")).unwrap();

        assert!(matches!(
            blockchain.mine_genesis_block(&addr("addrA")),
            Err(BlockchainError::GenesisAlreadyMined)
        ));
        assert_eq!(blockchain.len(), 1);
    }

    #[test]
    fn test_genesis_balance() {
        let mut blockchain = Blockchain::new();
        blockchain.mine_genesis_block(&addr("addrA")).unwrap();

        assert_eq!(blockchain.get_balance(&addr("addrA")), 100.0);
        assert_eq!(blockchain.get_balance(&addr("addrB")), 0.0);
    }

    #[test]
    fn test_operations_require_genesis() {
        let mut blockchain = Blockchain::new();
        let wallet = Wallet::new();

        assert!(matches!(
            blockchain.add_transaction(signed_transfer(&wallet, &addr("b"), 1.0)),
            Err(BlockchainError::EmptyChain)
        ));
        assert!(matches!(
            blockchain.mine_pending_transactions(&addr("miner")),
            Err(BlockchainError::EmptyChain)
        ));
        assert!(blockchain.pending_transactions().is_empty());
    }

    #[test]
    fn test_add_transaction() {
        let wallet = Wallet::new();
        let mut blockchain = Blockchain::new();
        blockchain.mine_genesis_block(wallet.address()).unwrap();

        blockchain
            .add_transaction(signed_transfer(&wallet, &addr("addrB"), 10.0))
            .unwrap();

        assert_eq!(blockchain.pending_transactions().len(), 1);
    }

    #[test]
    fn test_add_transaction_allows_overspending() {
        let wallet = Wallet::new();
        let mut blockchain = Blockchain::new();
        blockchain.mine_genesis_block(&addr("someone else")).unwrap();

        blockchain
            .add_transaction(signed_transfer(&wallet, &addr("addrB"), 500.0))
            .unwrap();
        blockchain.mine_pending_transactions(&addr("miner")).unwrap();

        assert_eq!(blockchain.get_balance(wallet.address()), -500.0);
    }

    #[test]
    fn test_rejects_unsigned_transaction() {
        let wallet = Wallet::new();
        let mut blockchain = Blockchain::new();
        blockchain.mine_genesis_block(wallet.address()).unwrap();

        let unsigned = Transaction::new(wallet.address().clone(), addr("addrB"), 10.0);
        assert!(matches!(
            blockchain.add_transaction(unsigned),
            Err(BlockchainError::InvalidTransaction(_))
        ));
        assert!(blockchain.pending_transactions().is_empty());
    }

    #[test]
    fn test_rejects_wrongly_signed_transaction() {
        let wallet = Wallet::new();
        let other = Wallet::new();
        let mut blockchain = Blockchain::new();
        blockchain.mine_genesis_block(wallet.address()).unwrap();

        let mut forged = Transaction::new(wallet.address().clone(), addr("addrB"), 10.0);
        forged.signature = signed_transfer(&other, &addr("addrB"), 10.0).signature;

        assert!(matches!(
            blockchain.add_transaction(forged),
            Err(BlockchainError::InvalidTransaction(_))
        ));
        assert!(blockchain.pending_transactions().is_empty());
    }

    #[test]
    fn test_rejects_missing_addresses() {
        let mut blockchain = Blockchain::new();
        blockchain.mine_genesis_block(&addr("addrA")).unwrap();

        let reward = Transaction::new_reward(addr("addrA"), 1_000.0);
        assert!(matches!(
            blockchain.add_transaction(reward),
            Err(BlockchainError::InvalidTransaction(_))
        ));

        let wallet = Wallet::new();
        let no_recipient = signed_transfer(&wallet, &addr(""), 1.0);
        assert!(matches!(
            blockchain.add_transaction(no_recipient),
            Err(BlockchainError::InvalidTransaction(_))
        ));
        assert!(blockchain.pending_transactions().is_empty());
    }

    #[test]
    fn test_mine_pending_transactions() {
        let wallet = Wallet::new();
        let mut blockchain = Blockchain::new();
        blockchain.mine_genesis_block(wallet.address()).unwrap();
        let genesis_hash = blockchain.latest_block().unwrap().hash.clone();

        let tx = signed_transfer(&wallet, &addr("addrB"), 10.0);
        blockchain.add_transaction(tx.clone()).unwrap();
        let block = blockchain.mine_pending_transactions(&addr("addrC")).unwrap().clone();

        assert_eq!(blockchain.len(), 2);
        assert_eq!(block.previous_hash, genesis_hash);
        assert_eq!(block.transactions, vec![tx]);
        assert!(block.meets_difficulty(2));
        assert_eq!(block.hash, block.calculate_hash());

        assert_eq!(
            blockchain.pending_transactions(),
            &[Transaction::new_reward(addr("addrC"), 100.0)]
        );
    }

    #[test]
    fn test_reference_scenario_balances() {
        let wallet = Wallet::new();
        let blockchain = populated_chain(&wallet);

        assert_eq!(blockchain.get_balance(wallet.address()), 90.0);
        assert_eq!(blockchain.get_balance(&addr("addrB")), 10.0);
        // The first reward is only paid out by the second mined block
        assert_eq!(blockchain.get_balance(&addr("addrC")), 100.0);
        assert_eq!(blockchain.pending_transactions().len(), 1);
    }

    #[test]
    fn test_mining_cancelled_leaves_state_untouched() {
        let wallet = Wallet::new();
        let mut blockchain = Blockchain::new();
        blockchain.mine_genesis_block(wallet.address()).unwrap();
        blockchain
            .add_transaction(signed_transfer(&wallet, &addr("addrB"), 10.0))
            .unwrap();

        let control = MiningControl::default().with_cancel_flag(Arc::new(AtomicBool::new(true)));
        let result = blockchain.mine_pending_transactions_with(&addr("miner"), &control);

        assert!(matches!(
            result,
            Err(BlockchainError::MiningError(MiningError::Cancelled { .. }))
        ));
        assert_eq!(blockchain.len(), 1);
        assert_eq!(blockchain.pending_transactions().len(), 1);
        assert!(blockchain.pending_transactions()[0].from_address.is_some());
    }

    #[test]
    fn test_add_block() {
        let wallet = Wallet::new();
        let mut blockchain = Blockchain::new();
        blockchain.mine_genesis_block(wallet.address()).unwrap();
        let tip = blockchain.latest_block().unwrap().hash.clone();

        let block = Block::new(
            Utc::now(),
            vec![signed_transfer(&wallet, &addr("addrB"), 5.0)],
            "ignored".to_string(),
        );
        let added = blockchain.add_block(block).unwrap().clone();

        assert_eq!(added.previous_hash, tip);
        assert!(blockchain.is_chain_valid());

        let bad = Block::new(
            Utc::now(),
            vec![Transaction::new(wallet.address().clone(), addr("addrB"), 5.0)],
            String::new(),
        );
        assert!(matches!(
            blockchain.add_block(bad),
            Err(BlockchainError::InvalidBlock(_))
        ));
        assert_eq!(blockchain.len(), 2);
    }

    #[test]
    fn test_blockchain_validity() {
        let wallet = Wallet::new();
        let blockchain = populated_chain(&wallet);

        assert!(blockchain.is_chain_valid());
        assert_eq!(blockchain.validate_chain(), Ok(()));
    }

    #[test]
    fn test_tampered_amount_detected() {
        let wallet = Wallet::new();
        let mut blockchain = populated_chain(&wallet);

        blockchain.chain[1].transactions[0].amount = 1.0;

        assert!(!blockchain.is_chain_valid());
        assert_eq!(blockchain.validate_chain().unwrap_err().index, 1);
    }

    #[test]
    fn test_tampered_reward_detected() {
        let wallet = Wallet::new();
        let mut blockchain = populated_chain(&wallet);

        // Reward transactions carry no signature, so only the block hash catches this
        blockchain.chain[2].transactions[0].amount = 1_000_000.0;

        assert_eq!(
            blockchain.validate_chain(),
            Err(ChainValidationError {
                index: 2,
                reason: ValidationFailure::HashMismatch
            })
        );
    }

    #[test]
    fn test_shifted_transfer_fields_detected() {
        let wallet = Wallet::new();
        let mut blockchain = populated_chain(&wallet);

        // Rewrite addrB/10 as addrB1/0, which reads the same once concatenated
        let transfer = &mut blockchain.chain[1].transactions[0];
        transfer.to_address = addr("addrB1");
        transfer.amount = 0.0;

        assert!(!transfer.is_valid().unwrap());
        assert_eq!(
            blockchain.validate_chain(),
            Err(ChainValidationError {
                index: 1,
                reason: ValidationFailure::InvalidTransactions
            })
        );
    }

    #[test]
    fn test_tampered_genesis_detected() {
        let wallet = Wallet::new();
        let mut blockchain = populated_chain(&wallet);

        blockchain.chain[0].transactions[0].amount = 5_000.0;

        assert_eq!(
            blockchain.validate_chain(),
            Err(ChainValidationError {
                index: 0,
                reason: ValidationFailure::HashMismatch
            })
        );
    }

    #[test]
    fn test_tampered_hash_detected() {
        let wallet = Wallet::new();
        let mut blockchain = populated_chain(&wallet);

        blockchain.chain[2].hash = "00".repeat(32);

        assert_eq!(
            blockchain.validate_chain(),
            Err(ChainValidationError {
                index: 2,
                reason: ValidationFailure::HashMismatch
            })
        );
    }

    #[test]
    fn test_tampered_previous_hash_detected() {
        let wallet = Wallet::new();
        let mut blockchain = populated_chain(&wallet);

        // Re-mine so that only the link is wrong
        blockchain.chain[2].previous_hash = "bogus".to_string();
        blockchain.chain[2].mine(2);

        assert_eq!(
            blockchain.validate_chain(),
            Err(ChainValidationError {
                index: 2,
                reason: ValidationFailure::BrokenLink
            })
        );
    }

    #[test]
    fn test_checks_every_block() {
        let wallet = Wallet::new();
        let mut blockchain = populated_chain(&wallet);
        blockchain.mine_pending_transactions(&addr("addrC")).unwrap();

        // Only the last block is tampered; earlier blocks are fine
        let last = blockchain.len() - 1;
        blockchain.chain[last].transactions[0].amount = 7.0;

        assert_eq!(blockchain.validate_chain().unwrap_err().index, last);
    }

    #[test]
    fn test_with_config() {
        let config = LedgerConfig {
            difficulty: 1,
            mining_reward: 25.0,
            storage_path: None,
        };
        let mut blockchain = Blockchain::with_config(&config).unwrap();
        blockchain.mine_genesis_block(&addr("addrA")).unwrap();

        assert_eq!(blockchain.difficulty(), 1);
        assert_eq!(blockchain.get_balance(&addr("addrA")), 25.0);

        let bad = LedgerConfig {
            difficulty: 100,
            ..LedgerConfig::default()
        };
        assert!(matches!(
            Blockchain::with_config(&bad),
            Err(BlockchainError::ConfigError(_))
        ));
    }

    #[test]
    fn test_with_storage_reloads_chain() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = LedgerConfig::default();
        let wallet = Wallet::new();

        let expected = {
            let mut blockchain = Blockchain::with_storage(dir.path(), &config).unwrap();
            assert!(blockchain.is_empty());
            blockchain.mine_genesis_block(wallet.address()).unwrap();
            blockchain
                .add_transaction(signed_transfer(&wallet, &addr("addrB"), 10.0))
                .unwrap();
            blockchain.mine_pending_transactions(&addr("addrC")).unwrap();
            blockchain.chain().to_vec()
        };

        let reloaded = Blockchain::with_storage(dir.path(), &config).unwrap();
        assert_eq!(reloaded.chain(), expected.as_slice());
        assert!(reloaded.is_chain_valid());
        assert_eq!(reloaded.get_balance(&addr("addrB")), 10.0);
        assert!(reloaded.pending_transactions().is_empty());
    }

    #[test]
    fn test_with_storage_keeps_stored_difficulty() {
        let dir = tempfile::TempDir::new().unwrap();
        let easy = LedgerConfig {
            difficulty: 1,
            ..LedgerConfig::default()
        };
        let wallet = Wallet::new();

        {
            let mut blockchain = Blockchain::with_storage(dir.path(), &easy).unwrap();
            blockchain.mine_genesis_block(wallet.address()).unwrap();
            blockchain.mine_pending_transactions(&addr("addrC")).unwrap();
        }

        let hard = LedgerConfig {
            difficulty: 4,
            ..LedgerConfig::default()
        };
        let reloaded = Blockchain::with_storage(dir.path(), &hard).unwrap();

        assert_eq!(reloaded.difficulty(), 1);
        assert_eq!(reloaded.len(), 2);
        assert!(reloaded.is_chain_valid());
    }

    #[test]
    fn test_with_storage_rejects_tampered_chain() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = LedgerConfig::default();
        let wallet = Wallet::new();

        {
            let mut blockchain = Blockchain::with_storage(dir.path(), &config).unwrap();
            blockchain.mine_genesis_block(wallet.address()).unwrap();
            blockchain
                .add_transaction(signed_transfer(&wallet, &addr("addrB"), 10.0))
                .unwrap();
            blockchain.mine_pending_transactions(&addr("addrC")).unwrap();
        }

        {
            let storage = BlockchainStorage::new(dir.path()).unwrap();
            let mut blocks = storage.get_all_blocks().unwrap();
            blocks[1].transactions[0].amount = 1_000.0;
            storage.save_block(1, &blocks[1]).unwrap();
            storage.flush().unwrap();
        }

        match Blockchain::with_storage(dir.path(), &config) {
            Err(BlockchainError::CorruptStorage(err)) => assert_eq!(err.index, 1),
            other => panic!("expected corrupt storage, got {:?}", other),
        }
    }
}

use anyhow::{Context, Result};
use log::info;

use pow_ledger::{Address, Blockchain, LedgerConfig, Transaction, Wallet};

/// Well-known demo key; never use it for anything of value
const DEMO_SECRET_KEY: &str = "55cbf22b76ebbf95b7f7c901b16f0cb620a265601f9b1b564689c0bfc7cdde3e";

fn main() -> Result<()> {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = LedgerConfig::from_env().context("failed to load ledger config")?;
    info!(
        "Starting ledger (difficulty {}, reward {})",
        config.difficulty, config.mining_reward
    );

    let mut blockchain = Blockchain::with_config(&config).context("failed to open ledger")?;

    let wallet = Wallet::from_secret_hex(DEMO_SECRET_KEY)?;
    let recipient = Wallet::new();
    let miner = Wallet::new();
    info!("Demo wallet address: {}", wallet.address());

    if blockchain.is_empty() {
        blockchain.mine_genesis_block(wallet.address())?;
    }

    let mut transfer = Transaction::new(wallet.address().clone(), recipient.address().clone(), 10.0);
    transfer.sign(&wallet)?;
    blockchain.add_transaction(transfer)?;

    blockchain.mine_pending_transactions(miner.address())?;

    report(&blockchain, "demo wallet", wallet.address());
    report(&blockchain, "recipient", recipient.address());
    report(&blockchain, "miner", miner.address());

    for (height, block) in blockchain.chain().iter().enumerate() {
        info!(
            "Block {}: hash={} previous={} nonce={} transactions={}",
            height,
            block.hash,
            block.previous_hash,
            block.nonce,
            block.transactions.len()
        );
    }
    info!("Pending transactions: {}", blockchain.pending_transactions().len());
    info!("Chain valid: {}", blockchain.is_chain_valid());

    Ok(())
}

fn report(blockchain: &Blockchain, label: &str, address: &Address) {
    info!("Balance of {}: {}", label, blockchain.get_balance(address));
}

use std::collections::{HashMap, HashSet};

use serde_json::{json, Map};
use tracing::{debug, info};

use crate::block::{Block, GENESIS_PREVIOUS_HASH};
use crate::error::{ChainError, Result};
use crate::sealer;
use crate::transaction::{Transaction, TxKind, SYSTEM};

use super::registry::Participant;

/// Leading zero hex characters required of every block hash.
pub const DEFAULT_DIFFICULTY: u32 = 4;

/// Amount credited to the sealer after each committed block.
pub const DEFAULT_SEAL_REWARD: u64 = 10;

/// The append-only chain of sealed blocks plus the buffer of transactions
/// waiting for the next seal. The chain is the sole source of truth; every
/// query recomputes its view by scanning it.
pub struct Ledger {
    pub chain: Vec<Block>,
    pub pending: Vec<Transaction>,
    pub difficulty: u32,
    pub seal_reward: u64,
    pub participants: HashMap<String, Participant>,
}

impl Ledger {
    /// Creates a ledger whose genesis block is sealed at `difficulty`,
    /// like every block after it.
    pub fn new(difficulty: u32, seal_reward: u64) -> Result<Self> {
        let genesis = sealer::seal_block(
            Block::new(0, Vec::new(), GENESIS_PREVIOUS_HASH.to_string())?,
            difficulty,
        )?;
        info!(hash = %genesis.hash, difficulty, "genesis block sealed");

        Ok(Ledger {
            chain: vec![genesis],
            pending: Vec::new(),
            difficulty,
            seal_reward,
            participants: HashMap::new(),
        })
    }

    /// Queues a transaction for the next seal. No duplicate-id screening
    /// takes place here or anywhere else.
    pub fn submit(&mut self, transaction: Transaction) -> Result<()> {
        transaction.validate()?;
        debug!(
            id = %transaction.transaction_id,
            kind = %transaction.kind,
            "transaction queued"
        );
        self.pending.push(transaction);
        Ok(())
    }

    /// Builds the unsealed successor of the current tip from a snapshot of
    /// the pending buffer.
    pub fn candidate_block(&self) -> Result<Block> {
        if self.pending.is_empty() {
            return Err(ChainError::NothingToSeal);
        }
        let tip = self.chain.last().ok_or_else(|| {
            ChainError::InvalidBlock("cannot extend an empty chain".to_string())
        })?;
        Block::new(
            self.chain.len() as u64,
            self.pending.clone(),
            tip.hash.clone(),
        )
    }

    /// Verifies a sealed block against the tip and appends it, then reseeds
    /// the pending buffer: exactly the sealed transactions are removed (by
    /// id, so submissions that arrived mid-seal survive) and one REWARD
    /// transaction for the sealer is queued. Sole chain mutator.
    pub fn commit_sealed(&mut self, block: Block, sealer_address: &str) -> Result<()> {
        let tip = self.chain.last().ok_or_else(|| {
            ChainError::InvalidBlock("cannot extend an empty chain".to_string())
        })?;

        if block.index != self.chain.len() as u64 {
            return Err(ChainError::InvalidBlock(format!(
                "expected index {}, got {}",
                self.chain.len(),
                block.index
            )));
        }
        if !block.links_to(tip) {
            return Err(ChainError::InvalidBlock(format!(
                "previous hash {} does not match tip {}",
                block.previous_hash, tip.hash
            )));
        }
        if !block.verify_integrity() {
            return Err(ChainError::InvalidBlock(
                "cached hash does not match recomputed digest".to_string(),
            ));
        }
        if !block.meets_difficulty(self.difficulty) {
            return Err(ChainError::InvalidBlock(format!(
                "hash does not meet difficulty {}",
                self.difficulty
            )));
        }

        let sealed_ids: HashSet<&str> = block
            .transactions
            .iter()
            .map(|tx| tx.transaction_id.as_str())
            .collect();
        self.pending
            .retain(|tx| !sealed_ids.contains(tx.transaction_id.as_str()));

        let reward = self.reward_transaction(sealer_address)?;
        info!(
            index = block.index,
            transactions = block.transactions.len(),
            hash = %block.hash,
            "block committed"
        );
        self.chain.push(block);
        self.pending.push(reward);
        Ok(())
    }

    /// Snapshot, proof-of-work search, commit, on the calling thread. Async
    /// callers go through the service layer, which runs the search on a
    /// blocking worker instead.
    pub fn seal_pending(&mut self, sealer_address: &str) -> Result<Block> {
        let candidate = self.candidate_block()?;
        let sealed = sealer::seal_block(candidate, self.difficulty)?;
        self.commit_sealed(sealed.clone(), sealer_address)?;
        Ok(sealed)
    }

    /// Full-chain verification: recomputed digest, linkage to the
    /// predecessor, and the difficulty prefix for every block after
    /// genesis. Boolean verdict only; the first failure ends the walk.
    pub fn validate(&self) -> bool {
        for i in 1..self.chain.len() {
            let block = &self.chain[i];
            if !block.verify_integrity() {
                return false;
            }
            if !block.links_to(&self.chain[i - 1]) {
                return false;
            }
            if !block.meets_difficulty(self.difficulty) {
                return false;
            }
        }
        true
    }

    /// By-value snapshot of every sealed block, in chain order.
    pub fn export_chain(&self) -> Vec<Block> {
        self.chain.clone()
    }

    /// By-value snapshot of the transactions waiting for the next seal.
    pub fn pending_transactions(&self) -> Vec<Transaction> {
        self.pending.clone()
    }

    fn reward_transaction(&self, sealer_address: &str) -> Result<Transaction> {
        let mut data = Map::new();
        data.insert("amount".to_string(), json!(self.seal_reward));
        Transaction::new(SYSTEM, sealer_address, TxKind::Reward, data)
    }
}

//! Read-only views over the sealed chain.
//!
//! Every query scans the blocks after genesis and returns owned records,
//! never references into ledger internals. Pending transactions are
//! invisible to all of them.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::block::Block;
use crate::transaction::{Transaction, TxKind, BROADCAST};

use super::chain::Ledger;

/// A sealed transaction annotated with the block that holds it.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionRecord {
    pub transaction: Transaction,
    pub block_index: u64,
    pub block_hash: String,
}

/// Point-in-time summary of the whole ledger.
#[derive(Debug, Clone, Serialize)]
pub struct ChainInfo {
    pub length: usize,
    pub difficulty: u32,
    pub pending_transactions: usize,
    pub participants: usize,
    pub is_valid: bool,
    pub latest_block: Option<Block>,
}

impl Ledger {
    /// Sealed transactions sent or received by `address`.
    pub fn transactions_for(&self, address: &str) -> Vec<TransactionRecord> {
        let mut records = Vec::new();
        for block in self.chain.iter().skip(1) {
            for tx in &block.transactions {
                if tx.sender == address || tx.receiver == address {
                    records.push(record(tx, block));
                }
            }
        }
        records
    }

    /// Sealed assignments. With a student address, only those addressed to
    /// that student or broadcast; with `None`, all of them.
    pub fn assignments_for(&self, student: Option<&str>) -> Vec<TransactionRecord> {
        let mut records = Vec::new();
        for block in self.chain.iter().skip(1) {
            for tx in &block.transactions {
                if tx.kind != TxKind::Assignment {
                    continue;
                }
                let visible = match student {
                    Some(address) => tx.receiver == address || tx.receiver == BROADCAST,
                    None => true,
                };
                if visible {
                    records.push(record(tx, block));
                }
            }
        }
        records
    }

    /// Sealed submissions for one assignment.
    pub fn submissions_for(&self, assignment_id: &str) -> Vec<TransactionRecord> {
        let mut records = Vec::new();
        for block in self.chain.iter().skip(1) {
            for tx in &block.transactions {
                if tx.kind == TxKind::Submission
                    && tx.data_str("assignment_id") == Some(assignment_id)
                {
                    records.push(record(tx, block));
                }
            }
        }
        records
    }

    /// Sealed grades addressed to one student.
    pub fn grades_for(&self, student: &str) -> Vec<TransactionRecord> {
        let mut records = Vec::new();
        for block in self.chain.iter().skip(1) {
            for tx in &block.transactions {
                if tx.kind == TxKind::Grade && tx.receiver == student {
                    records.push(record(tx, block));
                }
            }
        }
        records
    }

    /// The sealed submission with the given transaction id, if any.
    pub fn submission_by_id(&self, transaction_id: &str) -> Option<TransactionRecord> {
        for block in self.chain.iter().skip(1) {
            for tx in &block.transactions {
                if tx.kind == TxKind::Submission && tx.transaction_id == transaction_id {
                    return Some(record(tx, block));
                }
            }
        }
        None
    }

    /// Whether a sealed grade from `teacher` to `student` resolves (through
    /// its submission) to `assignment_id`. Grades still in the pending
    /// buffer do not count.
    pub fn has_teacher_graded(&self, teacher: &str, student: &str, assignment_id: &str) -> bool {
        for block in self.chain.iter().skip(1) {
            for tx in &block.transactions {
                if tx.kind != TxKind::Grade || tx.sender != teacher || tx.receiver != student {
                    continue;
                }
                let submission_id = match tx.data_str("submission_id") {
                    Some(id) => id,
                    None => continue,
                };
                if let Some(submission) = self.submission_by_id(submission_id) {
                    if submission.transaction.data_str("assignment_id") == Some(assignment_id) {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Sealed transaction counts per kind.
    pub fn tally_by_kind(&self) -> BTreeMap<TxKind, usize> {
        let mut tally = BTreeMap::new();
        for block in self.chain.iter().skip(1) {
            for tx in &block.transactions {
                *tally.entry(tx.kind).or_insert(0) += 1;
            }
        }
        tally
    }

    /// Summary of chain length, pending load, registry size and validity.
    pub fn info(&self) -> ChainInfo {
        ChainInfo {
            length: self.chain.len(),
            difficulty: self.difficulty,
            pending_transactions: self.pending.len(),
            participants: self.participants.len(),
            is_valid: self.validate(),
            latest_block: self.chain.last().cloned(),
        }
    }
}

fn record(tx: &Transaction, block: &Block) -> TransactionRecord {
    TransactionRecord {
        transaction: tx.clone(),
        block_index: block.index,
        block_hash: block.hash.clone(),
    }
}

//! Proof-of-work sealing
//!
//! The search increments the nonce until the block digest carries the
//! required zero prefix. Work scales as 16^difficulty and has no upper
//! bound, so callers on an async runtime must move it to a blocking worker
//! (`LedgerService` does).

use tracing::debug;

use crate::block::Block;
use crate::error::Result;

/// Seals `block` at the given difficulty. The digest at the current nonce
/// is tried first, so at difficulty 0 the block comes back untouched. Given
/// the same starting block the search is fully deterministic.
pub fn seal_block(mut block: Block, difficulty: u32) -> Result<Block> {
    block.hash = block.digest()?;
    while !block.meets_difficulty(difficulty) {
        block.nonce += 1;
        block.hash = block.digest()?;
    }
    debug!(index = block.index, nonce = block.nonce, "sealed block");
    Ok(block)
}

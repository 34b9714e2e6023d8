use crate::{count_leading_zero_digits, Block};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub valid: bool,
    /// Numbers of blocks that failed a check, ascending. A block failing
    /// both the linkage check and its own hash check appears twice; the
    /// duplicate is kept deliberately (callers surface the raw list).
    pub invalid_block_numbers: Vec<u64>,
}

/// Derived validity of a single block. Genesis is exempt; any other block
/// must hash to its stored `current_hash` and that hash must meet the
/// block's difficulty. Recomputed on every call, never cached.
pub fn is_block_valid(block: &Block) -> bool {
    if block.block_number == 0 {
        return true;
    }
    let recomputed = block.recomputed_hash();
    recomputed == block.current_hash && count_leading_zero_digits(&recomputed) >= block.difficulty
}

/// Full-chain audit over `blocks` in ascending block-number order. Each
/// block after the first must point at its predecessor's hash, and every
/// block must pass `is_block_valid`. Hash recomputation is the expensive
/// part, so it runs across blocks in parallel; the report order stays
/// ascending.
pub fn chain_integrity(blocks: &[Block]) -> IntegrityReport {
    let self_valid: Vec<bool> = blocks.par_iter().map(is_block_valid).collect();

    let mut invalid_block_numbers = Vec::new();
    for (i, block) in blocks.iter().enumerate() {
        if i > 0 && block.previous_hash != blocks[i - 1].current_hash {
            invalid_block_numbers.push(block.block_number);
        }
        if !self_valid[i] {
            invalid_block_numbers.push(block.block_number);
        }
    }

    IntegrityReport {
        valid: invalid_block_numbers.is_empty(),
        invalid_block_numbers,
    }
}

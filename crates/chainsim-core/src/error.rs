use crate::Block;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("block {0} not found")]
    NotFound(u64),

    #[error("invalid transaction payload: {0}")]
    InvalidInput(String),

    /// The nonce search hit its cap before meeting the difficulty target.
    /// Recoverable: the candidate carries the best-effort hash at the last
    /// nonce tried, and the caller may adopt it, retry with a larger
    /// budget, or lower the difficulty.
    #[error("mining exhausted after {attempts} attempts for block {}", .candidate.block_number)]
    MiningExhausted { attempts: u64, candidate: Box<Block> },
}

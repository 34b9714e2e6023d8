use crate::{block_hash, count_leading_zero_digits, now_secs};
use tracing::{info, warn};

/// Result of one nonce search. `exhausted` means the cap was hit and
/// `hash` is the digest at the final nonce tried, which does not meet the
/// difficulty target.
#[derive(Clone, Debug)]
pub struct MineOutcome {
    pub hash: String,
    pub nonce: u64,
    pub timestamp: u64,
    pub attempts: u64,
    pub exhausted: bool,
}

/// Brute-force proof-of-work search. The timestamp is captured once and
/// held fixed for the whole call; only the nonce varies the hash. Stops
/// when the digest has at least `difficulty` leading zero hex digits or
/// the nonce reaches `max_attempts`.
pub fn mine(
    block_number: u64,
    previous_hash: &str,
    serialized_transactions: &str,
    difficulty: u32,
    max_attempts: u64,
) -> MineOutcome {
    let timestamp = now_secs();
    let mut nonce = 0u64;
    loop {
        let hash = block_hash(
            block_number,
            previous_hash,
            serialized_transactions,
            nonce,
            timestamp,
        );
        if count_leading_zero_digits(&hash) >= difficulty {
            info!(block_number, nonce, %hash, "mined block");
            return MineOutcome {
                hash,
                nonce,
                timestamp,
                attempts: nonce + 1,
                exhausted: false,
            };
        }
        if nonce >= max_attempts {
            warn!(block_number, max_attempts, "nonce search exhausted");
            return MineOutcome {
                hash,
                nonce,
                timestamp,
                attempts: nonce + 1,
                exhausted: true,
            };
        }
        nonce += 1;
    }
}

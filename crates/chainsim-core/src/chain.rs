use crate::{
    block_hash,
    constants::{DEFAULT_DIFFICULTY, DEFAULT_MAX_ATTEMPTS, GENESIS_PREVIOUS_HASH},
    error::Error,
    format_timestamp, merkle_root, mine, now_secs, serialize_transactions, validate, Block,
    TxRecord,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

#[derive(Clone, Copy, Debug)]
pub struct ChainConfig {
    /// Leading zero hex digits required of every mined block hash.
    pub difficulty: u32,
    /// Nonce cap per mining call.
    pub max_attempts: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Externally visible shape of one block. `is_valid` is derived at view
/// time; it is never stored.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockView {
    pub block_number: u64,
    pub hash: String,
    pub previous_hash: String,
    pub timestamp: String,
    pub transactions: Vec<TxRecord>,
    pub nonce: u64,
    pub is_valid: bool,
    pub merkle_root: String,
}

impl BlockView {
    pub fn from_block(block: &Block) -> Self {
        Self {
            block_number: block.block_number,
            hash: block.current_hash.clone(),
            previous_hash: block.previous_hash.clone(),
            timestamp: format_timestamp(block.timestamp),
            transactions: block.transactions.clone(),
            nonce: block.nonce,
            is_valid: validate::is_block_valid(block),
            merkle_root: block.merkle_root.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChainStatus {
    pub total_blocks: u64,
    pub chain_valid: bool,
    pub invalid_block_numbers: Vec<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tip_hash: Option<String>,
    pub blocks: Vec<BlockView>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TamperReport {
    pub tampered_block: u64,
    pub chain_broken: bool,
    pub invalid_block_numbers: Vec<u64>,
}

/// The single owner of the block sequence. Blocks are held in ascending
/// order and the stored numbers are always exactly `0..=tip`: append is
/// the only way in, and it extends by one.
#[derive(Clone, Debug, Default)]
pub struct ChainStore {
    config: ChainConfig,
    blocks: Vec<Block>,
}

impl ChainStore {
    pub fn new(config: ChainConfig) -> Self {
        Self {
            config,
            blocks: Vec::new(),
        }
    }

    pub fn config(&self) -> ChainConfig {
        self.config
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn get_block(&self, block_number: u64) -> Option<&Block> {
        self.blocks
            .iter()
            .find(|b| b.block_number == block_number)
    }

    pub fn tip(&self) -> Option<&Block> {
        self.blocks.last()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Create the genesis block if absent, otherwise return the existing
    /// one. Genesis is not mined: nonce 0, difficulty 0, and it is exempt
    /// from the validity check.
    pub fn ensure_genesis(&mut self) -> &Block {
        if self.blocks.is_empty() {
            let timestamp = now_secs();
            let transactions = vec![json!({
                "type": "genesis",
                "message": "Genesis Block - First block in the chain",
                "timestamp": format_timestamp(timestamp),
            })];
            let serialized = serialize_transactions(&transactions);
            let current_hash = block_hash(0, GENESIS_PREVIOUS_HASH, &serialized, 0, timestamp);
            info!(%current_hash, "created genesis block");
            self.blocks.push(Block {
                block_number: 0,
                previous_hash: GENESIS_PREVIOUS_HASH.to_string(),
                current_hash,
                nonce: 0,
                merkle_root: merkle_root(&serialized),
                transactions,
                difficulty: 0,
                timestamp,
            });
        }
        &self.blocks[0]
    }

    /// Mine and store the next block off the current tip, creating
    /// genesis first on an empty store. On an exhausted nonce search the
    /// unmined candidate is returned inside `Error::MiningExhausted` and
    /// nothing is stored; `adopt_candidate` accepts it if the caller
    /// settles for a hash below target.
    pub fn append_block(&mut self, transactions: Vec<TxRecord>) -> Result<Block, Error> {
        if transactions.is_empty() {
            return Err(Error::InvalidInput("empty transaction list".to_string()));
        }
        if let Some(bad) = transactions.iter().find(|tx| !tx.is_object()) {
            return Err(Error::InvalidInput(format!(
                "transaction records must be JSON objects, got: {bad}"
            )));
        }

        self.ensure_genesis();
        let tip = self.blocks.last().expect("genesis just ensured");
        let block_number = tip.block_number + 1;
        let previous_hash = tip.current_hash.clone();
        let serialized = serialize_transactions(&transactions);

        let outcome = mine::mine(
            block_number,
            &previous_hash,
            &serialized,
            self.config.difficulty,
            self.config.max_attempts,
        );

        let block = Block {
            block_number,
            previous_hash,
            current_hash: outcome.hash,
            nonce: outcome.nonce,
            merkle_root: merkle_root(&serialized),
            transactions,
            difficulty: self.config.difficulty,
            timestamp: outcome.timestamp,
        };

        if outcome.exhausted {
            return Err(Error::MiningExhausted {
                attempts: outcome.attempts,
                candidate: Box::new(block),
            });
        }

        self.blocks.push(block.clone());
        Ok(block)
    }

    /// Store a candidate handed back by `Error::MiningExhausted`. The
    /// candidate must still extend the current tip; an append that landed
    /// in between invalidates it.
    pub fn adopt_candidate(&mut self, candidate: Block) -> Result<Block, Error> {
        let tip = self.blocks.last().ok_or_else(|| {
            Error::InvalidInput("cannot adopt a candidate onto an empty chain".to_string())
        })?;
        if candidate.block_number != tip.block_number + 1
            || candidate.previous_hash != tip.current_hash
        {
            return Err(Error::InvalidInput(format!(
                "candidate block {} does not extend the current tip {}",
                candidate.block_number, tip.block_number
            )));
        }
        info!(
            block_number = candidate.block_number,
            "adopted unmined candidate block"
        );
        self.blocks.push(candidate.clone());
        Ok(candidate)
    }

    /// Audit the full chain and expose it as views, ascending.
    pub fn get_status(&self) -> ChainStatus {
        let report = validate::chain_integrity(&self.blocks);
        ChainStatus {
            total_blocks: self.blocks.len() as u64,
            chain_valid: report.valid,
            invalid_block_numbers: report.invalid_block_numbers,
            tip_hash: self.blocks.last().map(|b| b.current_hash.clone()),
            blocks: self.blocks.iter().map(BlockView::from_block).collect(),
        }
    }

    /// Reversible tamper demonstration: swap the target block's payload
    /// for a marker record, audit the chain to observe the breakage, then
    /// put the original payload back. Restoration rides a drop guard so
    /// it runs even if the audit panics; no other block is touched.
    pub fn simulate_tamper(&mut self, block_number: u64) -> Result<TamperReport, Error> {
        let index = self
            .blocks
            .iter()
            .position(|b| b.block_number == block_number)
            .ok_or(Error::NotFound(block_number))?;

        let report = {
            let guard = RestoreGuard::tamper(self, index);
            validate::chain_integrity(guard.blocks())
        };

        info!(
            block_number,
            chain_broken = !report.valid,
            "tamper demonstration complete"
        );
        Ok(TamperReport {
            tampered_block: block_number,
            chain_broken: !report.valid,
            invalid_block_numbers: report.invalid_block_numbers,
        })
    }
}

fn tampered_payload() -> Vec<TxRecord> {
    vec![json!({
        "type": "tampered",
        "message": "This block has been tampered with!",
        "original_data": "MODIFIED",
    })]
}

/// Holds a block's real payload while the marker payload sits in the
/// store, and swaps it back on drop.
struct RestoreGuard<'a> {
    store: &'a mut ChainStore,
    index: usize,
    original: Option<Vec<TxRecord>>,
}

impl<'a> RestoreGuard<'a> {
    fn tamper(store: &'a mut ChainStore, index: usize) -> Self {
        let original = std::mem::replace(
            &mut store.blocks[index].transactions,
            tampered_payload(),
        );
        Self {
            store,
            index,
            original: Some(original),
        }
    }

    fn blocks(&self) -> &[Block] {
        &self.store.blocks
    }
}

impl Drop for RestoreGuard<'_> {
    fn drop(&mut self) {
        if let Some(original) = self.original.take() {
            self.store.blocks[self.index].transactions = original;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::count_leading_zero_digits;

    // Low difficulty keeps the brute-force search fast under test.
    fn test_store() -> ChainStore {
        ChainStore::new(ChainConfig {
            difficulty: 1,
            max_attempts: 1_000_000,
        })
    }

    fn payment(amount: u64) -> TxRecord {
        json!({ "type": "payment", "amount": amount })
    }

    #[test]
    fn ensure_genesis_is_idempotent() {
        let mut store = test_store();
        let first = store.ensure_genesis().clone();
        let second = store.ensure_genesis().clone();
        assert_eq!(first.block_number, 0);
        assert_eq!(second.block_number, 0);
        assert_eq!(first.current_hash, second.current_hash);
        assert_eq!(store.len(), 1);
        assert_eq!(first.previous_hash, GENESIS_PREVIOUS_HASH);
        assert_eq!(first.nonce, 0);
        assert_eq!(first.difficulty, 0);
    }

    #[test]
    fn append_creates_genesis_lazily() {
        let mut store = test_store();
        let block = store.append_block(vec![payment(100)]).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(block.block_number, 1);
        assert_eq!(
            block.previous_hash,
            store.get_block(0).unwrap().current_hash
        );
    }

    #[test]
    fn appended_blocks_link_and_meet_difficulty() {
        let mut store = test_store();
        for amount in [1u64, 2, 3] {
            store.append_block(vec![payment(amount)]).unwrap();
        }
        let blocks = store.blocks();
        assert_eq!(blocks.len(), 4);
        for i in 1..blocks.len() {
            assert_eq!(blocks[i].previous_hash, blocks[i - 1].current_hash);
            assert_eq!(blocks[i].block_number, i as u64);
            assert!(count_leading_zero_digits(&blocks[i].current_hash) >= 1);
        }
    }

    #[test]
    fn merkle_root_covers_the_payload() {
        let mut store = test_store();
        let block = store.append_block(vec![payment(100)]).unwrap();
        assert_eq!(
            block.merkle_root,
            merkle_root(&serialize_transactions(&[payment(100)]))
        );
    }

    #[test]
    fn empty_payload_is_rejected() {
        let mut store = test_store();
        let err = store.append_block(vec![]).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn non_object_record_is_rejected() {
        let mut store = test_store();
        let err = store
            .append_block(vec![json!("just a string")])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn exhausted_mining_stores_nothing() {
        let mut store = ChainStore::new(ChainConfig {
            difficulty: 64,
            max_attempts: 25,
        });
        let err = store.append_block(vec![payment(1)]).unwrap_err();
        match err {
            Error::MiningExhausted {
                attempts,
                candidate,
            } => {
                assert_eq!(attempts, 26);
                assert_eq!(candidate.block_number, 1);
                assert!(count_leading_zero_digits(&candidate.current_hash) < 64);
            }
            other => panic!("expected MiningExhausted, got {other}"),
        }
        // Genesis was created on the way in, but the candidate was not stored.
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn exhausted_candidate_can_be_adopted() {
        let mut store = ChainStore::new(ChainConfig {
            difficulty: 64,
            max_attempts: 25,
        });
        let err = store.append_block(vec![payment(1)]).unwrap_err();
        let Error::MiningExhausted { candidate, .. } = err else {
            panic!("expected MiningExhausted");
        };
        let adopted = store.adopt_candidate(*candidate).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(adopted.block_number, 1);
        // The adopted block fails the difficulty leg of validation.
        let status = store.get_status();
        assert!(!status.chain_valid);
        assert_eq!(status.invalid_block_numbers, vec![1]);
    }

    #[test]
    fn adopt_rejects_stale_candidate() {
        let mut store = test_store();
        store.append_block(vec![payment(1)]).unwrap();
        let mut candidate = store.tip().unwrap().clone();
        candidate.block_number += 5;
        let err = store.adopt_candidate(candidate).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn status_of_empty_store() {
        let store = test_store();
        let status = store.get_status();
        assert_eq!(status.total_blocks, 0);
        assert!(status.chain_valid);
        assert!(status.invalid_block_numbers.is_empty());
        assert!(status.tip_hash.is_none());
        assert!(status.blocks.is_empty());
    }

    #[test]
    fn status_reflects_the_chain() {
        let mut store = test_store();
        store.append_block(vec![payment(1)]).unwrap();
        store.append_block(vec![payment(2)]).unwrap();
        let status = store.get_status();
        assert_eq!(status.total_blocks, 3);
        assert!(status.chain_valid);
        assert_eq!(
            status.tip_hash.as_deref(),
            Some(store.tip().unwrap().current_hash.as_str())
        );
        assert_eq!(status.blocks.len(), 3);
        for (i, view) in status.blocks.iter().enumerate() {
            assert_eq!(view.block_number, i as u64);
            assert!(view.is_valid);
        }
        // Fixed textual timestamp format.
        assert_eq!(status.blocks[0].timestamp.len(), 19);
    }

    #[test]
    fn tamper_on_unknown_block_fails() {
        let mut store = test_store();
        store.ensure_genesis();
        let err = store.simulate_tamper(7).unwrap_err();
        assert!(matches!(err, Error::NotFound(7)));
    }

    #[test]
    fn tamper_breaks_and_restores() {
        let mut store = test_store();
        store.append_block(vec![payment(100)]).unwrap();
        let before = store.get_block(1).unwrap().transactions.clone();

        let report = store.simulate_tamper(1).unwrap();
        assert_eq!(report.tampered_block, 1);
        assert!(report.chain_broken);
        assert!(report.invalid_block_numbers.contains(&1));

        // Payload restored verbatim; the chain audits clean again.
        assert_eq!(store.get_block(1).unwrap().transactions, before);
        assert!(store.get_status().chain_valid);
    }

    #[test]
    fn tamper_leaves_other_blocks_untouched() {
        let mut store = test_store();
        store.append_block(vec![payment(1)]).unwrap();
        store.append_block(vec![payment(2)]).unwrap();
        let snapshot: Vec<Block> = store.blocks().to_vec();

        store.simulate_tamper(1).unwrap();

        for (before, after) in snapshot.iter().zip(store.blocks()) {
            assert_eq!(before.current_hash, after.current_hash);
            assert_eq!(before.transactions, after.transactions);
            assert_eq!(before.nonce, after.nonce);
            assert_eq!(before.merkle_root, after.merkle_root);
        }
    }

    #[test]
    fn tampering_genesis_does_not_break_the_chain() {
        // Genesis is exempt from the hash check and block 1 still points
        // at genesis's stored hash, so the audit stays clean.
        let mut store = test_store();
        store.append_block(vec![payment(1)]).unwrap();
        let report = store.simulate_tamper(0).unwrap();
        assert!(!report.chain_broken);
        assert!(report.invalid_block_numbers.is_empty());
    }
}

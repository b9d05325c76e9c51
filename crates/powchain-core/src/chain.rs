use crate::{
    constants::{
        GENESIS_DATA, GENESIS_HASH, GENESIS_PREVIOUS_HASH, GENESIS_TIMESTAMP, MAX_DIFFICULTY,
    },
    mine::{CancelToken, MiningStrategy},
    Block, CoreError, Result,
};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

/// The hard-coded root of the chain. Its stored hash is the fixed constant, which is
/// also what its fields hash to.
pub fn genesis_block() -> Block {
    Block {
        index: 0,
        timestamp: GENESIS_TIMESTAMP,
        data: Value::String(GENESIS_DATA.to_string()),
        previous_hash: GENESIS_PREVIOUS_HASH.to_string(),
        nonce: 0,
        hash: GENESIS_HASH.to_string(),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ViolationKind {
    /// Block 0 differs from the hard-coded genesis block.
    GenesisMismatch,
    /// `index` is not the block's position in the chain.
    IndexMismatch,
    /// `previousHash` differs from the predecessor's `hash`.
    BrokenLink,
    /// Stored `hash` differs from the digest of the block's fields.
    HashMismatch,
    /// Stored `hash` lacks the required leading zeros.
    InsufficientWork,
    /// Payload could not be serialized for rehashing.
    Unserializable,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ViolationKind::GenesisMismatch => "genesis block differs from the fixed genesis",
            ViolationKind::IndexMismatch => "index does not match position",
            ViolationKind::BrokenLink => "previous hash does not match predecessor",
            ViolationKind::HashMismatch => "stored hash does not match block contents",
            ViolationKind::InsufficientWork => "hash does not meet difficulty",
            ViolationKind::Unserializable => "payload cannot be serialized",
        };
        f.write_str(s)
    }
}

/// First problem found by [`Chain::validate_strict`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error, Serialize)]
#[error("block {index}: {kind}")]
pub struct ChainViolation {
    pub index: u64,
    pub kind: ViolationKind,
}

/// In-memory append-only chain. Always holds at least the genesis block.
#[derive(Clone, Debug)]
pub struct Chain {
    blocks: Vec<Block>,
    difficulty: u32,
    strategy: MiningStrategy,
}

impl Chain {
    pub fn new(difficulty: u32) -> Result<Self> {
        Self::with_strategy(difficulty, MiningStrategy::default())
    }

    pub fn with_strategy(difficulty: u32, strategy: MiningStrategy) -> Result<Self> {
        check_difficulty(difficulty)?;
        Ok(Self {
            blocks: vec![genesis_block()],
            difficulty,
            strategy,
        })
    }

    /// Wrap blocks obtained elsewhere (e.g. fetched from a node) so they can be
    /// validated. Nothing beyond non-emptiness is checked here.
    pub fn from_blocks(blocks: Vec<Block>, difficulty: u32) -> Result<Self> {
        check_difficulty(difficulty)?;
        if blocks.is_empty() {
            return Err(CoreError::EmptyChain);
        }
        Ok(Self {
            blocks,
            difficulty,
            strategy: MiningStrategy::default(),
        })
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn snapshot(&self) -> Vec<Block> {
        self.blocks.clone()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn strategy(&self) -> MiningStrategy {
        self.strategy
    }

    pub fn latest(&self) -> Result<&Block> {
        self.blocks.last().ok_or(CoreError::EmptyChain)
    }

    /// Link `candidate` to the current tip: index and previous hash are overwritten,
    /// nonce and hash are reset. Only the payload and timestamp survive.
    pub fn prepare(&self, mut candidate: Block) -> Result<Block> {
        let latest = self.latest()?;
        candidate.index = latest
            .index
            .checked_add(1)
            .ok_or(CoreError::IndexExhausted)?;
        candidate.previous_hash = latest.hash.clone();
        candidate.nonce = 0;
        candidate.hash.clear();
        debug!(index = candidate.index, prev = %candidate.previous_hash, "candidate prepared");
        Ok(candidate)
    }

    /// Append a mined candidate. Rejects it if the tip moved since [`Chain::prepare`]
    /// or if its hash does not satisfy the chain's difficulty.
    pub fn commit(&mut self, mined: Block) -> Result<&Block> {
        let latest = self.latest()?;
        if mined.previous_hash != latest.hash || latest.index.checked_add(1) != Some(mined.index) {
            return Err(CoreError::StaleCandidate { index: mined.index });
        }
        if !mined.meets_difficulty(self.difficulty) {
            return Err(CoreError::InsufficientWork {
                hash: mined.hash,
                difficulty: self.difficulty,
            });
        }
        info!(index = mined.index, hash = %mined.hash, "block appended");
        self.blocks.push(mined);
        self.latest()
    }

    /// Prepare, mine to completion and append `candidate`.
    pub fn add_block(&mut self, candidate: Block) -> Result<&Block> {
        self.add_block_cancellable(candidate, &CancelToken::new())
    }

    /// Like [`Chain::add_block`], but gives up with [`CoreError::MiningAborted`] when
    /// `cancel` fires. The chain is left untouched in that case.
    pub fn add_block_cancellable(&mut self, candidate: Block, cancel: &CancelToken) -> Result<&Block> {
        let candidate = self.prepare(candidate)?;
        let mined = self.strategy.mine(candidate, self.difficulty, cancel)?;
        self.commit(mined)
    }

    /// Linkage check only: every block's `previousHash` equals its predecessor's `hash`.
    ///
    /// A block whose fields were altered without rehashing passes this check as long
    /// as the stored hashes still line up. Use [`Chain::validate_strict`] to catch that.
    pub fn is_valid(&self) -> bool {
        self.blocks
            .windows(2)
            .all(|pair| pair[1].previous_hash == pair[0].hash)
    }

    /// Full check: fixed genesis, positional indices, linkage, each stored hash
    /// against a recomputed digest, and the difficulty predicate.
    pub fn validate_strict(&self) -> std::result::Result<(), ChainViolation> {
        let violation = |index: u64, kind| ChainViolation { index, kind };

        let Some(genesis) = self.blocks.first() else {
            return Ok(());
        };
        if *genesis != genesis_block() {
            return Err(violation(0, ViolationKind::GenesisMismatch));
        }

        for (pos, pair) in self.blocks.windows(2).enumerate() {
            let (prev, block) = (&pair[0], &pair[1]);
            let pos = pos as u64 + 1;
            if block.index != pos {
                return Err(violation(pos, ViolationKind::IndexMismatch));
            }
            if block.previous_hash != prev.hash {
                return Err(violation(pos, ViolationKind::BrokenLink));
            }
            match block.compute_hash() {
                Ok(hash) if hash == block.hash => {}
                Ok(_) => return Err(violation(pos, ViolationKind::HashMismatch)),
                Err(_) => return Err(violation(pos, ViolationKind::Unserializable)),
            }
            if !block.meets_difficulty(self.difficulty) {
                return Err(violation(pos, ViolationKind::InsufficientWork));
            }
        }
        Ok(())
    }

    pub fn is_valid_strict(&self) -> bool {
        self.validate_strict().is_ok()
    }
}

fn check_difficulty(difficulty: u32) -> Result<()> {
    if difficulty > MAX_DIFFICULTY {
        return Err(CoreError::DifficultyOutOfRange(difficulty));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chain_with(n: usize, difficulty: u32) -> Chain {
        let mut chain = Chain::new(difficulty).unwrap();
        for i in 0..n {
            chain.add_block(Block::with_data(format!("block {i}"))).unwrap();
        }
        chain
    }

    #[test]
    fn genesis_block_example() {
        let chain = Chain::new(2).unwrap();
        assert_eq!(chain.len(), 1);
        let genesis = &chain.blocks()[0];
        assert_eq!(genesis.index, 0);
        assert_eq!(genesis.timestamp, 0);
        assert_eq!(genesis.previous_hash, "0");
        assert_eq!(genesis.nonce, 0);
        assert_eq!(genesis.data, json!("Genesis Block"));
        assert_eq!(
            genesis.hash,
            "64f7b89238d2fba6619759197d7329d363ad5bb925ba477de55718950422879e"
        );
        assert!(chain.is_valid());
        assert!(chain.is_valid_strict());
    }

    #[test]
    fn difficulty_out_of_range_rejected() {
        assert!(Chain::new(64).is_ok());
        assert!(matches!(
            Chain::new(65),
            Err(CoreError::DifficultyOutOfRange(65))
        ));
    }

    #[test]
    fn add_block_links_and_mines() {
        let mut chain = Chain::new(2).unwrap();
        let appended = chain.add_block(Block::with_data("hello")).unwrap().clone();
        assert_eq!(chain.len(), 2);
        assert_eq!(appended.index, 1);
        assert_eq!(appended.previous_hash, chain.blocks()[0].hash);
        assert!(appended.hash.starts_with("00"));
        assert_eq!(appended.data, json!("hello"));
    }

    #[test]
    fn add_block_overwrites_caller_linkage() {
        let mut chain = Chain::new(1).unwrap();
        let mut candidate = Block::with_data("x");
        candidate.index = 99;
        candidate.previous_hash = "bogus".into();
        candidate.nonce = 12345;
        candidate.hash = "bogus".into();
        let appended = chain.add_block(candidate).unwrap();
        assert_eq!(appended.index, 1);
        assert_eq!(appended.previous_hash, GENESIS_HASH);
        assert_ne!(appended.hash, "bogus");
    }

    #[test]
    fn indices_follow_positions() {
        let chain = chain_with(5, 1);
        for (i, block) in chain.blocks().iter().enumerate() {
            assert_eq!(block.index, i as u64);
        }
        assert!(chain.is_valid());
        assert!(chain.is_valid_strict());
    }

    #[test]
    fn flipped_previous_hash_invalidates() {
        let mut chain = chain_with(3, 1);
        let hash = &mut chain.blocks[2].previous_hash;
        let flipped = if hash.starts_with('0') { "1" } else { "0" };
        hash.replace_range(0..1, flipped);
        assert!(!chain.is_valid());
        assert_eq!(
            chain.validate_strict(),
            Err(ChainViolation {
                index: 2,
                kind: ViolationKind::BrokenLink
            })
        );
    }

    #[test]
    fn tampered_data_passes_linkage_but_not_strict() {
        let mut chain = chain_with(3, 1);
        chain.blocks[1].data = json!("forged");
        assert!(chain.is_valid());
        assert_eq!(
            chain.validate_strict(),
            Err(ChainViolation {
                index: 1,
                kind: ViolationKind::HashMismatch
            })
        );
    }

    #[test]
    fn tampered_tip_rehashed_without_work_is_caught() {
        let mut chain = chain_with(2, 2);
        let tip = chain.blocks.last_mut().unwrap();
        tip.data = json!("forged");
        // Find a nonce whose hash does not satisfy the difficulty.
        loop {
            tip.hash = tip.compute_hash().unwrap();
            if !tip.hash.starts_with("00") {
                break;
            }
            tip.nonce += 1;
        }
        assert!(chain.is_valid());
        assert_eq!(
            chain.validate_strict().unwrap_err().kind,
            ViolationKind::InsufficientWork
        );
    }

    #[test]
    fn wrong_index_reported() {
        let mut chain = chain_with(2, 0);
        chain.blocks[2].index = 7;
        assert_eq!(
            chain.validate_strict(),
            Err(ChainViolation {
                index: 2,
                kind: ViolationKind::IndexMismatch
            })
        );
    }

    #[test]
    fn altered_genesis_reported() {
        let mut chain = chain_with(1, 0);
        chain.blocks[0].data = json!("not genesis");
        assert!(chain.is_valid());
        assert_eq!(
            chain.validate_strict().unwrap_err().kind,
            ViolationKind::GenesisMismatch
        );
    }

    #[test]
    fn stale_commit_rejected() {
        let mut chain = Chain::new(1).unwrap();
        let first = chain.prepare(Block::with_data("a")).unwrap();
        let second = chain.prepare(Block::with_data("b")).unwrap();
        assert_eq!(first.previous_hash, second.previous_hash);

        let first = crate::pow::mine_block(first, 1).unwrap();
        let second = crate::pow::mine_block(second, 1).unwrap();
        chain.commit(first).unwrap();
        assert!(matches!(
            chain.commit(second),
            Err(CoreError::StaleCandidate { index: 1 })
        ));
        assert_eq!(chain.len(), 2);
        assert!(chain.is_valid());
    }

    #[test]
    fn prepare_on_exhausted_index_fails() {
        let mut tip = genesis_block();
        tip.index = u64::MAX;
        let chain = Chain::from_blocks(vec![tip], 0).unwrap();
        assert!(matches!(
            chain.prepare(Block::with_data("late")),
            Err(CoreError::IndexExhausted)
        ));
    }

    #[test]
    fn unmined_commit_rejected() {
        let mut chain = Chain::new(4).unwrap();
        let mut candidate = chain.prepare(Block::with_data("lazy")).unwrap();
        candidate.hash = "ffff".into();
        assert!(matches!(
            chain.commit(candidate),
            Err(CoreError::InsufficientWork { difficulty: 4, .. })
        ));
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn aborted_mine_leaves_chain_untouched() {
        let mut chain = Chain::new(64).unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        let res = chain.add_block_cancellable(Block::with_data("never"), &cancel);
        assert!(matches!(res, Err(CoreError::MiningAborted)));
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn parallel_strategy_chain() {
        let mut chain = Chain::with_strategy(2, MiningStrategy::Parallel).unwrap();
        chain.add_block(Block::with_data("p1")).unwrap();
        chain.add_block(Block::with_data("p2")).unwrap();
        assert_eq!(chain.strategy(), MiningStrategy::Parallel);
        assert!(chain.is_valid_strict());
    }

    #[test]
    fn from_blocks_rejects_empty() {
        assert!(matches!(
            Chain::from_blocks(vec![], 2),
            Err(CoreError::EmptyChain)
        ));
        let chain = Chain::from_blocks(chain_with(2, 1).snapshot(), 1).unwrap();
        assert!(chain.is_valid_strict());
    }

    #[test]
    fn violation_display() {
        let v = ChainViolation {
            index: 3,
            kind: ViolationKind::HashMismatch,
        };
        assert_eq!(v.to_string(), "block 3: stored hash does not match block contents");
    }
}

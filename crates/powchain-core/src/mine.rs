use crate::{
    constants::CANCEL_CHECK_INTERVAL, pow::leading_zero_nibbles, push_decimal, sha256, Block,
    CoreError, Result,
};
use rayon::prelude::*;
use std::{
    fmt,
    str::FromStr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use tracing::{debug, info, warn};

/// Shared abort flag for an in-flight mine.
///
/// A child token reports cancelled when either it or any ancestor was cancelled,
/// so one shutdown token can fan out into per-request tokens.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    inner: Arc<TokenInner>,
}

#[derive(Debug, Default)]
struct TokenInner {
    flag: AtomicBool,
    parent: Option<CancelToken>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn child(&self) -> Self {
        Self {
            inner: Arc::new(TokenInner {
                flag: AtomicBool::new(false),
                parent: Some(self.clone()),
            }),
        }
    }

    pub fn cancel(&self) {
        self.inner.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.flag.load(Ordering::Acquire)
            || self
                .inner
                .parent
                .as_ref()
                .is_some_and(CancelToken::is_cancelled)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MiningStrategy {
    /// Single thread, nonces tried in order from the block's current nonce.
    #[default]
    Sequential,
    /// Nonce space split across the rayon pool; any qualifying nonce wins.
    Parallel,
}

impl MiningStrategy {
    pub fn mine(self, block: Block, difficulty: u32, cancel: &CancelToken) -> Result<Block> {
        match self {
            MiningStrategy::Sequential => mine_sequential(block, difficulty, cancel),
            MiningStrategy::Parallel => mine_parallel(block, difficulty, cancel),
        }
    }
}

impl fmt::Display for MiningStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MiningStrategy::Sequential => f.write_str("sequential"),
            MiningStrategy::Parallel => f.write_str("parallel"),
        }
    }
}

impl FromStr for MiningStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sequential" | "seq" => Ok(MiningStrategy::Sequential),
            "parallel" | "par" => Ok(MiningStrategy::Parallel),
            other => Err(format!("unknown mining strategy `{other}`")),
        }
    }
}

/// Preimage with the nonce as its decimal suffix, rewritten in place per attempt.
#[derive(Clone)]
struct NonceTemplate {
    bytes: Vec<u8>,
    nonce_at: usize,
}

impl NonceTemplate {
    fn new(block: &Block) -> Result<Self> {
        let bytes = block.hash_prefix()?.into_bytes();
        let nonce_at = bytes.len();
        Ok(Self { bytes, nonce_at })
    }

    fn digest(&mut self, nonce: u64) -> [u8; 32] {
        self.bytes.truncate(self.nonce_at);
        push_decimal(&mut self.bytes, nonce);
        sha256(&self.bytes)
    }
}

fn finish(mut block: Block, nonce: u64, hash: [u8; 32]) -> Block {
    block.nonce = nonce;
    block.hash = hex::encode(hash);
    info!(
        index = block.index,
        nonce,
        hash = %block.hash,
        "mined block"
    );
    block
}

/// Try nonces one by one from `block.nonce` until the digest has `difficulty`
/// leading zero hex digits. Polls `cancel` every [`CANCEL_CHECK_INTERVAL`] attempts
/// and returns [`CoreError::MiningAborted`] once it is set.
pub fn mine_sequential(block: Block, difficulty: u32, cancel: &CancelToken) -> Result<Block> {
    let mut template = NonceTemplate::new(&block)?;
    let mut nonce = block.nonce;
    let mut attempts = 0u64;
    debug!(index = block.index, difficulty, "sequential mining started");
    loop {
        let hash = template.digest(nonce);
        if leading_zero_nibbles(&hash) >= difficulty {
            return Ok(finish(block, nonce, hash));
        }
        nonce = nonce.wrapping_add(1);
        attempts += 1;
        if attempts % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
            warn!(index = block.index, attempts, "mining aborted");
            return Err(CoreError::MiningAborted);
        }
    }
}

/// Parallel nonce search over the whole u64 range. The winning nonce is whichever
/// qualifying nonce a worker finds first, not necessarily the smallest.
pub fn mine_parallel(block: Block, difficulty: u32, cancel: &CancelToken) -> Result<Block> {
    let template = NonceTemplate::new(&block)?;
    debug!(index = block.index, difficulty, "parallel mining started");

    let found = (0u64..u64::MAX)
        .into_par_iter()
        .map_init(
            || template.clone(),
            |local, nonce| {
                let hash = local.digest(nonce);
                (nonce, hash)
            },
        )
        .find_any(|(nonce, hash)| {
            leading_zero_nibbles(hash) >= difficulty
                || (nonce % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled())
        });

    match found {
        Some((nonce, hash)) if leading_zero_nibbles(&hash) >= difficulty => {
            Ok(finish(block, nonce, hash))
        }
        _ => {
            warn!(index = block.index, "mining aborted");
            Err(CoreError::MiningAborted)
        }
    }
}

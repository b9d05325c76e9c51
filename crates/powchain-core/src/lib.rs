pub mod chain;
pub mod constants;
pub mod mine;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

pub use chain::{genesis_block, Chain, ChainViolation, ViolationKind};
pub use mine::{CancelToken, MiningStrategy};

pub type Hash = [u8; 32];

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("chain has no blocks")]
    EmptyChain,

    #[error("payload cannot be canonically serialized: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("mining aborted before a qualifying nonce was found")]
    MiningAborted,

    #[error("candidate block {index} no longer extends the chain tip")]
    StaleCandidate { index: u64 },

    #[error("block hash {hash} does not meet difficulty {difficulty}")]
    InsufficientWork { hash: String, difficulty: u32 },

    #[error("chain tip index is u64::MAX, no further block can follow")]
    IndexExhausted,

    #[error("difficulty {0} is out of range (max {})", constants::MAX_DIFFICULTY)]
    DifficultyOutOfRange(u32),
}

pub type Result<T> = std::result::Result<T, CoreError>;

/// Milliseconds since the Unix epoch, 0 if the clock is before it.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// One ledger entry. `hash` stays empty until the block has been mined.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub index: u64,
    pub timestamp: u64,
    pub data: Value,
    pub previous_hash: String,
    pub nonce: u64,
    pub hash: String,
}

impl Block {
    pub fn new(index: u64, timestamp: u64, data: Value, previous_hash: impl Into<String>) -> Self {
        Self {
            index,
            timestamp,
            data,
            previous_hash: previous_hash.into(),
            nonce: 0,
            hash: String::new(),
        }
    }

    /// A candidate stamped with the current time. Index and linkage are filled in
    /// by [`Chain::add_block`].
    pub fn with_data(data: impl Into<Value>) -> Self {
        Self::new(0, now_millis(), data.into(), String::new())
    }

    /// Like [`Block::with_data`] for any serializable payload.
    pub fn from_payload<T: Serialize + ?Sized>(payload: &T) -> Result<Self> {
        Ok(Self::with_data(serde_json::to_value(payload)?))
    }

    /// Everything in the preimage except the trailing nonce: the decimal sum
    /// `index + timestamp`, the previous hash, then the data as compact JSON.
    pub fn hash_prefix(&self) -> Result<String> {
        // Value objects are BTreeMap-backed, so keys serialize sorted.
        let data = serde_json::to_string(&self.data)?;
        let height_and_time = u128::from(self.index) + u128::from(self.timestamp);
        Ok(format!("{height_and_time}{}{data}", self.previous_hash))
    }

    /// Canonical hashing preimage: [`Block::hash_prefix`] followed by the decimal nonce.
    ///
    /// The genesis block hashes the string `00"Genesis Block"0`.
    pub fn hash_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = self.hash_prefix()?.into_bytes();
        push_decimal(&mut bytes, self.nonce);
        Ok(bytes)
    }

    pub fn digest(&self) -> Result<Hash> {
        Ok(sha256(&self.hash_bytes()?))
    }

    /// Lowercase hex SHA-256 over the current fields. Does not touch `self.hash`.
    pub fn compute_hash(&self) -> Result<String> {
        Ok(hex::encode(self.digest()?))
    }

    /// Search nonces upward from the current one until the hash has `difficulty`
    /// leading zero hex digits, then store the nonce and hash.
    pub fn mine(&mut self, difficulty: u32) -> Result<()> {
        let mined = mine::mine_sequential(self.clone(), difficulty, &CancelToken::new())?;
        *self = mined;
        Ok(())
    }

    /// Whether the stored hash satisfies `difficulty`.
    pub fn meets_difficulty(&self, difficulty: u32) -> bool {
        pow::hex_meets_difficulty(&self.hash, difficulty)
    }
}

/// Append the base-10 digits of `n` without allocating.
pub(crate) fn push_decimal(buf: &mut Vec<u8>, mut n: u64) {
    let mut digits = [0u8; 20];
    let mut at = digits.len();
    loop {
        at -= 1;
        digits[at] = b'0' + (n % 10) as u8;
        n /= 10;
        if n == 0 {
            break;
        }
    }
    buf.extend_from_slice(&digits[at..]);
}

pub(crate) fn sha256(bytes: &[u8]) -> Hash {
    let digest = Sha256::digest(bytes);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest[..]);
    out
}

pub mod pow {
    use super::{Block, Result};
    use crate::mine::{mine_sequential, CancelToken};

    /// Mine the block by incrementing its nonce until the hash has at least
    /// `difficulty` leading zero hex digits.
    pub fn mine_block(block: Block, difficulty: u32) -> Result<Block> {
        mine_sequential(block, difficulty, &CancelToken::new())
    }

    /// Number of leading zero hex digits (nibbles) in a raw digest.
    pub fn leading_zero_nibbles(hash: &[u8]) -> u32 {
        let mut total = 0u32;
        for b in hash {
            if *b == 0 {
                total += 2;
            } else {
                if *b < 0x10 {
                    total += 1;
                }
                break;
            }
        }
        total
    }

    /// True when the first `difficulty` characters of `hash` are all `'0'`.
    pub fn hex_meets_difficulty(hash: &str, difficulty: u32) -> bool {
        let difficulty = difficulty as usize;
        hash.len() >= difficulty && hash.bytes().take(difficulty).all(|c| c == b'0')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fixed_block() -> Block {
        Block::new(1, 1_600_000_000_000, json!("hello"), "00ab")
    }

    #[test]
    fn leading_zero_nibbles_examples() {
        let mut h = [0u8; 32];
        assert_eq!(pow::leading_zero_nibbles(&h), 64);
        h[0] = 0x0F;
        assert_eq!(pow::leading_zero_nibbles(&h), 1);
        h[0] = 0xF0;
        assert_eq!(pow::leading_zero_nibbles(&h), 0);
        h = [0u8; 32];
        h[1] = 0x80;
        assert_eq!(pow::leading_zero_nibbles(&h), 2);
        h[1] = 0x08;
        assert_eq!(pow::leading_zero_nibbles(&h), 3);
    }

    #[test]
    fn hex_predicate_examples() {
        assert!(pow::hex_meets_difficulty("00ab", 0));
        assert!(pow::hex_meets_difficulty("00ab", 2));
        assert!(!pow::hex_meets_difficulty("00ab", 3));
        assert!(!pow::hex_meets_difficulty("0", 2));
        assert!(pow::hex_meets_difficulty("", 0));
    }

    #[test]
    fn nibble_count_agrees_with_hex_predicate() {
        for nonce in 0..200u64 {
            let mut block = fixed_block();
            block.nonce = nonce;
            let raw = block.digest().unwrap();
            let hex = hex::encode(raw);
            let zeros = pow::leading_zero_nibbles(&raw);
            assert!(pow::hex_meets_difficulty(&hex, zeros));
            assert!(!pow::hex_meets_difficulty(&hex, zeros + 1));
        }
    }

    #[test]
    fn compute_hash_is_deterministic() {
        let block = fixed_block();
        let h1 = block.compute_hash().unwrap();
        let h2 = block.clone().compute_hash().unwrap();
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), constants::HASH_HEX_SIZE);
        assert!(h1.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn compute_hash_does_not_store_hash() {
        let block = fixed_block();
        block.compute_hash().unwrap();
        assert!(block.hash.is_empty());
    }

    #[test]
    fn hash_changes_with_every_field() {
        let base = fixed_block();
        let h = base.compute_hash().unwrap();

        let mut b = base.clone();
        b.index += 1;
        assert_ne!(b.compute_hash().unwrap(), h);

        let mut b = base.clone();
        b.timestamp += 1;
        assert_ne!(b.compute_hash().unwrap(), h);

        let mut b = base.clone();
        b.previous_hash.push('0');
        assert_ne!(b.compute_hash().unwrap(), h);

        let mut b = base.clone();
        b.data = json!("hellp");
        assert_ne!(b.compute_hash().unwrap(), h);

        let mut b = base.clone();
        b.nonce += 1;
        assert_ne!(b.compute_hash().unwrap(), h);
    }

    #[test]
    fn object_payload_hash_ignores_key_order() {
        let a: Value = serde_json::from_str(r#"{"b":2,"a":{"y":1,"x":[1,2]}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"a":{"x":[1,2],"y":1},"b":2}"#).unwrap();
        let block_a = Block::new(3, 42, a, "ff");
        let block_b = Block::new(3, 42, b, "ff");
        assert_eq!(block_a.compute_hash().unwrap(), block_b.compute_hash().unwrap());
    }

    #[test]
    fn preimage_layout() {
        let mut block = fixed_block();
        assert_eq!(block.hash_prefix().unwrap(), r#"160000000000100ab"hello""#);
        assert_eq!(block.hash_bytes().unwrap(), br#"160000000000100ab"hello"0"#);
        assert_eq!(
            block.compute_hash().unwrap(),
            "edb0215a3aa52f49cfcdaabadcf7b9d49dd2e664d22830373baebb15f1dd49c1"
        );

        block.nonce = 1234;
        assert!(block.hash_bytes().unwrap().ends_with(b"\"1234"));
    }

    #[test]
    fn genesis_hash_is_reproducible() {
        let genesis = genesis_block();
        assert_eq!(genesis.hash_bytes().unwrap(), br#"00"Genesis Block"0"#);
        assert_eq!(genesis.compute_hash().unwrap(), constants::GENESIS_HASH);
    }

    #[test]
    fn decimal_digits() {
        for n in [0u64, 7, 10, 1234, u64::MAX] {
            let mut buf = b"x".to_vec();
            push_decimal(&mut buf, n);
            assert_eq!(buf, format!("x{n}").into_bytes());
        }
    }

    #[test]
    fn mine_meets_difficulty() {
        let mut block = fixed_block();
        block.mine(2).unwrap();
        assert!(block.hash.starts_with("00"));
        assert!(block.meets_difficulty(2));
        assert_eq!(block.hash, block.compute_hash().unwrap());
    }

    #[test]
    fn mine_difficulty_zero_takes_first_hash() {
        let mut block = fixed_block();
        let first = block.compute_hash().unwrap();
        block.mine(0).unwrap();
        assert_eq!(block.nonce, 0);
        assert_eq!(block.hash, first);
    }

    #[test]
    fn mine_block_by_value() {
        let mined = pow::mine_block(fixed_block(), 1).unwrap();
        assert!(mined.hash.starts_with('0'));
        assert_eq!(mined.hash, mined.compute_hash().unwrap());
    }

    #[test]
    fn from_payload_surfaces_serialization_errors() {
        use std::collections::HashMap;
        let mut bad: HashMap<(u8, u8), u8> = HashMap::new();
        bad.insert((1, 2), 3);
        assert!(matches!(
            Block::from_payload(&bad),
            Err(CoreError::Serialization(_))
        ));

        let ok = Block::from_payload(&vec![1, 2, 3]).unwrap();
        assert_eq!(ok.data, json!([1, 2, 3]));
        assert_eq!(ok.nonce, 0);
        assert!(ok.hash.is_empty());
    }

    #[test]
    fn block_json_shape() {
        let mut block = fixed_block();
        block.hash = "abc".into();
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(
            json,
            json!({
                "index": 1,
                "timestamp": 1_600_000_000_000u64,
                "data": "hello",
                "previousHash": "00ab",
                "nonce": 0,
                "hash": "abc"
            })
        );
        let back: Block = serde_json::from_value(json).unwrap();
        assert_eq!(back, block);
    }

    #[test]
    fn with_data_stamps_time() {
        let block = Block::with_data("x");
        assert!(block.timestamp > 0);
        assert_eq!(block.data, json!("x"));
    }
}

pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
/// Upper bound for a difficulty: every hex digit of the digest is zero.
pub const MAX_DIFFICULTY: u32 = HASH_HEX_SIZE as u32;
pub const DEFAULT_DIFFICULTY: u32 = 2;

pub const GENESIS_DATA: &str = "Genesis Block";
pub const GENESIS_PREVIOUS_HASH: &str = "0";
pub const GENESIS_TIMESTAMP: u64 = 0;
pub const GENESIS_HASH: &str = "64f7b89238d2fba6619759197d7329d363ad5bb925ba477de55718950422879e";

/// Number of nonces tried between two polls of a cancellation token.
pub const CANCEL_CHECK_INTERVAL: u64 = 1 << 12;

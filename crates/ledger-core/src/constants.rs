/// Hex prefix a proof hash must start with. Four zero nibbles, 16 bits.
pub const POW_TARGET_PREFIX: &str = "0000";
pub const GENESIS_PROOF: u64 = 100;
pub const GENESIS_PREVIOUS_HASH: &str = "1";
pub const GENESIS_INDEX: u64 = 1;
/// Sender used for the block reward; marks newly minted coin.
pub const REWARD_SENDER: &str = "0";
pub const MINING_REWARD: i64 = 1;
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 8;

pub const HASH_HEX_LEN: usize = 64;

/// Previous-hash sentinel for block 0.
pub const GENESIS_PREVIOUS_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// Leading zero hex digits required of a mined block hash.
pub const DEFAULT_DIFFICULTY: u32 = 4;

/// Nonce cap per mining call. An anti-infinite-loop guard for a demo
/// tool, not a security property.
pub const DEFAULT_MAX_ATTEMPTS: u64 = 100_000;

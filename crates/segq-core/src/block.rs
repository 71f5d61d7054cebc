//! Block size derivation.
//!
//! The block size is the transfer and hash granularity of a file. The default
//! comes from the hash tree layout (at most 512 leaves, never below 64 KiB); a
//! peer's tree may later reveal a larger one, so it only ever grows.

/// Block size used when the file size is unknown.
pub const DEFAULT_BLOCK_SIZE: u64 = 64 * 1024;

const BASE_BLOCK_SIZE: u64 = 1024;
const MAX_TREE_LEAVES: u64 = 1 << 9;

/// Block size for a file of `file_size` bytes (`None` = unknown).
pub fn tree_block_size(file_size: Option<u64>) -> u64 {
    let Some(file_size) = file_size else {
        return DEFAULT_BLOCK_SIZE;
    };
    let mut block = BASE_BLOCK_SIZE;
    while MAX_TREE_LEAVES.saturating_mul(block) < file_size {
        block *= 2;
    }
    block.max(DEFAULT_BLOCK_SIZE)
}

/// Accept `proposed` as the new block size only if it is larger than `current`
/// and an exact multiple of it.
pub fn grown_block_size(current: u64, proposed: u64) -> Option<u64> {
    if proposed <= current {
        return None;
    }
    if current != 0 && proposed % current != 0 {
        tracing::warn!(current, proposed, "rejecting block size that is not a multiple");
        return None;
    }
    Some(proposed)
}

//! The slice of block header data the ledgers read.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{BlockHeight, Timestamp};

/// Header fields of the block being executed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockCtx {
    /// Block height.
    pub height: BlockHeight,

    /// Block time, unix nanoseconds.
    pub time: Timestamp,

    /// Hash of the block header, used as entropy for derived addresses.
    pub header_hash: [u8; 32],
}

impl BlockCtx {
    /// Creates a context with a zero header hash.
    pub const fn new(height: BlockHeight, time: Timestamp) -> Self {
        Self {
            height,
            time,
            header_hash: [0; 32],
        }
    }

    /// Sets the header hash.
    pub const fn with_header_hash(mut self, header_hash: [u8; 32]) -> Self {
        self.header_hash = header_hash;
        self
    }

    /// The context of the following block, `block_time` later.
    pub fn next(&self, block_time: Duration) -> Self {
        let height = self.height + 1;
        let mut header_hash = [0; 32];
        header_hash[..8].copy_from_slice(&height.to_be_bytes());
        Self {
            height,
            time: self.after(block_time),
            header_hash,
        }
    }

    /// The block time plus `duration`, saturating.
    pub fn after(&self, duration: Duration) -> Timestamp {
        self.time.saturating_add(duration_nanos(duration))
    }
}

/// `duration` in nanoseconds, saturating at `i64::MAX`.
pub fn duration_nanos(duration: Duration) -> i64 {
    i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_block_advances_height_time_and_hash() {
        let genesis = BlockCtx::new(1, 1_000);
        let next = genesis.next(Duration::from_secs(5));
        assert_eq!(next.height, 2);
        assert_eq!(next.time, 5_000_001_000);
        assert_ne!(next.header_hash, genesis.header_hash);
    }

    #[test]
    fn huge_durations_saturate() {
        let ctx = BlockCtx::new(1, 10);
        assert_eq!(ctx.after(Duration::MAX), i64::MAX);
    }
}

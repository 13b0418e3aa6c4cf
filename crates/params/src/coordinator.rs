//! Parameters of the coordinator ledger.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::default::{PACKET_TIMEOUT, REWARD_INTERVAL_BLOCKS, REWARD_SHARDS};

/// Parameters that every coordinator node must agree on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorParams {
    /// How long a packet sent to a consumer stays valid.
    pub packet_timeout: Duration,

    /// Reward sweeps run at heights divisible by this. Zero disables reward collection.
    pub reward_interval_blocks: u64,

    /// Each sweep visits `ceil(operators / reward_shards)` operators.
    pub reward_shards: u32,
}

impl Default for CoordinatorParams {
    fn default() -> Self {
        Self {
            packet_timeout: PACKET_TIMEOUT,
            reward_interval_blocks: REWARD_INTERVAL_BLOCKS,
            reward_shards: REWARD_SHARDS,
        }
    }
}

impl CoordinatorParams {
    /// Whether a reward sweep is due at `height`.
    pub const fn is_reward_height(&self, height: u64) -> bool {
        self.reward_interval_blocks != 0 && height % self.reward_interval_blocks == 0
    }

    /// How many operators one sweep visits out of `operators`.
    pub const fn reward_batch_size(&self, operators: usize) -> usize {
        let shards = if self.reward_shards == 0 {
            1
        } else {
            self.reward_shards as usize
        };
        operators.div_ceil(shards)
    }
}

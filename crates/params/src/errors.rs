//! Errors for the restaking parameters.

use restaking_primitives::types::{ChainId, ChannelEnd};
use thiserror::Error;

/// A parameter set that cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamsError {
    /// Packets would time out immediately.
    #[error("packet timeout must be positive")]
    ZeroPacketTimeout,

    /// The reward work queue needs at least one shard.
    #[error("reward_shards must be at least 1")]
    ZeroRewardShards,

    /// Two consumers share a chain id.
    #[error("duplicate consumer chain id {0}")]
    DuplicateChain(ChainId),

    /// Two consumers share a coordinator-side channel end.
    #[error("channel end {0} is used by more than one consumer")]
    DuplicateChannel(ChannelEnd),

    /// A consumer accepts no restaking denomination.
    #[error("consumer {0} accepts no restaking denomination")]
    NoRestakingDenoms(ChainId),
}

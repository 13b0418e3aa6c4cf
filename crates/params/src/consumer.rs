//! Parameters of a consumer chain, seen from both ends.

use std::time::Duration;

use restaking_primitives::types::{ChainId, ChannelEnd, Denom};
use serde::{Deserialize, Serialize};

use crate::default::{PACKET_TIMEOUT, RESTAKING_PORT, TRANSFER_PORT, UNBONDING_DURATION};

/// Parameters of the consumer ledger itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerParams {
    /// This chain's id.
    pub chain_id: ChainId,

    /// Local end of the restaking channel to the coordinator.
    pub coordinator: ChannelEnd,

    /// Local end of the token transfer channel to the coordinator.
    pub transfer: ChannelEnd,

    /// How long a packet sent to the coordinator stays valid.
    pub packet_timeout: Duration,
}

impl ConsumerParams {
    /// Parameters using the default ports and timeout.
    pub fn with_defaults(
        chain_id: impl Into<ChainId>,
        coordinator_channel: &str,
        transfer_channel: &str,
    ) -> Self {
        Self {
            chain_id: chain_id.into(),
            coordinator: ChannelEnd::new(coordinator_channel, RESTAKING_PORT),
            transfer: ChannelEnd::new(transfer_channel, TRANSFER_PORT),
            packet_timeout: PACKET_TIMEOUT,
        }
    }
}

/// The consumer's staking module, which the ledger only reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakingParams {
    /// Native bond denomination.
    pub bond_denom: Denom,

    /// How long native unbonding takes.
    pub unbonding_duration: Duration,
}

impl StakingParams {
    /// Staking in `bond_denom` with the default unbonding period.
    pub fn new(bond_denom: impl Into<Denom>) -> Self {
        Self {
            bond_denom: bond_denom.into(),
            unbonding_duration: UNBONDING_DURATION,
        }
    }
}

/// Everything needed to wire one consumer to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerChainParams {
    /// The consumer's own parameters.
    pub consumer: ConsumerParams,

    /// Coordinator-side end of the restaking channel.
    pub coordinator_end: ChannelEnd,

    /// Coordinator-side end of the token transfer channel.
    pub coordinator_transfer_end: ChannelEnd,

    /// Denominations the consumer accepts as restaked collateral.
    pub restaking_denoms: Vec<Denom>,

    /// Denominations the consumer pays rewards in.
    pub reward_denoms: Vec<Denom>,

    /// The consumer's staking module.
    pub staking: StakingParams,
}

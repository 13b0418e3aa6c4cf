//! Default values for the restaking parameters.

use std::time::Duration;

/// Default lifetime of a cross-chain packet before it times out.
pub(crate) const PACKET_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Default number of blocks between reward sweeps.
pub(crate) const REWARD_INTERVAL_BLOCKS: u64 = 10;

/// Default number of sweeps it takes to visit every operator once.
pub(crate) const REWARD_SHARDS: u32 = 4;

/// Default port bound by the restaking module on both ends.
pub(crate) const RESTAKING_PORT: &str = "restaking";

/// Default port bound by the token transfer module on both ends.
pub(crate) const TRANSFER_PORT: &str = "transfer";

/// Default unbonding period of a consumer's staking module.
pub(crate) const UNBONDING_DURATION: Duration = Duration::from_secs(21 * 24 * 60 * 60);

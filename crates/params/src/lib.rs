//! Consensus-critical parameters of the restaking protocol: everything the coordinator and its
//! consumers must agree on for their ledgers to stay in step.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

pub mod consumer;
pub mod coordinator;
mod default;
pub mod errors;

use consumer::ConsumerChainParams;
use coordinator::CoordinatorParams;
use errors::ParamsError;

/// The full parameter set of a restaking network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Params {
    /// Coordinator parameters.
    pub coordinator: CoordinatorParams,

    /// One entry per consumer chain.
    pub consumers: Vec<ConsumerChainParams>,
}

impl Params {
    /// Checks the parameter set for values the ledgers cannot work with.
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.coordinator.packet_timeout.is_zero() {
            return Err(ParamsError::ZeroPacketTimeout);
        }
        if self.coordinator.reward_shards == 0 {
            return Err(ParamsError::ZeroRewardShards);
        }

        let mut chains = BTreeSet::new();
        let mut ends = BTreeSet::new();
        for chain in &self.consumers {
            let chain_id = &chain.consumer.chain_id;
            if !chains.insert(chain_id) {
                return Err(ParamsError::DuplicateChain(chain_id.clone()));
            }
            for end in [&chain.coordinator_end, &chain.coordinator_transfer_end] {
                if !ends.insert(end) {
                    return Err(ParamsError::DuplicateChannel(end.clone()));
                }
            }
            if chain.restaking_denoms.is_empty() {
                return Err(ParamsError::NoRestakingDenoms(chain_id.clone()));
            }
            if chain.consumer.packet_timeout.is_zero() {
                return Err(ParamsError::ZeroPacketTimeout);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use restaking_primitives::types::ChannelEnd;

    use super::*;
    use crate::consumer::{ConsumerParams, StakingParams};

    fn consumer(chain: &str, idx: usize) -> ConsumerChainParams {
        ConsumerChainParams {
            consumer: ConsumerParams::with_defaults(chain, "channel-0", "channel-1"),
            coordinator_end: ChannelEnd::new(format!("channel-{}", 2 * idx), "restaking"),
            coordinator_transfer_end: ChannelEnd::new(format!("channel-{}", 2 * idx + 1), "transfer"),
            restaking_denoms: vec!["ustake".into()],
            reward_denoms: vec![format!("u{chain}").into()],
            staking: StakingParams::new(format!("n{chain}")),
        }
    }

    #[test]
    fn test_params_serde_toml() {
        let params = Params {
            coordinator: CoordinatorParams::default(),
            consumers: vec![consumer("osmo", 0), consumer("juno", 1)],
        };

        let serialized = toml::to_string(&params).unwrap();
        let deserialized: Params = toml::from_str(&serialized).unwrap();
        assert_eq!(params, deserialized);

        let params_toml = r#"
            [coordinator]
            packet_timeout = { secs = 600, nanos = 0 }
            reward_interval_blocks = 10
            reward_shards = 4

            [[consumers]]
            restaking_denoms = ["ustake"]
            reward_denoms = ["uosmo"]
            coordinator_end = { channel = "channel-0", port = "restaking" }
            coordinator_transfer_end = { channel = "channel-1", port = "transfer" }

            [consumers.consumer]
            chain_id = "osmo-1"
            coordinator = { channel = "channel-7", port = "restaking" }
            transfer = { channel = "channel-8", port = "transfer" }
            packet_timeout = { secs = 600, nanos = 0 }

            [consumers.staking]
            bond_denom = "uosmo"
            unbonding_duration = { secs = 1814400, nanos = 0 }
        "#;

        let parsed = toml::from_str::<Params>(params_toml);
        assert!(
            parsed.is_ok(),
            "must be able to deserialize Params from a toml: {parsed:?}"
        );
        assert!(parsed.unwrap().validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_sets() {
        let mut params = Params {
            coordinator: CoordinatorParams::default(),
            consumers: vec![consumer("osmo", 0), consumer("osmo", 1)],
        };
        assert_eq!(
            params.validate(),
            Err(ParamsError::DuplicateChain("osmo".into()))
        );

        params.consumers[1] = consumer("juno", 0);
        assert!(matches!(
            params.validate(),
            Err(ParamsError::DuplicateChannel(_))
        ));

        params.consumers[1] = consumer("juno", 1);
        params.consumers[1].restaking_denoms.clear();
        assert_eq!(
            params.validate(),
            Err(ParamsError::NoRestakingDenoms("juno".into()))
        );

        params.consumers[1] = consumer("juno", 1);
        params.coordinator.reward_shards = 0;
        assert_eq!(params.validate(), Err(ParamsError::ZeroRewardShards));
    }
}

//! Parameter sets and initial consumer state for local networks.

use std::collections::BTreeMap;

use restaking_params::{
    consumer::{ConsumerChainParams, ConsumerParams, StakingParams},
    coordinator::CoordinatorParams,
    Params,
};
use restaking_primitives::{
    decimal::Decimal,
    packets::ValidatorUpdate,
    types::{ChainId, ChannelEnd, Denom, ValidatorId},
};

/// Denomination delegators stake on the coordinator of a local network.
pub const RESTAKING_DENOM: &str = "ustake";

/// Denomination every consumer of a local network pays rewards in.
pub const REWARD_DENOM: &str = "ureward";

/// Voting power of genesis validators.
pub const GENESIS_POWER: u64 = 10;

/// What a consumer starts with besides its parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsumerGenesis {
    /// Initial validator set.
    pub validators: Vec<ValidatorUpdate>,

    /// Native value of one unit of each restaked denomination.
    pub prices: BTreeMap<Denom, Decimal>,
}

/// Parameters of a network with one consumer per entry of `chains`.
///
/// Consumer `i` is reached over `channel-{2i}` and sends rewards back over `channel-{2i+1}` on
/// the coordinator; on the consumer side the channels are always `channel-0` and `channel-1`.
/// Each consumer bonds `u{chain}` natively.
pub fn local_params(coordinator: CoordinatorParams, chains: &[&str]) -> Params {
    let consumers = chains
        .iter()
        .enumerate()
        .map(|(i, chain)| ConsumerChainParams {
            consumer: ConsumerParams::with_defaults(*chain, "channel-0", "channel-1"),
            coordinator_end: ChannelEnd::new(format!("channel-{}", 2 * i), "restaking"),
            coordinator_transfer_end: ChannelEnd::new(format!("channel-{}", 2 * i + 1), "transfer"),
            restaking_denoms: vec![RESTAKING_DENOM.into()],
            reward_denoms: vec![REWARD_DENOM.into()],
            staking: StakingParams::new(format!("u{chain}")),
        })
        .collect();

    Params {
        coordinator,
        consumers,
    }
}

/// Name of the `i`th genesis validator of `chain`.
pub fn validator_name(chain: &ChainId, i: usize) -> ValidatorId {
    ValidatorId::new(format!("{chain}val{i}"))
}

/// `validators` validators on every consumer of `params` and a price of one native unit per
/// restaked unit.
pub fn local_genesis(params: &Params, validators: usize) -> BTreeMap<ChainId, ConsumerGenesis> {
    params
        .consumers
        .iter()
        .map(|chain| {
            let chain_id = chain.consumer.chain_id.clone();
            let genesis = ConsumerGenesis {
                validators: (0..validators)
                    .map(|i| ValidatorUpdate {
                        identity: validator_name(&chain_id, i),
                        power: GENESIS_POWER,
                    })
                    .collect(),
                prices: chain
                    .restaking_denoms
                    .iter()
                    .map(|denom| (denom.clone(), Decimal::ONE))
                    .collect(),
            };
            (chain_id, genesis)
        })
        .collect()
}

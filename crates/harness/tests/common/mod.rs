//! Helpers shared by the network tests.
#![allow(dead_code)]

use std::time::Duration;

use ethnum::U256;
use restaking_consumer::agent::AgentKey;
use restaking_harness::{
    genesis::{local_genesis, local_params, validator_name, RESTAKING_DENOM},
    Network,
};
use restaking_params::{coordinator::CoordinatorParams, Params};
use restaking_primitives::{
    coin::{Amount, Coin},
    types::{Address, ChainId, Timestamp},
};

pub const BLOCK_TIME: Duration = Duration::from_secs(5);

pub const GENESIS_TIME: Timestamp = 1_000_000_000;

pub fn amt(v: u128) -> Amount {
    U256::new(v)
}

pub fn stake(v: u128) -> Coin {
    Coin::new(RESTAKING_DENOM, v)
}

pub fn chain(name: &str) -> ChainId {
    ChainId::new(name)
}

/// Params for `chains` with reward sweeps disabled and a one minute unbonding period.
pub fn params(chains: &[&str]) -> Params {
    let mut params = local_params(
        CoordinatorParams {
            reward_interval_blocks: 0,
            ..Default::default()
        },
        chains,
    );
    for consumer in &mut params.consumers {
        consumer.staking.unbonding_duration = Duration::from_secs(60);
    }
    params
}

pub fn network_with(params: Params) -> Network {
    let genesis = local_genesis(&params, 2);
    Network::new(params, genesis, GENESIS_TIME, BLOCK_TIME).expect("network must start")
}

pub fn network(chains: &[&str]) -> Network {
    network_with(params(chains))
}

/// The agent an operator registered through [`register`] delegates through on `chain`.
pub fn agent_key(name: &str) -> AgentKey {
    AgentKey::new(RESTAKING_DENOM, validator_name(&chain(name), 0))
}

/// Registers an operator running the first genesis validator of every chain in `chains`.
pub fn register(net: &mut Network, chains: &[&str]) -> Address {
    let served: Vec<_> = chains
        .iter()
        .map(|name| (chain(name), validator_name(&chain(name), 0)))
        .collect();
    net.register_operator(&Address::new("owner"), &RESTAKING_DENOM.into(), &served)
        .expect("operator must register")
}

pub fn funded(net: &mut Network, who: &str, amount: u128) -> Address {
    let who = Address::new(who);
    net.fund(&who, &stake(amount)).expect("mint must succeed");
    who
}

/// Value `operator` holds on `name`'s agent.
pub fn consumer_value(net: &Network, name: &str, operator: &Address) -> Amount {
    net.consumer(&chain(name))
        .expect("consumer must exist")
        .ledger
        .operator_value(&agent_key(name), operator)
}

//! The consumer ledger.

use std::collections::BTreeMap;

use ethnum::U256;
use restaking_params::consumer::ConsumerParams;
use restaking_primitives::{
    coin::Amount,
    types::{Address, ValidatorId},
    unbonding_queue::UnbondingQueue,
};
use serde::{Deserialize, Serialize};

use crate::{
    agent::{Agent, AgentKey},
    unbonding::LocalUnbonding,
};

/// Consumer state. Like the coordinator ledger, collaborators are passed in per call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerLedger {
    pub(crate) params: ConsumerParams,
    pub(crate) agents: BTreeMap<AgentKey, Agent>,
    pub(crate) unbondings: BTreeMap<u64, LocalUnbonding>,
    pub(crate) unbonding_queue: UnbondingQueue<u64>,
    pub(crate) next_unbonding_id: u64,
    /// Sequence id the next validator set report carries.
    pub(crate) next_update_id: u64,
}

impl ConsumerLedger {
    /// Creates an empty ledger.
    pub fn new(params: ConsumerParams) -> Self {
        Self {
            params,
            agents: BTreeMap::new(),
            unbondings: BTreeMap::new(),
            unbonding_queue: UnbondingQueue::new(),
            next_unbonding_id: 0,
            next_update_id: 1,
        }
    }

    /// The parameters.
    pub const fn params(&self) -> &ConsumerParams {
        &self.params
    }

    /// An agent.
    pub fn agent(&self, key: &AgentKey) -> Option<&Agent> {
        self.agents.get(key)
    }

    /// Every agent in key order.
    pub fn agents(&self) -> impl Iterator<Item = &Agent> {
        self.agents.values()
    }

    /// Agents bonding to `validator`.
    pub fn agents_of<'a>(&'a self, validator: &'a ValidatorId) -> impl Iterator<Item = &'a Agent> {
        self.agents
            .values()
            .filter(move |agent| &agent.key.validator == validator)
    }

    /// Value of `operator`'s holding in the agent, in the restaked denomination.
    pub fn operator_value(&self, key: &AgentKey, operator: &Address) -> Amount {
        self.agents
            .get(key)
            .map(|agent| agent.pool.value_of(operator))
            .unwrap_or(U256::ZERO)
    }

    /// Unbondings waiting to mature, by id.
    pub fn unbondings(&self) -> impl Iterator<Item = &LocalUnbonding> {
        self.unbondings.values()
    }
}

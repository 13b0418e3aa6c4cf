//! Registered consumer chains and the validator sets they last reported.

use std::collections::BTreeMap;

use restaking_params::consumer::ConsumerChainParams;
use restaking_primitives::{
    packets::ValidatorSetChangePacket,
    types::{ChainId, ChannelEnd, Denom, ValidatorId},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::{CoordinatorError, CoordinatorResult};

/// Static description of a consumer chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerInfo {
    /// The consumer's chain id.
    pub chain_id: ChainId,

    /// Coordinator-side end of the restaking channel.
    pub end: ChannelEnd,

    /// Coordinator-side end of the token transfer channel.
    pub transfer_end: ChannelEnd,

    /// Denominations accepted as restaked collateral.
    pub restaking_denoms: Vec<Denom>,

    /// Denominations rewards are collected in.
    pub reward_denoms: Vec<Denom>,
}

impl From<&ConsumerChainParams> for ConsumerInfo {
    fn from(params: &ConsumerChainParams) -> Self {
        Self {
            chain_id: params.consumer.chain_id.clone(),
            end: params.coordinator_end.clone(),
            transfer_end: params.coordinator_transfer_end.clone(),
            restaking_denoms: params.restaking_denoms.clone(),
            reward_denoms: params.reward_denoms.clone(),
        }
    }
}

/// A registered consumer and its cached validator set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerState {
    /// Static description.
    pub info: ConsumerInfo,

    /// Validator identity → voting power, as last reported.
    pub validators: BTreeMap<ValidatorId, u64>,

    /// Sequence id of the last applied validator set report.
    pub last_update_sequence: Option<u64>,
}

impl ConsumerState {
    /// Whether `validator` is in the cached set.
    pub fn has_validator(&self, validator: &ValidatorId) -> bool {
        self.validators.contains_key(validator)
    }

    /// Whether the consumer accepts `denom` as collateral.
    pub fn accepts(&self, denom: &Denom) -> bool {
        self.info.restaking_denoms.contains(denom)
    }
}

/// Every consumer the coordinator talks to, indexed by chain id and by channel end.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerRegistry {
    consumers: BTreeMap<ChainId, ConsumerState>,
    by_end: BTreeMap<ChannelEnd, ChainId>,
    by_transfer_end: BTreeMap<ChannelEnd, ChainId>,
}

impl ConsumerRegistry {
    /// Registers a consumer with an empty validator set.
    pub fn add(&mut self, info: ConsumerInfo) -> CoordinatorResult<()> {
        if self.consumers.contains_key(&info.chain_id) {
            return Err(CoordinatorError::ConsumerExists(info.chain_id));
        }
        for end in [&info.end, &info.transfer_end] {
            if self.by_end.contains_key(end) || self.by_transfer_end.contains_key(end) {
                return Err(CoordinatorError::ChannelInUse(end.clone()));
            }
        }
        if info.end == info.transfer_end {
            return Err(CoordinatorError::ChannelInUse(info.end));
        }

        info!(chain_id = %info.chain_id, end = %info.end, "registered consumer");

        self.by_end.insert(info.end.clone(), info.chain_id.clone());
        self.by_transfer_end
            .insert(info.transfer_end.clone(), info.chain_id.clone());
        self.consumers.insert(
            info.chain_id.clone(),
            ConsumerState {
                info,
                validators: BTreeMap::new(),
                last_update_sequence: None,
            },
        );

        Ok(())
    }

    /// Looks a consumer up by chain id.
    pub fn get(&self, chain_id: &ChainId) -> Option<&ConsumerState> {
        self.consumers.get(chain_id)
    }

    /// The consumer on the other side of a restaking channel end.
    pub fn by_end(&self, end: &ChannelEnd) -> Option<&ConsumerState> {
        self.by_end.get(end).and_then(|id| self.consumers.get(id))
    }

    /// The consumer on the other side of a token transfer channel end.
    pub fn by_transfer_end(&self, end: &ChannelEnd) -> Option<&ConsumerState> {
        self.by_transfer_end
            .get(end)
            .and_then(|id| self.consumers.get(id))
    }

    /// Iterates registered consumers in chain id order.
    pub fn iter(&self) -> impl Iterator<Item = &ConsumerState> {
        self.consumers.values()
    }

    /// Applies a validator set report from `chain_id`. Reports whose sequence id is not newer than
    /// the last applied one are ignored. Returns whether the report was applied.
    pub fn apply_validator_updates(
        &mut self,
        chain_id: &ChainId,
        change: &ValidatorSetChangePacket,
    ) -> CoordinatorResult<bool> {
        let consumer = self
            .consumers
            .get_mut(chain_id)
            .ok_or_else(|| CoordinatorError::UnknownConsumer(chain_id.clone()))?;

        if consumer
            .last_update_sequence
            .is_some_and(|last| change.update_sequence_id <= last)
        {
            debug!(%chain_id, seq = change.update_sequence_id, "ignoring stale validator set report");
            return Ok(false);
        }

        for update in &change.updates {
            if update.power == 0 {
                consumer.validators.remove(&update.identity);
            } else {
                consumer
                    .validators
                    .insert(update.identity.clone(), update.power);
            }
        }
        consumer.last_update_sequence = Some(change.update_sequence_id);

        debug!(
            %chain_id,
            seq = change.update_sequence_id,
            validators = consumer.validators.len(),
            "applied validator set report"
        );

        Ok(true)
    }
}

//! The coordinator ledger: all coordinator state as one owned value.

use std::collections::BTreeMap;

use restaking_params::coordinator::CoordinatorParams;
use restaking_primitives::{
    coin::Shares,
    packets::ValidatorSetChangePacket,
    types::{Address, ChainId},
    unbonding_queue::UnbondingQueue,
};
use serde::{Deserialize, Serialize};

use crate::{
    callbacks::CallbackRegistry,
    consumers::{ConsumerInfo, ConsumerRegistry, ConsumerState},
    delegation::UnbondingEntry,
    errors::CoordinatorResult,
    operator::Operator,
    records::{OperatorDelegationRecord, OperatorUndelegationRecord, RecordKey},
    rewards::RewardDistributor,
};

/// Coordinator state. Every mutation goes through a method on this type; collaborators are
/// passed in per call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorLedger {
    pub(crate) params: CoordinatorParams,
    pub(crate) consumers: ConsumerRegistry,
    pub(crate) operators: BTreeMap<Address, Operator>,
    pub(crate) registration_nonce: u64,
    /// `(delegator, operator)` → shares.
    pub(crate) delegations: BTreeMap<(Address, Address), Shares>,
    pub(crate) delegation_records: BTreeMap<RecordKey, OperatorDelegationRecord>,
    pub(crate) undelegation_records: BTreeMap<RecordKey, OperatorUndelegationRecord>,
    /// `(delegator, operator)` → entries, oldest first.
    pub(crate) unbonding_delegations: BTreeMap<(Address, Address), Vec<UnbondingEntry>>,
    pub(crate) unbonding_queue: UnbondingQueue<(Address, Address)>,
    pub(crate) next_unbonding_id: u64,
    pub(crate) callbacks: CallbackRegistry,
    pub(crate) rewards: RewardDistributor,
}

impl CoordinatorLedger {
    /// Creates an empty ledger.
    pub fn new(params: CoordinatorParams) -> Self {
        Self {
            params,
            consumers: ConsumerRegistry::default(),
            operators: BTreeMap::new(),
            registration_nonce: 0,
            delegations: BTreeMap::new(),
            delegation_records: BTreeMap::new(),
            undelegation_records: BTreeMap::new(),
            unbonding_delegations: BTreeMap::new(),
            unbonding_queue: UnbondingQueue::new(),
            next_unbonding_id: 0,
            callbacks: CallbackRegistry::default(),
            rewards: RewardDistributor::default(),
        }
    }

    /// Registers a consumer chain.
    pub fn add_consumer(&mut self, info: ConsumerInfo) -> CoordinatorResult<()> {
        self.consumers.add(info)
    }

    /// Seeds or updates a consumer's validator set outside of the packet flow, e.g. at genesis.
    pub fn apply_validator_updates(
        &mut self,
        chain_id: &ChainId,
        change: &ValidatorSetChangePacket,
    ) -> CoordinatorResult<bool> {
        self.consumers.apply_validator_updates(chain_id, change)
    }

    /// The parameters.
    pub const fn params(&self) -> &CoordinatorParams {
        &self.params
    }

    /// A registered consumer.
    pub fn consumer(&self, chain_id: &ChainId) -> Option<&ConsumerState> {
        self.consumers.get(chain_id)
    }

    /// An operator.
    pub fn operator(&self, address: &Address) -> Option<&Operator> {
        self.operators.get(address)
    }

    /// Every operator in address order.
    pub fn operators(&self) -> impl Iterator<Item = &Operator> {
        self.operators.values()
    }

    /// Every delegation as `((delegator, operator), shares)`.
    pub fn delegations(&self) -> impl Iterator<Item = (&(Address, Address), &Shares)> {
        self.delegations.iter()
    }

    /// A delegation record.
    pub fn delegation_record(&self, key: &RecordKey) -> Option<&OperatorDelegationRecord> {
        self.delegation_records.get(key)
    }

    /// An undelegation record.
    pub fn undelegation_record(&self, key: &RecordKey) -> Option<&OperatorUndelegationRecord> {
        self.undelegation_records.get(key)
    }

    /// Delegation records that have not finalized.
    pub fn open_delegation_records(&self) -> impl Iterator<Item = &OperatorDelegationRecord> {
        self.delegation_records.values()
    }

    /// Undelegation records that have not finalized.
    pub fn open_undelegation_records(&self) -> impl Iterator<Item = &OperatorUndelegationRecord> {
        self.undelegation_records.values()
    }

    /// Packets still waiting on an acknowledgement.
    pub fn pending_callbacks(&self) -> usize {
        self.callbacks.len()
    }

    /// Reward bookkeeping.
    pub const fn rewards(&self) -> &RewardDistributor {
        &self.rewards
    }
}

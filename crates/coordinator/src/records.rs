//! Per-block batches of delegation changes waiting to be mirrored on every consumer.
//!
//! A record is created `Pending` by the first delegate or undelegate of an operator in a block. At
//! the end of the block one packet per served consumer is sent and the record becomes
//! `Processing`. Each consumer is a leg; the record finalizes only once every leg resolved.

use std::{collections::BTreeMap, fmt};

use restaking_primitives::{
    coin::Amount,
    types::{Address, BlockHeight, ChainId, PacketKey, Timestamp},
};
use serde::{Deserialize, Serialize};

/// Records are keyed by the height they were opened at and the operator they batch.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    /// Height the record was opened at.
    pub height: BlockHeight,

    /// The operator.
    pub operator: Address,
}

impl RecordKey {
    /// Creates a record key.
    pub const fn new(height: BlockHeight, operator: Address) -> Self {
        Self { height, operator }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.operator, self.height)
    }
}

/// Where a record is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordStatus {
    /// Still collecting amounts in the block it was opened.
    Pending,

    /// Packets sent, waiting for acknowledgements.
    Processing,
}

/// The state of one consumer's leg of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LegState {
    /// Packet sent, waiting on the acknowledgement of this packet.
    Sent(PacketKey),

    /// Acknowledged successfully.
    Resolved,

    /// Never sent, rejected or timed out. The record can no longer finalize.
    Failed(String),
}

/// The legs of a record, one per served consumer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Legs(BTreeMap<ChainId, LegState>);

impl Legs {
    /// Sets the state of `chain_id`'s leg.
    pub fn set(&mut self, chain_id: ChainId, state: LegState) {
        self.0.insert(chain_id, state);
    }

    /// The state of `chain_id`'s leg.
    pub fn get(&self, chain_id: &ChainId) -> Option<&LegState> {
        self.0.get(chain_id)
    }

    /// Whether there is at least one leg and every leg resolved.
    pub fn all_resolved(&self) -> bool {
        !self.0.is_empty() && self.0.values().all(|leg| *leg == LegState::Resolved)
    }

    /// Whether some leg failed, in which case the record is stuck.
    pub fn any_failed(&self) -> bool {
        self.0.values().any(|leg| matches!(leg, LegState::Failed(_)))
    }

    /// Iterates the legs in chain id order.
    pub fn iter(&self) -> impl Iterator<Item = (&ChainId, &LegState)> {
        self.0.iter()
    }
}

/// Net delegations to an operator in one block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorDelegationRecord {
    /// The operator.
    pub operator: Address,

    /// Total delegated in the block.
    pub amount: Amount,

    /// Lifecycle status.
    pub status: RecordStatus,

    /// Per-consumer progress.
    pub legs: Legs,
}

/// Undelegations from an operator in one block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorUndelegationRecord {
    /// The operator.
    pub operator: Address,

    /// Total undelegated in the block.
    pub amount: Amount,

    /// Lifecycle status.
    pub status: RecordStatus,

    /// Per-consumer progress.
    pub legs: Legs,

    /// The unbonding entries this record will stamp, as `(delegator, entry id)`.
    pub entries: Vec<(Address, u64)>,

    /// Latest completion time acknowledged so far.
    pub completion_time: Option<Timestamp>,
}

impl OperatorUndelegationRecord {
    /// Folds in a consumer's completion time, keeping the latest.
    pub fn observe_completion(&mut self, completion: Timestamp) {
        self.completion_time = Some(match self.completion_time {
            Some(current) => current.max(completion),
            None => completion,
        });
    }
}

#[cfg(test)]
mod tests {
    use ethnum::U256;
    use restaking_primitives::types::ChannelEnd;

    use super::*;

    #[test]
    fn legs_and_join() {
        let mut legs = Legs::default();
        assert!(!legs.all_resolved());

        let key = PacketKey::new(ChannelEnd::new("channel-0", "restaking"), 1);
        legs.set("osmo".into(), LegState::Sent(key));
        legs.set("juno".into(), LegState::Resolved);
        assert!(!legs.all_resolved());

        legs.set("osmo".into(), LegState::Resolved);
        assert!(legs.all_resolved());

        legs.set("juno".into(), LegState::Failed("timeout".into()));
        assert!(!legs.all_resolved());
        assert!(legs.any_failed());
    }

    #[test]
    fn completion_time_keeps_the_max() {
        let mut record = OperatorUndelegationRecord {
            operator: "op".into(),
            amount: U256::new(5),
            status: RecordStatus::Processing,
            legs: Legs::default(),
            entries: vec![],
            completion_time: None,
        };

        record.observe_completion(30);
        record.observe_completion(10);
        assert_eq!(record.completion_time, Some(30));
        record.observe_completion(40);
        assert_eq!(record.completion_time, Some(40));
    }
}

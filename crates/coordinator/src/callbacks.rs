//! Correlates outbound packets with what the coordinator must do when they are acknowledged.

use std::{collections::BTreeMap, fmt};

use restaking_primitives::types::{Address, ChainId, Denom, PacketKey};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{
    errors::{CoordinatorError, CoordinatorResult},
    records::RecordKey,
};

/// The continuation attached to an outbound packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Callback {
    /// A delegate packet of `record` sent to `chain_id`.
    Delegate {
        /// The delegation record.
        record: RecordKey,

        /// The leg.
        chain_id: ChainId,
    },

    /// An undelegate packet of `record` sent to `chain_id`.
    Undelegate {
        /// The undelegation record.
        record: RecordKey,

        /// The leg.
        chain_id: ChainId,
    },

    /// A withdraw-reward packet of `operator`'s current round.
    WithdrawReward {
        /// The operator whose round this belongs to.
        operator: Address,

        /// The consumer asked.
        chain_id: ChainId,

        /// The denomination asked for.
        denom: Denom,
    },
}

impl fmt::Display for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callback::Delegate { record, chain_id } => write!(f, "Delegate({record} on {chain_id})"),
            Callback::Undelegate { record, chain_id } => {
                write!(f, "Undelegate({record} on {chain_id})")
            }
            Callback::WithdrawReward {
                operator,
                chain_id,
                denom,
            } => write!(f, "WithdrawReward({denom} of {operator} on {chain_id})"),
        }
    }
}

/// Pending callbacks keyed by the packet they wait on. A callback is consumed when read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackRegistry(BTreeMap<PacketKey, Callback>);

impl CallbackRegistry {
    /// Attaches `callback` to `key`.
    pub fn register(&mut self, key: PacketKey, callback: Callback) -> CoordinatorResult<()> {
        if self.0.contains_key(&key) {
            return Err(CoordinatorError::DuplicateCallback(key));
        }

        trace!(%key, %callback, "registered callback");
        self.0.insert(key, callback);

        Ok(())
    }

    /// Removes and returns the callback attached to `key`.
    pub fn resolve(&mut self, key: &PacketKey) -> Option<Callback> {
        self.0.remove(key)
    }

    /// Number of packets still waiting on an acknowledgement.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no packet is waiting on an acknowledgement.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use restaking_primitives::types::ChannelEnd;

    use super::*;

    #[test]
    fn callbacks_resolve_once() {
        let mut registry = CallbackRegistry::default();
        let key = PacketKey::new(ChannelEnd::new("channel-0", "restaking"), 3);
        let callback = Callback::Delegate {
            record: RecordKey::new(10, "op".into()),
            chain_id: "osmo".into(),
        };

        registry.register(key.clone(), callback.clone()).unwrap();
        assert_eq!(
            registry.register(key.clone(), callback.clone()),
            Err(CoordinatorError::DuplicateCallback(key.clone()))
        );

        assert_eq!(registry.resolve(&key), Some(callback));
        assert_eq!(registry.resolve(&key), None);
        assert!(registry.is_empty());
    }
}

//! Native stake leaving agents. Unbonded tokens come back to the agent account once the staking
//! module releases them and are burned, since the collateral they stood for lives on the
//! coordinator.

use restaking_primitives::{
    block::BlockCtx,
    coin::Coin,
    types::{Address, Timestamp},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{agent::AgentKey, host::ConsumerHost, ledger::ConsumerLedger};

/// Why stake left an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnbondingCause {
    /// The coordinator undelegated it.
    Undelegate,

    /// The operator was slashed on another consumer.
    Slash,
}

/// Native stake waiting to be released and burned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalUnbonding {
    /// Id.
    pub id: u64,

    /// Agent the stake left.
    pub agent: AgentKey,

    /// Operator whose claim shrank.
    pub operator: Address,

    /// Native stake unbonded.
    pub native: Coin,

    /// When the staking module releases it.
    pub completion: Timestamp,

    /// Why.
    pub cause: UnbondingCause,
}

impl ConsumerLedger {
    /// Records native stake unbonding from `agent` and returns the entry id.
    pub(crate) fn schedule_unbonding(
        &mut self,
        agent: AgentKey,
        operator: Address,
        native: Coin,
        completion: Timestamp,
        cause: UnbondingCause,
    ) -> u64 {
        let id = self.next_unbonding_id;
        self.next_unbonding_id += 1;

        self.unbonding_queue.insert(completion, id);
        self.unbondings.insert(
            id,
            LocalUnbonding {
                id,
                agent,
                operator,
                native,
                completion,
                cause,
            },
        );

        id
    }

    /// Burns matured unbondings. An unbonding whose tokens have not come back yet stays queued
    /// and is retried next block.
    pub fn end_block(&mut self, ctx: &BlockCtx, host: &mut impl ConsumerHost) {
        for id in self.unbonding_queue.dequeue_matured(ctx.time) {
            let Some(entry) = self.unbondings.get(&id) else {
                continue;
            };

            if entry.native.is_zero() {
                self.unbondings.remove(&id);
                continue;
            }

            match host.burn(&entry.agent.address(), &entry.native) {
                Ok(()) => {
                    info!(entry = id, agent = %entry.agent, native = %entry.native, cause = ?entry.cause, "burned unbonded stake");
                    self.unbondings.remove(&id);
                }
                Err(e) => {
                    warn!(entry = id, agent = %entry.agent, %e, "unbonded stake not released yet");
                    self.unbonding_queue.insert(entry.completion, id);
                }
            }
        }
    }
}

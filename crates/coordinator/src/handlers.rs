//! Inbound packets, acknowledgements and timeouts.

use restaking_primitives::{
    block::BlockCtx,
    interfaces::{Bank, Messenger},
    packets::{AckPayload, Acknowledgement, Packet},
    types::{ChainId, ChannelEnd, PacketKey},
};
use tracing::{debug, error, info, warn};

use crate::{
    callbacks::Callback,
    errors::{CoordinatorError, CoordinatorResult},
    ledger::CoordinatorLedger,
    records::{LegState, RecordKey},
};

impl CoordinatorLedger {
    /// Handles a packet a consumer sent to the coordinator-side end `end`.
    pub fn on_receive(
        &mut self,
        ctx: &BlockCtx,
        bank: &mut impl Bank,
        messenger: &mut impl Messenger,
        end: &ChannelEnd,
        packet: Packet,
    ) -> Acknowledgement {
        debug!(%end, %packet, "received packet");

        match self.handle_packet(ctx, bank, messenger, end, packet) {
            Ok(ack) => ack,
            Err(e) => {
                warn!(%end, %e, "rejected packet");
                Acknowledgement::error(e)
            }
        }
    }

    fn handle_packet(
        &mut self,
        ctx: &BlockCtx,
        bank: &mut impl Bank,
        messenger: &mut impl Messenger,
        end: &ChannelEnd,
        packet: Packet,
    ) -> CoordinatorResult<Acknowledgement> {
        let chain_id = self
            .consumers
            .by_end(end)
            .map(|c| c.info.chain_id.clone())
            .ok_or_else(|| CoordinatorError::UnknownChannel(end.clone()))?;

        match packet {
            Packet::ValidatorSetChange(change) => {
                self.consumers.apply_validator_updates(&chain_id, &change)?;
                Ok(Acknowledgement::empty())
            }
            Packet::ConsumerSlash(notice) => {
                self.apply_slash(
                    ctx,
                    bank,
                    messenger,
                    &notice.operator,
                    notice.slash_fraction,
                    Some(&chain_id),
                )?;
                Ok(Acknowledgement::empty())
            }
            other => Err(CoordinatorError::UnexpectedPacket(other.to_string())),
        }
    }

    /// Handles the acknowledgement of a packet the coordinator sent.
    pub fn on_acknowledgement(
        &mut self,
        bank: &mut impl Bank,
        key: &PacketKey,
        ack: Acknowledgement,
    ) {
        let Some(callback) = self.callbacks.resolve(key) else {
            debug!(%key, %ack, "no callback registered");
            return;
        };

        debug!(%key, %callback, %ack, "resolving callback");

        match callback {
            Callback::Delegate { record, chain_id } => {
                self.on_delegate_ack(&record, &chain_id, ack);
            }
            Callback::Undelegate { record, chain_id } => {
                self.on_undelegate_ack(&record, &chain_id, ack);
            }
            Callback::WithdrawReward {
                operator,
                chain_id,
                denom,
            } => {
                self.on_withdraw_reward_ack(bank, &operator, &chain_id, &denom, ack);
            }
        }
    }

    /// Handles a packet that timed out. Treated as an error acknowledgement.
    pub fn on_timeout(&mut self, bank: &mut impl Bank, key: &PacketKey) {
        warn!(%key, "packet timed out");
        self.on_acknowledgement(bank, key, Acknowledgement::Error("packet timed out".to_owned()));
    }

    fn on_delegate_ack(&mut self, key: &RecordKey, chain_id: &ChainId, ack: Acknowledgement) {
        let Some(record) = self.delegation_records.get_mut(key) else {
            warn!(record = %key, %chain_id, "delegate ack for unknown record");
            return;
        };

        match ack {
            Acknowledgement::Success(_) => record.legs.set(chain_id.clone(), LegState::Resolved),
            Acknowledgement::Error(reason) => {
                error!(record = %key, %chain_id, %reason, "consumer rejected delegation");
                record.legs.set(chain_id.clone(), LegState::Failed(reason));
                return;
            }
        }

        if !record.legs.all_resolved() {
            return;
        }

        let Some(record) = self.delegation_records.remove(key) else {
            return;
        };
        let op = self.operator_mut(&record.operator);
        op.restaked_amount += record.amount;
        op.pending_delegation -= record.amount;

        info!(record = %key, amount = %record.amount, restaked = %op.restaked_amount, "delegation record finalized");
    }

    fn on_undelegate_ack(&mut self, key: &RecordKey, chain_id: &ChainId, ack: Acknowledgement) {
        let Some(record) = self.undelegation_records.get_mut(key) else {
            warn!(record = %key, %chain_id, "undelegate ack for unknown record");
            return;
        };

        match ack {
            Acknowledgement::Success(AckPayload::Undelegate(ack)) => {
                record.observe_completion(ack.completion_time_unix_nano);
                record.legs.set(chain_id.clone(), LegState::Resolved);
            }
            Acknowledgement::Success(payload) => {
                error!(record = %key, %chain_id, ?payload, "undelegate ack without a completion time");
                record
                    .legs
                    .set(chain_id.clone(), LegState::Failed("missing completion time".to_owned()));
                return;
            }
            Acknowledgement::Error(reason) => {
                error!(record = %key, %chain_id, %reason, "consumer rejected undelegation");
                record.legs.set(chain_id.clone(), LegState::Failed(reason));
                return;
            }
        }

        if !record.legs.all_resolved() {
            return;
        }

        let Some(record) = self.undelegation_records.remove(key) else {
            return;
        };
        let completion = record
            .completion_time
            .expect("every resolved undelegate leg carries a completion time");
        self.schedule_unbondings(&record.operator, &record.entries, completion);

        let op = self.operator_mut(&record.operator);
        if op.restaked_amount < record.amount {
            warn!(
                record = %key,
                restaked = %op.restaked_amount,
                amount = %record.amount,
                "undelegation exceeds acknowledged stake, clamping"
            );
        }
        op.restaked_amount = op.restaked_amount.saturating_sub(record.amount);
        op.pending_undelegation -= record.amount;

        info!(record = %key, amount = %record.amount, completion, "undelegation record finalized");
    }
}

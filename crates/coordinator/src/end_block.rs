//! End-of-block processing.

use ethnum::U256;
use restaking_primitives::{
    block::BlockCtx,
    coin::Coin,
    interfaces::{Bank, Messenger},
    packets::{DelegatePacket, Packet, UndelegatePacket},
    types::{Address, ChainId, PacketKey, ValidatorId},
};
use tracing::{debug, warn};

use crate::{
    callbacks::Callback,
    ledger::CoordinatorLedger,
    records::{LegState, Legs, RecordKey, RecordStatus},
};

/// Which kind of record a sweep is sending.
#[derive(Debug, Clone, Copy)]
enum Direction {
    Delegate,
    Undelegate,
}

impl CoordinatorLedger {
    /// Runs the end-of-block work: mirrors this block's delegation changes on the consumers,
    /// pays matured unbondings and starts due reward rounds.
    pub fn end_block(
        &mut self,
        ctx: &BlockCtx,
        bank: &mut impl Bank,
        messenger: &mut impl Messenger,
    ) {
        let pending: Vec<_> = self
            .delegation_records
            .iter()
            .filter(|(_, r)| r.status == RecordStatus::Pending)
            .map(|(k, r)| (k.clone(), r.amount))
            .collect();
        for (key, amount) in pending {
            let legs = self.send_legs(ctx, messenger, &key, amount, Direction::Delegate);
            if let Some(record) = self.delegation_records.get_mut(&key) {
                record.status = RecordStatus::Processing;
                record.legs = legs;
            }
        }

        let pending: Vec<_> = self
            .undelegation_records
            .iter()
            .filter(|(_, r)| r.status == RecordStatus::Pending)
            .map(|(k, r)| (k.clone(), r.amount))
            .collect();
        for (key, amount) in pending {
            let legs = self.send_legs(ctx, messenger, &key, amount, Direction::Undelegate);
            if let Some(record) = self.undelegation_records.get_mut(&key) {
                record.status = RecordStatus::Processing;
                record.legs = legs;
            }
        }

        self.pay_matured_unbondings(ctx, bank);
        self.start_reward_rounds(ctx, messenger);
    }

    /// Sends one packet per consumer the record's operator serves and registers the callbacks.
    fn send_legs(
        &mut self,
        ctx: &BlockCtx,
        messenger: &mut impl Messenger,
        key: &RecordKey,
        amount: U256,
        direction: Direction,
    ) -> Legs {
        let timeout = ctx.after(self.params.packet_timeout);
        let op = &self.operators[&key.operator];
        let coin = Coin::new(op.restaking_denom.clone(), amount);
        let mut legs = Legs::default();

        for served in &op.operated_validators {
            let chain_id = served.chain_id.clone();
            let Some(consumer) = self.consumers.get(&chain_id) else {
                warn!(record = %key, %chain_id, "consumer not registered, record cannot finalize");
                legs.set(chain_id, LegState::Failed("unknown consumer".to_owned()));
                continue;
            };

            let (packet, callback) = build_leg(
                direction,
                &key.operator,
                served.validator.clone(),
                coin.clone(),
                key.clone(),
                chain_id.clone(),
            );

            match messenger.send(&consumer.info.end, packet, timeout) {
                Ok(sequence) => {
                    let packet_key = PacketKey::new(consumer.info.end.clone(), sequence);
                    self.callbacks
                        .register(packet_key.clone(), callback)
                        .expect("messenger must never reuse a sequence");
                    debug!(record = %key, %chain_id, %packet_key, ?direction, "sent leg");
                    legs.set(chain_id, LegState::Sent(packet_key));
                }
                Err(e) => {
                    warn!(record = %key, %chain_id, %e, "send failed, record cannot finalize");
                    legs.set(chain_id, LegState::Failed(e.to_string()));
                }
            }
        }

        legs
    }
}

fn build_leg(
    direction: Direction,
    operator: &Address,
    validator: ValidatorId,
    amount: Coin,
    record: RecordKey,
    chain_id: ChainId,
) -> (Packet, Callback) {
    match direction {
        Direction::Delegate => (
            Packet::Delegate(DelegatePacket {
                operator: operator.clone(),
                validator,
                amount,
            }),
            Callback::Delegate { record, chain_id },
        ),
        Direction::Undelegate => (
            Packet::Undelegate(UndelegatePacket {
                operator: operator.clone(),
                validator,
                amount,
            }),
            Callback::Undelegate { record, chain_id },
        ),
    }
}

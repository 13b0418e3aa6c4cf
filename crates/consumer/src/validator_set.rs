//! Reporting the local validator set to the coordinator.

use restaking_primitives::{
    block::BlockCtx,
    interfaces::Messenger,
    packets::{Packet, ValidatorSetChangePacket, ValidatorUpdate},
    types::Sequence,
};
use tracing::info;

use crate::{errors::ConsumerResult, ledger::ConsumerLedger};

impl ConsumerLedger {
    /// Sends validator set changes to the coordinator. Each report carries the next update
    /// sequence id so the coordinator can drop stale ones. Returns the packet sequence.
    pub fn report_validator_updates(
        &mut self,
        ctx: &BlockCtx,
        messenger: &mut impl Messenger,
        updates: Vec<ValidatorUpdate>,
    ) -> ConsumerResult<Sequence> {
        let update_sequence_id = self.next_update_id;
        let count = updates.len();
        let packet = Packet::ValidatorSetChange(ValidatorSetChangePacket {
            updates,
            update_sequence_id,
        });

        let sequence = messenger.send(
            &self.params.coordinator,
            packet,
            ctx.after(self.params.packet_timeout),
        )?;
        self.next_update_id += 1;

        info!(update_sequence_id, count, sequence, "reported validator set changes");

        Ok(sequence)
    }

    /// Sequence id of the next validator set report.
    pub const fn next_update_id(&self) -> u64 {
        self.next_update_id
    }
}

//! Slashes in both directions: a local validator misbehaving, and an operator slashed on another
//! consumer.

use std::collections::BTreeSet;

use ethnum::U256;
use restaking_primitives::{
    block::BlockCtx,
    coin::Coin,
    decimal::Decimal,
    interfaces::Messenger,
    packets::{ConsumerSlashNotice, Packet, SlashPacket},
    types::{Address, ValidatorId},
};
use tracing::{info, warn};

use crate::{
    agent::AgentKey,
    errors::{ConsumerError, ConsumerResult},
    host::ConsumerHost,
    ledger::ConsumerLedger,
    unbonding::UnbondingCause,
};

impl ConsumerLedger {
    /// Hook for the staking module slashing `validator` by `fraction`. Every agent bonded to it
    /// loses the same fraction of its stake, and the coordinator is told about each operator
    /// holding a share of those agents. Returns the operators reported.
    pub fn on_validator_slashed(
        &mut self,
        ctx: &BlockCtx,
        messenger: &mut impl Messenger,
        validator: &ValidatorId,
        fraction: Decimal,
    ) -> ConsumerResult<Vec<Address>> {
        if fraction > Decimal::ONE {
            return Err(ConsumerError::InvalidSlashFraction(fraction));
        }

        let mut operators = BTreeSet::new();
        for agent in self
            .agents
            .values_mut()
            .filter(|agent| &agent.key.validator == validator)
        {
            let native = fraction.mul_floor(agent.native_staked);
            agent.native_staked -= native;
            let slashed = agent
                .pool
                .apply_slash(fraction.mul_floor(agent.pool.total_staked()));

            info!(agent = %agent.key, %fraction, %native, %slashed, "agent slashed with its validator");
            operators.extend(agent.pool.holders().map(|(holder, _)| holder.clone()));
        }

        let timeout = ctx.after(self.params.packet_timeout);
        let mut reported = Vec::with_capacity(operators.len());
        for operator in operators {
            let notice = Packet::ConsumerSlash(ConsumerSlashNotice {
                operator: operator.clone(),
                slash_fraction: fraction,
            });
            match messenger.send(&self.params.coordinator, notice, timeout) {
                Ok(sequence) => {
                    info!(%operator, %validator, %fraction, sequence, "reported operator slash");
                    reported.push(operator);
                }
                Err(e) => warn!(%operator, %validator, %e, "could not report operator slash"),
            }
        }

        Ok(reported)
    }

    /// Takes the slashed amount out of the operator's holding and unbonds the native stake behind
    /// it, which is burned once released. The operator loses at most what it holds here.
    pub(crate) fn handle_slash(
        &mut self,
        ctx: &BlockCtx,
        host: &mut impl ConsumerHost,
        packet: SlashPacket,
    ) -> ConsumerResult<()> {
        let SlashPacket {
            operator,
            validator,
            amount,
        } = packet;
        let key = AgentKey::new(amount.denom.clone(), validator);

        let (shares, native) = {
            let agent = self
                .agents
                .get(&key)
                .ok_or_else(|| ConsumerError::NotExistedAgent(key.clone()))?;

            let held = agent.pool.value_of(&operator);
            let taken = amount.amount.min(held);
            if taken == U256::ZERO {
                info!(agent = %key, %operator, %amount, "nothing left to slash");
                return Ok(());
            }

            let (shares, withdrawn) = agent.preview_release(&operator, taken)?;
            (
                shares,
                Coin::new(host.bond_denom(), agent.native_for(withdrawn)),
            )
        };

        let completion = self.unbond(ctx, host, &key, &operator, shares, &native)?;
        let id = self.schedule_unbonding(
            key.clone(),
            operator.clone(),
            native.clone(),
            completion,
            UnbondingCause::Slash,
        );

        info!(agent = %key, %operator, %amount, %native, entry = id, "applied coordinator slash");

        Ok(())
    }
}

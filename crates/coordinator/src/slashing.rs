//! Slashing operators and propagating the slash to the other consumers.

use ethnum::U256;
use restaking_primitives::{
    block::BlockCtx,
    coin::{Amount, Coin},
    decimal::Decimal,
    interfaces::{Bank, Messenger},
    packets::{Packet, SlashPacket},
    types::{Address, ChainId},
};
use tracing::{info, warn};

use crate::{
    errors::{CoordinatorError, CoordinatorResult},
    ledger::CoordinatorLedger,
};

impl CoordinatorLedger {
    /// Slashes `fraction` of `operator`'s stake and tells every consumer it serves. Returns the
    /// amount burned.
    pub fn slash_operator(
        &mut self,
        ctx: &BlockCtx,
        bank: &mut impl Bank,
        messenger: &mut impl Messenger,
        operator: &Address,
        fraction: Decimal,
    ) -> CoordinatorResult<Amount> {
        self.apply_slash(ctx, bank, messenger, operator, fraction, None)
    }

    /// Burns `floor(fraction * slashable stake)` from the operator's custody and forwards a
    /// [`SlashPacket`] to every served consumer except `origin`, which already applied it.
    pub(crate) fn apply_slash(
        &mut self,
        ctx: &BlockCtx,
        bank: &mut impl Bank,
        messenger: &mut impl Messenger,
        operator: &Address,
        fraction: Decimal,
        origin: Option<&ChainId>,
    ) -> CoordinatorResult<Amount> {
        if fraction > Decimal::ONE {
            return Err(CoordinatorError::InvalidSlashFraction(fraction));
        }

        let op = self
            .operators
            .get(operator)
            .ok_or_else(|| CoordinatorError::UnknownOperator(operator.clone()))?;
        if let Some(chain_id) = origin {
            if !op.serves(chain_id) {
                return Err(CoordinatorError::NotServed {
                    operator: operator.clone(),
                    chain_id: chain_id.clone(),
                });
            }
        }

        let slashed = fraction.mul_floor(op.slashable_stake());
        if slashed == U256::ZERO {
            info!(%operator, %fraction, "nothing to slash");
            return Ok(U256::ZERO);
        }

        let coin = Coin::new(op.restaking_denom.clone(), slashed);
        bank.burn(operator, &coin)?;

        let timeout = ctx.after(self.params.packet_timeout);
        let op = self.operator_mut(operator);
        op.restaked_amount -= slashed;
        let targets: Vec<_> = op
            .operated_validators
            .iter()
            .filter(|served| Some(&served.chain_id) != origin)
            .cloned()
            .collect();

        info!(%operator, %fraction, %coin, origin = ?origin, height = ctx.height, "slashed operator");

        for served in targets {
            let Some(consumer) = self.consumers.get(&served.chain_id) else {
                warn!(%operator, chain_id = %served.chain_id, "cannot forward slash to unknown consumer");
                continue;
            };

            let packet = Packet::Slash(SlashPacket {
                operator: operator.clone(),
                validator: served.validator,
                amount: coin.clone(),
            });
            if let Err(e) = messenger.send(&consumer.info.end, packet, timeout) {
                warn!(%operator, chain_id = %served.chain_id, %e, "could not forward slash");
            }
        }

        Ok(slashed)
    }
}

//! Packets from the coordinator and acknowledgements of what the consumer sent.

use ethnum::U256;
use restaking_primitives::{
    block::BlockCtx,
    coin::{Coin, Shares},
    packets::{
        AckPayload, Acknowledgement, DelegatePacket, Packet, UndelegateAck, UndelegatePacket,
        WithdrawRewardAck, WithdrawRewardPacket,
    },
    types::{Address, ChannelEnd, PacketKey, Timestamp},
};
use tracing::{debug, error, info, warn};

use crate::{
    agent::{reward_collector, Agent, AgentKey},
    errors::{ConsumerError, ConsumerResult},
    host::ConsumerHost,
    ledger::ConsumerLedger,
    unbonding::UnbondingCause,
};

impl ConsumerLedger {
    /// Handles a packet the coordinator sent to the local end `end`.
    pub fn on_receive(
        &mut self,
        ctx: &BlockCtx,
        host: &mut impl ConsumerHost,
        end: &ChannelEnd,
        packet: Packet,
    ) -> Acknowledgement {
        debug!(%end, %packet, "received packet");

        match self.handle_packet(ctx, host, end, packet) {
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
        host: &mut impl ConsumerHost,
        end: &ChannelEnd,
        packet: Packet,
    ) -> ConsumerResult<Acknowledgement> {
        if end != &self.params.coordinator {
            return Err(ConsumerError::WrongChannel(end.clone()));
        }

        match packet {
            Packet::Delegate(p) => {
                self.handle_delegate(host, p)?;
                Ok(Acknowledgement::empty())
            }
            Packet::Undelegate(p) => {
                let completion = self.handle_undelegate(ctx, host, p)?;
                Ok(Acknowledgement::Success(AckPayload::Undelegate(
                    UndelegateAck {
                        completion_time_unix_nano: completion,
                    },
                )))
            }
            Packet::Slash(p) => {
                self.handle_slash(ctx, host, p)?;
                Ok(Acknowledgement::empty())
            }
            Packet::WithdrawReward(p) => {
                let ack = self.handle_withdraw_reward(ctx, host, p)?;
                Ok(Acknowledgement::Success(AckPayload::WithdrawReward(ack)))
            }
            other => Err(ConsumerError::UnexpectedPacket(other.to_string())),
        }
    }

    /// Handles the acknowledgement of a packet the consumer sent. The coordinator never answers
    /// with anything the consumer acts on, so this only reports failures.
    pub fn on_acknowledgement(&mut self, key: &PacketKey, ack: Acknowledgement) {
        match ack {
            Acknowledgement::Success(_) => debug!(%key, "coordinator accepted packet"),
            Acknowledgement::Error(reason) => error!(%key, %reason, "coordinator rejected packet"),
        }
    }

    /// Handles a packet to the coordinator that timed out.
    pub fn on_timeout(&mut self, key: &PacketKey) {
        error!(%key, "packet to the coordinator timed out");
    }

    /// Bonds the native equivalent of the restaked amount and credits the operator with agent
    /// shares.
    fn handle_delegate(
        &mut self,
        host: &mut impl ConsumerHost,
        packet: DelegatePacket,
    ) -> ConsumerResult<()> {
        let DelegatePacket {
            operator,
            validator,
            amount,
        } = packet;
        if amount.is_zero() {
            return Err(ConsumerError::ZeroAmount);
        }
        if host.validator(&validator).is_none() {
            return Err(ConsumerError::UnknownValidator(validator));
        }

        let native = host
            .native_equivalent(&amount)
            .ok_or_else(|| ConsumerError::NoPrice(amount.denom.clone()))?;
        if native.is_zero() {
            return Err(ConsumerError::NothingToBond(amount));
        }

        let key = AgentKey::new(amount.denom.clone(), validator.clone());
        if let Some(agent) = self.agents.get_mut(&key) {
            agent.pool.preview_deposit(amount.amount)?;
            collect_rewards(host, agent)?;
        }

        let address = key.address();
        host.mint(&address, &native)?;
        if let Err(e) = host.delegate(&address, &validator, native.amount) {
            host.burn(&address, &native)?;
            return Err(e.into());
        }

        let agent = self
            .agents
            .entry(key)
            .or_insert_with_key(|key| Agent::new(key.clone()));
        agent.settle(&operator);
        let shares = agent.pool.deposit(operator.clone(), amount.amount)?;
        agent.native_staked += native.amount;

        info!(agent = %agent.key, %operator, %amount, %native, %shares, "operator delegated");

        Ok(())
    }

    /// Unbonds the native stake behind `amount` of the operator's holding. Returns when the
    /// unbonding completes.
    fn handle_undelegate(
        &mut self,
        ctx: &BlockCtx,
        host: &mut impl ConsumerHost,
        packet: UndelegatePacket,
    ) -> ConsumerResult<Timestamp> {
        let UndelegatePacket {
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
            let (shares, withdrawn) = agent.preview_release(&operator, amount.amount)?;
            if withdrawn < amount.amount {
                debug!(agent = %key, %operator, %amount, %withdrawn, "undelegation capped at holding");
            }
            (shares, Coin::new(host.bond_denom(), agent.native_for(withdrawn)))
        };

        let completion = self.unbond(ctx, host, &key, &operator, shares, &native)?;
        let id = self.schedule_unbonding(
            key.clone(),
            operator.clone(),
            native.clone(),
            completion,
            UnbondingCause::Undelegate,
        );

        info!(agent = %key, %operator, %amount, %native, entry = id, completion, "operator undelegated");

        Ok(completion)
    }

    /// Unbonds `native` from the agent and burns `operator`'s `shares`. Returns the completion
    /// time.
    pub(crate) fn unbond(
        &mut self,
        ctx: &BlockCtx,
        host: &mut impl ConsumerHost,
        key: &AgentKey,
        operator: &Address,
        shares: Shares,
        native: &Coin,
    ) -> ConsumerResult<Timestamp> {
        let agent = self
            .agents
            .get_mut(key)
            .unwrap_or_else(|| panic!("agent {key} must exist"));
        collect_rewards(host, agent)?;

        if !native.is_zero() {
            host.undelegate(&agent.address, &key.validator, native.amount)?;
        }

        agent.settle(operator);
        agent.pool.withdraw(operator, shares)?;
        agent.native_staked -= native.amount;

        Ok(ctx.after(host.unbonding_duration()))
    }

    /// Sends `operator`'s accrued rewards of one denomination to its coordinator account.
    fn handle_withdraw_reward(
        &mut self,
        ctx: &BlockCtx,
        host: &mut impl ConsumerHost,
        packet: WithdrawRewardPacket,
    ) -> ConsumerResult<WithdrawRewardAck> {
        let WithdrawRewardPacket {
            operator,
            validator,
            reward_denom,
        } = packet;
        let collector = reward_collector();

        let mut taken = Vec::new();
        for agent in self
            .agents
            .values_mut()
            .filter(|agent| agent.key.validator == validator)
        {
            collect_rewards(host, agent)?;
            agent.settle(&operator);
            let owed = agent.take_accrued(&operator, &reward_denom);
            if owed == U256::ZERO {
                continue;
            }

            host.transfer(
                &agent.address,
                &collector,
                &Coin::new(reward_denom.clone(), owed),
            )?;
            taken.push((agent.key.clone(), owed));
        }

        let total = taken
            .iter()
            .fold(U256::ZERO, |acc, (_, owed)| acc + *owed);
        let balance = Coin::new(reward_denom.clone(), total);
        let transfer_end = self.params.transfer.clone();

        if balance.is_zero() {
            debug!(%operator, %validator, %reward_denom, "no rewards to send");
            return Ok(WithdrawRewardAck {
                transfer_channel: transfer_end.channel,
                transfer_port: transfer_end.port,
                transfer_sequence: None,
                balance,
            });
        }

        let timeout = ctx.after(self.params.packet_timeout);
        match host.send_transfer(&transfer_end, &collector, &operator, &balance, timeout) {
            Ok(sequence) => {
                info!(%operator, %validator, %balance, sequence, "sent operator rewards");
                Ok(WithdrawRewardAck {
                    transfer_channel: transfer_end.channel,
                    transfer_port: transfer_end.port,
                    transfer_sequence: Some(sequence),
                    balance,
                })
            }
            Err(e) => {
                for (key, owed) in taken {
                    let agent = self
                        .agents
                        .get_mut(&key)
                        .unwrap_or_else(|| panic!("agent {key} must exist"));
                    host.transfer(
                        &collector,
                        &agent.address,
                        &Coin::new(reward_denom.clone(), owed),
                    )?;
                    agent.restore_accrued(&operator, &reward_denom, owed);
                }
                Err(e.into())
            }
        }
    }
}

/// Withdraws the agent's staking rewards and credits them to its reward index.
pub(crate) fn collect_rewards(
    host: &mut impl ConsumerHost,
    agent: &mut Agent,
) -> ConsumerResult<()> {
    if agent.native_staked == U256::ZERO {
        return Ok(());
    }

    let rewards = host.withdraw_rewards(&agent.address, &agent.key.validator)?;
    agent.credit_rewards(&rewards);

    Ok(())
}

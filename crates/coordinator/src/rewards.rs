//! Reward collection from the consumers and distribution to delegators.
//!
//! Rewards are collected in rounds, one per operator at a time. A round asks every served
//! consumer for every reward denomination it pays; each answer is a leg that moves from
//! `Withdrawing` to `Transferring` once the consumer reports the token transfer, and to
//! `Transferred` once the tokens arrive. When every leg arrived the operator's reward period
//! advances and the cumulative reward-per-share ratios grow by `received / shares`.
//!
//! A delegator is owed `shares * (ratio[last] - ratio[start])` where `start` is the period of
//! their last settlement. Settling before every share change keeps the share count constant over
//! each accrual interval.

use std::collections::{BTreeMap, VecDeque};

use ethnum::U256;
use restaking_primitives::{
    block::BlockCtx,
    coin::{Coin, Coins},
    decimal::Decimal,
    interfaces::{Bank, Messenger},
    packets::{AckPayload, Acknowledgement, Packet, WithdrawRewardPacket},
    types::{Address, ChainId, ChannelEnd, Denom, PacketKey},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::{
    callbacks::Callback,
    errors::{CoordinatorError, CoordinatorResult},
    ledger::CoordinatorLedger,
};

/// Cumulative reward per share, by denomination.
pub type RewardRatios = BTreeMap<Denom, Decimal>;

/// Progress of one leg of a reward round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RewardLegStatus {
    /// Waiting for the consumer to acknowledge the withdraw request.
    Withdrawing,

    /// The consumer sent the tokens; waiting for them to arrive.
    Transferring,

    /// The tokens arrived.
    Transferred,
}

/// One `(consumer, denomination)` leg of a reward round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardLeg {
    /// Progress.
    pub status: RewardLegStatus,

    /// What the consumer reported sending.
    pub balance: Coin,

    /// Why the leg stalled, if it did.
    pub failure: Option<String>,
}

/// An in-flight reward round of one operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorWithdrawRewardRecord {
    /// The operator.
    pub operator: Address,

    /// Height the round started at.
    pub started_at: u64,

    /// Legs keyed by consumer and denomination.
    pub legs: BTreeMap<(ChainId, Denom), RewardLeg>,
}

impl OperatorWithdrawRewardRecord {
    fn is_complete(&self) -> bool {
        self.legs
            .values()
            .all(|leg| leg.status == RewardLegStatus::Transferred)
    }
}

/// Reward bookkeeping of the coordinator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardDistributor {
    historical: BTreeMap<(Address, u64), RewardRatios>,
    starting_periods: BTreeMap<(Address, Address), u64>,
    rounds: BTreeMap<Address, OperatorWithdrawRewardRecord>,
    transfers: BTreeMap<(ChainId, PacketKey), (Address, Denom)>,
    early_transfers: BTreeMap<(ChainId, PacketKey), Coin>,
    queue: VecDeque<Address>,
}

impl RewardDistributor {
    /// Starts tracking a new operator at period 0.
    pub(crate) fn track_operator(&mut self, operator: &Address) {
        self.historical
            .insert((operator.clone(), 0), RewardRatios::new());
        self.queue.push_back(operator.clone());
    }

    pub(crate) fn forget_delegation(&mut self, delegator: &Address, operator: &Address) {
        self.starting_periods
            .remove(&(delegator.clone(), operator.clone()));
    }

    /// Cumulative ratios of `operator` at `period`.
    pub fn cumulative(&self, operator: &Address, period: u64) -> Option<&RewardRatios> {
        self.historical.get(&(operator.clone(), period))
    }

    /// The period `delegator`'s accrual with `operator` starts from.
    pub fn starting_period(&self, delegator: &Address, operator: &Address) -> Option<u64> {
        self.starting_periods
            .get(&(delegator.clone(), operator.clone()))
            .copied()
    }

    /// The in-flight round of `operator`.
    pub fn round(&self, operator: &Address) -> Option<&OperatorWithdrawRewardRecord> {
        self.rounds.get(operator)
    }

    /// Rotates the work queue by `n` and returns the operators rotated.
    fn next_batch(&mut self, n: usize) -> Vec<Address> {
        let mut batch = Vec::with_capacity(n);
        for _ in 0..n.min(self.queue.len()) {
            let Some(operator) = self.queue.pop_front() else {
                break;
            };
            self.queue.push_back(operator.clone());
            batch.push(operator);
        }
        batch
    }
}

impl CoordinatorLedger {
    /// Rewards `delegator` could withdraw from `operator` right now.
    pub fn pending_rewards(&self, delegator: &Address, operator: &Address) -> Coins {
        let shares = self.delegation_shares(delegator, operator);
        let Some(op) = self.operators.get(operator) else {
            return Coins::new();
        };
        let end = op.last_reward_period;
        let start = self
            .rewards
            .starting_period(delegator, operator)
            .unwrap_or(end);
        if start == end || shares == U256::ZERO {
            return Coins::new();
        }

        let ratios_at = |period| {
            self.rewards
                .cumulative(operator, period)
                .unwrap_or_else(|| panic!("reward period {period} of {operator} must be kept"))
        };
        let (start_ratios, end_ratios) = (ratios_at(start), ratios_at(end));

        end_ratios
            .iter()
            .map(|(denom, end_ratio)| {
                let start_ratio = start_ratios.get(denom).copied().unwrap_or_default();
                let diff = end_ratio
                    .checked_sub(start_ratio)
                    .expect("cumulative reward ratios never decrease");
                Coin::new(denom.clone(), diff.mul_floor(shares))
            })
            .collect()
    }

    /// Pays `delegator` everything accrued with `operator`.
    pub fn withdraw_delegator_rewards(
        &mut self,
        bank: &mut impl Bank,
        delegator: &Address,
        operator: &Address,
    ) -> CoordinatorResult<Coins> {
        if !self.operators.contains_key(operator) {
            return Err(CoordinatorError::UnknownOperator(operator.clone()));
        }
        if !self
            .delegations
            .contains_key(&(delegator.clone(), operator.clone()))
        {
            return Err(CoordinatorError::NoDelegation {
                delegator: delegator.clone(),
                operator: operator.clone(),
            });
        }

        Ok(self.settle_rewards(bank, delegator, operator))
    }

    /// Pays out pending rewards and restarts accrual from the operator's latest period.
    pub(crate) fn settle_rewards(
        &mut self,
        bank: &mut impl Bank,
        delegator: &Address,
        operator: &Address,
    ) -> Coins {
        let owed = self.pending_rewards(delegator, operator);
        let op = &self.operators[operator];

        let reward_account = op.reward_account();
        for coin in owed.iter() {
            if let Err(e) = bank.transfer(&reward_account, delegator, &coin) {
                panic!("reward account of {operator} must cover accrued rewards: {e}");
            }
        }
        if !owed.is_empty() {
            info!(%delegator, %operator, rewards = %owed, "paid delegator rewards");
        }

        self.rewards
            .starting_periods
            .insert((delegator.clone(), operator.clone()), op.last_reward_period);

        owed
    }

    /// Starts reward rounds for the next batch of operators if a sweep is due at this height.
    pub(crate) fn start_reward_rounds(&mut self, ctx: &BlockCtx, messenger: &mut impl Messenger) {
        if !self.params.is_reward_height(ctx.height) {
            return;
        }

        let batch_size = self.params.reward_batch_size(self.rewards.queue.len());
        let timeout = ctx.after(self.params.packet_timeout);

        for operator in self.rewards.next_batch(batch_size) {
            if self.rewards.rounds.contains_key(&operator) {
                warn!(%operator, "previous reward round still in flight, skipping");
                continue;
            }

            let op = &self.operators[&operator];
            if op.shares == U256::ZERO {
                debug!(%operator, "no stake, skipping reward round");
                continue;
            }

            let mut legs = BTreeMap::new();
            for served in &op.operated_validators {
                let Some(consumer) = self.consumers.get(&served.chain_id) else {
                    warn!(%operator, chain_id = %served.chain_id, "consumer gone, not collecting rewards");
                    continue;
                };

                for denom in &consumer.info.reward_denoms {
                    let packet = Packet::WithdrawReward(WithdrawRewardPacket {
                        operator: operator.clone(),
                        validator: served.validator.clone(),
                        reward_denom: denom.clone(),
                    });

                    let failure = match messenger.send(&consumer.info.end, packet, timeout) {
                        Ok(sequence) => {
                            let callback = Callback::WithdrawReward {
                                operator: operator.clone(),
                                chain_id: served.chain_id.clone(),
                                denom: denom.clone(),
                            };
                            self.callbacks
                                .register(PacketKey::new(consumer.info.end.clone(), sequence), callback)
                                .expect("messenger must never reuse a sequence");
                            None
                        }
                        Err(e) => {
                            error!(%operator, chain_id = %served.chain_id, %denom, %e, "could not request rewards");
                            Some(e.to_string())
                        }
                    };

                    legs.insert(
                        (served.chain_id.clone(), denom.clone()),
                        RewardLeg {
                            status: RewardLegStatus::Withdrawing,
                            balance: Coin::zero(denom.clone()),
                            failure,
                        },
                    );
                }
            }

            if legs.is_empty() {
                continue;
            }

            debug!(%operator, legs = legs.len(), height = ctx.height, "started reward round");
            self.rewards.rounds.insert(
                operator.clone(),
                OperatorWithdrawRewardRecord {
                    operator,
                    started_at: ctx.height,
                    legs,
                },
            );
        }
    }

    pub(crate) fn on_withdraw_reward_ack(
        &mut self,
        bank: &mut impl Bank,
        operator: &Address,
        chain_id: &ChainId,
        denom: &Denom,
        ack: Acknowledgement,
    ) {
        let leg_key = (chain_id.clone(), denom.clone());
        let Some(leg) = self
            .rewards
            .rounds
            .get_mut(operator)
            .and_then(|round| round.legs.get_mut(&leg_key))
        else {
            warn!(%operator, %chain_id, %denom, "reward ack for unknown round");
            return;
        };

        match ack {
            Acknowledgement::Success(AckPayload::WithdrawReward(ack)) => {
                match ack.transfer_sequence {
                    Some(sequence) if !ack.balance.is_zero() => {
                        let end = ChannelEnd {
                            channel: ack.transfer_channel,
                            port: ack.transfer_port,
                        };
                        let transfer_key = (chain_id.clone(), PacketKey::new(end, sequence));

                        leg.balance = ack.balance;
                        if let Some(arrived) = self.rewards.early_transfers.remove(&transfer_key) {
                            leg.status = RewardLegStatus::Transferred;
                            leg.balance = arrived;
                        } else {
                            leg.status = RewardLegStatus::Transferring;
                            self.rewards
                                .transfers
                                .insert(transfer_key, (operator.clone(), denom.clone()));
                        }
                    }
                    _ => {
                        leg.status = RewardLegStatus::Transferred;
                        leg.balance = Coin::zero(denom.clone());
                    }
                }
            }
            Acknowledgement::Success(payload) => {
                error!(%operator, %chain_id, ?payload, "unexpected withdraw reward ack payload");
                leg.failure = Some("unexpected ack payload".to_owned());
            }
            Acknowledgement::Error(reason) => {
                error!(%operator, %chain_id, %denom, %reason, "reward withdrawal failed");
                leg.failure = Some(reason);
            }
        }

        self.try_complete_round(bank, operator);
    }

    /// Hook for a token transfer arriving from a consumer on the coordinator-side transfer end
    /// `dest`. `source` identifies the transfer on the consumer's side.
    pub fn on_transfer_received(
        &mut self,
        bank: &mut impl Bank,
        dest: &ChannelEnd,
        source: &PacketKey,
        receiver: &Address,
        coin: Coin,
    ) {
        let Some(consumer) = self.consumers.by_transfer_end(dest) else {
            debug!(%dest, "transfer on a channel no consumer uses");
            return;
        };
        let key = (consumer.info.chain_id.clone(), source.clone());

        let Some((operator, denom)) = self.rewards.transfers.remove(&key) else {
            if self.operators.contains_key(receiver) {
                debug!(%source, %receiver, %coin, "reward transfer arrived before its ack");
                self.rewards.early_transfers.insert(key, coin);
            }
            return;
        };

        if let Some(leg) = self
            .rewards
            .rounds
            .get_mut(&operator)
            .and_then(|round| round.legs.get_mut(&(key.0.clone(), denom)))
        {
            leg.status = RewardLegStatus::Transferred;
            leg.balance = coin;
        }

        self.try_complete_round(bank, &operator);
    }

    fn try_complete_round(&mut self, bank: &mut impl Bank, operator: &Address) {
        if !self
            .rewards
            .rounds
            .get(operator)
            .is_some_and(OperatorWithdrawRewardRecord::is_complete)
        {
            return;
        }

        let Some(round) = self.rewards.rounds.remove(operator) else {
            return;
        };
        let rewards: Coins = round.legs.into_values().map(|leg| leg.balance).collect();
        self.on_operator_receive_all_rewards(bank, operator, rewards);
    }

    /// Moves a completed round's rewards to the operator's reward account and opens the next
    /// reward period.
    pub(crate) fn on_operator_receive_all_rewards(
        &mut self,
        bank: &mut impl Bank,
        operator: &Address,
        rewards: Coins,
    ) {
        let op = self.operator_mut(operator);
        let reward_account = op.reward_account();
        let shares = op.shares;
        let last = op.last_reward_period;

        for coin in rewards.iter() {
            if let Err(e) = bank.transfer(operator, &reward_account, &coin) {
                panic!("collected rewards must be in custody of {operator}: {e}");
            }
        }

        let mut ratios = self
            .rewards
            .cumulative(operator, last)
            .cloned()
            .unwrap_or_else(|| panic!("reward period {last} of {operator} must be kept"));

        if shares == U256::ZERO {
            if !rewards.is_empty() {
                warn!(%operator, %rewards, "rewards arrived for an operator without shares");
            }
        } else {
            for coin in rewards.iter() {
                let ratio = Decimal::from_ratio(coin.amount, shares)
                    .expect("reward ratio must fit in 256 bits");
                let entry = ratios.entry(coin.denom.clone()).or_default();
                *entry = entry
                    .checked_add(ratio)
                    .expect("cumulative reward ratio must fit in 256 bits");
            }
        }

        let period = last + 1;
        self.rewards
            .historical
            .insert((operator.clone(), period), ratios);
        self.operator_mut(operator).last_reward_period = period;

        info!(%operator, %rewards, period, "allocated operator rewards");
    }
}

//! The network driver.

use std::{collections::BTreeMap, time::Duration};

use restaking_consumer::{mem::InMemoryHost, ConsumerLedger};
use restaking_coordinator::{
    consumers::ConsumerInfo, operator::RegisterOperator, CoordinatorLedger,
};
use restaking_params::{consumer::ConsumerChainParams, Params};
use restaking_primitives::{
    block::BlockCtx,
    coin::{Amount, Coin, Coins, Shares},
    decimal::Decimal,
    interfaces::Bank,
    mem::{InMemoryBank, Outbox},
    types::{Address, BlockHeight, ChainId, Denom, Timestamp, ValidatorId},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::{
    errors::{HarnessError, HarnessResult},
    genesis::ConsumerGenesis,
    relayer::{RelayStats, Relayer},
};

/// Relay passes after which [`Network::relay`] gives up on reaching a quiet state.
const MAX_RELAY_PASSES: usize = 64;

/// One consumer chain: its ledger and the modules it runs against.
#[derive(Debug, Clone)]
pub struct ConsumerNode {
    /// Wiring to the coordinator.
    pub params: ConsumerChainParams,

    /// The restaking ledger.
    pub ledger: ConsumerLedger,

    /// Bank, staking, prices and token transfer.
    pub host: InMemoryHost,

    /// Packets to the coordinator not relayed yet.
    pub outbox: Outbox,
}

/// Every ledger of the network at one height.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    /// Height the snapshot was taken at.
    pub height: BlockHeight,

    /// The coordinator.
    pub coordinator: CoordinatorLedger,

    /// The consumers by chain id.
    pub consumers: BTreeMap<ChainId, ConsumerLedger>,
}

/// A coordinator and its consumers sharing one block clock.
#[derive(Debug, Clone)]
pub struct Network {
    /// The coordinator ledger.
    pub coordinator: CoordinatorLedger,

    /// Coordinator balances.
    pub bank: InMemoryBank,

    /// Packets the coordinator sent and the relayer has not picked up yet.
    pub outbox: Outbox,

    consumers: BTreeMap<ChainId, ConsumerNode>,
    relayer: Relayer,
    ctx: BlockCtx,
    block_time: Duration,
}

impl Network {
    /// Builds a network from `params`, seeds every consumer with its genesis and relays the
    /// initial validator sets to the coordinator.
    pub fn new(
        params: Params,
        genesis: BTreeMap<ChainId, ConsumerGenesis>,
        genesis_time: Timestamp,
        block_time: Duration,
    ) -> HarnessResult<Self> {
        params.validate()?;

        let ctx = BlockCtx::new(1, genesis_time);
        let mut coordinator = CoordinatorLedger::new(params.coordinator);
        let mut relayer = Relayer::new();
        let mut consumers = BTreeMap::new();

        for chain in params.consumers {
            let chain_id = chain.consumer.chain_id.clone();
            coordinator.add_consumer(ConsumerInfo::from(&chain))?;
            relayer.add_route(chain.coordinator_end.clone(), chain_id.clone());

            let mut host = InMemoryHost::new(
                chain.staking.bond_denom.clone(),
                chain.staking.unbonding_duration,
            );
            host.begin_block(&ctx)?;

            let mut node = ConsumerNode {
                ledger: ConsumerLedger::new(chain.consumer.clone()),
                params: chain,
                host,
                outbox: Outbox::new(),
            };

            let seed = genesis.get(&chain_id).cloned().unwrap_or_default();
            for (denom, price) in seed.prices {
                node.host.set_price(denom, price);
            }
            let updates: Vec<_> = seed
                .validators
                .into_iter()
                .map(|v| node.host.set_validator(v.identity, v.power))
                .collect();
            if !updates.is_empty() {
                node.ledger
                    .report_validator_updates(&ctx, &mut node.outbox, updates)?;
            }

            consumers.insert(chain_id, node);
        }

        let mut network = Self {
            coordinator,
            bank: InMemoryBank::new(),
            outbox: Outbox::new(),
            consumers,
            relayer,
            ctx,
            block_time,
        };
        network.relay();

        info!(consumers = network.consumers.len(), "network ready");

        Ok(network)
    }

    /// The block being executed.
    pub const fn ctx(&self) -> &BlockCtx {
        &self.ctx
    }

    /// The relayer, e.g. to hold a channel.
    pub fn relayer_mut(&mut self) -> &mut Relayer {
        &mut self.relayer
    }

    /// A consumer.
    pub fn consumer(&self, chain_id: &ChainId) -> HarnessResult<&ConsumerNode> {
        self.consumers
            .get(chain_id)
            .ok_or_else(|| HarnessError::UnknownConsumer(chain_id.clone()))
    }

    /// A consumer, mutably.
    pub fn consumer_mut(&mut self, chain_id: &ChainId) -> HarnessResult<&mut ConsumerNode> {
        self.consumers
            .get_mut(chain_id)
            .ok_or_else(|| HarnessError::UnknownConsumer(chain_id.clone()))
    }

    /// Every consumer in chain id order.
    pub fn consumers(&self) -> impl Iterator<Item = (&ChainId, &ConsumerNode)> {
        self.consumers.iter()
    }

    /// Copies every ledger.
    pub fn snapshot(&self) -> NetworkSnapshot {
        NetworkSnapshot {
            height: self.ctx.height,
            coordinator: self.coordinator.clone(),
            consumers: self
                .consumers
                .iter()
                .map(|(chain_id, node)| (chain_id.clone(), node.ledger.clone()))
                .collect(),
        }
    }

    /// Ends the current block on every chain, moves to the next one and relays everything that
    /// was sent.
    pub fn end_block(&mut self) -> RelayStats {
        self.coordinator
            .end_block(&self.ctx, &mut self.bank, &mut self.outbox);
        for node in self.consumers.values_mut() {
            node.ledger.end_block(&self.ctx, &mut node.host);
        }

        self.ctx = self.ctx.next(self.block_time);
        for (chain_id, node) in &mut self.consumers {
            if let Err(e) = node.host.begin_block(&self.ctx) {
                error!(%chain_id, %e, "could not release unbonded stake");
            }
        }

        self.relay()
    }

    /// Ends `blocks` blocks.
    pub fn run_blocks(&mut self, blocks: u64) -> RelayStats {
        let mut stats = RelayStats::default();
        for _ in 0..blocks {
            stats.absorb(self.end_block());
        }
        stats
    }

    /// Ends blocks until the clock reaches `time`.
    pub fn run_until(&mut self, time: Timestamp) -> RelayStats {
        let mut stats = RelayStats::default();
        while self.ctx.time < time {
            stats.absorb(self.end_block());
        }
        stats
    }

    /// Carries packets, acknowledgements and transfers until nothing moves or only held packets
    /// are left.
    pub fn relay(&mut self) -> RelayStats {
        let mut total = RelayStats::default();
        for _ in 0..MAX_RELAY_PASSES {
            let pass = self.relay_once();
            if pass.is_idle() {
                return total;
            }
            total.absorb(pass);
        }

        warn!(passes = MAX_RELAY_PASSES, "relay did not settle");
        total
    }

    fn relay_once(&mut self) -> RelayStats {
        let mut stats = RelayStats::default();
        let ctx = self.ctx;

        let dropped = self.relayer.enqueue(self.outbox.drain());
        if dropped != 0 {
            warn!(dropped, "coordinator sent packets without a route");
        }

        for (chain_id, node) in &mut self.consumers {
            for out in self.relayer.take_deliverable(chain_id) {
                if out.timeout <= ctx.time {
                    debug!(%chain_id, key = %out.key, "packet expired in flight");
                    self.coordinator.on_timeout(&mut self.bank, &out.key);
                    stats.timeouts += 1;
                    continue;
                }

                let end = node.params.consumer.coordinator.clone();
                let ack = node.ledger.on_receive(&ctx, &mut node.host, &end, out.packet);
                self.coordinator
                    .on_acknowledgement(&mut self.bank, &out.key, ack);
                stats.packets += 1;
            }

            let coordinator_end = node.params.coordinator_end.clone();
            for out in node.outbox.drain() {
                if out.timeout <= ctx.time {
                    node.ledger.on_timeout(&out.key);
                    stats.timeouts += 1;
                    continue;
                }

                let ack = self.coordinator.on_receive(
                    &ctx,
                    &mut self.bank,
                    &mut self.outbox,
                    &coordinator_end,
                    out.packet,
                );
                node.ledger.on_acknowledgement(&out.key, ack);
                stats.packets += 1;
            }

            let transfer_end = node.params.coordinator_transfer_end.clone();
            for transfer in node.host.drain_transfers() {
                let delivered = transfer.timeout > ctx.time
                    && match self.bank.mint(&transfer.receiver, &transfer.coin) {
                        Ok(()) => true,
                        Err(e) => {
                            warn!(%chain_id, key = %transfer.key, %e, "could not credit transfer");
                            false
                        }
                    };

                if !delivered {
                    if let Err(e) = node.host.refund(&transfer) {
                        error!(%chain_id, key = %transfer.key, %e, "could not refund transfer");
                    }
                    stats.refunds += 1;
                    continue;
                }

                self.coordinator.on_transfer_received(
                    &mut self.bank,
                    &transfer_end,
                    &transfer.key,
                    &transfer.receiver,
                    transfer.coin.clone(),
                );
                if let Err(e) = node.host.settle(&transfer) {
                    error!(%chain_id, key = %transfer.key, %e, "could not settle transfer");
                }
                stats.transfers += 1;
            }
        }

        stats
    }

    /// Times out every packet queued for `chain_id`, held or not.
    pub fn expire_in_flight(&mut self, chain_id: &ChainId) -> usize {
        let expired = self.relayer.take_all(chain_id);
        for out in &expired {
            self.coordinator.on_timeout(&mut self.bank, &out.key);
        }
        expired.len()
    }

    /// Mints `coin` to `who` on the coordinator.
    pub fn fund(&mut self, who: &Address, coin: &Coin) -> HarnessResult<()> {
        self.bank.mint(who, coin)?;
        Ok(())
    }

    /// What `who` holds of `denom` on the coordinator.
    pub fn balance(&self, who: &Address, denom: &Denom) -> Amount {
        self.bank.balance(who, denom)
    }

    /// Registers an operator running `validators[i]` on `chains[i]`.
    pub fn register_operator(
        &mut self,
        owner: &Address,
        restaking_denom: &Denom,
        served: &[(ChainId, ValidatorId)],
    ) -> HarnessResult<Address> {
        let (consumer_chain_ids, consumer_validators): (Vec<_>, Vec<_>) =
            served.iter().cloned().unzip();
        let address = self.coordinator.register_operator(
            &self.ctx,
            RegisterOperator {
                consumer_chain_ids,
                consumer_validators,
                restaking_denom: restaking_denom.clone(),
                sender: owner.clone(),
            },
        )?;
        Ok(address)
    }

    /// Delegates on the coordinator; the consumers follow at the end of the block.
    pub fn delegate(
        &mut self,
        delegator: &Address,
        operator: &Address,
        amount: &Coin,
    ) -> HarnessResult<Shares> {
        let shares = self
            .coordinator
            .delegate(&self.ctx, &mut self.bank, delegator, operator, amount)?;
        Ok(shares)
    }

    /// Undelegates on the coordinator and returns the unbonding entry id.
    pub fn undelegate(
        &mut self,
        delegator: &Address,
        operator: &Address,
        amount: &Coin,
    ) -> HarnessResult<u64> {
        let id = self
            .coordinator
            .undelegate(&self.ctx, &mut self.bank, delegator, operator, amount)?;
        Ok(id)
    }

    /// Pays `delegator` its accrued rewards from `operator`.
    pub fn withdraw_rewards(
        &mut self,
        delegator: &Address,
        operator: &Address,
    ) -> HarnessResult<Coins> {
        let paid = self
            .coordinator
            .withdraw_delegator_rewards(&mut self.bank, delegator, operator)?;
        Ok(paid)
    }

    /// Slashes `operator` on the coordinator and queues the slash for its consumers.
    pub fn slash_operator(&mut self, operator: &Address, fraction: Decimal) -> HarnessResult<Amount> {
        let burned = self.coordinator.slash_operator(
            &self.ctx,
            &mut self.bank,
            &mut self.outbox,
            operator,
            fraction,
        )?;
        Ok(burned)
    }

    /// Slashes `validator` on `chain_id`'s staking module and lets the consumer ledger report the
    /// operators involved. Returns the operators reported.
    pub fn slash_validator(
        &mut self,
        chain_id: &ChainId,
        validator: &ValidatorId,
        fraction: Decimal,
    ) -> HarnessResult<Vec<Address>> {
        let ctx = self.ctx;
        let node = self.consumer_mut(chain_id)?;
        node.host.slash_validator(validator, fraction)?;
        let reported = node
            .ledger
            .on_validator_slashed(&ctx, &mut node.outbox, validator, fraction)?;
        Ok(reported)
    }

    /// Changes a validator's power on `chain_id` and reports it to the coordinator.
    pub fn set_validator(
        &mut self,
        chain_id: &ChainId,
        validator: &ValidatorId,
        power: u64,
    ) -> HarnessResult<()> {
        let ctx = self.ctx;
        let node = self.consumer_mut(chain_id)?;
        let update = node.host.set_validator(validator.clone(), power);
        node.ledger
            .report_validator_updates(&ctx, &mut node.outbox, vec![update])?;
        Ok(())
    }

    /// Accrues `coin` of staking rewards to the delegators of `validator` on `chain_id`.
    pub fn distribute_rewards(
        &mut self,
        chain_id: &ChainId,
        validator: &ValidatorId,
        coin: &Coin,
    ) -> HarnessResult<()> {
        self.consumer_mut(chain_id)?
            .host
            .distribute_rewards(validator, coin);
        Ok(())
    }
}

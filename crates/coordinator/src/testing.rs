//! Fixtures shared by the coordinator tests.

use std::time::Duration;

use ethnum::U256;
use restaking_params::coordinator::CoordinatorParams;
use restaking_primitives::{
    block::BlockCtx,
    coin::{Amount, Coin, Shares},
    interfaces::Bank,
    mem::{InMemoryBank, OutboundPacket, Outbox},
    packets::{
        AckPayload, Acknowledgement, Packet, UndelegateAck, ValidatorSetChangePacket,
        ValidatorUpdate, WithdrawRewardAck,
    },
    types::{Address, ChainId, ChannelEnd, Denom, PacketKey, Timestamp},
};

use crate::{
    consumers::ConsumerInfo, errors::CoordinatorResult, operator::RegisterOperator,
    CoordinatorLedger,
};

pub(crate) const DENOM: &str = "ustake";
pub(crate) const REWARD_DENOM: &str = "ureward";
pub(crate) const BLOCK_TIME: Duration = Duration::from_secs(5);

pub(crate) fn amt(v: u128) -> Amount {
    U256::new(v)
}

pub(crate) fn stake(v: u128) -> Coin {
    Coin::new(DENOM, v)
}

pub(crate) fn validator_of(chain: &str) -> String {
    format!("{chain}val")
}

/// A coordinator ledger with an in-memory bank and outbox, wired to consumers named by the
/// caller. Consumer `i` talks over `channel-{2i}` and transfers over `channel-{2i+1}`.
pub(crate) struct Fixture {
    pub(crate) ledger: CoordinatorLedger,
    pub(crate) bank: InMemoryBank,
    pub(crate) outbox: Outbox,
    pub(crate) ctx: BlockCtx,
    chains: Vec<ChainId>,
}

impl Fixture {
    pub(crate) fn new(chains: &[&str]) -> Self {
        Self::with_params(
            chains,
            CoordinatorParams {
                reward_interval_blocks: 0,
                ..Default::default()
            },
        )
    }

    pub(crate) fn with_params(chains: &[&str], params: CoordinatorParams) -> Self {
        let mut ledger = CoordinatorLedger::new(params);
        for (i, chain) in chains.iter().enumerate() {
            let chain_id = ChainId::new(*chain);
            ledger
                .add_consumer(ConsumerInfo {
                    chain_id: chain_id.clone(),
                    end: Self::end_of(i),
                    transfer_end: Self::transfer_end_of(i),
                    restaking_denoms: vec![DENOM.into()],
                    reward_denoms: vec![REWARD_DENOM.into()],
                })
                .unwrap();
            ledger
                .apply_validator_updates(
                    &chain_id,
                    &ValidatorSetChangePacket {
                        updates: vec![ValidatorUpdate {
                            identity: validator_of(chain).into(),
                            power: 10,
                        }],
                        update_sequence_id: 1,
                    },
                )
                .unwrap();
        }

        Self {
            ledger,
            bank: InMemoryBank::new(),
            outbox: Outbox::new(),
            ctx: BlockCtx::new(1, 1_000_000_000),
            chains: chains.iter().map(|c| ChainId::new(*c)).collect(),
        }
    }

    pub(crate) fn end_of(i: usize) -> ChannelEnd {
        ChannelEnd::new(format!("channel-{}", 2 * i), "restaking")
    }

    pub(crate) fn transfer_end_of(i: usize) -> ChannelEnd {
        ChannelEnd::new(format!("channel-{}", 2 * i + 1), "transfer")
    }

    /// The coordinator-side end of `chain`.
    pub(crate) fn end(&self, chain: &str) -> ChannelEnd {
        let idx = self
            .chains
            .iter()
            .position(|c| c.as_str() == chain)
            .expect("chain must be part of the fixture");
        Self::end_of(idx)
    }

    pub(crate) fn register_operator(&mut self, owner: &str, chains: &[&str]) -> Address {
        self.ledger
            .register_operator(
                &self.ctx,
                RegisterOperator {
                    consumer_chain_ids: chains.iter().map(|c| ChainId::new(*c)).collect(),
                    consumer_validators: chains.iter().map(|c| validator_of(c).into()).collect(),
                    restaking_denom: DENOM.into(),
                    sender: owner.into(),
                },
            )
            .unwrap()
    }

    pub(crate) fn fund(&mut self, who: &str, amount: u128) -> Address {
        let who = Address::new(who);
        self.bank.mint(&who, &stake(amount)).unwrap();
        who
    }

    pub(crate) fn delegate(
        &mut self,
        delegator: &Address,
        operator: &Address,
        amount: u128,
    ) -> CoordinatorResult<Shares> {
        self.ledger
            .delegate(&self.ctx, &mut self.bank, delegator, operator, &stake(amount))
    }

    pub(crate) fn undelegate(
        &mut self,
        delegator: &Address,
        operator: &Address,
        amount: u128,
    ) -> CoordinatorResult<u64> {
        self.ledger
            .undelegate(&self.ctx, &mut self.bank, delegator, operator, &stake(amount))
    }

    /// Ends the current block, returns what it sent and moves to the next block.
    pub(crate) fn end_block(&mut self) -> Vec<OutboundPacket> {
        self.ledger
            .end_block(&self.ctx, &mut self.bank, &mut self.outbox);
        self.ctx = self.ctx.next(BLOCK_TIME);
        self.outbox.drain()
    }

    /// Delivers `packet` as if `chain` sent it.
    pub(crate) fn receive(&mut self, chain: &str, packet: Packet) -> Acknowledgement {
        let end = self.end(chain);
        self.ledger
            .on_receive(&self.ctx, &mut self.bank, &mut self.outbox, &end, packet)
    }

    pub(crate) fn ack(&mut self, key: &PacketKey, ack: Acknowledgement) {
        self.ledger.on_acknowledgement(&mut self.bank, key, ack);
    }

    /// Acknowledges `sent` the way a healthy consumer would: undelegations complete at
    /// `completion`, reward requests report an empty balance.
    pub(crate) fn ack_all(&mut self, sent: &[OutboundPacket], completion: Timestamp) {
        for out in sent {
            let payload = match &out.packet {
                Packet::Undelegate(_) => AckPayload::Undelegate(UndelegateAck {
                    completion_time_unix_nano: completion,
                }),
                Packet::WithdrawReward(p) => AckPayload::WithdrawReward(WithdrawRewardAck {
                    transfer_channel: "channel-9".into(),
                    transfer_port: "transfer".into(),
                    transfer_sequence: None,
                    balance: Coin::zero(p.reward_denom.clone()),
                }),
                _ => AckPayload::Empty,
            };
            self.ack(&out.key, Acknowledgement::Success(payload));
        }
    }

    pub(crate) fn balance(&self, who: &Address) -> Amount {
        self.bank.balance(who, &Denom::new(DENOM))
    }

    pub(crate) fn reward_balance(&self, who: &Address) -> Amount {
        self.bank.balance(who, &Denom::new(REWARD_DENOM))
    }
}

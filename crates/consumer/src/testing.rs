//! Fixtures shared by the consumer tests.

use std::time::Duration;

use ethnum::U256;
use restaking_params::consumer::ConsumerParams;
use restaking_primitives::{
    block::BlockCtx,
    coin::{Amount, Coin},
    decimal::Decimal,
    interfaces::Bank,
    mem::Outbox,
    packets::{
        Acknowledgement, DelegatePacket, Packet, SlashPacket, UndelegatePacket,
        WithdrawRewardPacket,
    },
    types::{Address, Denom, ValidatorId},
};

use crate::{agent::AgentKey, mem::InMemoryHost, ConsumerLedger};

pub(crate) const DENOM: &str = "ustake";
pub(crate) const BOND_DENOM: &str = "uatom";
pub(crate) const REWARD_DENOM: &str = "ureward";
pub(crate) const VALIDATOR: &str = "val";
pub(crate) const UNBONDING: Duration = Duration::from_secs(100);
pub(crate) const BLOCK_TIME: Duration = Duration::from_secs(5);

pub(crate) fn amt(v: u128) -> Amount {
    U256::new(v)
}

pub(crate) fn stake(v: u128) -> Coin {
    Coin::new(DENOM, v)
}

pub(crate) fn key() -> AgentKey {
    AgentKey::new(DENOM, VALIDATOR)
}

/// A consumer ledger on an in-memory chain where one restaked token is worth two native ones.
pub(crate) struct Fixture {
    pub(crate) ledger: ConsumerLedger,
    pub(crate) host: InMemoryHost,
    pub(crate) outbox: Outbox,
    pub(crate) ctx: BlockCtx,
}

impl Fixture {
    pub(crate) fn new() -> Self {
        let mut host = InMemoryHost::new(BOND_DENOM, UNBONDING);
        host.set_validator(VALIDATOR, 10);
        host.set_price(DENOM, Decimal::from_ratio(amt(2), amt(1)).unwrap());

        let ctx = BlockCtx::new(1, 1_000_000_000);
        host.begin_block(&ctx).unwrap();

        Self {
            ledger: ConsumerLedger::new(ConsumerParams::with_defaults(
                "osmo",
                "channel-0",
                "channel-1",
            )),
            host,
            outbox: Outbox::new(),
            ctx,
        }
    }

    pub(crate) fn receive(&mut self, packet: Packet) -> Acknowledgement {
        let end = self.ledger.params().coordinator.clone();
        self.ledger
            .on_receive(&self.ctx, &mut self.host, &end, packet)
    }

    pub(crate) fn delegate(&mut self, operator: &str, amount: u128) -> Acknowledgement {
        self.receive(Packet::Delegate(DelegatePacket {
            operator: operator.into(),
            validator: VALIDATOR.into(),
            amount: stake(amount),
        }))
    }

    pub(crate) fn undelegate(&mut self, operator: &str, amount: u128) -> Acknowledgement {
        self.receive(Packet::Undelegate(UndelegatePacket {
            operator: operator.into(),
            validator: VALIDATOR.into(),
            amount: stake(amount),
        }))
    }

    pub(crate) fn slash(&mut self, operator: &str, amount: u128) -> Acknowledgement {
        self.receive(Packet::Slash(SlashPacket {
            operator: operator.into(),
            validator: VALIDATOR.into(),
            amount: stake(amount),
        }))
    }

    pub(crate) fn withdraw_reward(&mut self, operator: &str) -> Acknowledgement {
        self.receive(Packet::WithdrawReward(WithdrawRewardPacket {
            operator: operator.into(),
            validator: VALIDATOR.into(),
            reward_denom: REWARD_DENOM.into(),
        }))
    }

    /// Ends the ledger's block and starts the next one on the host.
    pub(crate) fn end_block(&mut self) {
        self.ledger.end_block(&self.ctx, &mut self.host);
        self.ctx = self.ctx.next(BLOCK_TIME);
        self.host.begin_block(&self.ctx).unwrap();
    }

    /// Ends every block up to and including `time`.
    pub(crate) fn run_until(&mut self, time: i64) {
        while self.ctx.time <= time {
            self.end_block();
        }
    }

    pub(crate) fn value_of(&self, operator: &str) -> Amount {
        self.ledger.operator_value(&key(), &Address::new(operator))
    }

    pub(crate) fn native_bonded(&self) -> Amount {
        self.host
            .bonded(&key().address(), &ValidatorId::new(VALIDATOR))
    }

    pub(crate) fn balance(&self, who: &Address, denom: &str) -> Amount {
        self.host.balance(who, &Denom::new(denom))
    }
}

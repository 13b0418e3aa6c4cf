use restaking_params::coordinator::CoordinatorParams;
use restaking_primitives::{
    coin::Coin,
    decimal::Decimal,
    interfaces::Bank,
    mem::OutboundPacket,
    packets::{AckPayload, Acknowledgement, Packet, WithdrawRewardAck},
    types::{Address, ChainId, ChannelEnd, Denom, PacketKey},
};

use crate::{
    rewards::RewardLegStatus,
    testing::{amt, Fixture, REWARD_DENOM},
};

fn params(shards: u32) -> CoordinatorParams {
    CoordinatorParams {
        reward_interval_blocks: 3,
        reward_shards: shards,
        ..Default::default()
    }
}

fn consumer_transfer_end() -> ChannelEnd {
    ChannelEnd::new("channel-5", "transfer")
}

fn sent_ack(sequence: u64, amount: u128) -> Acknowledgement {
    Acknowledgement::Success(AckPayload::WithdrawReward(WithdrawRewardAck {
        transfer_channel: "channel-5".into(),
        transfer_port: "transfer".into(),
        transfer_sequence: Some(sequence),
        balance: Coin::new(REWARD_DENOM, amount),
    }))
}

fn empty_ack() -> Acknowledgement {
    Acknowledgement::Success(AckPayload::WithdrawReward(WithdrawRewardAck {
        transfer_channel: "channel-5".into(),
        transfer_port: "transfer".into(),
        transfer_sequence: None,
        balance: Coin::zero(REWARD_DENOM),
    }))
}

/// Operator on osmo and juno with 10,000 from `a` and 30,000 from `b`, advanced to the first
/// reward sweep. Returns the reward requests sent by that sweep.
fn staked(fx: &mut Fixture) -> (Address, Address, Address, Vec<OutboundPacket>) {
    let op = fx.register_operator("owner", &["osmo", "juno"]);
    let a = fx.fund("a", 10_000);
    let b = fx.fund("b", 30_000);
    fx.delegate(&a, &op, 10_000).unwrap();
    fx.delegate(&b, &op, 30_000).unwrap();

    let sent = fx.end_block();
    fx.ack_all(&sent, 0);
    assert!(fx.end_block().is_empty());

    let requests = fx.end_block();
    assert_eq!(requests.len(), 2);
    assert!(requests
        .iter()
        .all(|out| matches!(out.packet, Packet::WithdrawReward(_))));

    (op, a, b, requests)
}

/// Delivers a reward transfer from osmo the way the token transfer module would.
fn deliver(fx: &mut Fixture, op: &Address, sequence: u64, amount: u128) {
    let coin = Coin::new(REWARD_DENOM, amount);
    fx.bank.mint(op, &coin).unwrap();
    fx.ledger.on_transfer_received(
        &mut fx.bank,
        &Fixture::transfer_end_of(0),
        &PacketKey::new(consumer_transfer_end(), sequence),
        op,
        coin,
    );
}

#[test]
fn completed_round_is_split_by_shares() {
    let mut fx = Fixture::with_params(&["osmo", "juno"], params(1));
    let (op, a, b, requests) = staked(&mut fx);

    fx.ack(&requests[0].key, sent_ack(1, 400));
    let leg = &fx.ledger.rewards().round(&op).unwrap().legs
        [&(ChainId::new("osmo"), Denom::new(REWARD_DENOM))];
    assert_eq!(leg.status, RewardLegStatus::Transferring);

    deliver(&mut fx, &op, 1, 400);
    fx.ack(&requests[1].key, empty_ack());

    assert!(fx.ledger.rewards().round(&op).is_none());
    let operator = fx.ledger.operator(&op).unwrap();
    assert_eq!(operator.last_reward_period, 1);
    assert_eq!(
        fx.ledger.rewards().cumulative(&op, 1).unwrap()[&Denom::new(REWARD_DENOM)],
        "0.01".parse::<Decimal>().unwrap()
    );
    assert_eq!(fx.reward_balance(&operator.reward_account()), amt(400));

    let paid = fx
        .ledger
        .withdraw_delegator_rewards(&mut fx.bank, &a, &op)
        .unwrap();
    assert_eq!(paid.amount_of(&REWARD_DENOM.into()), amt(100));
    assert_eq!(fx.reward_balance(&a), amt(100));
    assert!(fx.ledger.pending_rewards(&a, &op).is_empty());

    // delegating again settles what was owed first
    assert_eq!(
        fx.ledger.pending_rewards(&b, &op).amount_of(&REWARD_DENOM.into()),
        amt(300)
    );
    fx.fund("b", 1_000);
    fx.delegate(&b, &op, 1_000).unwrap();
    assert_eq!(fx.reward_balance(&b), amt(300));
    assert!(fx.ledger.pending_rewards(&b, &op).is_empty());
}

#[test]
fn transfer_arriving_before_its_ack_is_matched() {
    let mut fx = Fixture::with_params(&["osmo", "juno"], params(1));
    let (op, a, _, requests) = staked(&mut fx);

    deliver(&mut fx, &op, 1, 800);
    fx.ack(&requests[1].key, empty_ack());
    assert!(fx.ledger.rewards().round(&op).is_some());

    fx.ack(&requests[0].key, sent_ack(1, 800));
    assert!(fx.ledger.rewards().round(&op).is_none());
    assert_eq!(
        fx.ledger.pending_rewards(&a, &op).amount_of(&REWARD_DENOM.into()),
        amt(200)
    );
}

#[test]
fn failed_leg_stalls_the_round() {
    let mut fx = Fixture::with_params(&["osmo", "juno"], params(1));
    let (op, _, _, requests) = staked(&mut fx);

    fx.ack(&requests[0].key, Acknowledgement::error("no agent"));
    fx.ack(&requests[1].key, empty_ack());

    let round = fx.ledger.rewards().round(&op).unwrap();
    let leg = &round.legs[&(ChainId::new("osmo"), Denom::new(REWARD_DENOM))];
    assert_eq!(leg.status, RewardLegStatus::Withdrawing);
    assert_eq!(leg.failure.as_deref(), Some("no agent"));

    // the next sweep leaves the stalled operator alone
    fx.end_block();
    fx.end_block();
    assert!(fx.end_block().is_empty());
    assert_eq!(fx.ledger.operator(&op).unwrap().last_reward_period, 0);
}

#[test]
fn sweeps_rotate_through_operators() {
    let mut fx = Fixture::with_params(&["osmo"], params(3));
    let mut operators = Vec::new();
    for owner in ["o1", "o2", "o3"] {
        let op = fx.register_operator(owner, &["osmo"]);
        let d = fx.fund(&format!("d-{owner}"), 100);
        fx.delegate(&d, &op, 100).unwrap();
        operators.push(op);
    }
    let sent = fx.end_block();
    fx.ack_all(&sent, 0);

    let mut visited = Vec::new();
    for _ in 0..9 {
        for out in fx.end_block() {
            let Packet::WithdrawReward(request) = &out.packet else {
                panic!("unexpected packet {}", out.packet);
            };
            visited.push(request.operator.clone());
            fx.ack_all(std::slice::from_ref(&out), 0);
        }
    }

    assert_eq!(visited, operators);
    for op in &operators {
        assert_eq!(fx.ledger.operator(op).unwrap().last_reward_period, 1);
    }
}

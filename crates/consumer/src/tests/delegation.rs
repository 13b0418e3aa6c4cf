use restaking_primitives::{
    coin::Coin,
    packets::{Acknowledgement, DelegatePacket, Packet, ValidatorSetChangePacket},
    types::{ChannelEnd, Denom},
};

use crate::{
    errors::ConsumerError,
    testing::{amt, key, Fixture, BOND_DENOM, DENOM, VALIDATOR},
};

#[test]
fn delegation_bonds_the_native_equivalent() {
    let mut fx = Fixture::new();

    assert_eq!(fx.delegate("op1", 1_000), Acknowledgement::empty());
    assert_eq!(fx.delegate("op2", 500), Acknowledgement::empty());

    assert_eq!(fx.value_of("op1"), amt(1_000));
    assert_eq!(fx.value_of("op2"), amt(500));
    assert_eq!(fx.native_bonded(), amt(3_000));

    let agent = fx.ledger.agent(&key()).unwrap();
    assert_eq!(agent.native_staked, amt(3_000));
    assert_eq!(agent.pool.total_shares(), amt(1_500));
    assert_eq!(fx.host.bank.supply(&Denom::new(BOND_DENOM)), amt(3_000));
}

#[test]
fn rejected_delegations_leave_no_trace() {
    let mut fx = Fixture::new();

    let ack = fx.receive(Packet::Delegate(DelegatePacket {
        operator: "op".into(),
        validator: "ghost".into(),
        amount: Coin::new(DENOM, 10u128),
    }));
    assert_eq!(
        ack,
        Acknowledgement::error(ConsumerError::UnknownValidator("ghost".into()))
    );

    let ack = fx.receive(Packet::Delegate(DelegatePacket {
        operator: "op".into(),
        validator: VALIDATOR.into(),
        amount: Coin::new("uother", 10u128),
    }));
    assert_eq!(
        ack,
        Acknowledgement::error(ConsumerError::NoPrice("uother".into()))
    );

    assert_eq!(
        fx.delegate("op", 0),
        Acknowledgement::error(ConsumerError::ZeroAmount)
    );

    assert_eq!(fx.ledger.agents().count(), 0);
    assert_eq!(fx.host.bank.supply(&Denom::new(BOND_DENOM)), amt(0));
}

#[test]
fn dust_worth_no_native_stake_is_rejected() {
    let mut fx = Fixture::new();
    fx.host.set_price(DENOM, "0.1".parse().unwrap());

    assert_eq!(
        fx.delegate("op", 5),
        Acknowledgement::error(ConsumerError::NothingToBond(Coin::new(DENOM, 5u128)))
    );
    assert!(fx.delegate("op", 10).is_success());
    assert_eq!(fx.native_bonded(), amt(1));
}

#[test]
fn only_the_coordinator_channel_is_served() {
    let mut fx = Fixture::new();

    let ack = fx.ledger.on_receive(
        &fx.ctx,
        &mut fx.host,
        &ChannelEnd::new("channel-9", "restaking"),
        Packet::Delegate(DelegatePacket {
            operator: "op".into(),
            validator: VALIDATOR.into(),
            amount: Coin::new(DENOM, 10u128),
        }),
    );
    assert!(!ack.is_success());

    let ack = fx.receive(Packet::ValidatorSetChange(ValidatorSetChangePacket {
        updates: Vec::new(),
        update_sequence_id: 1,
    }));
    assert!(!ack.is_success());
    assert_eq!(fx.ledger.agents().count(), 0);
}

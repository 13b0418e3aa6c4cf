use restaking_primitives::{
    errors::MessengerError,
    packets::{Packet, ValidatorUpdate},
};

use crate::{errors::ConsumerError, testing::Fixture};

fn update(identity: &str, power: u64) -> ValidatorUpdate {
    ValidatorUpdate {
        identity: identity.into(),
        power,
    }
}

#[test]
fn reports_carry_increasing_sequence_ids() {
    let mut fx = Fixture::new();

    fx.ledger
        .report_validator_updates(&fx.ctx, &mut fx.outbox, vec![update("a", 1)])
        .unwrap();
    fx.ledger
        .report_validator_updates(&fx.ctx, &mut fx.outbox, vec![update("a", 0), update("b", 3)])
        .unwrap();

    let ids: Vec<_> = fx
        .outbox
        .drain()
        .into_iter()
        .map(|out| match out.packet {
            Packet::ValidatorSetChange(change) => change.update_sequence_id,
            other => panic!("unexpected packet {other}"),
        })
        .collect();
    assert_eq!(ids, vec![1, 2]);
    assert_eq!(fx.ledger.next_update_id(), 3);
}

#[test]
fn failed_report_does_not_burn_a_sequence_id() {
    let mut fx = Fixture::new();
    let end = fx.ledger.params().coordinator.clone();
    fx.outbox.close(end.clone());

    let err = fx
        .ledger
        .report_validator_updates(&fx.ctx, &mut fx.outbox, vec![update("a", 1)])
        .unwrap_err();
    assert_eq!(err, ConsumerError::Messenger(MessengerError::ChannelClosed(end)));
    assert_eq!(fx.ledger.next_update_id(), 1);
}

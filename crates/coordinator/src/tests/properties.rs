use ethnum::U256;
use proptest::prelude::*;
use restaking_primitives::{
    coin::{Coin, Coins},
    decimal::Decimal,
    interfaces::Bank,
    types::{Address, Denom},
};

use crate::testing::{Fixture, REWARD_DENOM};

#[derive(Debug, Clone)]
enum Action {
    Delegate(usize, u128),
    Undelegate(usize, u128),
    Slash(u32),
    EndBlock,
}

fn action() -> impl Strategy<Value = Action> {
    prop_oneof![
        3 => (0..3usize, 1..1_000_000u128).prop_map(|(d, a)| Action::Delegate(d, a)),
        2 => (0..3usize, 1..500_000u128).prop_map(|(d, a)| Action::Undelegate(d, a)),
        1 => (0..=20u32).prop_map(Action::Slash),
        2 => Just(Action::EndBlock),
    ]
}

proptest! {
    #[test]
    fn shares_stay_consistent(actions in prop::collection::vec(action(), 1..40)) {
        let mut fx = Fixture::new(&["osmo", "juno"]);
        let op = fx.register_operator("owner", &["osmo", "juno"]);
        let delegators: Vec<Address> =
            (0..3).map(|i| Address::new(format!("d{i}"))).collect();

        for action in actions {
            match action {
                Action::Delegate(d, amount) => {
                    fx.fund(delegators[d].as_str(), amount);
                    let _ = fx.delegate(&delegators[d], &op, amount);
                }
                Action::Undelegate(d, amount) => {
                    let _ = fx.undelegate(&delegators[d], &op, amount);
                }
                Action::Slash(percent) => {
                    let fraction =
                        Decimal::from_ratio(U256::new(percent.into()), U256::new(100)).unwrap();
                    let (ctx, ledger) = (fx.ctx, &mut fx.ledger);
                    ledger
                        .slash_operator(&ctx, &mut fx.bank, &mut fx.outbox, &op, fraction)
                        .unwrap();
                    fx.outbox.drain();
                }
                Action::EndBlock => {
                    let sent = fx.end_block();
                    let completion = fx.ctx.time;
                    fx.ack_all(&sent, completion);
                }
            }

            let operator = fx.ledger.operator(&op).unwrap();
            let held = delegators
                .iter()
                .fold(U256::ZERO, |acc, d| acc + fx.ledger.delegation_shares(d, &op));
            prop_assert_eq!(held, operator.shares);

            let value = delegators
                .iter()
                .fold(U256::ZERO, |acc, d| acc + fx.ledger.delegation_value(d, &op));
            prop_assert!(value <= operator.effective_stake());
        }
    }

    #[test]
    fn reward_ratios_never_decrease(
        stake in 1..1_000_000u128,
        rounds in prop::collection::vec(0..10_000u128, 1..10),
    ) {
        let mut fx = Fixture::new(&["osmo"]);
        let op = fx.register_operator("owner", &["osmo"]);
        let d = fx.fund("d", stake);
        fx.delegate(&d, &op, stake).unwrap();

        let denom = Denom::new(REWARD_DENOM);
        let mut previous = Decimal::ZERO;
        for (i, amount) in rounds.into_iter().enumerate() {
            let coin = Coin::new(REWARD_DENOM, amount);
            fx.bank.mint(&op, &coin).unwrap();
            let rewards: Coins = std::iter::once(coin).collect();
            fx.ledger.on_operator_receive_all_rewards(&mut fx.bank, &op, rewards);

            let period = i as u64 + 1;
            prop_assert_eq!(fx.ledger.operator(&op).unwrap().last_reward_period, period);
            let ratio = fx
                .ledger
                .rewards()
                .cumulative(&op, period)
                .unwrap()
                .get(&denom)
                .copied()
                .unwrap_or_default();
            prop_assert!(ratio >= previous);
            previous = ratio;

            let owed = fx.ledger.pending_rewards(&d, &op).amount_of(&denom);
            prop_assert!(owed <= fx.reward_balance(&fx.ledger.operator(&op).unwrap().reward_account()));
        }
    }
}

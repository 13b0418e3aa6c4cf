//! Proportional ownership of a pool of staked tokens.
//!
//! A holder's claim is `shares * total_staked / total_shares`. Deposits and withdrawals move both
//! totals at the current price; slashing only moves `total_staked`, which spreads the loss over all
//! holders without touching their share balances.
//!
//! Every quotient is floored and computed from the totals *before* the mutation, so the pool never
//! pays out more than it holds.

use std::collections::BTreeMap;

use ethnum::U256;
use serde::{Deserialize, Serialize};

use crate::{
    coin::{Amount, Shares},
    errors::SharePoolError,
};

/// Shares issued for `amount` at the given pool totals. The first deposit into an empty pool is
/// priced 1:1.
pub fn calculate_shares(amount: Amount, total_shares: Shares, total_staked: Amount) -> Shares {
    if total_shares == U256::ZERO || total_staked == U256::ZERO {
        return amount;
    }

    mul_div_floor(amount, total_shares, total_staked)
}

/// Value of `shares` at the given pool totals.
pub fn calculate_amount(shares: Shares, total_shares: Shares, total_staked: Amount) -> Amount {
    if total_shares == U256::ZERO {
        return U256::ZERO;
    }

    mul_div_floor(shares, total_staked, total_shares)
}

/// Shares that must be burned to take `amount` out of the pool, rounded up so that rounding never
/// works against the remaining holders.
pub fn shares_for_withdrawal(amount: Amount, total_shares: Shares, total_staked: Amount) -> Shares {
    if total_shares == U256::ZERO || total_staked == U256::ZERO {
        return amount;
    }

    let product = amount
        .checked_mul(total_shares)
        .expect("share pool: product overflow");
    let quotient = product / total_staked;
    if product % total_staked == U256::ZERO {
        quotient
    } else {
        quotient + U256::ONE
    }
}

fn mul_div_floor(a: U256, b: U256, c: U256) -> U256 {
    a.checked_mul(b).expect("share pool: product overflow") / c
}

/// A pool of staked tokens owned by share holders.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharePool<H: Ord> {
    total_staked: Amount,
    total_shares: Shares,
    holders: BTreeMap<H, Shares>,
}

impl<H: Ord> Default for SharePool<H> {
    fn default() -> Self {
        Self {
            total_staked: U256::ZERO,
            total_shares: U256::ZERO,
            holders: BTreeMap::new(),
        }
    }
}

impl<H: Ord + Clone> SharePool<H> {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tokens currently backing the pool.
    pub const fn total_staked(&self) -> Amount {
        self.total_staked
    }

    /// Shares currently outstanding.
    pub const fn total_shares(&self) -> Shares {
        self.total_shares
    }

    /// Shares held by `holder`, zero if none.
    pub fn shares_of(&self, holder: &H) -> Shares {
        self.holders.get(holder).copied().unwrap_or(U256::ZERO)
    }

    /// Current value of the shares held by `holder`.
    pub fn value_of(&self, holder: &H) -> Amount {
        calculate_amount(self.shares_of(holder), self.total_shares, self.total_staked)
    }

    /// Iterates holders and their shares in key order.
    pub fn holders(&self) -> impl Iterator<Item = (&H, &Shares)> {
        self.holders.iter()
    }

    /// Whether nobody holds shares.
    pub fn is_empty(&self) -> bool {
        self.holders.is_empty()
    }

    /// Shares a deposit of `amount` would issue right now, or why it would be refused.
    pub fn preview_deposit(&self, amount: Amount) -> Result<Shares, SharePoolError> {
        if amount == U256::ZERO {
            return Err(SharePoolError::ZeroAmount);
        }
        if self.total_staked == U256::ZERO && self.total_shares != U256::ZERO {
            return Err(SharePoolError::Insolvent {
                shares: self.total_shares,
            });
        }

        let shares = calculate_shares(amount, self.total_shares, self.total_staked);
        if shares == U256::ZERO {
            return Err(SharePoolError::DepositTooSmall(amount));
        }

        Ok(shares)
    }

    /// Adds `amount` to the pool on behalf of `holder` and returns the shares issued.
    pub fn deposit(&mut self, holder: H, amount: Amount) -> Result<Shares, SharePoolError> {
        let shares = self.preview_deposit(amount)?;

        self.total_staked += amount;
        self.total_shares += shares;
        *self.holders.entry(holder).or_insert(U256::ZERO) += shares;

        Ok(shares)
    }

    /// Burns `shares` held by `holder` and returns their value, which leaves the pool.
    pub fn withdraw(&mut self, holder: &H, shares: Shares) -> Result<Amount, SharePoolError> {
        if shares == U256::ZERO {
            return Err(SharePoolError::ZeroAmount);
        }

        let held = self.shares_of(holder);
        if held == U256::ZERO {
            return Err(SharePoolError::NoShares);
        }
        if shares > held {
            return Err(SharePoolError::InsufficientShares {
                requested: shares,
                held,
            });
        }

        let amount = calculate_amount(shares, self.total_shares, self.total_staked);

        self.total_staked -= amount;
        self.total_shares -= shares;
        if held == shares {
            self.holders.remove(holder);
        } else {
            self.holders.insert(holder.clone(), held - shares);
        }

        Ok(amount)
    }

    /// What [`Self::withdraw_amount`] would burn and pay out, without changing the pool.
    pub fn preview_withdraw_amount(
        &self,
        holder: &H,
        amount: Amount,
    ) -> Result<(Shares, Amount), SharePoolError> {
        if amount == U256::ZERO {
            return Err(SharePoolError::ZeroAmount);
        }

        let shares = shares_for_withdrawal(amount, self.total_shares, self.total_staked);
        let held = self.shares_of(holder);
        if held == U256::ZERO {
            return Err(SharePoolError::NoShares);
        }
        if shares > held {
            return Err(SharePoolError::InsufficientShares {
                requested: shares,
                held,
            });
        }

        Ok((
            shares,
            calculate_amount(shares, self.total_shares, self.total_staked),
        ))
    }

    /// Burns enough of `holder`'s shares to cover `amount`, rounding the burn up. Returns
    /// `(shares burned, amount withdrawn)`; the withdrawn amount may exceed `amount` by rounding
    /// dust but never exceeds the holder's value.
    pub fn withdraw_amount(
        &mut self,
        holder: &H,
        amount: Amount,
    ) -> Result<(Shares, Amount), SharePoolError> {
        let (shares, _) = self.preview_withdraw_amount(holder, amount)?;
        let withdrawn = self.withdraw(holder, shares)?;

        Ok((shares, withdrawn))
    }

    /// Removes up to `amount` from the backing tokens without touching any share balance. Returns
    /// the amount actually removed, which is capped at `total_staked`.
    pub fn apply_slash(&mut self, amount: Amount) -> Amount {
        let slashed = amount.min(self.total_staked);
        self.total_staked -= slashed;
        slashed
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    type Pool = SharePool<&'static str>;

    fn amt(v: u128) -> Amount {
        U256::new(v)
    }

    #[test]
    fn first_depositor_bootstraps_one_to_one() {
        let mut pool = Pool::new();
        assert_eq!(pool.deposit("alice", amt(10_000)).unwrap(), amt(10_000));
        assert_eq!(pool.total_staked(), amt(10_000));
        assert_eq!(pool.total_shares(), amt(10_000));
    }

    #[test]
    fn later_depositors_pay_the_current_price() {
        let mut pool = Pool::new();
        pool.deposit("alice", amt(1_000)).unwrap();
        pool.apply_slash(amt(500));

        // price is now 0.5 tokens per share
        assert_eq!(pool.deposit("bob", amt(100)).unwrap(), amt(200));
        assert_eq!(pool.value_of(&"bob"), amt(100));
        assert_eq!(pool.value_of(&"alice"), amt(500));
    }

    #[test]
    fn withdrawing_everything_empties_the_pool() {
        let mut pool = Pool::new();
        let shares = pool.deposit("alice", amt(77)).unwrap();
        assert_eq!(pool.withdraw(&"alice", shares).unwrap(), amt(77));
        assert!(pool.is_empty());
        assert_eq!(pool.total_staked(), U256::ZERO);
        assert_eq!(pool.total_shares(), U256::ZERO);
    }

    #[test]
    fn withdraw_errors() {
        let mut pool = Pool::new();
        pool.deposit("alice", amt(10)).unwrap();

        assert_eq!(pool.withdraw(&"bob", amt(1)), Err(SharePoolError::NoShares));
        assert_eq!(
            pool.withdraw(&"alice", amt(11)),
            Err(SharePoolError::InsufficientShares {
                requested: amt(11),
                held: amt(10)
            })
        );
        assert_eq!(pool.withdraw(&"alice", U256::ZERO), Err(SharePoolError::ZeroAmount));
        assert_eq!(pool.total_staked(), amt(10));
    }

    #[test]
    fn deposit_into_wiped_out_pool_is_rejected() {
        let mut pool = Pool::new();
        pool.deposit("alice", amt(10)).unwrap();
        assert_eq!(pool.apply_slash(amt(1_000)), amt(10));
        assert_eq!(
            pool.deposit("bob", amt(5)),
            Err(SharePoolError::Insolvent { shares: amt(10) })
        );
    }

    #[test]
    fn previews_leave_the_pool_alone() {
        let mut pool = Pool::new();
        pool.deposit("alice", amt(100)).unwrap();
        pool.apply_slash(amt(50));
        let before = pool.clone();

        assert_eq!(pool.preview_deposit(amt(10)), Ok(amt(20)));
        assert_eq!(pool.preview_withdraw_amount(&"alice", amt(25)), Ok((amt(50), amt(25))));
        assert_eq!(
            pool.preview_withdraw_amount(&"alice", amt(51)),
            Err(SharePoolError::InsufficientShares {
                requested: amt(102),
                held: amt(100)
            })
        );
        assert_eq!(pool, before);
    }

    #[test]
    fn withdraw_amount_rounds_the_burn_up() {
        let mut pool = Pool::new();
        pool.deposit("alice", amt(3)).unwrap();
        pool.deposit("bob", amt(3)).unwrap();
        pool.apply_slash(amt(2));

        // 4 staked over 6 shares: taking 1 token needs 1.5 shares, so 2 are burned
        let (shares, withdrawn) = pool.withdraw_amount(&"alice", amt(1)).unwrap();
        assert_eq!(shares, amt(2));
        assert_eq!(withdrawn, amt(1));
        assert_eq!(pool.shares_of(&"alice"), amt(1));
    }

    #[test]
    fn five_percent_slash_scenario() {
        let mut pool = Pool::new();
        pool.deposit("op", amt(1_000_000_000)).unwrap();
        pool.apply_slash(amt(50_000_000));
        assert_eq!(pool.total_staked(), amt(950_000_000));
        assert_eq!(pool.shares_of(&"op"), amt(1_000_000_000));
        assert_eq!(pool.value_of(&"op"), amt(950_000_000));
    }

    proptest! {
        #[test]
        fn deposits_conserve_value(deposits in prop::collection::vec((0usize..4, 1u64..1_000_000_000), 1..30)) {
            const HOLDERS: [&str; 4] = ["a", "b", "c", "d"];
            let mut pool = Pool::new();
            for (idx, amount) in deposits {
                pool.deposit(HOLDERS[idx], U256::from(amount)).unwrap();
            }

            let share_sum = pool.holders().fold(U256::ZERO, |acc, (_, s)| acc + *s);
            prop_assert_eq!(share_sum, pool.total_shares());

            let value_sum = HOLDERS.iter().fold(U256::ZERO, |acc, h| acc + pool.value_of(h));
            prop_assert!(value_sum <= pool.total_staked());
        }

        #[test]
        fn slash_is_socialized(a in 1u64..1_000_000_000, b in 1u64..1_000_000_000, slash in 0u64..1_000_000_000) {
            let mut pool = Pool::new();
            pool.deposit("a", U256::from(a)).unwrap();
            pool.deposit("b", U256::from(b)).unwrap();
            let before_a = pool.shares_of(&"a");
            let before_b = pool.shares_of(&"b");

            let slashed = pool.apply_slash(U256::from(slash));
            prop_assert_eq!(slashed, U256::from(slash).min(U256::from(a) + U256::from(b)));
            prop_assert_eq!(pool.shares_of(&"a"), before_a);
            prop_assert_eq!(pool.shares_of(&"b"), before_b);
            prop_assert!(pool.value_of(&"a") + pool.value_of(&"b") <= pool.total_staked());
        }

        #[test]
        fn full_exit_never_overpays(a in 1u64..1_000_000, b in 1u64..1_000_000, slash in 0u64..1_000_000) {
            let mut pool = Pool::new();
            let sa = pool.deposit("a", U256::from(a)).unwrap();
            let sb = pool.deposit("b", U256::from(b)).unwrap();
            pool.apply_slash(U256::from(slash));
            let staked = pool.total_staked();

            let out_a = pool.withdraw(&"a", sa).unwrap();
            let out_b = pool.withdraw(&"b", sb).unwrap();
            prop_assert_eq!(out_a + out_b, staked);
            prop_assert_eq!(pool.total_shares(), U256::ZERO);
        }
    }
}

//! Token amounts.

use std::{collections::BTreeMap, fmt};

use ethnum::U256;
use serde::{Deserialize, Serialize};

use crate::types::Denom;

/// An unsigned 256-bit token amount.
pub type Amount = U256;

/// Share balances use the same width as amounts.
pub type Shares = U256;

/// An amount of a single denomination.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Coin {
    /// The denomination.
    pub denom: Denom,

    /// The amount.
    pub amount: Amount,
}

impl Coin {
    /// Creates a coin.
    pub fn new(denom: impl Into<Denom>, amount: impl Into<Amount>) -> Self {
        Self {
            denom: denom.into(),
            amount: amount.into(),
        }
    }

    /// A zero coin of the given denomination.
    pub fn zero(denom: impl Into<Denom>) -> Self {
        Self::new(denom, U256::ZERO)
    }

    /// Whether the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.amount == U256::ZERO
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

/// A multi-denomination amount, kept sorted by denomination with no zero entries.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coins(BTreeMap<Denom, Amount>);

impl Coins {
    /// Creates an empty set of coins.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a coin. Zero coins are ignored.
    pub fn add(&mut self, coin: &Coin) {
        if coin.is_zero() {
            return;
        }

        let entry = self.0.entry(coin.denom.clone()).or_insert(U256::ZERO);
        *entry = entry
            .checked_add(coin.amount)
            .expect("coins: amount overflow");
    }

    /// The amount of `denom` held.
    pub fn amount_of(&self, denom: &Denom) -> Amount {
        self.0.get(denom).copied().unwrap_or(U256::ZERO)
    }

    /// Whether nothing is held.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates the held coins in denomination order.
    pub fn iter(&self) -> impl Iterator<Item = Coin> + '_ {
        self.0.iter().map(|(denom, amount)| Coin::new(denom.clone(), *amount))
    }
}

impl FromIterator<Coin> for Coins {
    fn from_iter<T: IntoIterator<Item = Coin>>(iter: T) -> Self {
        let mut coins = Coins::new();
        for coin in iter {
            coins.add(&coin);
        }
        coins
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for coin in self.iter() {
            if !first {
                f.write_str(",")?;
            }
            first = false;
            write!(f, "{coin}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coins_merge_and_drop_zeros() {
        let coins: Coins = [
            Coin::new("uatom", 5u128),
            Coin::zero("uosmo"),
            Coin::new("uatom", 7u128),
            Coin::new("ujuno", 1u128),
        ]
        .into_iter()
        .collect();

        assert_eq!(coins.amount_of(&Denom::new("uatom")), U256::new(12));
        assert_eq!(coins.amount_of(&Denom::new("uosmo")), U256::ZERO);
        assert_eq!(coins.to_string(), "12uatom,1ujuno");
    }
}

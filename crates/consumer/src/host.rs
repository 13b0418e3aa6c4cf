//! What the consumer ledger needs from the chain it runs on.

use std::time::Duration;

use restaking_primitives::{
    coin::{Amount, Coin},
    interfaces::{Bank, TokenTransfer},
    types::{Address, Denom, ValidatorId},
};
use serde::{Deserialize, Serialize};

use crate::errors::StakingError;

/// A validator as the staking module reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorInfo {
    /// Identity.
    pub identity: ValidatorId,

    /// Voting power.
    pub power: u64,

    /// Whether the validator is jailed.
    pub jailed: bool,
}

/// The native staking module.
pub trait Staking {
    /// Denomination native stake is bonded in.
    fn bond_denom(&self) -> Denom;

    /// How long unbonded stake stays locked.
    fn unbonding_duration(&self) -> Duration;

    /// Looks a validator up.
    fn validator(&self, identity: &ValidatorId) -> Option<ValidatorInfo>;

    /// Bonds `amount` of the bond denomination held by `delegator` to `validator`.
    fn delegate(
        &mut self,
        delegator: &Address,
        validator: &ValidatorId,
        amount: Amount,
    ) -> Result<(), StakingError>;

    /// Starts unbonding `amount`. The tokens return to `delegator` after
    /// [`Self::unbonding_duration`].
    fn undelegate(
        &mut self,
        delegator: &Address,
        validator: &ValidatorId,
        amount: Amount,
    ) -> Result<(), StakingError>;

    /// Pays out the staking rewards `delegator` accrued with `validator` and returns them.
    fn withdraw_rewards(
        &mut self,
        delegator: &Address,
        validator: &ValidatorId,
    ) -> Result<Vec<Coin>, StakingError>;
}

/// Prices restaked collateral in native stake.
pub trait PriceOracle {
    /// The native stake `coin` is worth, `None` if the denomination has no price.
    fn native_equivalent(&self, coin: &Coin) -> Option<Coin>;
}

/// Everything the consumer ledger touches on its own chain.
pub trait ConsumerHost: Bank + Staking + PriceOracle + TokenTransfer {}

impl<T: Bank + Staking + PriceOracle + TokenTransfer> ConsumerHost for T {}

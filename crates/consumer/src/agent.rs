//! Agents: local stand-ins that bond native stake on behalf of restaking operators.
//!
//! There is one agent per `(restaked denomination, validator)`. Operators hold shares of the
//! agent's pool, denominated in the restaked denomination, while the agent itself bonds the native
//! equivalent. Staking rewards the agent earns are spread over the shares with a cumulative
//! per-share index; each holder keeps a checkpoint of the index it was last settled at.

use std::{collections::BTreeMap, fmt};

use ethnum::U256;
use restaking_primitives::{
    coin::{Amount, Coin, Shares},
    decimal::Decimal,
    errors::SharePoolError,
    share_pool::SharePool,
    types::{Address, Denom, ValidatorId},
};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Prefix of every agent account.
pub const AGENT_ADDRESS_PREFIX: &str = "agent";

/// Account withdrawn rewards are gathered in before they are sent to the coordinator.
pub const REWARD_COLLECTOR: &str = "restaking/rewards";

/// The account rewards are sent to the coordinator from.
pub fn reward_collector() -> Address {
    Address::new(REWARD_COLLECTOR)
}

/// Identifies an agent.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentKey {
    /// Restaked denomination the agent's pool is counted in.
    pub denom: Denom,

    /// Validator the agent bonds to.
    pub validator: ValidatorId,
}

impl AgentKey {
    /// Creates a key.
    pub fn new(denom: impl Into<Denom>, validator: impl Into<ValidatorId>) -> Self {
        Self {
            denom: denom.into(),
            validator: validator.into(),
        }
    }

    /// The agent's account.
    pub fn address(&self) -> Address {
        Address::new(format!(
            "{AGENT_ADDRESS_PREFIX}/{}/{}",
            self.denom, self.validator
        ))
    }
}

impl fmt::Display for AgentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.denom, self.validator)
    }
}

/// An agent and the operators' claims on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    /// Key.
    pub key: AgentKey,

    /// Account holding the agent's tokens.
    pub address: Address,

    /// Operators' shares, valued in the restaked denomination.
    pub pool: SharePool<Address>,

    /// Native stake currently bonded.
    pub native_staked: Amount,

    reward_index: BTreeMap<Denom, Decimal>,
    checkpoints: BTreeMap<Address, BTreeMap<Denom, Decimal>>,
    accrued: BTreeMap<(Address, Denom), Amount>,
}

impl Agent {
    /// An agent with nothing bonded.
    pub fn new(key: AgentKey) -> Self {
        Self {
            address: key.address(),
            key,
            pool: SharePool::new(),
            native_staked: U256::ZERO,
            reward_index: BTreeMap::new(),
            checkpoints: BTreeMap::new(),
            accrued: BTreeMap::new(),
        }
    }

    /// Native stake backing `amount` of the pool.
    pub fn native_for(&self, amount: Amount) -> Amount {
        let total = self.pool.total_staked();
        if total == U256::ZERO {
            return U256::ZERO;
        }

        amount
            .checked_mul(self.native_staked)
            .expect("agent: native product overflow")
            / total
    }

    /// Shares to burn and the pool value released when `holder` gives up `amount`. A request at or
    /// above the holding releases all of it: the coordinator prices the same stake with its own
    /// rounding, so its figure can sit a few units above what the pool says the holder owns.
    pub(crate) fn preview_release(
        &self,
        holder: &Address,
        amount: Amount,
    ) -> Result<(Shares, Amount), SharePoolError> {
        let held = self.pool.value_of(holder);
        let shares = self.pool.shares_of(holder);
        if amount >= held && shares > U256::ZERO && amount > U256::ZERO {
            return Ok((shares, held));
        }

        self.pool.preview_withdraw_amount(holder, amount)
    }

    /// Cumulative rewards per share of `denom`.
    pub fn reward_index(&self, denom: &Denom) -> Decimal {
        self.reward_index.get(denom).copied().unwrap_or_default()
    }

    /// Settled rewards of `denom` owed to `holder` and not yet sent.
    pub fn accrued(&self, holder: &Address, denom: &Denom) -> Amount {
        self.accrued
            .get(&(holder.clone(), denom.clone()))
            .copied()
            .unwrap_or(U256::ZERO)
    }

    /// Spreads freshly withdrawn staking rewards over the outstanding shares.
    pub(crate) fn credit_rewards(&mut self, rewards: &[Coin]) {
        let shares = self.pool.total_shares();
        if shares == U256::ZERO {
            if rewards.iter().any(|c| !c.is_zero()) {
                warn!(agent = %self.key, "rewards earned without shareholders stay with the agent");
            }
            return;
        }

        for coin in rewards.iter().filter(|c| !c.is_zero()) {
            let per_share =
                Decimal::from_ratio(coin.amount, shares).expect("shares are non-zero");
            let index = self.reward_index.entry(coin.denom.clone()).or_default();
            *index = index
                .checked_add(per_share)
                .expect("agent: reward index overflow");
        }
    }

    /// Moves everything `holder` earned since its last checkpoint into its accrued balance.
    pub(crate) fn settle(&mut self, holder: &Address) {
        let shares = self.pool.shares_of(holder);
        let checkpoint = self.checkpoints.entry(holder.clone()).or_default();

        for (denom, index) in &self.reward_index {
            let start = checkpoint.get(denom).copied().unwrap_or_default();
            let owed = index
                .checked_sub(start)
                .expect("reward index never decreases")
                .mul_floor(shares);
            if owed != U256::ZERO {
                *self
                    .accrued
                    .entry((holder.clone(), denom.clone()))
                    .or_insert(U256::ZERO) += owed;
            }
        }

        checkpoint.clone_from(&self.reward_index);
    }

    /// Takes `holder`'s accrued `denom` out for sending.
    pub(crate) fn take_accrued(&mut self, holder: &Address, denom: &Denom) -> Amount {
        self.accrued
            .remove(&(holder.clone(), denom.clone()))
            .unwrap_or(U256::ZERO)
    }

    /// Puts back rewards that could not be sent.
    pub(crate) fn restore_accrued(&mut self, holder: &Address, denom: &Denom, amount: Amount) {
        *self
            .accrued
            .entry((holder.clone(), denom.clone()))
            .or_insert(U256::ZERO) += amount;
    }
}

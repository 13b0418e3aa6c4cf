//! An in-memory consumer chain: bank, staking module, price oracle and token transfer in one
//! value. Tests and the devnet run consumer ledgers against it.

use std::{
    collections::{BTreeMap, BTreeSet, VecDeque},
    time::Duration,
};

use ethnum::U256;
use restaking_primitives::{
    block::{duration_nanos, BlockCtx},
    coin::{Amount, Coin},
    decimal::Decimal,
    errors::{BankError, MessengerError},
    interfaces::{Bank, TokenTransfer},
    mem::InMemoryBank,
    packets::ValidatorUpdate,
    types::{Address, ChannelEnd, Denom, PacketKey, Sequence, Timestamp, ValidatorId},
    unbonding_queue::UnbondingQueue,
};
use tracing::{debug, trace};

use crate::{
    errors::StakingError,
    host::{PriceOracle, Staking, ValidatorInfo},
};

/// Account holding bonded stake.
pub const BONDED_POOL: &str = "staking/bonded";

/// Account holding stake that is unbonding.
pub const UNBONDING_POOL: &str = "staking/unbonding";

/// Account holding escrowed outgoing transfers.
pub const TRANSFER_ESCROW: &str = "transfer/escrow";

/// A token transfer waiting to be relayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundTransfer {
    /// Where the transfer left from and its sequence.
    pub key: PacketKey,

    /// Sender on this chain.
    pub sender: Address,

    /// Receiver on the other chain.
    pub receiver: Address,

    /// What was sent.
    pub coin: Coin,

    /// Timeout as given by the sender.
    pub timeout: Timestamp,
}

#[derive(Debug, Clone)]
struct PendingRelease {
    delegator: Address,
    amount: Amount,
}

/// A consumer chain's modules backed by maps.
#[derive(Debug, Clone)]
pub struct InMemoryHost {
    /// Balances.
    pub bank: InMemoryBank,
    bond_denom: Denom,
    unbonding_duration: Duration,
    now: Timestamp,
    validators: BTreeMap<ValidatorId, ValidatorInfo>,
    bonded: BTreeMap<(Address, ValidatorId), Amount>,
    rewards: BTreeMap<(Address, ValidatorId), BTreeMap<Denom, Amount>>,
    releases: BTreeMap<u64, PendingRelease>,
    release_queue: UnbondingQueue<u64>,
    next_release: u64,
    prices: BTreeMap<Denom, Decimal>,
    transfers: VecDeque<OutboundTransfer>,
    next_transfer_sequence: BTreeMap<ChannelEnd, Sequence>,
    closed: BTreeSet<ChannelEnd>,
}

impl InMemoryHost {
    /// A chain bonding `bond_denom` with the given unbonding period and no validators.
    pub fn new(bond_denom: impl Into<Denom>, unbonding_duration: Duration) -> Self {
        Self {
            bank: InMemoryBank::new(),
            bond_denom: bond_denom.into(),
            unbonding_duration,
            now: 0,
            validators: BTreeMap::new(),
            bonded: BTreeMap::new(),
            rewards: BTreeMap::new(),
            releases: BTreeMap::new(),
            release_queue: UnbondingQueue::new(),
            next_release: 0,
            prices: BTreeMap::new(),
            transfers: VecDeque::new(),
            next_transfer_sequence: BTreeMap::new(),
            closed: BTreeSet::new(),
        }
    }

    /// Adds, updates or with zero power removes a validator. Returns the update to report.
    pub fn set_validator(&mut self, identity: impl Into<ValidatorId>, power: u64) -> ValidatorUpdate {
        let identity = identity.into();
        if power == 0 {
            self.validators.remove(&identity);
        } else {
            self.validators.insert(
                identity.clone(),
                ValidatorInfo {
                    identity: identity.clone(),
                    power,
                    jailed: false,
                },
            );
        }

        ValidatorUpdate { identity, power }
    }

    /// The whole validator set as updates.
    pub fn validator_set(&self) -> Vec<ValidatorUpdate> {
        self.validators
            .values()
            .map(|v| ValidatorUpdate {
                identity: v.identity.clone(),
                power: v.power,
            })
            .collect()
    }

    /// Sets how much native stake one unit of `denom` is worth.
    pub fn set_price(&mut self, denom: impl Into<Denom>, price: Decimal) {
        self.prices.insert(denom.into(), price);
    }

    /// Native stake `delegator` has bonded to `validator`.
    pub fn bonded(&self, delegator: &Address, validator: &ValidatorId) -> Amount {
        self.bonded
            .get(&(delegator.clone(), validator.clone()))
            .copied()
            .unwrap_or(U256::ZERO)
    }

    /// Credits `coin` of rewards to the delegators of `validator` pro rata to their bonded stake.
    /// Rounding dust is dropped.
    pub fn distribute_rewards(&mut self, validator: &ValidatorId, coin: &Coin) {
        let delegations: Vec<_> = self
            .bonded
            .iter()
            .filter(|((_, v), amount)| v == validator && **amount != U256::ZERO)
            .map(|((d, _), amount)| (d.clone(), *amount))
            .collect();
        let total = delegations
            .iter()
            .fold(U256::ZERO, |acc, (_, amount)| acc + *amount);
        if total == U256::ZERO {
            return;
        }

        for (delegator, amount) in delegations {
            let share = coin.amount * amount / total;
            *self
                .rewards
                .entry((delegator, validator.clone()))
                .or_default()
                .entry(coin.denom.clone())
                .or_insert(U256::ZERO) += share;
        }
    }

    /// Burns `fraction` of every delegation to `validator` and returns the total burned.
    pub fn slash_validator(
        &mut self,
        validator: &ValidatorId,
        fraction: Decimal,
    ) -> Result<Amount, BankError> {
        let mut burned = U256::ZERO;
        for ((_, v), amount) in self.bonded.iter_mut() {
            if v != validator {
                continue;
            }
            let cut = fraction.mul_floor(*amount);
            *amount -= cut;
            burned += cut;
        }

        if burned != U256::ZERO {
            let coin = Coin::new(self.bond_denom.clone(), burned);
            self.bank.burn(&Address::new(BONDED_POOL), &coin)?;
        }
        debug!(%validator, %fraction, %burned, "slashed validator");

        Ok(burned)
    }

    /// Moves the clock to `ctx` and releases unbondings that completed.
    pub fn begin_block(&mut self, ctx: &BlockCtx) -> Result<(), BankError> {
        self.now = ctx.time;

        for id in self.release_queue.dequeue_matured(ctx.time) {
            let Some(release) = self.releases.remove(&id) else {
                continue;
            };
            let coin = Coin::new(self.bond_denom.clone(), release.amount);
            self.bank
                .transfer(&Address::new(UNBONDING_POOL), &release.delegator, &coin)?;
            trace!(delegator = %release.delegator, %coin, "released unbonded stake");
        }

        Ok(())
    }

    /// Makes every later transfer over `end` fail.
    pub fn close_transfer_channel(&mut self, end: ChannelEnd) {
        self.closed.insert(end);
    }

    /// Takes every queued transfer in send order.
    pub fn drain_transfers(&mut self) -> Vec<OutboundTransfer> {
        self.transfers.drain(..).collect()
    }

    /// Gives an escrowed transfer back to its sender after it failed.
    pub fn refund(&mut self, transfer: &OutboundTransfer) -> Result<(), BankError> {
        self.bank.transfer(
            &Address::new(TRANSFER_ESCROW),
            &transfer.sender,
            &transfer.coin,
        )
    }

    /// Settles an escrowed transfer that was delivered.
    pub fn settle(&mut self, transfer: &OutboundTransfer) -> Result<(), BankError> {
        self.bank
            .burn(&Address::new(TRANSFER_ESCROW), &transfer.coin)
    }
}

impl Bank for InMemoryHost {
    fn balance(&self, owner: &Address, denom: &Denom) -> Amount {
        self.bank.balance(owner, denom)
    }

    fn transfer(&mut self, from: &Address, to: &Address, coin: &Coin) -> Result<(), BankError> {
        self.bank.transfer(from, to, coin)
    }

    fn mint(&mut self, to: &Address, coin: &Coin) -> Result<(), BankError> {
        self.bank.mint(to, coin)
    }

    fn burn(&mut self, from: &Address, coin: &Coin) -> Result<(), BankError> {
        self.bank.burn(from, coin)
    }
}

impl Staking for InMemoryHost {
    fn bond_denom(&self) -> Denom {
        self.bond_denom.clone()
    }

    fn unbonding_duration(&self) -> Duration {
        self.unbonding_duration
    }

    fn validator(&self, identity: &ValidatorId) -> Option<ValidatorInfo> {
        self.validators.get(identity).cloned()
    }

    fn delegate(
        &mut self,
        delegator: &Address,
        validator: &ValidatorId,
        amount: Amount,
    ) -> Result<(), StakingError> {
        if !self.validators.contains_key(validator) {
            return Err(StakingError::UnknownValidator(validator.clone()));
        }

        let coin = Coin::new(self.bond_denom.clone(), amount);
        self.bank
            .transfer(delegator, &Address::new(BONDED_POOL), &coin)?;
        *self
            .bonded
            .entry((delegator.clone(), validator.clone()))
            .or_insert(U256::ZERO) += amount;

        Ok(())
    }

    fn undelegate(
        &mut self,
        delegator: &Address,
        validator: &ValidatorId,
        amount: Amount,
    ) -> Result<(), StakingError> {
        let key = (delegator.clone(), validator.clone());
        let Some(bonded) = self.bonded.get_mut(&key) else {
            return Err(StakingError::NoDelegation {
                delegator: delegator.clone(),
                validator: validator.clone(),
            });
        };
        if *bonded < amount {
            return Err(StakingError::InsufficientStake {
                requested: Coin::new(self.bond_denom.clone(), amount),
                bonded: Coin::new(self.bond_denom.clone(), *bonded),
            });
        }

        let coin = Coin::new(self.bond_denom.clone(), amount);
        self.bank.transfer(
            &Address::new(BONDED_POOL),
            &Address::new(UNBONDING_POOL),
            &coin,
        )?;
        *bonded -= amount;

        let id = self.next_release;
        self.next_release += 1;
        let completion = self
            .now
            .saturating_add(duration_nanos(self.unbonding_duration));
        self.release_queue.insert(completion, id);
        self.releases.insert(
            id,
            PendingRelease {
                delegator: delegator.clone(),
                amount,
            },
        );

        Ok(())
    }

    fn withdraw_rewards(
        &mut self,
        delegator: &Address,
        validator: &ValidatorId,
    ) -> Result<Vec<Coin>, StakingError> {
        let key = (delegator.clone(), validator.clone());
        if !self.bonded.contains_key(&key) {
            return Err(StakingError::NoDelegation {
                delegator: delegator.clone(),
                validator: validator.clone(),
            });
        }

        let owed = self.rewards.remove(&key).unwrap_or_default();
        let mut paid = Vec::with_capacity(owed.len());
        for (denom, amount) in owed {
            let coin = Coin::new(denom, amount);
            self.bank.mint(delegator, &coin)?;
            paid.push(coin);
        }

        Ok(paid)
    }
}

impl PriceOracle for InMemoryHost {
    fn native_equivalent(&self, coin: &Coin) -> Option<Coin> {
        let price = self.prices.get(&coin.denom)?;
        Some(Coin::new(self.bond_denom.clone(), price.mul_floor(coin.amount)))
    }
}

impl TokenTransfer for InMemoryHost {
    fn send_transfer(
        &mut self,
        end: &ChannelEnd,
        sender: &Address,
        receiver: &Address,
        coin: &Coin,
        timeout: Timestamp,
    ) -> Result<Sequence, MessengerError> {
        if self.closed.contains(end) {
            return Err(MessengerError::ChannelClosed(end.clone()));
        }

        self.bank
            .transfer(sender, &Address::new(TRANSFER_ESCROW), coin)?;

        let next = self.next_transfer_sequence.entry(end.clone()).or_insert(1);
        let sequence = *next;
        *next += 1;

        trace!(%end, sequence, %sender, %receiver, %coin, "queued transfer");
        self.transfers.push_back(OutboundTransfer {
            key: PacketKey::new(end.clone(), sequence),
            sender: sender.clone(),
            receiver: receiver.clone(),
            coin: coin.clone(),
            timeout,
        });

        Ok(sequence)
    }
}

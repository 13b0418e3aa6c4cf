//! Seeded random users driving the network.

use std::collections::BTreeMap;

use anyhow::{bail, Context};
use ethnum::U256;
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use restaking_harness::{genesis::validator_name, Network};
use restaking_primitives::{
    coin::Coin,
    decimal::Decimal,
    types::{Address, ChainId, Denom, ValidatorId},
};
use tracing::{debug, info};

use crate::config::WorkloadConfig;

/// Fraction of stake a validator loses when the workload slashes it.
const SLASH_FRACTION: Decimal = Decimal::from_atomics(U256::new(10_000_000_000_000_000));

/// What the workload did so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct WorkloadStats {
    pub delegations: u64,
    pub undelegations: u64,
    pub reward_accruals: u64,
    pub reward_withdrawals: u64,
    pub validator_slashes: u64,
    pub rejected: u64,
}

#[derive(Debug, Clone)]
struct ConsumerTargets {
    validators: Vec<ValidatorId>,
    reward_denom: Option<Denom>,
}

/// Simulated delegators, operators and consumer validators.
#[derive(Debug)]
pub(crate) struct Workload {
    config: WorkloadConfig,
    rng: StdRng,
    restaking_denom: Denom,
    operators: Vec<Address>,
    delegators: Vec<Address>,
    consumers: BTreeMap<ChainId, ConsumerTargets>,
    stats: WorkloadStats,
}

impl Workload {
    /// Registers the operators and funds the delegators.
    pub(crate) fn genesis(
        config: WorkloadConfig,
        seed: u64,
        network: &mut Network,
    ) -> anyhow::Result<Self> {
        let mut rng = StdRng::seed_from_u64(seed);

        let consumers: BTreeMap<_, _> = network
            .consumers()
            .map(|(chain_id, node)| {
                let targets = ConsumerTargets {
                    validators: (0..config.validators_per_consumer)
                        .map(|i| validator_name(chain_id, i))
                        .collect(),
                    reward_denom: node.params.reward_denoms.first().cloned(),
                };
                (chain_id.clone(), targets)
            })
            .collect();
        if consumers.values().any(|c| c.validators.is_empty()) {
            bail!("every consumer needs at least one validator");
        }

        let restaking_denom = network
            .consumers()
            .next()
            .and_then(|(_, node)| node.params.restaking_denoms.first().cloned())
            .context("network has no consumer accepting a restaking denomination")?;

        let mut operators = Vec::with_capacity(config.operators);
        for i in 0..config.operators {
            let served: Vec<_> = consumers
                .iter()
                .filter_map(|(chain_id, targets)| {
                    targets
                        .validators
                        .choose(&mut rng)
                        .map(|v| (chain_id.clone(), v.clone()))
                })
                .collect();
            let operator = network
                .register_operator(
                    &Address::new(format!("owner{i}")),
                    &restaking_denom,
                    &served,
                )
                .with_context(|| format!("could not register operator {i}"))?;
            operators.push(operator);
        }

        let mut delegators = Vec::with_capacity(config.delegators);
        for i in 0..config.delegators {
            let delegator = Address::new(format!("delegator{i}"));
            network.fund(
                &delegator,
                &Coin::new(restaking_denom.clone(), u128::from(config.initial_balance)),
            )?;
            delegators.push(delegator);
        }

        info!(
            operators = operators.len(),
            delegators = delegators.len(),
            %restaking_denom,
            "workload ready"
        );

        Ok(Self {
            config,
            rng,
            restaking_denom,
            operators,
            delegators,
            consumers,
            stats: WorkloadStats::default(),
        })
    }

    pub(crate) const fn stats(&self) -> &WorkloadStats {
        &self.stats
    }

    pub(crate) fn operators(&self) -> &[Address] {
        &self.operators
    }

    pub(crate) fn delegators(&self) -> &[Address] {
        &self.delegators
    }

    /// Performs this block's random actions. Rejections are expected and only counted.
    pub(crate) fn step(&mut self, network: &mut Network) {
        if self.operators.is_empty() || self.delegators.is_empty() {
            return;
        }

        for _ in 0..self.config.actions_per_block {
            match self.rng.gen_range(0..10) {
                0..=4 => self.delegate(network),
                5 | 6 => self.undelegate(network),
                7 | 8 => self.accrue_rewards(network),
                _ => self.withdraw_rewards(network),
            }
        }

        if self.rng.gen_range(0..1_000_000) < self.config.slash_ppm {
            self.slash_validator(network);
        }
    }

    fn pick_pair(&mut self) -> (Address, Address) {
        let delegator = self.delegators[self.rng.gen_range(0..self.delegators.len())].clone();
        let operator = self.operators[self.rng.gen_range(0..self.operators.len())].clone();
        (delegator, operator)
    }

    fn pick_validator(&mut self) -> Option<(ChainId, ValidatorId, Option<Denom>)> {
        let chains: Vec<_> = self.consumers.keys().cloned().collect();
        let chain_id = chains.choose(&mut self.rng)?.clone();
        let targets = &self.consumers[&chain_id];
        let validator = targets.validators.choose(&mut self.rng)?.clone();
        Some((chain_id, validator, targets.reward_denom.clone()))
    }

    fn delegate(&mut self, network: &mut Network) {
        let (delegator, operator) = self.pick_pair();
        let amount = self.rng.gen_range(1..=self.config.max_delegation.max(1));
        let coin = Coin::new(self.restaking_denom.clone(), u128::from(amount));

        match network.delegate(&delegator, &operator, &coin) {
            Ok(shares) => {
                debug!(%delegator, %operator, %coin, %shares, "workload delegated");
                self.stats.delegations += 1;
            }
            Err(e) => self.rejected("delegate", &e),
        }
    }

    fn undelegate(&mut self, network: &mut Network) {
        let (delegator, operator) = self.pick_pair();
        let value = network.coordinator.delegation_value(&delegator, &operator);
        if value == U256::ZERO {
            return;
        }

        let amount = self.rng.gen_range(1..=value.as_u128());
        let coin = Coin::new(self.restaking_denom.clone(), amount);
        match network.undelegate(&delegator, &operator, &coin) {
            Ok(entry) => {
                debug!(%delegator, %operator, %coin, entry, "workload undelegated");
                self.stats.undelegations += 1;
            }
            Err(e) => self.rejected("undelegate", &e),
        }
    }

    fn accrue_rewards(&mut self, network: &mut Network) {
        let Some((chain_id, validator, Some(denom))) = self.pick_validator() else {
            return;
        };
        let amount = self.rng.gen_range(1..=self.config.max_reward.max(1));
        let coin = Coin::new(denom, u128::from(amount));

        match network.distribute_rewards(&chain_id, &validator, &coin) {
            Ok(()) => self.stats.reward_accruals += 1,
            Err(e) => self.rejected("accrue rewards", &e),
        }
    }

    fn withdraw_rewards(&mut self, network: &mut Network) {
        let (delegator, operator) = self.pick_pair();
        match network.withdraw_rewards(&delegator, &operator) {
            Ok(paid) => {
                if !paid.is_empty() {
                    debug!(%delegator, %operator, %paid, "workload withdrew rewards");
                }
                self.stats.reward_withdrawals += 1;
            }
            Err(e) => self.rejected("withdraw rewards", &e),
        }
    }

    fn slash_validator(&mut self, network: &mut Network) {
        let Some((chain_id, validator, _)) = self.pick_validator() else {
            return;
        };

        match network.slash_validator(&chain_id, &validator, SLASH_FRACTION) {
            Ok(reported) => {
                info!(%chain_id, %validator, operators = reported.len(), "workload slashed validator");
                self.stats.validator_slashes += 1;
            }
            Err(e) => self.rejected("slash validator", &e),
        }
    }

    fn rejected(&mut self, action: &str, err: &dyn std::fmt::Display) {
        debug!(%action, %err, "workload action rejected");
        self.stats.rejected += 1;
    }
}

//! Operators and their registration.

use std::collections::BTreeSet;

use ethnum::U256;
use restaking_primitives::{
    block::BlockCtx,
    coin::{Amount, Shares},
    types::{Address, ChainId, Denom, ValidatorId},
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

use crate::{
    errors::{CoordinatorError, CoordinatorResult},
    ledger::CoordinatorLedger,
};

/// Prefix of derived operator addresses.
pub const OPERATOR_ADDRESS_PREFIX: &str = "operator1";

/// A validator an operator runs on some consumer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperatedValidator {
    /// The consumer.
    pub chain_id: ChainId,

    /// The validator on that consumer.
    pub validator: ValidatorId,
}

/// A pool that delegators stake into and whose stake is mirrored on every consumer it serves.
///
/// The operator's address doubles as the custody account holding the delegated tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operator {
    /// Derived address.
    pub address: Address,

    /// Account that registered the operator.
    pub owner: Address,

    /// The only denomination delegators can stake.
    pub restaking_denom: Denom,

    /// Stake acknowledged by every consumer.
    pub restaked_amount: Amount,

    /// Shares outstanding across all delegators.
    pub shares: Shares,

    /// One validator per served consumer.
    pub operated_validators: Vec<OperatedValidator>,

    /// Delegated in blocks whose records have not finalized yet.
    pub pending_delegation: Amount,

    /// Undelegated in blocks whose records have not finalized yet.
    pub pending_undelegation: Amount,

    /// Latest completed reward period.
    pub last_reward_period: u64,
}

impl Operator {
    /// The stake shares are priced against: acknowledged stake plus in-flight delegations minus
    /// in-flight undelegations.
    pub fn effective_stake(&self) -> Amount {
        (self.restaked_amount + self.pending_delegation).saturating_sub(self.pending_undelegation)
    }

    /// Stake a slash can take; in-flight undelegations are already promised to their delegators.
    pub fn slashable_stake(&self) -> Amount {
        self.restaked_amount
            .saturating_sub(self.pending_undelegation)
    }

    /// Whether the operator runs a validator on `chain_id`.
    pub fn serves(&self, chain_id: &ChainId) -> bool {
        self.operated_validators
            .iter()
            .any(|v| &v.chain_id == chain_id)
    }

    /// Account collected rewards are paid out from.
    pub fn reward_account(&self) -> Address {
        Address::new(format!("{}/rewards", self.address))
    }

    /// Whether delegations can no longer be priced because every staked token was slashed.
    pub fn is_insolvent(&self) -> bool {
        self.shares != U256::ZERO && self.effective_stake() == U256::ZERO
    }
}

/// A request to register an operator. `consumer_chain_ids[i]` pairs with `consumer_validators[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterOperator {
    /// Consumers to serve.
    pub consumer_chain_ids: Vec<ChainId>,

    /// Validator run on each consumer.
    pub consumer_validators: Vec<ValidatorId>,

    /// Denomination delegators will stake.
    pub restaking_denom: Denom,

    /// The registering account.
    pub sender: Address,
}

/// Derives an operator address from the block, a registration nonce and the request.
pub fn derive_operator_address(ctx: &BlockCtx, nonce: u64, msg: &RegisterOperator) -> Address {
    let mut hasher = Sha256::new();
    hasher.update(ctx.header_hash);
    hasher.update(ctx.height.to_be_bytes());
    hasher.update(nonce.to_be_bytes());
    for part in [msg.sender.as_str(), msg.restaking_denom.as_str()] {
        hasher.update(part.as_bytes());
        hasher.update([0]);
    }
    for (chain_id, validator) in msg.consumer_chain_ids.iter().zip(&msg.consumer_validators) {
        hasher.update(chain_id.as_str().as_bytes());
        hasher.update([0]);
        hasher.update(validator.as_str().as_bytes());
        hasher.update([0]);
    }

    let digest = hasher.finalize();
    Address::new(format!("{OPERATOR_ADDRESS_PREFIX}{}", hex::encode(&digest[..20])))
}

impl CoordinatorLedger {
    /// Registers an operator serving one validator on each listed consumer and returns its
    /// address.
    pub fn register_operator(
        &mut self,
        ctx: &BlockCtx,
        msg: RegisterOperator,
    ) -> CoordinatorResult<Address> {
        let chains = msg.consumer_chain_ids.len();
        let validators = msg.consumer_validators.len();
        if chains == 0 || chains != validators {
            return Err(CoordinatorError::MismatchedValidators { chains, validators });
        }

        let mut seen = BTreeSet::new();
        for (chain_id, validator) in msg.consumer_chain_ids.iter().zip(&msg.consumer_validators) {
            if !seen.insert(chain_id) {
                return Err(CoordinatorError::DuplicateConsumer(chain_id.clone()));
            }

            let consumer = self
                .consumers
                .get(chain_id)
                .ok_or_else(|| CoordinatorError::UnknownConsumer(chain_id.clone()))?;
            if !consumer.has_validator(validator) {
                return Err(CoordinatorError::NotExistedValidator {
                    chain_id: chain_id.clone(),
                    validator: validator.clone(),
                });
            }
            if !consumer.accepts(&msg.restaking_denom) {
                return Err(CoordinatorError::UnsupportedRestakingToken {
                    chain_id: chain_id.clone(),
                    denom: msg.restaking_denom.clone(),
                });
            }
        }

        let address = derive_operator_address(ctx, self.registration_nonce, &msg);
        if self.operators.contains_key(&address) {
            return Err(CoordinatorError::OperatorExists(address));
        }
        self.registration_nonce += 1;

        let operated_validators = msg
            .consumer_chain_ids
            .into_iter()
            .zip(msg.consumer_validators)
            .map(|(chain_id, validator)| OperatedValidator {
                chain_id,
                validator,
            })
            .collect();

        let operator = Operator {
            address: address.clone(),
            owner: msg.sender,
            restaking_denom: msg.restaking_denom,
            restaked_amount: U256::ZERO,
            shares: U256::ZERO,
            operated_validators,
            pending_delegation: U256::ZERO,
            pending_undelegation: U256::ZERO,
            last_reward_period: 0,
        };

        info!(
            %address,
            owner = %operator.owner,
            denom = %operator.restaking_denom,
            consumers = chains,
            height = ctx.height,
            "registered operator"
        );

        self.rewards.track_operator(&address);
        self.operators.insert(address.clone(), operator);

        Ok(address)
    }
}

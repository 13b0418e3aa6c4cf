//! Delegating to and undelegating from operators.
//!
//! Both operations take effect on the coordinator immediately: shares are minted or burned at the
//! operator's current price and the amount joins the block's record for that operator. The
//! consumers catch up when the record is swept at the end of the block.

use ethnum::U256;
use restaking_primitives::{
    block::BlockCtx,
    coin::{Amount, Coin, Shares},
    interfaces::Bank,
    share_pool::{calculate_amount, calculate_shares, shares_for_withdrawal},
    types::{Address, BlockHeight, Timestamp},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    errors::{CoordinatorError, CoordinatorResult},
    ledger::CoordinatorLedger,
    operator::Operator,
    records::{
        Legs, OperatorDelegationRecord, OperatorUndelegationRecord, RecordKey, RecordStatus,
    },
};

/// One pending payout to a delegator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnbondingEntry {
    /// Unique across the ledger.
    pub id: u64,

    /// Amount owed.
    pub amount: Amount,

    /// Height the undelegation was requested at.
    pub create_height: BlockHeight,

    /// When the payout matures; `None` until every consumer acknowledged the undelegation.
    pub complete_time: Option<Timestamp>,
}

impl CoordinatorLedger {
    /// Stakes `amount` with `operator` on behalf of `delegator` and returns the shares minted.
    pub fn delegate(
        &mut self,
        ctx: &BlockCtx,
        bank: &mut impl Bank,
        delegator: &Address,
        operator: &Address,
        amount: &Coin,
    ) -> CoordinatorResult<Shares> {
        let op = self.checked_operator(operator, amount)?;
        if op.is_insolvent() {
            return Err(CoordinatorError::OperatorInsolvent(operator.clone()));
        }

        let shares = calculate_shares(amount.amount, op.shares, op.effective_stake());
        if shares == U256::ZERO {
            return Err(CoordinatorError::DelegationTooSmall(amount.amount));
        }

        bank.transfer(delegator, operator, amount)?;
        self.settle_rewards(bank, delegator, operator);

        let op = self.operator_mut(operator);
        op.shares += shares;
        op.pending_delegation += amount.amount;

        *self
            .delegations
            .entry((delegator.clone(), operator.clone()))
            .or_insert(U256::ZERO) += shares;

        let record = self
            .delegation_records
            .entry(RecordKey::new(ctx.height, operator.clone()))
            .or_insert_with(|| OperatorDelegationRecord {
                operator: operator.clone(),
                amount: U256::ZERO,
                status: RecordStatus::Pending,
                legs: Legs::default(),
            });
        assert_eq!(
            record.status,
            RecordStatus::Pending,
            "delegation record of the current block must still be pending"
        );
        record.amount += amount.amount;

        info!(%delegator, %operator, %amount, %shares, height = ctx.height, "delegated");

        Ok(shares)
    }

    /// Starts unbonding `amount` of `delegator`'s stake with `operator` and returns the id of the
    /// unbonding entry. The entry's completion time is only known once every consumer has
    /// acknowledged.
    pub fn undelegate(
        &mut self,
        ctx: &BlockCtx,
        bank: &mut impl Bank,
        delegator: &Address,
        operator: &Address,
        amount: &Coin,
    ) -> CoordinatorResult<u64> {
        let op = self.checked_operator(operator, amount)?;
        let key = (delegator.clone(), operator.clone());
        let held = self
            .delegations
            .get(&key)
            .copied()
            .ok_or_else(|| CoordinatorError::NoDelegation {
                delegator: delegator.clone(),
                operator: operator.clone(),
            })?;

        let effective = op.effective_stake();
        let burned = shares_for_withdrawal(amount.amount, op.shares, effective);
        if burned > held || amount.amount > effective {
            return Err(CoordinatorError::InsufficientShares {
                requested: burned,
                held,
            });
        }

        self.settle_rewards(bank, delegator, operator);

        let op = self.operator_mut(operator);
        op.shares -= burned;
        op.pending_undelegation += amount.amount;

        if burned == held {
            self.delegations.remove(&key);
            self.rewards.forget_delegation(delegator, operator);
        } else {
            self.delegations.insert(key.clone(), held - burned);
        }

        let id = self.next_unbonding_id;
        self.next_unbonding_id += 1;
        self.unbonding_delegations
            .entry(key)
            .or_default()
            .push(UnbondingEntry {
                id,
                amount: amount.amount,
                create_height: ctx.height,
                complete_time: None,
            });

        let record = self
            .undelegation_records
            .entry(RecordKey::new(ctx.height, operator.clone()))
            .or_insert_with(|| OperatorUndelegationRecord {
                operator: operator.clone(),
                amount: U256::ZERO,
                status: RecordStatus::Pending,
                legs: Legs::default(),
                entries: Vec::new(),
                completion_time: None,
            });
        assert_eq!(
            record.status,
            RecordStatus::Pending,
            "undelegation record of the current block must still be pending"
        );
        record.amount += amount.amount;
        record.entries.push((delegator.clone(), id));

        info!(%delegator, %operator, %amount, shares = %burned, entry = id, height = ctx.height, "undelegated");

        Ok(id)
    }

    /// Pays every unbonding entry that matured by `ctx.time` out of operator custody.
    pub(crate) fn pay_matured_unbondings(&mut self, ctx: &BlockCtx, bank: &mut impl Bank) {
        for (delegator, operator) in self.unbonding_queue.dequeue_matured(ctx.time) {
            let key = (delegator, operator);
            let Some(entries) = self.unbonding_delegations.get_mut(&key) else {
                continue;
            };
            let denom = self.operators[&key.1].restaking_denom.clone();

            let (matured, waiting): (Vec<_>, Vec<_>) = entries
                .drain(..)
                .partition(|e| e.complete_time.is_some_and(|t| t <= ctx.time));
            *entries = waiting;

            for entry in matured {
                let coin = Coin::new(denom.clone(), entry.amount);
                if let Err(e) = bank.transfer(&key.1, &key.0, &coin) {
                    panic!("operator custody must cover matured unbonding {}: {e}", entry.id);
                }
                info!(delegator = %key.0, operator = %key.1, %coin, entry = entry.id, "unbonding completed");
            }

            if entries.is_empty() {
                self.unbonding_delegations.remove(&key);
            }
        }
    }

    fn checked_operator(&self, operator: &Address, amount: &Coin) -> CoordinatorResult<&Operator> {
        if amount.is_zero() {
            return Err(CoordinatorError::ZeroAmount);
        }

        let op = self
            .operators
            .get(operator)
            .ok_or_else(|| CoordinatorError::UnknownOperator(operator.clone()))?;
        if amount.denom != op.restaking_denom {
            return Err(CoordinatorError::WrongDenom {
                expected: op.restaking_denom.clone(),
                got: amount.denom.clone(),
            });
        }

        Ok(op)
    }

    pub(crate) fn operator_mut(&mut self, operator: &Address) -> &mut Operator {
        self.operators
            .get_mut(operator)
            .unwrap_or_else(|| panic!("operator {operator} must exist"))
    }

    /// Shares `delegator` holds of `operator`, zero if none.
    pub fn delegation_shares(&self, delegator: &Address, operator: &Address) -> Shares {
        self.delegations
            .get(&(delegator.clone(), operator.clone()))
            .copied()
            .unwrap_or(U256::ZERO)
    }

    /// Current value of `delegator`'s stake with `operator`.
    pub fn delegation_value(&self, delegator: &Address, operator: &Address) -> Amount {
        let Some(op) = self.operators.get(operator) else {
            return U256::ZERO;
        };
        calculate_amount(
            self.delegation_shares(delegator, operator),
            op.shares,
            op.effective_stake(),
        )
    }

    /// Unbonding entries of `delegator` with `operator`, oldest first.
    pub fn unbonding_entries(&self, delegator: &Address, operator: &Address) -> &[UnbondingEntry] {
        self.unbonding_delegations
            .get(&(delegator.clone(), operator.clone()))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Stamps the entries of a finalized undelegation record and queues them for payout.
    pub(crate) fn schedule_unbondings(
        &mut self,
        operator: &Address,
        entries: &[(Address, u64)],
        completion: Timestamp,
    ) {
        for (delegator, id) in entries {
            let key = (delegator.clone(), operator.clone());
            let Some(entry) = self
                .unbonding_delegations
                .get_mut(&key)
                .and_then(|list| list.iter_mut().find(|e| e.id == *id))
            else {
                panic!("unbonding entry {id} of {delegator} must exist until paid");
            };

            entry.complete_time = Some(completion);
            self.unbonding_queue.insert(completion, key);
            debug!(%delegator, %operator, entry = id, completion, "scheduled unbonding");
        }
    }
}

//! The consumer side of restaking.
//!
//! A consumer chain mirrors each operator's restaked collateral into local "agents", one per
//! `(restaked denomination, validator)`. An agent holds native stake bonded to its validator and
//! tracks every operator's claim on it with a [`SharePool`](restaking_primitives::share_pool::SharePool).
//! Packets from the coordinator move collateral in and out of agents; validator slashes and
//! validator set changes travel the other way.

pub mod agent;
pub mod errors;
pub mod host;
pub mod ledger;
pub mod mem;
pub mod unbonding;

mod handlers;
mod slashing;
mod validator_set;

#[cfg(test)]
mod testing;
#[cfg(test)]
mod tests;

pub use ledger::ConsumerLedger;

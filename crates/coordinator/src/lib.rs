//! The coordinator side of cross-chain restaking.
//!
//! Delegators stake with operators here; every operator's stake is mirrored on each consumer
//! chain it serves through packets sent at the end of the block. Acknowledgements come back
//! asynchronously and are correlated through the [`callbacks`] registry, so waiting for a consumer
//! is always persisted state and never a suspended computation.
//!
//! The whole state lives in one [`CoordinatorLedger`](ledger::CoordinatorLedger) value; the bank
//! and the messenger are passed in by the host on every call.

pub mod callbacks;
pub mod consumers;
pub mod delegation;
mod end_block;
pub mod errors;
mod handlers;
pub mod ledger;
pub mod operator;
pub mod records;
pub mod rewards;
mod slashing;

#[cfg(test)]
mod testing;
#[cfg(test)]
mod tests;

pub use ledger::CoordinatorLedger;

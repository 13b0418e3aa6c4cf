//! Ledger-level tests of the consumer, driven through [`crate::testing::Fixture`].

mod delegation;
mod validator_set;

//! Ledger-level tests of the coordinator, driven through [`crate::testing::Fixture`].

mod properties;
mod rewards;

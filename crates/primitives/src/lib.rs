//! Types, pure accounting building blocks and collaborator traits shared by the coordinator and
//! consumer ledgers.
//!
//! This crate lies at the bottom of the crate hierarchy in this workspace, i.e. it does not depend
//! on any other crate in this workspace.

pub mod block;
pub mod coin;
pub mod decimal;
pub mod errors;
pub mod interfaces;
pub mod mem;
pub mod packets;
pub mod share_pool;
pub mod types;
pub mod unbonding_queue;

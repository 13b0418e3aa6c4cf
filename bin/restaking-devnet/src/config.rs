use std::{path::PathBuf, time::Duration};

use restaking_db::persistent::config::DbConfig;
use serde::{Deserialize, Serialize};

/// Settings of one devnet run. None of these are consensus-critical; two runs with the same
/// params, seed and workload produce the same ledgers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Config {
    /// The directory to store the snapshot database in.
    pub datadir: PathBuf,

    /// How many blocks to run.
    pub blocks: u64,

    /// Seed of the workload generator.
    pub seed: u64,

    /// Time between blocks.
    pub block_time: Duration,

    /// Every how many blocks the ledgers are persisted.
    pub snapshot_interval: u64,

    /// How many snapshots per namespace are kept.
    pub keep_snapshots: u64,

    /// What the simulated users do.
    pub workload: WorkloadConfig,

    /// The configuration for the sqlite3 database.
    pub db: DbConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct WorkloadConfig {
    /// Genesis validators per consumer.
    pub validators_per_consumer: usize,

    /// Operators registered at genesis.
    pub operators: usize,

    /// Delegators funded at genesis.
    pub delegators: usize,

    /// What every delegator starts with.
    pub initial_balance: u64,

    /// Random actions per block.
    pub actions_per_block: usize,

    /// Largest single delegation.
    pub max_delegation: u64,

    /// Largest reward accrued to a validator in one action.
    pub max_reward: u64,

    /// Chance per block that some validator is slashed, in parts per million.
    pub slash_ppm: u32,
}

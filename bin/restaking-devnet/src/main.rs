//! Runs a coordinator and its consumer chains in one process, drives them with a seeded random
//! workload and persists the ledgers to sqlite as it goes.

use std::{fs, path::Path};

use anyhow::Context;
use clap::Parser;
use ethnum::U256;
use restaking_common::{logging, logging::LoggerConfig};
use restaking_db::snapshot::SnapshotDb;
use restaking_harness::{genesis::local_genesis, relayer::RelayStats, Network};
use restaking_params::Params;
use restaking_primitives::types::BlockHeight;
use serde::de::DeserializeOwned;
use tokio::runtime;
use tracing::{debug, info, trace, warn};

use crate::{
    config::Config,
    constants::{COORDINATOR_NAMESPACE, GENESIS_TIME},
    persist::persist,
    workload::Workload,
};

mod args;
mod config;
mod constants;
mod persist;
mod workload;

fn main() -> anyhow::Result<()> {
    let _guard = logging::init(LoggerConfig::from_env("restaking-devnet"))?;

    let cli = args::Cli::parse();
    let params = parse_toml::<Params>(&cli.params)?;
    let mut config = parse_toml::<Config>(&cli.config)?;
    if let Some(blocks) = cli.blocks {
        config.blocks = blocks;
    }
    params.validate().context("invalid params")?;

    info!(
        consumers = params.consumers.len(),
        blocks = config.blocks,
        seed = config.seed,
        "starting devnet"
    );

    let runtime = runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("could not build runtime")?;

    runtime.block_on(run(params, config))
}

async fn run(params: Params, config: Config) -> anyhow::Result<()> {
    let db = persist::init_database_handle(&config).await?;
    if let Some((height, _)) = db.latest_snapshot(COORDINATOR_NAMESPACE).await? {
        warn!(%height, "database holds an earlier run, its snapshots will be overwritten");
    }

    let genesis = local_genesis(&params, config.workload.validators_per_consumer);
    let mut network = Network::new(params, genesis, GENESIS_TIME, config.block_time)?;
    let mut workload = Workload::genesis(config.workload.clone(), config.seed, &mut network)?;

    let mut relayed = RelayStats::default();
    for _ in 0..config.blocks {
        workload.step(&mut network);
        relayed.absorb(network.end_block());

        let height = network.ctx().height;
        if config.snapshot_interval > 0 && height % config.snapshot_interval == 0 {
            let keep_from = keep_from(height, config.snapshot_interval, config.keep_snapshots);
            persist(&db, &network.snapshot(), keep_from).await?;
            info!(%height, "persisted ledgers");
        }
    }

    persist(&db, &network.snapshot(), None).await?;
    summarize(&network, &workload, &relayed);

    Ok(())
}

/// Oldest height worth keeping when snapshots are taken every `interval` blocks.
fn keep_from(height: BlockHeight, interval: u64, keep: u64) -> Option<BlockHeight> {
    if keep == 0 {
        return None;
    }
    height.checked_sub(interval.saturating_mul(keep - 1))
}

fn summarize(network: &Network, workload: &Workload, relayed: &RelayStats) {
    let coordinator = &network.coordinator;

    for operator in coordinator.operators() {
        info!(
            operator = %operator.address,
            restaked = %operator.restaked_amount,
            shares = %operator.shares,
            pending_delegation = %operator.pending_delegation,
            pending_undelegation = %operator.pending_undelegation,
            "operator"
        );
    }

    for (chain_id, node) in network.consumers() {
        info!(
            %chain_id,
            agents = node.ledger.agents().count(),
            unbondings = node.ledger.unbondings().count(),
            "consumer"
        );
    }

    let held: usize = workload
        .delegators()
        .iter()
        .map(|who| {
            coordinator
                .operators()
                .filter(|op| coordinator.delegation_value(who, &op.address) > U256::ZERO)
                .count()
        })
        .sum();

    info!(
        height = network.ctx().height,
        open_delegation_records = coordinator.open_delegation_records().count(),
        open_undelegation_records = coordinator.open_undelegation_records().count(),
        pending_callbacks = coordinator.pending_callbacks(),
        operators = workload.operators().len(),
        delegations = held,
        stats = ?workload.stats(),
        relayed = ?relayed,
        "devnet finished"
    );
}

/// Reads and parses a TOML file from `path` into `T`.
fn parse_toml<T>(path: impl AsRef<Path>) -> anyhow::Result<T>
where
    T: std::fmt::Debug + DeserializeOwned,
{
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read TOML file {}", path.display()))?;
    trace!(?raw, "read file");

    let parsed = toml::from_str::<T>(&raw)
        .with_context(|| format!("failed to parse TOML file {}", path.display()))?;
    debug!(?parsed, "parsed TOML file");

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_the_configured_number_of_snapshots() {
        assert_eq!(keep_from(100, 10, 3), Some(80));
        assert_eq!(keep_from(10, 10, 3), None);
        assert_eq!(keep_from(100, 10, 0), None);
        assert_eq!(keep_from(100, 10, 1), Some(100));
    }

    #[test]
    fn bundled_files_parse() {
        let params: Params = toml::from_str(include_str!("../params.toml")).unwrap();
        assert!(params.validate().is_ok());
        assert_eq!(params.consumers.len(), 2);

        let config: Config = toml::from_str(include_str!("../config.toml")).unwrap();
        assert_eq!(config.snapshot_interval, 50);
    }
}

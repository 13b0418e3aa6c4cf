//! Opening the snapshot database and writing ledgers into it.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use restaking_db::{
    persistent::sqlite::SqliteDb,
    snapshot::{self, SnapshotDb},
};
use restaking_harness::network::NetworkSnapshot;
use restaking_primitives::types::ChainId;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use tracing::{debug, info};

use crate::{
    config::Config,
    constants::{COORDINATOR_NAMESPACE, DB_NAME},
};

pub(crate) async fn init_database_handle(config: &Config) -> anyhow::Result<SqliteDb> {
    let db_path = create_db_file(&config.datadir, DB_NAME)?;

    let connect_options = SqliteConnectOptions::new()
        .filename(&db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .connect_with(connect_options)
        .await
        .with_context(|| format!("could not open database at {}", db_path.display()))?;

    info!(path = %db_path.display(), "opened snapshot database");

    Ok(SqliteDb::new(pool, config.db.clone()).await?)
}

fn create_db_file(datadir: &Path, db_name: &str) -> anyhow::Result<PathBuf> {
    if !datadir.exists() {
        fs::create_dir_all(datadir)
            .with_context(|| format!("could not create datadir at {}", datadir.display()))?;
    }

    Ok(datadir.join(db_name))
}

/// Namespace a consumer ledger is stored under.
pub(crate) fn consumer_namespace(chain_id: &ChainId) -> String {
    format!("consumer/{chain_id}")
}

/// Stores every ledger of `snap` at its height and drops snapshots older than `keep_from`.
pub(crate) async fn persist<D>(
    db: &D,
    snap: &NetworkSnapshot,
    keep_from: Option<u64>,
) -> anyhow::Result<()>
where
    D: SnapshotDb + Sync,
{
    snapshot::save(db, COORDINATOR_NAMESPACE, snap.height, &snap.coordinator).await?;
    for (chain_id, ledger) in &snap.consumers {
        snapshot::save(db, &consumer_namespace(chain_id), snap.height, ledger).await?;
    }

    let Some(keep_from) = keep_from else {
        return Ok(());
    };

    let mut pruned = db.prune_below(COORDINATOR_NAMESPACE, keep_from).await?;
    for chain_id in snap.consumers.keys() {
        pruned += db
            .prune_below(&consumer_namespace(chain_id), keep_from)
            .await?;
    }
    debug!(height = snap.height, keep_from, pruned, "persisted ledgers");

    Ok(())
}

//! One tester run against the in-memory store.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use stacktester_concurrency::MemoryDatabase;
use stacktester_core::{printable, Database};
use stacktester_executor::{Executor, RunSummary};
use stacktester_storage::snapshot;

use crate::commands::Invocation;
use crate::settings::Settings;

/// Run the instruction stream named by `invocation`.
///
/// The snapshot file, when given and present, seeds the keyspace; the final
/// keyspace is written back to it after every context has finished.
///
/// # Errors
///
/// Fails on configuration and snapshot errors. Context failures are reported
/// in the returned summary instead.
pub async fn run(invocation: &Invocation) -> Result<RunSummary> {
    let mut settings = Settings::load(invocation.config.as_deref())?;
    settings.tester.api_version = invocation.api_version;
    settings.tester.validate()?;

    let memory = MemoryDatabase::new(settings.store.clone());
    if let Some(path) = &invocation.cluster {
        if path.exists() {
            snapshot::load(memory.store(), path)
                .with_context(|| format!("failed to load snapshot {}", path.display()))?;
        } else {
            warn!(path = %path.display(), "Snapshot not found, starting from an empty keyspace");
        }
    }

    info!(
        prefix = %printable(&invocation.prefix),
        api_version = invocation.api_version,
        "Starting run"
    );
    let db: Arc<dyn Database> = Arc::new(memory.clone());
    let executor = Executor::new(db, settings.tester);
    let summary = executor.run(invocation.prefix.clone()).await;
    info!(
        contexts = summary.contexts,
        failures = summary.failures.len(),
        "Run finished"
    );

    if let Some(path) = &invocation.cluster {
        snapshot::save(memory.store(), path)
            .with_context(|| format!("failed to save snapshot {}", path.display()))?;
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stacktester_concurrency::DatabaseConfig;
    use stacktester_core::{tuple, Element};
    use std::path::Path;

    fn instruction(tokens: &[Element]) -> Vec<u8> {
        tuple::pack(tokens).unwrap()
    }

    async fn write_stream(path: &Path, prefix: &[u8], program: &[Vec<Element>]) {
        let memory = MemoryDatabase::new(DatabaseConfig::for_testing());
        let tr = memory.create_transaction().unwrap();
        for (i, tokens) in program.iter().enumerate() {
            let key = tuple::pack(&[Element::bytes(prefix.to_vec()), Element::from(i as i64)]).unwrap();
            tr.set(&key, &instruction(tokens)).unwrap();
        }
        tr.commit().await.unwrap();
        snapshot::save(memory.store(), path).unwrap();
    }

    async fn read_back(path: &Path, key: &[u8]) -> Option<Vec<u8>> {
        let memory = MemoryDatabase::new(DatabaseConfig::for_testing());
        snapshot::load(memory.store(), path).unwrap();
        let tr = memory.create_transaction().unwrap();
        tr.get(key, false).await.unwrap()
    }

    fn invocation(prefix: &[u8], cluster: &Path) -> Invocation {
        Invocation {
            prefix: prefix.to_vec(),
            api_version: 510,
            cluster: Some(cluster.to_path_buf()),
            config: None,
        }
    }

    #[tokio::test]
    async fn test_run_round_trips_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.snap");
        write_stream(
            &path,
            b"spec",
            &[
                vec![Element::from("PUSH"), Element::bytes(b"out".to_vec())],
                vec![Element::from("PUSH"), Element::bytes(b"done".to_vec())],
                vec![Element::from("SET_DATABASE")],
            ],
        )
        .await;

        let summary = run(&invocation(b"spec", &path)).await.unwrap();
        assert!(summary.is_success());
        assert_eq!(read_back(&path, b"out").await, Some(b"done".to_vec()));
    }

    #[tokio::test]
    async fn test_failed_context_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.snap");
        write_stream(&path, b"spec", &[vec![Element::from("NO_SUCH_OP")]]).await;

        let summary = run(&invocation(b"spec", &path)).await.unwrap();
        assert_eq!(summary.failures.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_snapshot_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fresh.snap");
        let summary = run(&invocation(b"spec", &path)).await.unwrap();
        assert!(summary.is_success());
        assert!(path.exists());
    }
}

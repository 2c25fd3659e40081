//! Periodic eviction of served artifacts.
//!
//! Committed artifacts stay downloadable for `ARTIFACT_TTL_SECS`. This task
//! deletes files in the public directory whose modification time is older
//! than that, on a fixed `tokio::time::interval`.

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio_util::sync::CancellationToken;

/// Upper bound on how often the sweep runs.
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Result of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub files_deleted: u32,
    pub bytes_reclaimed: u64,
}

/// Run the eviction loop until `cancel` is triggered.
pub async fn run(public_dir: PathBuf, ttl: Duration, cancel: CancellationToken) {
    let period = sweep_interval(ttl);

    tracing::info!(
        dir = %public_dir.display(),
        ttl_secs = ttl.as_secs(),
        interval_secs = period.as_secs(),
        "Artifact retention job started"
    );

    let mut interval = tokio::time::interval(period);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Artifact retention job stopping");
                break;
            }
            _ = interval.tick() => {
                match sweep(&public_dir, ttl).await {
                    Ok(report) if report.files_deleted > 0 => {
                        tracing::info!(
                            files_deleted = report.files_deleted,
                            bytes_reclaimed = report.bytes_reclaimed,
                            "Artifact retention: evicted expired artifacts"
                        );
                    }
                    Ok(_) => tracing::debug!("Artifact retention: nothing to evict"),
                    Err(e) => {
                        tracing::error!(error = %e, "Artifact retention: sweep failed");
                    }
                }
            }
        }
    }
}

/// Delete every regular file in `dir` last modified at least `ttl` ago.
///
/// Files that vanish mid-sweep are skipped.
pub async fn sweep(dir: &Path, ttl: Duration) -> io::Result<SweepReport> {
    let now = SystemTime::now();
    let mut report = SweepReport::default();
    let mut entries = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let meta = match entry.metadata().await {
            Ok(meta) if meta.is_file() => meta,
            _ => continue,
        };

        let age = meta
            .modified()
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .unwrap_or_default();
        if age < ttl {
            continue;
        }

        match tokio::fs::remove_file(entry.path()).await {
            Ok(()) => {
                report.files_deleted += 1;
                report.bytes_reclaimed += meta.len();
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %entry.path().display(), error = %e, "Failed to evict artifact");
            }
        }
    }

    Ok(report)
}

fn sweep_interval(ttl: Duration) -> Duration {
    ttl.min(MAX_SWEEP_INTERVAL).max(Duration::from_secs(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sweep_keeps_fresh_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("compressed-a.bin"), b"1234").unwrap();

        let report = sweep(dir.path(), Duration::from_secs(3600)).await.unwrap();
        assert_eq!(report, SweepReport::default());
        assert!(dir.path().join("compressed-a.bin").exists());
    }

    #[tokio::test]
    async fn sweep_evicts_expired_files_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("reconstructed-a.wav"), b"12345").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let report = sweep(dir.path(), Duration::ZERO).await.unwrap();
        assert_eq!(report.files_deleted, 1);
        assert_eq!(report.bytes_reclaimed, 5);
        assert!(!dir.path().join("reconstructed-a.wav").exists());
        assert!(dir.path().join("nested").is_dir());
    }

    #[test]
    fn interval_is_clamped() {
        assert_eq!(sweep_interval(Duration::from_secs(3600)), MAX_SWEEP_INTERVAL);
        assert_eq!(sweep_interval(Duration::from_secs(5)), Duration::from_secs(5));
        assert_eq!(sweep_interval(Duration::ZERO), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn run_stops_on_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(
            dir.path().to_path_buf(),
            Duration::from_secs(3600),
            cancel.clone(),
        ));
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("task should stop")
            .expect("task should not panic");
    }
}

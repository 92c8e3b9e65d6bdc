//! Backup retention sweep
//!
//! Safety net for backup files orphaned by process termination paths that
//! bypassed the journal (an unclean kill after backup capture but before
//! the journal flush landed on disk). Independent of the tracked-operation
//! lifecycle.
//!
//! The sweeper is an explicitly owned scheduled task: tests and graceful
//! shutdown stop it deterministically instead of relying on an untracked
//! global timer.

use crate::error::JournalError;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Handle owning the periodic backup sweep task
#[derive(Debug)]
pub struct RetentionSweeper {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl RetentionSweeper {
    /// Spawn the sweep task
    ///
    /// Every `interval`, backup files in `backup_dir` older than `max_age`
    /// are deleted. The journal file and in-flight temp files are never
    /// touched.
    #[must_use]
    pub fn spawn(backup_dir: PathBuf, max_age: Duration, interval: Duration) -> Self {
        let (shutdown, mut watch_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick fires immediately; skip it so a fresh process
            // does not race its own recovery bootstrap.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match sweep_once(&backup_dir, max_age).await {
                            Ok(0) => {}
                            Ok(purged) => {
                                tracing::info!(purged, dir = %backup_dir.display(), "purged stale backups");
                            }
                            Err(e) => {
                                tracing::warn!(error = %e, "backup retention sweep failed");
                            }
                        }
                    }
                    _ = watch_rx.changed() => break,
                }
            }
        });
        Self { shutdown, handle }
    }

    /// Stop the sweep task and wait for it to exit
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }
}

/// Delete backup files older than `max_age`; returns how many were removed
///
/// Exposed for tests and manual triggering.
///
/// # Errors
/// Fails when the backup directory cannot be read; individual file
/// failures are logged and skipped.
pub async fn sweep_once(backup_dir: &Path, max_age: Duration) -> Result<usize, JournalError> {
    let mut entries = tokio::fs::read_dir(backup_dir)
        .await
        .map_err(|e| JournalError::io(backup_dir, e))?;

    let mut purged = 0usize;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| JournalError::io(backup_dir, e))?
    {
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();
        // journal.json and dot-prefixed temp files belong to the journal.
        if name == crate::journal::JOURNAL_FILE || name.starts_with('.') {
            continue;
        }
        let Ok(meta) = entry.metadata().await else {
            continue;
        };
        if !meta.is_file() {
            continue;
        }
        let Ok(modified) = meta.modified() else {
            continue;
        };
        let age = modified.elapsed().unwrap_or_default();
        if age > max_age {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => purged += 1,
                Err(e) => {
                    tracing::warn!(file = %path.display(), error = %e, "failed to purge backup");
                }
            }
        }
    }
    Ok(purged)
}

//! Backup/rollback manager
//!
//! [`OperationJournal`] owns the `.backup/` directory of a live project
//! root: before-image files plus the durable `journal.json` operation
//! table. Every table mutation is flushed to disk before the public call
//! returns, so a crash at any point can be replayed by the next
//! [`OperationJournal::open`].

use crate::error::{JournalError, RollbackReport};
use crate::types::{MutationOperation, OperationId, OperationKind, OperationState};
use chrono::Utc;
use dashmap::DashMap;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Backup directory name under the project root
pub const BACKUP_DIR: &str = ".backup";

/// Durable operation table file inside [`BACKUP_DIR`]
pub const JOURNAL_FILE: &str = "journal.json";

/// Journal configuration
#[derive(Debug, Clone)]
pub struct JournalConfig {
    /// Age beyond which orphaned backup files are purged by the retention sweep
    pub backup_max_age: Duration,
    /// How often the retention sweep runs
    pub sweep_interval: Duration,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            backup_max_age: Duration::from_secs(24 * 60 * 60),
            sweep_interval: Duration::from_secs(60 * 60),
        }
    }
}

/// Durable, crash-recoverable record of in-flight live-tree mutations
///
/// The in-memory table is a cache of `journal.json`; only non-terminal
/// operations are persisted, so replay at open restores exactly the
/// mutations that never reached commit or rollback.
#[derive(Debug)]
pub struct OperationJournal {
    project_root: PathBuf,
    backup_dir: PathBuf,
    journal_path: PathBuf,
    config: JournalConfig,
    /// Tracked operations, including terminal ones kept for history
    table: Mutex<HashMap<OperationId, MutationOperation>>,
    /// Per-target-path serialization; entries live as long as the manager
    path_locks: DashMap<PathBuf, Arc<Mutex<()>>>,
}

impl OperationJournal {
    /// Open the journal for a project root, running crash recovery first
    ///
    /// Every entry found in a persisted journal is treated as unterminated
    /// at last shutdown and unconditionally reverted: backups are copied
    /// back when present, created files removed when not. The journal file
    /// is then deleted so a clean start begins from an empty table. A
    /// malformed journal is logged and discarded rather than blocking
    /// startup.
    ///
    /// No public operation can race the bootstrap because no handle exists
    /// until this returns.
    ///
    /// # Errors
    /// Fails when the backup directory cannot be created or a recovered
    /// entry cannot be restored.
    pub async fn open(
        project_root: impl Into<PathBuf>,
        config: JournalConfig,
    ) -> Result<Self, JournalError> {
        let project_root = project_root.into();
        let backup_dir = project_root.join(BACKUP_DIR);
        let journal_path = backup_dir.join(JOURNAL_FILE);

        tokio::fs::create_dir_all(&backup_dir)
            .await
            .map_err(|e| JournalError::io(&backup_dir, e))?;

        let journal = Self {
            project_root,
            backup_dir,
            journal_path,
            config,
            table: Mutex::new(HashMap::new()),
            path_locks: DashMap::new(),
        };
        journal.recover().await?;
        Ok(journal)
    }

    /// Crash-recovery sweep over a persisted journal file
    async fn recover(&self) -> Result<(), JournalError> {
        let raw = match tokio::fs::read_to_string(&self.journal_path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(JournalError::io(&self.journal_path, e)),
        };

        let mut entries: Vec<MutationOperation> = match serde_json::from_str(&raw) {
            Ok(entries) => entries,
            Err(e) => {
                // Availability over perfect recovery: a corrupt journal must
                // not block startup, but whatever it described is forfeited.
                tracing::error!(
                    journal = %self.journal_path.display(),
                    error = %e,
                    "journal unreadable; discarding it and starting empty"
                );
                Vec::new()
            }
        };

        if !entries.is_empty() {
            tracing::info!(
                count = entries.len(),
                "recovering unterminated operations from previous run"
            );
        }

        // Newest first: layered edits to one path must end at the oldest
        // before-image.
        entries.sort_by_key(|op| std::cmp::Reverse(op.created_at));

        for op in &entries {
            // No partial trust of a recovered entry: revert unconditionally.
            restore_files(op).await?;
            tracing::info!(
                operation = %op.id,
                target = %op.target_path.display(),
                kind = ?op.kind,
                "rolled back unterminated operation"
            );
        }

        match tokio::fs::remove_file(&self.journal_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(JournalError::io(&self.journal_path, e)),
        }
    }

    /// Write `content` to `rel_path`, backing up any existing file first
    ///
    /// The operation is journaled and flushed to disk before the live write
    /// happens. If the write itself fails, the operation is rolled back
    /// before the error surfaces: the journal never records a mutation
    /// whose underlying write did not actually happen.
    ///
    /// # Errors
    /// - [`JournalError::Guard`] for rejected paths
    /// - [`JournalError::Io`] for filesystem failures
    pub async fn write_with_backup(
        &self,
        rel_path: &str,
        content: &[u8],
    ) -> Result<OperationId, JournalError> {
        let safe = remedy_guard::SafePath::validate(rel_path)?;
        let target = safe.resolve(&self.project_root);

        let path_lock = self.path_lock(&target);
        let _path_guard = path_lock.lock().await;

        let exists = tokio::fs::try_exists(&target)
            .await
            .map_err(|e| JournalError::io(&target, e))?;
        let kind = if exists {
            OperationKind::Overwrite
        } else {
            OperationKind::Create
        };

        let mut op = MutationOperation::new(target.clone(), None, kind);
        if exists {
            op.backup_path = Some(self.capture_backup(&op).await?);
        }
        let id = op.id;

        self.insert_and_flush(op.clone()).await?;

        match write_file(&target, content).await {
            Ok(()) => {
                self.advance_and_flush(id, OperationState::Applied).await?;
                tracing::info!(operation = %id, target = %target.display(), ?kind, "live write applied");
                Ok(id)
            }
            Err(e) => {
                // Undo before surfacing; the tree must look untouched.
                if let Err(restore_err) = restore_files(&op).await {
                    tracing::error!(
                        operation = %id,
                        error = %restore_err,
                        "rollback after failed write also failed"
                    );
                }
                self.advance_and_flush(id, OperationState::RolledBack)
                    .await?;
                Err(e)
            }
        }
    }

    /// Unlink `rel_path`, backing it up first
    ///
    /// Delete requires a pre-existing file; the backup is mandatory.
    ///
    /// # Errors
    /// - [`JournalError::MissingTarget`] when the file does not exist
    /// - [`JournalError::Guard`] / [`JournalError::Io`] as for writes
    pub async fn delete_with_backup(&self, rel_path: &str) -> Result<OperationId, JournalError> {
        let safe = remedy_guard::SafePath::validate(rel_path)?;
        let target = safe.resolve(&self.project_root);

        let path_lock = self.path_lock(&target);
        let _path_guard = path_lock.lock().await;

        let exists = tokio::fs::try_exists(&target)
            .await
            .map_err(|e| JournalError::io(&target, e))?;
        if !exists {
            return Err(JournalError::MissingTarget(target));
        }

        let mut op = MutationOperation::new(target.clone(), None, OperationKind::Delete);
        op.backup_path = Some(self.capture_backup(&op).await?);
        let id = op.id;

        self.insert_and_flush(op.clone()).await?;

        match tokio::fs::remove_file(&target).await {
            Ok(()) => {
                self.advance_and_flush(id, OperationState::Applied).await?;
                tracing::info!(operation = %id, target = %target.display(), "live delete applied");
                Ok(id)
            }
            Err(e) => {
                if let Err(restore_err) = restore_files(&op).await {
                    tracing::error!(
                        operation = %id,
                        error = %restore_err,
                        "rollback after failed delete also failed"
                    );
                }
                self.advance_and_flush(id, OperationState::RolledBack)
                    .await?;
                Err(JournalError::io(&target, e))
            }
        }
    }

    /// Restore one operation to its pre-mutation state
    ///
    /// Idempotent: an unknown or already-terminal id is a successful no-op.
    /// A pure creation is rolled back by deleting the created file.
    ///
    /// # Errors
    /// Returns [`JournalError::Io`] when the restore itself fails.
    pub async fn rollback_operation(&self, id: OperationId) -> Result<(), JournalError> {
        let Some(pending) = self.non_terminal_snapshot_of(id).await else {
            tracing::debug!(operation = %id, "rollback no-op: unknown or terminal");
            return Ok(());
        };

        let path_lock = self.path_lock(&pending.target_path);
        let _path_guard = path_lock.lock().await;

        let mut table = self.table.lock().await;
        // Re-check under the path lock; a racing caller may have won.
        let Some(op) = table.get(&id).filter(|op| !op.is_terminal()).cloned() else {
            return Ok(());
        };

        restore_files(&op).await?;

        let entry = table
            .get_mut(&id)
            .ok_or(JournalError::UnknownOperation(id))?;
        entry.state = entry.state.transition(OperationState::RolledBack)?;
        self.flush_locked(&table).await?;
        tracing::info!(operation = %id, target = %op.target_path.display(), "operation rolled back");
        Ok(())
    }

    /// Commit operations, discarding their backups
    ///
    /// The irreversible boundary: only call once external verification has
    /// succeeded. All ids are validated before any backup is touched.
    ///
    /// # Errors
    /// - [`JournalError::UnknownOperation`] for an id the journal does not
    ///   track (a caller bug, never silently ignored)
    /// - [`JournalError::InvalidTransition`] for an operation not in
    ///   `Applied`
    pub async fn commit(&self, ids: &[OperationId]) -> Result<(), JournalError> {
        let mut table = self.table.lock().await;

        for id in ids {
            let op = table.get(id).ok_or(JournalError::UnknownOperation(*id))?;
            op.state.transition(OperationState::Committed)?;
        }

        for id in ids {
            let entry = table
                .get_mut(id)
                .ok_or(JournalError::UnknownOperation(*id))?;
            if let Some(backup) = entry.backup_path.take() {
                if let Err(e) = tokio::fs::remove_file(&backup).await {
                    if e.kind() != ErrorKind::NotFound {
                        // Leaked backup; the retention sweep reclaims it.
                        tracing::warn!(
                            operation = %id,
                            backup = %backup.display(),
                            error = %e,
                            "failed to remove committed backup"
                        );
                    }
                }
            }
            entry.state = entry.state.transition(OperationState::Committed)?;
            tracing::info!(operation = %id, "operation committed");
        }

        self.flush_locked(&table).await
    }

    /// Roll back every tracked non-terminal operation
    ///
    /// Used for whole-batch abort. Per-operation failures are collected in
    /// the report; they never stop the sweep.
    pub async fn rollback_all(&self) -> RollbackReport {
        let pending: Vec<OperationId> = {
            let table = self.table.lock().await;
            let mut ops: Vec<&MutationOperation> =
                table.values().filter(|op| !op.is_terminal()).collect();
            // Newest first, so layered edits to one path unwind back to the
            // oldest before-image.
            ops.sort_by_key(|op| std::cmp::Reverse(op.created_at));
            ops.iter().map(|op| op.id).collect()
        };

        let mut report = RollbackReport::default();
        for id in pending {
            match self.rollback_operation(id).await {
                Ok(()) => report.rolled_back.push(id),
                Err(e) => {
                    tracing::error!(operation = %id, error = %e, "rollback failed during sweep");
                    report.failures.push((id, e));
                }
            }
        }
        report
    }

    /// Read-only snapshot of non-terminal operations
    pub async fn active_operations(&self) -> Vec<MutationOperation> {
        let table = self.table.lock().await;
        let mut ops: Vec<MutationOperation> = table
            .values()
            .filter(|op| !op.is_terminal())
            .cloned()
            .collect();
        ops.sort_by_key(|op| op.created_at);
        ops
    }

    /// Backup directory owned by this journal
    #[inline]
    #[must_use]
    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Journal configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &JournalConfig {
        &self.config
    }

    fn path_lock(&self, target: &Path) -> Arc<Mutex<()>> {
        self.path_locks
            .entry(target.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn non_terminal_snapshot_of(&self, id: OperationId) -> Option<MutationOperation> {
        let table = self.table.lock().await;
        table.get(&id).filter(|op| !op.is_terminal()).cloned()
    }

    /// Copy the current target bytes into a fresh, uniquely named backup
    async fn capture_backup(&self, op: &MutationOperation) -> Result<PathBuf, JournalError> {
        let file_name = op
            .target_path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("file");
        let backup_name = format!(
            "{}-{}-{}",
            Utc::now().format("%Y%m%dT%H%M%S%3fZ"),
            op.id,
            file_name
        );
        let backup_path = self.backup_dir.join(backup_name);

        tokio::fs::copy(&op.target_path, &backup_path)
            .await
            .map_err(|e| JournalError::io(&backup_path, e))?;
        Ok(backup_path)
    }

    async fn insert_and_flush(&self, op: MutationOperation) -> Result<(), JournalError> {
        let mut table = self.table.lock().await;
        table.insert(op.id, op);
        self.flush_locked(&table).await
    }

    async fn advance_and_flush(
        &self,
        id: OperationId,
        to: OperationState,
    ) -> Result<(), JournalError> {
        let mut table = self.table.lock().await;
        let entry = table
            .get_mut(&id)
            .ok_or(JournalError::UnknownOperation(id))?;
        entry.state = entry.state.transition(to)?;
        self.flush_locked(&table).await
    }

    /// Persist the non-terminal table to `journal.json`, atomically
    ///
    /// Called with the table lock held so persisted state never lags a
    /// mutation visible to another caller.
    async fn flush_locked(
        &self,
        table: &HashMap<OperationId, MutationOperation>,
    ) -> Result<(), JournalError> {
        let mut entries: Vec<&MutationOperation> =
            table.values().filter(|op| !op.is_terminal()).collect();
        entries.sort_by_key(|op| op.created_at);

        let json = serde_json::to_vec_pretty(&entries)
            .map_err(|e| JournalError::io(&self.journal_path, e.into()))?;
        atomic_write(&self.journal_path, &json).await
    }
}

/// Write bytes to a target path, creating parent directories as needed
async fn write_file(target: &Path, content: &[u8]) -> Result<(), JournalError> {
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| JournalError::io(parent, e))?;
    }
    tokio::fs::write(target, content)
        .await
        .map_err(|e| JournalError::io(target, e))
}

/// Return the target to its pre-operation state
///
/// With a backup: copy it back over the target and remove the backup file.
/// Without one (pure creation): delete the created file, tolerating absence.
async fn restore_files(op: &MutationOperation) -> Result<(), JournalError> {
    match &op.backup_path {
        Some(backup) => {
            if let Some(parent) = op.target_path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| JournalError::io(parent, e))?;
            }
            tokio::fs::copy(backup, &op.target_path)
                .await
                .map_err(|e| JournalError::io(&op.target_path, e))?;
            match tokio::fs::remove_file(backup).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(JournalError::io(backup, e)),
            }
        }
        None => match tokio::fs::remove_file(&op.target_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(JournalError::io(&op.target_path, e)),
        },
    }
    Ok(())
}

/// Atomic file replacement: same-dir temp file, rename, parent sync
async fn atomic_write(path: &Path, content: &[u8]) -> Result<(), JournalError> {
    let parent = path
        .parent()
        .ok_or_else(|| JournalError::io(path, std::io::Error::other("path has no parent")))?;
    let tmp_name = format!(
        ".{}.tmp-{}",
        path.file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("journal"),
        uuid::Uuid::new_v4()
    );
    let tmp_path = parent.join(tmp_name);

    let mut file = tokio::fs::OpenOptions::new()
        .create_new(true)
        .write(true)
        .open(&tmp_path)
        .await
        .map_err(|e| JournalError::io(&tmp_path, e))?;
    file.write_all(content)
        .await
        .map_err(|e| JournalError::io(&tmp_path, e))?;
    file.sync_all()
        .await
        .map_err(|e| JournalError::io(&tmp_path, e))?;
    drop(file);

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| JournalError::io(path, e))?;
    sync_dir(parent)
}

#[cfg(unix)]
fn sync_dir(parent: &Path) -> Result<(), JournalError> {
    std::fs::File::open(parent)
        .and_then(|dir| dir.sync_all())
        .map_err(|e| JournalError::io(parent, e))
}

#[cfg(not(unix))]
fn sync_dir(_parent: &Path) -> Result<(), JournalError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open_journal(root: &TempDir) -> OperationJournal {
        OperationJournal::open(root.path(), JournalConfig::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn write_creates_file_and_tracks_operation() {
        let root = TempDir::new().unwrap();
        let journal = open_journal(&root).await;

        let id = journal
            .write_with_backup("src/a.ts", b"export const x = 1;")
            .await
            .unwrap();

        let written = std::fs::read(root.path().join("src/a.ts")).unwrap();
        assert_eq!(written, b"export const x = 1;");

        let active = journal.active_operations().await;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, id);
        assert_eq!(active[0].kind, OperationKind::Create);
        assert_eq!(active[0].state, OperationState::Applied);
        assert!(active[0].backup_path.is_none());
    }

    #[tokio::test]
    async fn overwrite_captures_backup_before_write() {
        let root = TempDir::new().unwrap();
        std::fs::write(root.path().join("a.txt"), b"before").unwrap();
        let journal = open_journal(&root).await;

        journal.write_with_backup("a.txt", b"after").await.unwrap();

        let active = journal.active_operations().await;
        assert_eq!(active[0].kind, OperationKind::Overwrite);
        let backup = active[0].backup_path.clone().unwrap();
        assert_eq!(std::fs::read(backup).unwrap(), b"before");
        assert_eq!(std::fs::read(root.path().join("a.txt")).unwrap(), b"after");
    }

    #[tokio::test]
    async fn rollback_restores_previous_bytes() {
        let root = TempDir::new().unwrap();
        std::fs::write(root.path().join("a.txt"), b"original").unwrap();
        let journal = open_journal(&root).await;

        let id = journal.write_with_backup("a.txt", b"edited").await.unwrap();
        journal.rollback_operation(id).await.unwrap();

        assert_eq!(
            std::fs::read(root.path().join("a.txt")).unwrap(),
            b"original"
        );
        assert!(journal.active_operations().await.is_empty());
    }

    #[tokio::test]
    async fn rollback_of_creation_deletes_file() {
        let root = TempDir::new().unwrap();
        let journal = open_journal(&root).await;

        let id = journal.write_with_backup("new.txt", b"brand new").await.unwrap();
        assert!(root.path().join("new.txt").exists());

        journal.rollback_operation(id).await.unwrap();
        assert!(!root.path().join("new.txt").exists());
    }

    #[tokio::test]
    async fn rollback_is_idempotent() {
        let root = TempDir::new().unwrap();
        std::fs::write(root.path().join("a.txt"), b"original").unwrap();
        let journal = open_journal(&root).await;

        let id = journal.write_with_backup("a.txt", b"edited").await.unwrap();
        journal.rollback_operation(id).await.unwrap();
        journal.rollback_operation(id).await.unwrap();

        // Unknown id is also a no-op.
        journal.rollback_operation(OperationId::new()).await.unwrap();
    }

    #[tokio::test]
    async fn commit_removes_backup_and_keeps_content() {
        let root = TempDir::new().unwrap();
        std::fs::write(root.path().join("a.txt"), b"x = 1").unwrap();
        let journal = open_journal(&root).await;

        let id = journal.write_with_backup("a.txt", b"x = 2").await.unwrap();
        let backup = journal.active_operations().await[0]
            .backup_path
            .clone()
            .unwrap();

        journal.commit(&[id]).await.unwrap();

        assert_eq!(std::fs::read(root.path().join("a.txt")).unwrap(), b"x = 2");
        assert!(!backup.exists());
        assert!(journal.active_operations().await.is_empty());
    }

    #[tokio::test]
    async fn rollback_after_commit_is_noop() {
        let root = TempDir::new().unwrap();
        std::fs::write(root.path().join("a.txt"), b"x = 1").unwrap();
        let journal = open_journal(&root).await;

        let id = journal.write_with_backup("a.txt", b"x = 2").await.unwrap();
        journal.commit(&[id]).await.unwrap();
        journal.rollback_operation(id).await.unwrap();

        assert_eq!(std::fs::read(root.path().join("a.txt")).unwrap(), b"x = 2");
    }

    #[tokio::test]
    async fn commit_of_unknown_id_is_hard_error() {
        let root = TempDir::new().unwrap();
        let journal = open_journal(&root).await;

        let result = journal.commit(&[OperationId::new()]).await;
        assert!(matches!(result, Err(JournalError::UnknownOperation(_))));
    }

    #[tokio::test]
    async fn commit_of_rolled_back_operation_is_rejected() {
        let root = TempDir::new().unwrap();
        std::fs::write(root.path().join("a.txt"), b"x = 1").unwrap();
        let journal = open_journal(&root).await;

        let id = journal.write_with_backup("a.txt", b"x = 2").await.unwrap();
        journal.rollback_operation(id).await.unwrap();

        let result = journal.commit(&[id]).await;
        assert!(matches!(result, Err(JournalError::InvalidTransition(_))));
    }

    #[tokio::test]
    async fn delete_with_backup_and_rollback() {
        let root = TempDir::new().unwrap();
        std::fs::write(root.path().join("doomed.txt"), b"keep me").unwrap();
        let journal = open_journal(&root).await;

        let id = journal.delete_with_backup("doomed.txt").await.unwrap();
        assert!(!root.path().join("doomed.txt").exists());

        journal.rollback_operation(id).await.unwrap();
        assert_eq!(
            std::fs::read(root.path().join("doomed.txt")).unwrap(),
            b"keep me"
        );
    }

    #[tokio::test]
    async fn delete_of_missing_target_fails() {
        let root = TempDir::new().unwrap();
        let journal = open_journal(&root).await;

        let result = journal.delete_with_backup("ghost.txt").await;
        assert!(matches!(result, Err(JournalError::MissingTarget(_))));
        assert!(journal.active_operations().await.is_empty());
    }

    #[tokio::test]
    async fn traversal_is_rejected_before_any_effect() {
        let root = TempDir::new().unwrap();
        let journal = open_journal(&root).await;

        let result = journal.write_with_backup("../outside.txt", b"nope").await;
        assert!(matches!(result, Err(JournalError::Guard(_))));
        assert!(journal.active_operations().await.is_empty());
    }

    #[tokio::test]
    async fn rollback_all_collects_everything() {
        let root = TempDir::new().unwrap();
        std::fs::write(root.path().join("a.txt"), b"a0").unwrap();
        let journal = open_journal(&root).await;

        journal.write_with_backup("a.txt", b"a1").await.unwrap();
        journal.write_with_backup("b.txt", b"b1").await.unwrap();

        let report = journal.rollback_all().await;
        assert!(report.is_clean());
        assert_eq!(report.rolled_back.len(), 2);

        assert_eq!(std::fs::read(root.path().join("a.txt")).unwrap(), b"a0");
        assert!(!root.path().join("b.txt").exists());
    }

    #[tokio::test]
    async fn journal_file_reflects_pending_operations() {
        let root = TempDir::new().unwrap();
        std::fs::write(root.path().join("a.txt"), b"x = 1").unwrap();
        let journal = open_journal(&root).await;

        journal.write_with_backup("a.txt", b"x = 2").await.unwrap();

        let raw = std::fs::read_to_string(journal.backup_dir().join(JOURNAL_FILE)).unwrap();
        let persisted: Vec<MutationOperation> = serde_json::from_str(&raw).unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].state, OperationState::Applied);
    }

    #[tokio::test]
    async fn corrupt_journal_is_discarded_at_open() {
        let root = TempDir::new().unwrap();
        let backup_dir = root.path().join(BACKUP_DIR);
        std::fs::create_dir_all(&backup_dir).unwrap();
        std::fs::write(backup_dir.join(JOURNAL_FILE), b"{not json").unwrap();

        let journal = open_journal(&root).await;
        assert!(journal.active_operations().await.is_empty());
        assert!(!backup_dir.join(JOURNAL_FILE).exists());
    }

    #[tokio::test]
    async fn concurrent_same_path_writes_never_lose_a_backup() {
        let root = TempDir::new().unwrap();
        std::fs::write(root.path().join("hot.txt"), b"v0").unwrap();
        let journal = Arc::new(open_journal(&root).await);

        let a = {
            let journal = Arc::clone(&journal);
            tokio::spawn(async move { journal.write_with_backup("hot.txt", b"v1").await })
        };
        let b = {
            let journal = Arc::clone(&journal);
            tokio::spawn(async move { journal.write_with_backup("hot.txt", b"v2").await })
        };
        let id_a = a.await.unwrap().unwrap();
        let id_b = b.await.unwrap().unwrap();

        // Per-path serialization: one of the two backups must hold the
        // original bytes, and rolling both back (in either order the caller
        // picks) must be able to reach v0 again.
        let ops = journal.active_operations().await;
        assert_eq!(ops.len(), 2);
        let backups: Vec<Vec<u8>> = ops
            .iter()
            .map(|op| std::fs::read(op.backup_path.as_ref().unwrap()).unwrap())
            .collect();
        assert!(backups.iter().any(|bytes| bytes == b"v0"));

        // Roll back newest-first restores the original content.
        let (first, second) = if ops[0].id == id_a {
            (id_b, id_a)
        } else {
            (id_a, id_b)
        };
        journal.rollback_operation(first).await.unwrap();
        journal.rollback_operation(second).await.unwrap();
        assert_eq!(std::fs::read(root.path().join("hot.txt")).unwrap(), b"v0");
    }
}

//! Sandbox provisioning
//!
//! Materializes disposable copies of a project tree into uniquely named
//! scratch directories, applies guarded changes to them, and reclaims them
//! on teardown or TTL expiry.

use crate::change::{ChangeOp, ProposedChange};
use crate::error::SandboxError;
use crate::manifest::{CheckManifest, MANIFEST_FILE};
use crate::session::{SandboxSession, SessionId};
use chrono::Utc;
use dashmap::DashMap;
use remedy_guard::SafePath;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Directory names never copied into a sandbox
const SKIP_DIRS: &[&str] = &[".backup", ".git", ".validation", "node_modules", "dist"];

/// Materializes and owns disposable sandbox sessions
#[derive(Debug)]
pub struct SandboxProvisioner {
    scratch_root: PathBuf,
    default_ttl: Duration,
    sessions: DashMap<SessionId, SandboxSession>,
}

impl SandboxProvisioner {
    /// Create a provisioner rooted at a scratch directory
    #[inline]
    #[must_use]
    pub fn new(scratch_root: impl Into<PathBuf>, default_ttl: Duration) -> Self {
        Self {
            scratch_root: scratch_root.into(),
            default_ttl,
            sessions: DashMap::new(),
        }
    }

    /// Materialize a disposable copy of `source_root`
    ///
    /// Copies the tree into `<scratch>/<session-id>/`, skipping backup,
    /// VCS, dependency, and build-output directories, then guarantees a
    /// check manifest exists so later checks can run standalone.
    ///
    /// Best-effort atomic: on any failure the partial directory is removed
    /// and no session is returned - a partial copy is never trusted.
    ///
    /// # Errors
    /// Returns [`SandboxError::Io`] when the copy fails.
    pub async fn provision(&self, source_root: &Path) -> Result<SandboxSession, SandboxError> {
        let id = SessionId::new();
        let root = self.scratch_root.join(id.to_string());
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| SandboxError::io(&root, e))?;

        if let Err(e) = self.populate(source_root, &root).await {
            // Discard the partial copy rather than hand out a broken session.
            if let Err(cleanup) = tokio::fs::remove_dir_all(&root).await {
                tracing::warn!(
                    session = %id,
                    error = %cleanup,
                    "failed to remove partial sandbox after provisioning error"
                );
            }
            return Err(e);
        }

        let session = SandboxSession {
            id,
            root,
            created_at: Utc::now(),
            ttl: self.default_ttl,
        };
        self.sessions.insert(id, session.clone());
        tracing::info!(session = %id, root = %session.root.display(), "sandbox provisioned");
        Ok(session)
    }

    async fn populate(&self, source_root: &Path, root: &Path) -> Result<(), SandboxError> {
        copy_tree(source_root, root, &self.scratch_root).await?;
        if !root.join(MANIFEST_FILE).exists() {
            CheckManifest::minimal().save(root).await?;
        }
        Ok(())
    }

    /// Apply proposed changes to a session's working tree
    ///
    /// Every path is routed through the guard against the session root.
    /// Create/Modify write the full replacement content; Delete tolerates
    /// an already-absent target. No backup bookkeeping - the whole session
    /// is disposable.
    ///
    /// # Errors
    /// - [`SandboxError::UnknownSession`] for an unregistered id
    /// - [`SandboxError::Guard`] for rejected paths
    /// - [`SandboxError::MissingContent`] for Create/Modify without content
    pub async fn apply_changes(
        &self,
        id: SessionId,
        changes: &[ProposedChange],
    ) -> Result<(), SandboxError> {
        let root = self
            .sessions
            .get(&id)
            .map(|session| session.root.clone())
            .ok_or(SandboxError::UnknownSession(id))?;

        for change in changes {
            let safe = SafePath::validate(&change.path)?;
            let target = safe.resolve(&root);

            match change.operation {
                ChangeOp::Create | ChangeOp::Modify => {
                    let content = change
                        .new_content
                        .as_deref()
                        .ok_or_else(|| SandboxError::MissingContent(change.path.clone()))?;
                    if let Some(parent) = target.parent() {
                        tokio::fs::create_dir_all(parent)
                            .await
                            .map_err(|e| SandboxError::io(parent, e))?;
                    }
                    tokio::fs::write(&target, content)
                        .await
                        .map_err(|e| SandboxError::io(&target, e))?;
                }
                ChangeOp::Delete => match tokio::fs::remove_file(&target).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(SandboxError::io(&target, e)),
                },
            }
        }
        tracing::debug!(session = %id, count = changes.len(), "changes applied to sandbox");
        Ok(())
    }

    /// Tear down a session, removing its directory
    ///
    /// Failures are logged, not escalated: a leaked temp directory is a
    /// cleanup-sweep problem, not a pipeline-correctness problem. The
    /// session is dropped from the registry either way.
    pub async fn teardown(&self, id: SessionId) {
        let Some((_, session)) = self.sessions.remove(&id) else {
            tracing::debug!(session = %id, "teardown of unknown session ignored");
            return;
        };
        match tokio::fs::remove_dir_all(&session.root).await {
            Ok(()) => tracing::info!(session = %id, "sandbox torn down"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(session = %id, error = %e, "failed to remove sandbox directory");
            }
        }
    }

    /// Tear down every session past its TTL; returns how many were removed
    pub async fn purge_expired(&self) -> usize {
        let expired: Vec<SessionId> = self
            .sessions
            .iter()
            .filter(|entry| entry.value().is_expired())
            .map(|entry| *entry.key())
            .collect();
        for id in &expired {
            self.teardown(*id).await;
        }
        expired.len()
    }

    /// Number of live sessions
    #[inline]
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Scratch directory this provisioner owns
    #[inline]
    #[must_use]
    pub fn scratch_root(&self) -> &Path {
        &self.scratch_root
    }
}

/// Copy a directory tree, skipping [`SKIP_DIRS`] and the scratch root
async fn copy_tree(source: &Path, dest: &Path, scratch_root: &Path) -> Result<(), SandboxError> {
    let mut worklist = vec![(source.to_path_buf(), dest.to_path_buf())];

    while let Some((src_dir, dst_dir)) = worklist.pop() {
        tokio::fs::create_dir_all(&dst_dir)
            .await
            .map_err(|e| SandboxError::io(&dst_dir, e))?;

        let mut entries = tokio::fs::read_dir(&src_dir)
            .await
            .map_err(|e| SandboxError::io(&src_dir, e))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SandboxError::io(&src_dir, e))?
        {
            let src_path = entry.path();
            let name = entry.file_name();
            let dst_path = dst_dir.join(&name);
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| SandboxError::io(&src_path, e))?;

            if file_type.is_dir() {
                let skip = name
                    .to_str()
                    .map(|name| SKIP_DIRS.contains(&name))
                    .unwrap_or(false);
                // Never copy the scratch root into itself.
                if skip || src_path == scratch_root {
                    continue;
                }
                worklist.push((src_path, dst_path));
            } else if file_type.is_file() {
                tokio::fs::copy(&src_path, &dst_path)
                    .await
                    .map_err(|e| SandboxError::io(&src_path, e))?;
            }
            // Symlinks are dropped; the sandbox must be standalone.
        }
    }
    Ok(())
}

/// Handle owning the periodic expired-session sweep task
#[derive(Debug)]
pub struct SessionSweeper {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl SessionSweeper {
    /// Spawn the sweep task over a shared provisioner
    #[must_use]
    pub fn spawn(provisioner: Arc<SandboxProvisioner>, interval: Duration) -> Self {
        let (shutdown, mut watch_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let purged = provisioner.purge_expired().await;
                        if purged > 0 {
                            tracing::info!(purged, "expired sandbox sessions reclaimed");
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

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn seed_project(root: &Path) {
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::write(root.join("src/a.ts"), b"export const x = 1;").unwrap();
        std::fs::write(root.join("README.md"), b"demo").unwrap();
        std::fs::create_dir_all(root.join(".git")).unwrap();
        std::fs::write(root.join(".git/HEAD"), b"ref").unwrap();
    }

    #[tokio::test]
    async fn provision_copies_tree_and_skips_vcs() {
        let source = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();
        seed_project(source.path());

        let provisioner =
            SandboxProvisioner::new(scratch.path(), Duration::from_secs(600));
        let session = provisioner.provision(source.path()).await.unwrap();

        assert_eq!(
            std::fs::read(session.root.join("src/a.ts")).unwrap(),
            b"export const x = 1;"
        );
        assert!(session.root.join("README.md").exists());
        assert!(!session.root.join(".git").exists());
        assert!(session.root.join(MANIFEST_FILE).exists());
        assert_eq!(provisioner.session_count(), 1);
    }

    #[tokio::test]
    async fn provision_preserves_existing_manifest() {
        let source = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();
        seed_project(source.path());
        let manifest = CheckManifest {
            type_check: Some(crate::manifest::CommandSpec::new("tsc", &["--noEmit"])),
            ..CheckManifest::minimal()
        };
        manifest.save(source.path()).await.unwrap();

        let provisioner =
            SandboxProvisioner::new(scratch.path(), Duration::from_secs(600));
        let session = provisioner.provision(source.path()).await.unwrap();

        let copied = CheckManifest::load(&session.root).await.unwrap();
        assert!(copied.type_check.is_some());
    }

    #[tokio::test]
    async fn changes_are_applied_through_the_guard() {
        let source = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();
        seed_project(source.path());

        let provisioner =
            SandboxProvisioner::new(scratch.path(), Duration::from_secs(600));
        let session = provisioner.provision(source.path()).await.unwrap();

        let changes = vec![
            ProposedChange::modify("src/a.ts", "export const x = 2;"),
            ProposedChange::create("src/b.ts", "export const y = 1;"),
            ProposedChange::delete("README.md"),
            ProposedChange::delete("already-gone.txt"),
        ];
        provisioner.apply_changes(session.id, &changes).await.unwrap();

        assert_eq!(
            std::fs::read(session.root.join("src/a.ts")).unwrap(),
            b"export const x = 2;"
        );
        assert!(session.root.join("src/b.ts").exists());
        assert!(!session.root.join("README.md").exists());

        // Live tree untouched.
        assert_eq!(
            std::fs::read(source.path().join("src/a.ts")).unwrap(),
            b"export const x = 1;"
        );
        assert!(source.path().join("README.md").exists());
    }

    #[tokio::test]
    async fn traversal_change_is_rejected() {
        let source = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();
        seed_project(source.path());

        let provisioner =
            SandboxProvisioner::new(scratch.path(), Duration::from_secs(600));
        let session = provisioner.provision(source.path()).await.unwrap();

        let changes = vec![ProposedChange::create("../escape.txt", "nope")];
        let result = provisioner.apply_changes(session.id, &changes).await;
        assert!(matches!(result, Err(SandboxError::Guard(_))));
    }

    #[tokio::test]
    async fn modify_without_content_is_rejected() {
        let source = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();
        seed_project(source.path());

        let provisioner =
            SandboxProvisioner::new(scratch.path(), Duration::from_secs(600));
        let session = provisioner.provision(source.path()).await.unwrap();

        let mut change = ProposedChange::modify("src/a.ts", "");
        change.new_content = None;
        let result = provisioner.apply_changes(session.id, &[change]).await;
        assert!(matches!(result, Err(SandboxError::MissingContent(_))));
    }

    #[tokio::test]
    async fn apply_to_unknown_session_fails() {
        let scratch = TempDir::new().unwrap();
        let provisioner =
            SandboxProvisioner::new(scratch.path(), Duration::from_secs(600));
        let result = provisioner
            .apply_changes(SessionId::new(), &[ProposedChange::delete("a")])
            .await;
        assert!(matches!(result, Err(SandboxError::UnknownSession(_))));
    }

    #[tokio::test]
    async fn teardown_removes_directory_and_registration() {
        let source = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();
        seed_project(source.path());

        let provisioner =
            SandboxProvisioner::new(scratch.path(), Duration::from_secs(600));
        let session = provisioner.provision(source.path()).await.unwrap();
        let root = session.root.clone();

        provisioner.teardown(session.id).await;
        assert!(!root.exists());
        assert_eq!(provisioner.session_count(), 0);

        // Double teardown is harmless.
        provisioner.teardown(session.id).await;
    }

    #[tokio::test]
    async fn purge_reclaims_only_expired_sessions() {
        let source = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();
        seed_project(source.path());

        let provisioner = SandboxProvisioner::new(scratch.path(), Duration::ZERO);
        let expired = provisioner.provision(source.path()).await.unwrap();

        // Sessions with a generous TTL survive the purge.
        let keeper = SandboxSession {
            ttl: Duration::from_secs(3600),
            ..provisioner.provision(source.path()).await.unwrap()
        };
        provisioner.sessions.insert(keeper.id, keeper.clone());

        // Zero-TTL sessions are immediately reclaimable.
        tokio::time::sleep(Duration::from_millis(5)).await;
        let purged = provisioner.purge_expired().await;

        assert!(purged >= 1);
        assert!(!expired.root.exists());
        assert!(keeper.root.exists());
    }
}

//! Version store: current/archive file management plus the ledger
//!
//! Layout per project:
//!   <project>/<stable path>            current artifact (see ResourceKind)
//!   <project>/versions/versions.json   ledger
//!   <project>/versions/<type>/         archived versions, keyed by version
//!                                      number and timestamp
//!
//! All mutation for one project runs under that project's async lock: the
//! ledger is a single document per project, so this also serialises writes
//! for any (resource_type, resource_id) within it while leaving unrelated
//! projects fully parallel. New bytes are staged to disk before the ledger
//! is rewritten, and the ledger itself is replaced via write-new-then-rename,
//! so a crash can lose at most the ledger update, never artifact bytes.

use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{AppError, Result};
use crate::resource::ResourceKind;
use crate::version::ledger::{Ledger, VersionRecord};

/// Result of recording a new version.
#[derive(Debug, Clone, Serialize)]
pub struct AddedVersion {
    pub version: u64,
    pub file: String,
    pub created_at: String,
}

/// Result of restoring an archived version.
#[derive(Debug, Clone, Serialize)]
pub struct RestoreOutcome {
    pub restored_version: u64,
    pub new_current_version: u64,
    pub prompt: String,
    pub file_path: String,
}

/// Read-only history of one resource.
#[derive(Debug, Clone, Serialize)]
pub struct VersionHistory {
    pub current_version: u64,
    pub versions: Vec<VersionRecord>,
}

/// Version manager for all projects under one storage root.
pub struct VersionStore {
    projects_root: PathBuf,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl VersionStore {
    pub fn new<P: Into<PathBuf>>(projects_root: P) -> Self {
        Self {
            projects_root: projects_root.into(),
            locks: DashMap::new(),
        }
    }

    pub fn project_path(&self, project: &str) -> PathBuf {
        self.projects_root.join(project)
    }

    /// Absolute stable path of a resource's current artifact.
    pub fn current_path(&self, project: &str, kind: ResourceKind, resource_id: &str) -> PathBuf {
        self.project_path(project)
            .join(kind.current_rel_path(resource_id))
    }

    fn lock_for(&self, project: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(project.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn ledger_path(project_path: &Path) -> PathBuf {
        project_path.join("versions").join("versions.json")
    }

    fn archive_rel_path(kind: ResourceKind, resource_id: &str, version: u64) -> String {
        let timestamp = Utc::now().format("%Y%m%dT%H%M%S");
        format!(
            "versions/{}/{}_v{}_{}{}",
            kind.as_str(),
            resource_id,
            version,
            timestamp,
            kind.extension()
        )
    }

    fn now_iso() -> String {
        Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }

    async fn load_ledger(path: &Path) -> Result<Ledger> {
        match fs::read(path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| AppError::CorruptLedger(format!("{}: {}", path.display(), e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Ledger::default()),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Persist the ledger by writing a sibling temp file and renaming it over
    /// the old document, so readers never observe a half-written ledger.
    async fn save_ledger(path: &Path, ledger: &Ledger) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(ledger)?;
        fs::write(&tmp, &bytes).await?;
        fs::rename(&tmp, path).await?;
        Ok(())
    }

    async fn write_staged(path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("staged");
        fs::write(&tmp, bytes).await?;
        fs::rename(&tmp, path).await?;
        Ok(())
    }

    /// Move the current file into the archive under `version`, updating the
    /// matching ledger record to point at its new location.
    async fn archive_current(
        project_path: &Path,
        ledger: &mut Ledger,
        kind: ResourceKind,
        resource_id: &str,
        version: u64,
        current_abs: &Path,
    ) -> Result<()> {
        let archive_rel = Self::archive_rel_path(kind, resource_id, version);
        let archive_abs = project_path.join(&archive_rel);
        if let Some(parent) = archive_abs.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::rename(current_abs, &archive_abs).await?;

        if let Some(record) = ledger.history_mut(kind, resource_id).record_mut(version) {
            record.file = archive_rel.clone();
        }
        debug!(
            resource = %format!("{}/{}", kind, resource_id),
            version,
            archive = %archive_rel,
            "archived current artifact"
        );
        Ok(())
    }

    /// Record freshly generated bytes as the new current version.
    ///
    /// An existing current file is archived first under its own version
    /// number; a current file with no history at all is backfilled as
    /// version 1 with an unknown prompt before the new version is minted.
    pub async fn add_version(
        &self,
        project: &str,
        kind: ResourceKind,
        resource_id: &str,
        bytes: &[u8],
        prompt: &str,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Result<AddedVersion> {
        let lock = self.lock_for(project);
        let _guard = lock.lock().await;

        let project_path = self.project_path(project);
        let ledger_path = Self::ledger_path(&project_path);
        let mut ledger = Self::load_ledger(&ledger_path).await?;

        let current_rel = kind.current_rel_path(resource_id);
        let current_abs = project_path.join(&current_rel);

        if fs::try_exists(&current_abs).await? {
            let history = ledger.history_mut(kind, resource_id);
            if history.versions.is_empty() {
                // Pre-existing file that predates version tracking.
                let backfill = history.next_version();
                history.versions.push(VersionRecord {
                    version: backfill,
                    file: current_rel.clone(),
                    prompt: String::new(),
                    created_at: Self::now_iso(),
                    restored_from: None,
                    metadata: Default::default(),
                });
                history.current_version = backfill;
                Self::archive_current(
                    &project_path,
                    &mut ledger,
                    kind,
                    resource_id,
                    backfill,
                    &current_abs,
                )
                .await?;
            } else {
                let current_version = history.current_version;
                Self::archive_current(
                    &project_path,
                    &mut ledger,
                    kind,
                    resource_id,
                    current_version,
                    &current_abs,
                )
                .await?;
            }
        }

        // Bytes hit the disk before the ledger entry exists.
        Self::write_staged(&current_abs, bytes).await?;

        let created_at = Self::now_iso();
        let history = ledger.history_mut(kind, resource_id);
        let version = history.next_version();
        history.versions.push(VersionRecord {
            version,
            file: current_rel.clone(),
            prompt: prompt.to_string(),
            created_at: created_at.clone(),
            restored_from: None,
            metadata,
        });
        history.current_version = version;

        Self::save_ledger(&ledger_path, &ledger).await?;

        info!(
            project,
            resource = %format!("{}/{}", kind, resource_id),
            version,
            size = bytes.len(),
            "recorded new version"
        );

        Ok(AddedVersion {
            version,
            file: current_rel,
            created_at,
        })
    }

    /// Make an archived version current again.
    ///
    /// History is never rewritten: the current file is archived under its own
    /// number, the target's bytes are copied back to the stable path, and a
    /// brand-new version number is minted for the restored content.
    pub async fn restore_version(
        &self,
        project: &str,
        kind: ResourceKind,
        resource_id: &str,
        target: u64,
    ) -> Result<RestoreOutcome> {
        let lock = self.lock_for(project);
        let _guard = lock.lock().await;

        let project_path = self.project_path(project);
        let ledger_path = Self::ledger_path(&project_path);
        let mut ledger = Self::load_ledger(&ledger_path).await?;

        let history = ledger
            .history(kind, resource_id)
            .filter(|h| !h.versions.is_empty())
            .ok_or_else(|| {
                AppError::ResourceNotFound(format!("{}/{}", kind, resource_id))
            })?;
        let target_record = history.record(target).cloned().ok_or_else(|| {
            AppError::VersionNotFound(format!("{}/{} v{}", kind, resource_id, target))
        })?;

        let current_rel = kind.current_rel_path(resource_id);
        let current_abs = project_path.join(&current_rel);
        let current_version = history.current_version;

        if fs::try_exists(&current_abs).await? {
            Self::archive_current(
                &project_path,
                &mut ledger,
                kind,
                resource_id,
                current_version,
                &current_abs,
            )
            .await?;
        }

        // Re-resolve the target file: archiving above may have moved it when
        // the target was the current version.
        let target_file = ledger
            .history(kind, resource_id)
            .and_then(|h| h.record(target))
            .map(|r| r.file.clone())
            .unwrap_or_else(|| target_record.file.clone());
        let target_abs = project_path.join(&target_file);
        if !fs::try_exists(&target_abs).await? {
            return Err(AppError::ResourceNotFound(format!(
                "version file missing: {}",
                target_file
            )));
        }

        if let Some(parent) = current_abs.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::copy(&target_abs, &current_abs).await?;

        let created_at = Self::now_iso();
        let history = ledger.history_mut(kind, resource_id);
        let new_version = history.next_version();
        history.versions.push(VersionRecord {
            version: new_version,
            file: current_rel.clone(),
            prompt: target_record.prompt.clone(),
            created_at,
            restored_from: Some(target),
            metadata: target_record.metadata.clone(),
        });
        history.current_version = new_version;

        Self::save_ledger(&ledger_path, &ledger).await?;

        info!(
            project,
            resource = %format!("{}/{}", kind, resource_id),
            restored_version = target,
            new_current_version = new_version,
            "restored version"
        );

        Ok(RestoreOutcome {
            restored_version: target,
            new_current_version: new_version,
            prompt: target_record.prompt,
            file_path: current_rel,
        })
    }

    /// Read-only history; a resource with no versions yields an empty history
    /// rather than an error, matching what the UI expects.
    pub async fn get_versions(
        &self,
        project: &str,
        kind: ResourceKind,
        resource_id: &str,
    ) -> Result<VersionHistory> {
        let lock = self.lock_for(project);
        let _guard = lock.lock().await;

        let ledger_path = Self::ledger_path(&self.project_path(project));
        let ledger = Self::load_ledger(&ledger_path).await?;

        Ok(match ledger.history(kind, resource_id) {
            Some(history) => VersionHistory {
                current_version: history.current_version,
                versions: history.versions.clone(),
            },
            None => VersionHistory {
                current_version: 0,
                versions: Vec::new(),
            },
        })
    }
}

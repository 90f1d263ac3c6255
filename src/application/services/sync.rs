//! Remote file synchronizer — converges the workspace file store onto the
//! staging manifest.
//!
//! The plan step is read-only (one remote listing); the apply step uploads
//! only entries whose hash differs from the remote copy. Uploads run
//! concurrently up to a bounded worker count, each retried with backoff on
//! transient failures. Remote files absent from the manifest are deleted
//! only under `prune`, except stale `packages/` artifacts, which are always
//! removed so a single current package remains.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use futures_util::StreamExt as _;

use crate::application::ports::{FileStore, ProgressReporter};
use crate::application::services::staging::PACKAGES_DIR;
use crate::domain::error::{PlatformError, SyncError};
use crate::domain::manifest::{ManifestEntry, StagingManifest};
use crate::domain::retry::RetryPolicy;

/// Synchronizer options.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Delete remote files absent from the manifest (default: additive-only).
    pub prune: bool,
    /// Bounded number of concurrent uploads.
    pub concurrency: usize,
    pub retry: RetryPolicy,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            prune: false,
            concurrency: 8,
            retry: RetryPolicy::uploads(),
        }
    }
}

/// Read-only diff between the manifest and the remote listing.
#[derive(Debug, Clone)]
pub struct SyncPlan {
    pub uploads: Vec<ManifestEntry>,
    /// Stale package artifacts, always deleted.
    pub stale_packages: Vec<String>,
    /// Other remote-only files, deleted only under `prune`.
    pub prune_paths: Vec<String>,
    pub unchanged: usize,
}

impl SyncPlan {
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.uploads.is_empty() && self.stale_packages.is_empty() && self.prune_paths.is_empty()
    }

    /// Short human summary, used for dry-run reporting.
    #[must_use]
    pub fn describe(&self) -> String {
        format!(
            "{} to upload, {} unchanged, {} to delete",
            self.uploads.len(),
            self.unchanged,
            self.stale_packages.len() + self.prune_paths.len()
        )
    }
}

/// Result of an applied sync.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub uploaded: usize,
    pub deleted: usize,
    pub unchanged: usize,
}

/// Compute the upload/delete plan from a fresh remote listing.
///
/// The remote listing is the source of truth for "already uploaded" — no
/// local cache survives between runs, so a re-run after a partial failure
/// naturally skips files that made it.
///
/// # Errors
///
/// Returns `SyncError::List` when the remote listing fails.
pub async fn plan(
    files: &impl FileStore,
    manifest: &StagingManifest,
    workspace_path: &str,
    prune: bool,
) -> Result<SyncPlan, SyncError> {
    let remote = match files.list(workspace_path).await {
        Ok(listing) => listing,
        Err(PlatformError::NotFound) => Vec::new(),
        Err(e) => {
            return Err(SyncError::List {
                path: workspace_path.to_string(),
                detail: e.to_string(),
            });
        }
    };

    let remote_hashes: HashMap<&str, Option<&str>> = remote
        .iter()
        .map(|f| (f.path.as_str(), f.sha256.as_deref()))
        .collect();

    let mut uploads = Vec::new();
    let mut unchanged = 0;
    for entry in manifest.entries() {
        match remote_hashes.get(entry.relative_path.as_str()) {
            Some(Some(hash)) if *hash == entry.content_hash => unchanged += 1,
            _ => uploads.push(entry.clone()),
        }
    }

    let mut stale_packages = Vec::new();
    let mut prune_paths = Vec::new();
    for file in &remote {
        if manifest.contains(&file.path) {
            continue;
        }
        if file.path.starts_with(&format!("{PACKAGES_DIR}/")) {
            stale_packages.push(file.path.clone());
        } else if prune {
            prune_paths.push(file.path.clone());
        }
    }

    Ok(SyncPlan {
        uploads,
        stale_packages,
        prune_paths,
        unchanged,
    })
}

/// Apply a sync plan: concurrent uploads, then deletions.
///
/// The cancellation flag stops dispatching new uploads immediately; uploads
/// already in flight finish or fail cleanly and are joined before this
/// function returns.
///
/// # Errors
///
/// Returns `SyncError::Aborted` listing failed files once any upload
/// exhausts its retries, and `SyncError::Cancelled` when interrupted.
pub async fn apply(
    files: &impl FileStore,
    reporter: &impl ProgressReporter,
    staging_root: &Path,
    plan: &SyncPlan,
    workspace_path: &str,
    opts: &SyncOptions,
    cancel: &AtomicBool,
) -> Result<SyncReport, SyncError> {
    files
        .mkdirs(workspace_path)
        .await
        .map_err(|e| SyncError::List {
            path: workspace_path.to_string(),
            detail: e.to_string(),
        })?;

    let uploaded = AtomicUsize::new(0);
    let failed: Mutex<Vec<String>> = Mutex::new(Vec::new());

    futures_util::stream::iter(plan.uploads.iter())
        .for_each_concurrent(opts.concurrency.max(1), |entry| {
            let uploaded = &uploaded;
            let failed = &failed;
            async move {
                if cancel.load(Ordering::Relaxed) {
                    return;
                }
                match upload_one(files, staging_root, workspace_path, entry, &opts.retry).await {
                    Ok(()) => {
                        let n = uploaded.fetch_add(1, Ordering::Relaxed) + 1;
                        if n % 10 == 0 {
                            reporter.step(&format!("uploaded {n} file(s)..."));
                        }
                    }
                    Err(detail) => {
                        if let Ok(mut failures) = failed.lock() {
                            failures.push(format!("{}: {detail}", entry.relative_path));
                        }
                    }
                }
            }
        })
        .await;

    let uploaded = uploaded.into_inner();
    let failures = failed.into_inner().unwrap_or_default();

    if cancel.load(Ordering::Relaxed) {
        return Err(SyncError::Cancelled { uploaded });
    }
    if !failures.is_empty() {
        return Err(SyncError::Aborted {
            uploaded,
            failed: failures,
        });
    }

    let mut deleted = 0;
    for path in plan.stale_packages.iter().chain(plan.prune_paths.iter()) {
        files
            .delete(workspace_path, path)
            .await
            .map_err(|e| SyncError::Delete {
                path: path.clone(),
                detail: e.to_string(),
            })?;
        deleted += 1;
    }

    reporter.success(&format!(
        "synced workspace: {uploaded} uploaded, {} unchanged, {deleted} deleted",
        plan.unchanged
    ));

    Ok(SyncReport {
        uploaded,
        deleted,
        unchanged: plan.unchanged,
    })
}

/// Upload a single entry with bounded retries. Returns the final error
/// detail when all attempts are exhausted.
async fn upload_one(
    files: &impl FileStore,
    staging_root: &Path,
    workspace_path: &str,
    entry: &ManifestEntry,
    retry: &RetryPolicy,
) -> Result<(), String> {
    let local = staging_root.join(&entry.relative_path);
    let bytes = tokio::fs::read(&local)
        .await
        .map_err(|e| format!("reading {}: {e}", local.display()))?;

    let mut attempt = 1;
    loop {
        match files
            .upload(workspace_path, &entry.relative_path, bytes.clone())
            .await
        {
            Ok(()) => return Ok(()),
            Err(e) if e.is_transient() && attempt < retry.max_attempts => {
                tokio::time::sleep(retry.delay_for(attempt)).await;
                attempt += 1;
            }
            Err(e) => {
                return Err(format!("{e} (after {attempt} attempt(s))"));
            }
        }
    }
}

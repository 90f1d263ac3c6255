//! Staging assembler — builds the canonical local tree about to be uploaded.
//!
//! Layout of the staging tree:
//!
//! ```text
//! packages/<artifact>      package build output
//! static/...               bundle build output
//! config/...               project config dir, minus deployment files
//! app.yaml                 app manifest with injected database env vars
//! ```
//!
//! Exclusion patterns are evaluated against the *source* path before copy,
//! so excluded content never reaches the staging tree. The temp directory is
//! removed on every exit path (success, error, or cancellation) by the
//! `TempDir` guard.

use std::path::Path;

use sha2::{Digest, Sha256};
use tempfile::TempDir;

use crate::application::ports::ProgressReporter;
use crate::application::services::build::BuildArtifacts;
use crate::domain::config::DesiredState;
use crate::domain::error::AssemblyError;
use crate::domain::exclude::ExcludePatterns;
use crate::domain::manifest::{ManifestEntry, StagingManifest};

/// Name of the app manifest file inside the staging tree.
pub const APP_MANIFEST: &str = "app.yaml";
/// Staging subdirectory for the package artifact.
pub const PACKAGES_DIR: &str = "packages";

/// A fully assembled staging tree. Dropping this value deletes the tree.
#[derive(Debug)]
pub struct StagedTree {
    dir: TempDir,
    pub manifest: StagingManifest,
}

impl StagedTree {
    #[must_use]
    pub fn root(&self) -> &Path {
        self.dir.path()
    }
}

/// Assemble the staging tree and compute its manifest.
///
/// # Errors
///
/// Returns `AssemblyError` on filesystem failures, invalid exclude patterns,
/// or duplicate staging paths.
pub fn assemble(
    project_root: &Path,
    artifacts: &BuildArtifacts,
    desired: &DesiredState,
    reporter: &impl ProgressReporter,
) -> Result<StagedTree, AssemblyError> {
    reporter.step("assembling staging tree...");

    let excludes = ExcludePatterns::compile(&desired.exclude_patterns)?;
    let dir = TempDir::with_prefix(format!("{}-deploy-", desired.app_name))
        .map_err(|e| io_err("creating staging directory", e))?;
    let mut entries: Vec<ManifestEntry> = Vec::new();

    // Package artifact.
    let package_name = artifacts
        .package_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| {
            io_err(
                "resolving package artifact name",
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    artifacts.package_path.display().to_string(),
                ),
            )
        })?;
    let package_rel = format!("{PACKAGES_DIR}/{package_name}");
    copy_file(
        &artifacts.package_path,
        dir.path(),
        &package_rel,
        &mut entries,
    )?;

    // Static bundle.
    copy_tree(
        &artifacts.bundle_dir,
        project_root,
        dir.path(),
        "static",
        &excludes,
        &mut entries,
    )?;

    // Project config directory, minus deployment config (it describes this
    // tool's own input, not the app).
    let config_src = project_root.join("config");
    if config_src.is_dir() {
        let deployment_files = ExcludePatterns::compile(&[
            "deployment.yaml".to_string(),
            "deployment.example.yaml".to_string(),
        ])?;
        copy_tree_filtered(
            &config_src,
            project_root,
            dir.path(),
            "config",
            &[&excludes, &deployment_files],
            &mut entries,
        )?;
    }

    // App manifest with database wiring injected.
    let manifest_bytes = render_app_manifest(project_root, desired)?;
    let manifest_dest = dir.path().join(APP_MANIFEST);
    std::fs::write(&manifest_dest, &manifest_bytes)
        .map_err(|e| io_err("writing app.yaml", e))?;
    entries.push(hash_entry(&manifest_dest, APP_MANIFEST)?);

    let manifest = StagingManifest::from_entries(entries)?;
    reporter.success(&format!("staged {} file(s)", manifest.len()));

    Ok(StagedTree { dir, manifest })
}

/// Generate the staged `app.yaml`.
///
/// Starts from the project's own `app.yaml` when present, then overwrites
/// the `env` section with the configured env vars plus `DATABASE_INSTANCE`
/// and `DATABASE_SCHEMA` so the running app finds its backing database.
fn render_app_manifest(
    project_root: &Path,
    desired: &DesiredState,
) -> Result<Vec<u8>, AssemblyError> {
    let source = project_root.join(APP_MANIFEST);
    let mut doc: serde_yaml::Mapping = if source.is_file() {
        let content =
            std::fs::read_to_string(&source).map_err(|e| io_err("reading app.yaml", e))?;
        serde_yaml::from_str(&content).map_err(|e| AssemblyError::InvalidPattern {
            pattern: APP_MANIFEST.into(),
            detail: e.to_string(),
        })?
    } else {
        serde_yaml::Mapping::new()
    };

    let mut env: Vec<serde_yaml::Value> = Vec::new();
    let mut push_var = |name: &str, value: &str| {
        let mut entry = serde_yaml::Mapping::new();
        entry.insert("name".into(), name.into());
        entry.insert("value".into(), value.into());
        env.push(serde_yaml::Value::Mapping(entry));
    };
    for var in &desired.env_vars {
        if var.name != "DATABASE_INSTANCE" && var.name != "DATABASE_SCHEMA" {
            push_var(&var.name, &var.value);
        }
    }
    push_var("DATABASE_INSTANCE", &desired.database.instance_name);
    push_var("DATABASE_SCHEMA", &desired.database.schema);
    doc.insert("env".into(), serde_yaml::Value::Sequence(env));

    serde_yaml::to_string(&doc)
        .map(String::into_bytes)
        .map_err(|e| AssemblyError::InvalidPattern {
            pattern: APP_MANIFEST.into(),
            detail: e.to_string(),
        })
}

fn copy_tree(
    src: &Path,
    project_root: &Path,
    staging_root: &Path,
    dest_prefix: &str,
    excludes: &ExcludePatterns,
    entries: &mut Vec<ManifestEntry>,
) -> Result<(), AssemblyError> {
    copy_tree_filtered(
        src,
        project_root,
        staging_root,
        dest_prefix,
        &[excludes],
        entries,
    )
}

fn copy_tree_filtered(
    src: &Path,
    project_root: &Path,
    staging_root: &Path,
    dest_prefix: &str,
    filters: &[&ExcludePatterns],
    entries: &mut Vec<ManifestEntry>,
) -> Result<(), AssemblyError> {
    let read = std::fs::read_dir(src)
        .map_err(|e| io_err(&format!("reading {}", src.display()), e))?;
    for item in read {
        let item = item.map_err(|e| io_err(&format!("reading {}", src.display()), e))?;
        let path = item.path();
        let is_dir = path.is_dir();

        // Exclusion is decided on the source path, relative to the project
        // root when the source lives inside it.
        let match_path = path.strip_prefix(project_root).unwrap_or(&path);
        if filters.iter().any(|f| f.is_excluded(match_path, is_dir)) {
            continue;
        }

        let name = item.file_name();
        let rel = format!("{dest_prefix}/{}", name.to_string_lossy());
        if is_dir {
            copy_tree_filtered(&path, project_root, staging_root, &rel, filters, entries)?;
        } else {
            copy_file(&path, staging_root, &rel, entries)?;
        }
    }
    Ok(())
}

fn copy_file(
    src: &Path,
    staging_root: &Path,
    relative_path: &str,
    entries: &mut Vec<ManifestEntry>,
) -> Result<(), AssemblyError> {
    let dest = staging_root.join(relative_path);
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| io_err(&format!("creating {}", parent.display()), e))?;
    }
    std::fs::copy(src, &dest)
        .map_err(|e| io_err(&format!("copying {}", src.display()), e))?;
    entries.push(hash_entry(&dest, relative_path)?);
    Ok(())
}

fn hash_entry(path: &Path, relative_path: &str) -> Result<ManifestEntry, AssemblyError> {
    let bytes =
        std::fs::read(path).map_err(|e| io_err(&format!("hashing {}", path.display()), e))?;
    let digest = Sha256::digest(&bytes);
    Ok(ManifestEntry {
        relative_path: relative_path.to_string(),
        content_hash: format!("{digest:x}"),
        size_bytes: bytes.len() as u64,
    })
}

fn io_err(context: &str, source: std::io::Error) -> AssemblyError {
    AssemblyError::Io {
        context: context.to_string(),
        source,
    }
}

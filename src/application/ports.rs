//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain` — never from `crate::infra`,
//! `crate::commands`, or `crate::output`.
//!
//! The remote platform is a capability set {upload, list, create, get,
//! update, delete, poll}; the orchestrator is agnostic to its transport.

use std::process::Output;
use std::path::Path;

use crate::domain::config::{CapacityTier, Grant};
use crate::domain::error::PlatformError;
use crate::domain::resource::{AppSpec, AppState, DatabaseInstanceState};

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer. Sync trait — no async needed.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
}

// ── Build Tool Port ───────────────────────────────────────────────────────────

/// Abstracts local process execution so the artifact builder can be tested
/// without spawning real build tools.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run a program from `cwd` and capture its output.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exceeds the
    /// runner's timeout. On timeout, the child process must be killed.
    async fn run(&self, program: &str, args: &[&str], cwd: &Path) -> anyhow::Result<Output>;
}

// ── Workspace File Store Port ─────────────────────────────────────────────────

/// A file in the remote workspace listing. `path` is relative to the listed
/// workspace root, `/`-separated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub path: String,
    /// Lowercase hex SHA-256 as reported by the platform, when available.
    pub sha256: Option<String>,
    pub size_bytes: u64,
}

/// Workspace file operations under a workspace path.
#[allow(async_fn_in_trait)]
pub trait FileStore {
    /// Ensure the workspace directory exists.
    async fn mkdirs(&self, workspace_path: &str) -> Result<(), PlatformError>;

    /// List all files under `workspace_path`, recursively. Paths in the
    /// result are relative to `workspace_path`.
    async fn list(&self, workspace_path: &str) -> Result<Vec<RemoteFile>, PlatformError>;

    /// Upload a file, overwriting any existing content.
    async fn upload(
        &self,
        workspace_path: &str,
        relative_path: &str,
        bytes: Vec<u8>,
    ) -> Result<(), PlatformError>;

    /// Delete a file under `workspace_path`.
    async fn delete(&self, workspace_path: &str, relative_path: &str)
    -> Result<(), PlatformError>;
}

// ── Database API Port ─────────────────────────────────────────────────────────

/// Managed database operations: instance lifecycle, schema, grants.
#[allow(async_fn_in_trait)]
pub trait DatabaseApi {
    /// Fetch the instance snapshot, `None` if absent.
    async fn get_instance(
        &self,
        name: &str,
    ) -> Result<Option<DatabaseInstanceState>, PlatformError>;

    /// Request creation of a new instance. Returns once the request is
    /// accepted; the caller polls `get_instance` for readiness.
    async fn create_instance(
        &self,
        name: &str,
        capacity: CapacityTier,
    ) -> Result<(), PlatformError>;

    /// Change the capacity tier of an existing instance.
    async fn update_instance(
        &self,
        name: &str,
        capacity: CapacityTier,
    ) -> Result<(), PlatformError>;

    /// Delete the instance.
    async fn delete_instance(&self, name: &str) -> Result<(), PlatformError>;

    /// Whether the schema exists on the instance.
    async fn schema_exists(&self, instance: &str, schema: &str) -> Result<bool, PlatformError>;

    /// Create the schema. `AlreadyExists` from the platform is surfaced as
    /// an error here; the provisioner treats it as success.
    async fn create_schema(&self, instance: &str, schema: &str) -> Result<(), PlatformError>;

    /// Current grants on the schema. An absent schema yields an empty list.
    async fn list_grants(&self, instance: &str, schema: &str)
    -> Result<Vec<Grant>, PlatformError>;

    /// Add one grant to the schema.
    async fn add_grant(
        &self,
        instance: &str,
        schema: &str,
        grant: &Grant,
    ) -> Result<(), PlatformError>;
}

// ── Apps API Port ─────────────────────────────────────────────────────────────

/// App resource lifecycle operations.
#[allow(async_fn_in_trait)]
pub trait AppsApi {
    /// Fetch the app snapshot, `None` if absent.
    async fn get_app(&self, name: &str) -> Result<Option<AppState>, PlatformError>;

    /// Create the app resource. One atomic call — either the whole spec is
    /// accepted or the call fails.
    async fn create_app(&self, spec: &AppSpec) -> Result<(), PlatformError>;

    /// Update the app resource to match `spec`. One atomic call.
    async fn update_app(&self, spec: &AppSpec) -> Result<(), PlatformError>;

    /// Delete the app resource.
    async fn delete_app(&self, name: &str) -> Result<(), PlatformError>;
}

// ── Composite ─────────────────────────────────────────────────────────────────

/// Composite trait — any type implementing all three API sub-traits is a
/// `PlatformApi`.
pub trait PlatformApi: FileStore + DatabaseApi + AppsApi {}

/// Blanket implementation.
impl<T> PlatformApi for T where T: FileStore + DatabaseApi + AppsApi {}

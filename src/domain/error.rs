//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.
//!
//! The taxonomy follows the retry contract of each failure class:
//! configuration and build errors are never retried (fix and re-run), sync
//! errors are retried with backoff before becoming fatal, and timeouts are
//! kept distinct from remote `FAILED` states because a timeout means
//! "outcome unknown, check manually".

use thiserror::Error;

// ── Configuration errors ──────────────────────────────────────────────────────

/// Errors produced while loading the declarative deployment configuration.
/// Never retried — the input must be fixed before re-running.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required field '{field}' for environment '{environment}'")]
    MissingField { field: String, environment: String },

    #[error("Invalid value for {field}: {value}\n\nValid values: {valid}")]
    InvalidEnum {
        field: String,
        value: String,
        valid: String,
    },

    #[error("Unknown placeholder '{{{placeholder}}}' in workspace path")]
    TemplateSubstitutionFailed { placeholder: String },

    #[error("No identity available to substitute '{{username}}'. Add 'username' to the credential profile.")]
    MissingIdentity,

    #[error("Unknown environment: {name}. Available: {available}")]
    UnknownEnvironment { name: String, available: String },

    #[error("Unknown profile '{name}'. Available: {available}")]
    UnknownProfile { name: String, available: String },
}

// ── Build errors ──────────────────────────────────────────────────────────────

/// Errors from the local artifact build steps. Deterministic (bad source),
/// so never retried automatically.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("{step} build failed:\n{detail}")]
    StepFailed { step: String, detail: String },

    #[error("{step} build did not produce {path}")]
    MissingOutput { step: String, path: String },
}

// ── Staging assembly errors ───────────────────────────────────────────────────

/// Errors while assembling the local staging tree.
#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("Duplicate staging entry: {path}")]
    DuplicatePath { path: String },

    #[error("Invalid exclude pattern '{pattern}': {detail}")]
    InvalidPattern { pattern: String, detail: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

// ── Remote file sync errors ───────────────────────────────────────────────────

/// Errors from the remote file synchronizer. Individual uploads are retried
/// with backoff before the whole sync aborts.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Listing workspace files at {path} failed: {detail}")]
    List { path: String, detail: String },

    #[error("Sync aborted: {uploaded} file(s) uploaded, {} failed:\n{}", .failed.len(), .failed.join("\n"))]
    Aborted {
        uploaded: usize,
        failed: Vec<String>,
    },

    #[error("Deleting {path} failed: {detail}")]
    Delete { path: String, detail: String },

    #[error("Sync cancelled: {uploaded} file(s) uploaded before interrupt")]
    Cancelled { uploaded: usize },
}

// ── Database provisioning errors ──────────────────────────────────────────────

/// Errors from the database provisioner. Instance/schema/grant failures are
/// fatal; only transient polling errors are retried (up to the deadline).
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("Database instance '{name}' reached FAILED state: {diagnostic}")]
    InstanceFailed { name: String, diagnostic: String },

    #[error("Timed out waiting for {resource} to become READY (last status: {last_status})")]
    Timeout {
        resource: String,
        last_status: String,
    },

    #[error("Schema '{schema}' setup failed: {detail}")]
    Schema { schema: String, detail: String },

    #[error("Granting {level} to '{principal}' failed: {detail}")]
    Grant {
        principal: String,
        level: String,
        detail: String,
    },

    #[error(transparent)]
    Platform(#[from] PlatformError),
}

// ── App resource reconciliation errors ────────────────────────────────────────

/// Errors from the app resource reconciler. `AlreadyExists` and `NotFound`
/// are user-facing guidance, distinct from platform outages.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("App '{name}' already exists. Use 'strato update' to deploy a new version.")]
    AlreadyExists { name: String },

    #[error("App '{name}' not found. Use 'strato create' to create it first.")]
    NotFound { name: String },

    #[error("App '{name}' reached FAILED state: {diagnostic}")]
    DeployFailed { name: String, diagnostic: String },

    #[error("Timed out waiting for app to become READY (last status: {last_status})")]
    Timeout { last_status: String },

    #[error(transparent)]
    Platform(#[from] PlatformError),
}

// ── Platform API errors ───────────────────────────────────────────────────────

/// Typed outcome of a remote platform call, shared by every port trait.
/// Diagnostic text from the platform is carried verbatim — never summarized.
#[derive(Debug, Clone, Error)]
pub enum PlatformError {
    #[error("resource not found")]
    NotFound,

    #[error("resource already exists")]
    AlreadyExists,

    #[error("transient platform error: {detail}")]
    Transient { detail: String },

    #[error("platform API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("network error: {detail}")]
    Network { detail: String },
}

impl PlatformError {
    /// Whether a retry with backoff may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::Network { .. })
    }
}

// ── Phase error umbrella ──────────────────────────────────────────────────────

/// Any phase failure, as recorded in a `ReconciliationResult`. The orchestrator
/// aggregates these instead of terminating, so the final report is always
/// complete and ordered.
#[derive(Debug, Error)]
pub enum PhaseError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Assembly(#[from] AssemblyError),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Provision(#[from] ProvisionError),
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
}

impl PhaseError {
    /// Stable error-kind label used in reports and JSON output.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "ConfigError",
            Self::Build(_) => "BuildError",
            Self::Assembly(_) => "AssemblyError",
            Self::Sync(SyncError::Cancelled { .. }) => "Cancelled",
            Self::Sync(_) => "SyncError",
            Self::Provision(ProvisionError::Timeout { .. }) => "Timeout",
            Self::Provision(_) => "ProvisioningError",
            Self::Reconcile(ReconcileError::Timeout { .. }) => "Timeout",
            Self::Reconcile(ReconcileError::AlreadyExists { .. }) => "AlreadyExists",
            Self::Reconcile(ReconcileError::NotFound { .. }) => "NotFound",
            Self::Reconcile(_) => "ReconcileError",
        }
    }
}

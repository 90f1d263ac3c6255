//! Per-phase reconciliation results and the aggregated deployment report.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::error::PhaseError;

/// Pipeline phase, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Config,
    Build,
    Staging,
    Sync,
    DatabaseInstance,
    Schema,
    Grants,
    App,
}

impl Phase {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Build => "build",
            Self::Staging => "staging",
            Self::Sync => "sync",
            Self::DatabaseInstance => "database-instance",
            Self::Schema => "schema",
            Self::Grants => "grants",
            Self::App => "app",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a phase did (or, in dry-run mode, what it would do).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionTaken {
    Created,
    Updated,
    Unchanged,
    Deleted,
    Skipped,
}

impl ActionTaken {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Unchanged => "unchanged",
            Self::Deleted => "deleted",
            Self::Skipped => "skipped",
        }
    }
}

impl std::fmt::Display for ActionTaken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed error detail carried in a result, serializable for `--json`.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorDetail {
    /// Stable kind label, e.g. `Timeout`, `AlreadyExists`, `SyncError`.
    pub kind: String,
    /// Full message, including verbatim platform diagnostics.
    pub message: String,
}

impl From<&PhaseError> for ErrorDetail {
    fn from(err: &PhaseError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

/// Outcome of one phase. When `error` is set, `action` records the action
/// that was being applied when the phase failed.
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationResult {
    pub phase: Phase,
    pub action: ActionTaken,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

impl ReconciliationResult {
    #[must_use]
    pub fn ok(phase: Phase, action: ActionTaken, detail: Option<String>) -> Self {
        Self {
            phase,
            action,
            detail,
            error: None,
        }
    }

    #[must_use]
    pub fn failed(phase: Phase, action: ActionTaken, err: &PhaseError) -> Self {
        Self {
            phase,
            action,
            detail: None,
            error: Some(ErrorDetail::from(err)),
        }
    }
}

/// Ordered record of everything a run attempted. The run succeeded iff no
/// result carries an error.
#[derive(Debug, Serialize)]
pub struct DeployReport {
    pub action: String,
    pub environment: String,
    pub app_name: String,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub results: Vec<ReconciliationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_url: Option<String>,
}

impl DeployReport {
    /// Whether every phase completed without an unrecoverable error.
    #[must_use]
    pub fn ok(&self) -> bool {
        self.results.iter().all(|r| r.error.is_none())
    }

    /// First failing result, if any.
    #[must_use]
    pub fn failure(&self) -> Option<&ReconciliationResult> {
        self.results.iter().find(|r| r.error.is_some())
    }
}

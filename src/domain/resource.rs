//! Remote resource state snapshots and desired app specification.
//!
//! Snapshots are fetched fresh by each reconciler at the top of its own
//! phase — never cached across phases, because external actors may change
//! remote state between invocation and action.

use serde::{Deserialize, Serialize};

use crate::domain::config::{CapacityTier, ComputeSize, EnvVar, Grant};

/// Remote resource status as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceStatus {
    Pending,
    Ready,
    Updating,
    Failed,
    Absent,
}

impl ResourceStatus {
    /// Terminal states stop polling.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ready | Self::Failed)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Ready => "READY",
            Self::Updating => "UPDATING",
            Self::Failed => "FAILED",
            Self::Absent => "ABSENT",
        }
    }
}

impl std::fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a managed database instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseInstanceState {
    pub status: ResourceStatus,
    pub capacity: Option<CapacityTier>,
    /// Verbatim diagnostic text from the platform, if any.
    pub diagnostics: Option<String>,
}

/// Binding of an app resource to its backing database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseBinding {
    pub instance_name: String,
    pub schema: String,
}

/// Desired shape of the app resource, sent to the platform as one atomic
/// create or update call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppSpec {
    pub name: String,
    pub description: Option<String>,
    pub workspace_path: String,
    pub compute_size: ComputeSize,
    pub env: Vec<EnvVar>,
    pub grants: Vec<Grant>,
    pub database: DatabaseBinding,
}

/// Snapshot of the remote app resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    pub status: ResourceStatus,
    pub compute_size: Option<ComputeSize>,
    pub env: Vec<EnvVar>,
    pub grants: Vec<Grant>,
    pub workspace_path: Option<String>,
    pub database: Option<DatabaseBinding>,
    pub url: Option<String>,
    /// Verbatim diagnostic text from the platform, if any.
    pub diagnostics: Option<String>,
}

//! Domain types and validators for the desired deployment state.
//!
//! Pure functions only — no I/O, no async, no filesystem access. The infra
//! layer parses the YAML documents and funnels them through the validators
//! here, so an invalid compute size or permission level is rejected at load
//! time rather than deep inside a reconciler.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;

// ── Constants ────────────────────────────────────────────────────────────────

pub const VALID_COMPUTE_SIZES: &[&str] = &["SMALL", "MEDIUM", "LARGE", "X_LARGE"];
pub const VALID_PERMISSION_LEVELS: &[&str] = &["CAN_VIEW", "CAN_USE", "CAN_MANAGE"];
pub const VALID_CAPACITY_TIERS: &[&str] = &["CU_1", "CU_2", "CU_4", "CU_8"];

pub const DEFAULT_SCHEMA: &str = "app_data";
pub const DEFAULT_DEPLOY_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

// ── Closed enums ─────────────────────────────────────────────────────────────

/// Compute tier of the app resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComputeSize {
    Small,
    Medium,
    Large,
    XLarge,
}

impl ComputeSize {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Small => "SMALL",
            Self::Medium => "MEDIUM",
            Self::Large => "LARGE",
            Self::XLarge => "X_LARGE",
        }
    }
}

impl FromStr for ComputeSize {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SMALL" => Ok(Self::Small),
            "MEDIUM" => Ok(Self::Medium),
            "LARGE" => Ok(Self::Large),
            "X_LARGE" => Ok(Self::XLarge),
            other => Err(ConfigError::InvalidEnum {
                field: "compute_size".into(),
                value: other.into(),
                valid: VALID_COMPUTE_SIZES.join(", "),
            }),
        }
    }
}

impl std::fmt::Display for ComputeSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Permission level a principal can hold on the app and its schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionLevel {
    CanView,
    CanUse,
    CanManage,
}

impl PermissionLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CanView => "CAN_VIEW",
            Self::CanUse => "CAN_USE",
            Self::CanManage => "CAN_MANAGE",
        }
    }
}

impl FromStr for PermissionLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CAN_VIEW" => Ok(Self::CanView),
            "CAN_USE" => Ok(Self::CanUse),
            "CAN_MANAGE" => Ok(Self::CanManage),
            other => Err(ConfigError::InvalidEnum {
                field: "permissions.level".into(),
                value: other.into(),
                valid: VALID_PERMISSION_LEVELS.join(", "),
            }),
        }
    }
}

impl std::fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capacity tier of the managed database instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapacityTier {
    #[serde(rename = "CU_1")]
    Cu1,
    #[serde(rename = "CU_2")]
    Cu2,
    #[serde(rename = "CU_4")]
    Cu4,
    #[serde(rename = "CU_8")]
    Cu8,
}

impl CapacityTier {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cu1 => "CU_1",
            Self::Cu2 => "CU_2",
            Self::Cu4 => "CU_4",
            Self::Cu8 => "CU_8",
        }
    }
}

impl FromStr for CapacityTier {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CU_1" => Ok(Self::Cu1),
            "CU_2" => Ok(Self::Cu2),
            "CU_4" => Ok(Self::Cu4),
            "CU_8" => Ok(Self::Cu8),
            other => Err(ConfigError::InvalidEnum {
                field: "database.capacity".into(),
                value: other.into(),
                valid: VALID_CAPACITY_TIERS.join(", "),
            }),
        }
    }
}

impl std::fmt::Display for CapacityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Desired state ────────────────────────────────────────────────────────────

/// A single environment variable entry. Order is preserved from the
/// configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

/// An association between a principal and a permission level.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Grant {
    pub principal: String,
    pub level: PermissionLevel,
}

/// Desired configuration of the managed database instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSpec {
    pub instance_name: String,
    pub schema: String,
    pub capacity: CapacityTier,
}

/// Local build commands and their expected outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSettings {
    /// Argv of the package build step, run from the project root.
    pub package_command: Vec<String>,
    /// Directory the package build writes its artifact into.
    pub package_output_dir: String,
    /// Argv of the static bundle build step.
    pub bundle_command: Vec<String>,
    /// Directory the bundle build produces.
    pub bundle_dir: String,
}

/// Polling and deadline settings for remote operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Overall deadline for a create/update to reach a terminal state.
    pub deploy: Duration,
    /// Delay between status polls.
    pub poll_interval: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            deploy: Duration::from_secs(DEFAULT_DEPLOY_TIMEOUT_SECS),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
        }
    }
}

/// Immutable desired state for one environment, derived once per invocation
/// and never mutated during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredState {
    pub environment: String,
    pub app_name: String,
    pub description: Option<String>,
    /// Workspace path with placeholders already substituted.
    pub workspace_path: String,
    pub compute_size: ComputeSize,
    pub env_vars: Vec<EnvVar>,
    pub grants: Vec<Grant>,
    pub database: DatabaseSpec,
    pub exclude_patterns: Vec<String>,
    pub build: BuildSettings,
    pub timeouts: Timeouts,
}

// ── Validators ───────────────────────────────────────────────────────────────

/// Require a non-empty value for a named field.
///
/// # Errors
///
/// Returns `ConfigError::MissingField` when the value is absent or blank.
pub fn require_field(
    value: Option<&str>,
    field: &str,
    environment: &str,
) -> Result<String, ConfigError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.to_string()),
        _ => Err(ConfigError::MissingField {
            field: field.to_string(),
            environment: environment.to_string(),
        }),
    }
}

/// Substitute `{placeholder}` tokens in a workspace path template.
///
/// The only recognized placeholder is `{username}`, filled from the
/// caller-supplied identity. Unknown placeholders are rejected so a typo
/// fails at load time instead of producing a bogus remote path.
///
/// # Errors
///
/// Returns `TemplateSubstitutionFailed` for an unrecognized placeholder and
/// `MissingIdentity` when `{username}` is present but no identity was given.
pub fn substitute_placeholders(
    template: &str,
    username: Option<&str>,
) -> Result<String, ConfigError> {
    #[allow(clippy::expect_used)] // compile-time constant pattern
    let re = regex::Regex::new(r"\{([a-zA-Z_]+)\}").expect("valid placeholder regex");

    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    for caps in re.captures_iter(template) {
        #[allow(clippy::expect_used)] // capture 0 always exists on a match
        let whole = caps.get(0).expect("match");
        let name = &caps[1];
        out.push_str(&template[last..whole.start()]);
        match name {
            "username" => match username {
                Some(u) => out.push_str(u),
                None => return Err(ConfigError::MissingIdentity),
            },
            other => {
                return Err(ConfigError::TemplateSubstitutionFailed {
                    placeholder: other.to_string(),
                });
            }
        }
        last = whole.end();
    }
    out.push_str(&template[last..]);
    Ok(out)
}

// ── Unit tests ───────────────────────────────────────────────────────────────

//! Infrastructure stores for the deployment document and credential
//! profiles.
//!
//! Both are YAML documents consumed read-only. Raw serde structs are parsed
//! here and funneled through the domain validators so every enum and
//! required field is checked at load time.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::domain::config::{
    BuildSettings, DEFAULT_DEPLOY_TIMEOUT_SECS, DEFAULT_POLL_INTERVAL_SECS, DEFAULT_SCHEMA,
    DatabaseSpec, DesiredState, EnvVar, Grant, Timeouts, require_field,
    substitute_placeholders,
};
use crate::domain::error::ConfigError;

// ── Deployment document schema ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct DeploymentDoc {
    #[serde(default)]
    common: CommonDoc,
    environments: BTreeMap<String, EnvironmentDoc>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CommonDoc {
    build: BuildDoc,
    deployment: DeploymentSettingsDoc,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct BuildDoc {
    package_command: Vec<String>,
    package_output_dir: String,
    bundle_command: Vec<String>,
    bundle_dir: String,
    exclude_patterns: Vec<String>,
}

impl Default for BuildDoc {
    fn default() -> Self {
        Self {
            package_command: Vec::new(),
            package_output_dir: "dist".into(),
            bundle_command: Vec::new(),
            bundle_dir: "frontend/dist".into(),
            exclude_patterns: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct DeploymentSettingsDoc {
    timeout_seconds: u64,
    poll_interval_seconds: u64,
}

impl Default for DeploymentSettingsDoc {
    fn default() -> Self {
        Self {
            timeout_seconds: DEFAULT_DEPLOY_TIMEOUT_SECS,
            poll_interval_seconds: DEFAULT_POLL_INTERVAL_SECS,
        }
    }
}

#[derive(Debug, Deserialize)]
struct EnvironmentDoc {
    app_name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    workspace_path: Option<String>,
    #[serde(default)]
    compute_size: Option<String>,
    #[serde(default)]
    env_vars: Vec<EnvVarDoc>,
    #[serde(default)]
    permissions: Vec<GrantDoc>,
    database: Option<DatabaseDoc>,
}

#[derive(Debug, Deserialize)]
struct EnvVarDoc {
    name: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct GrantDoc {
    principal: String,
    level: String,
}

#[derive(Debug, Deserialize)]
struct DatabaseDoc {
    instance_name: Option<String>,
    #[serde(default)]
    schema: Option<String>,
    #[serde(default)]
    capacity: Option<String>,
}

/// Load and validate the desired state for one environment.
///
/// Pure function of the file contents plus the caller-supplied identity —
/// it either returns a complete `DesiredState` or a typed error, never a
/// partial result.
///
/// # Errors
///
/// Returns an error when the file is unreadable, the YAML is malformed, or
/// any domain validation fails.
pub fn load_desired_state(
    path: &Path,
    environment: &str,
    username: Option<&str>,
) -> Result<DesiredState> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    let doc: DeploymentDoc = serde_yaml::from_str(&content)
        .with_context(|| format!("cannot parse {}", path.display()))?;
    desired_state_from_doc(&doc, environment, username)
}

fn desired_state_from_doc(
    doc: &DeploymentDoc,
    environment: &str,
    username: Option<&str>,
) -> Result<DesiredState> {
    let env = doc.environments.get(environment).ok_or_else(|| {
        ConfigError::UnknownEnvironment {
            name: environment.to_string(),
            available: doc
                .environments
                .keys()
                .cloned()
                .collect::<Vec<_>>()
                .join(", "),
        }
    })?;

    let app_name = require_field(env.app_name.as_deref(), "app_name", environment)?;
    let workspace_template =
        require_field(env.workspace_path.as_deref(), "workspace_path", environment)?;
    let workspace_path = substitute_placeholders(&workspace_template, username)?;

    let compute_size = env
        .compute_size
        .as_deref()
        .unwrap_or("MEDIUM")
        .parse()?;

    let database_doc = env.database.as_ref();
    let instance_name = require_field(
        database_doc.and_then(|d| d.instance_name.as_deref()),
        "database.instance_name",
        environment,
    )?;
    let capacity = database_doc
        .and_then(|d| d.capacity.as_deref())
        .unwrap_or("CU_1")
        .parse()?;
    let schema = database_doc
        .and_then(|d| d.schema.as_deref())
        .unwrap_or(DEFAULT_SCHEMA)
        .to_string();

    let mut grants = Vec::with_capacity(env.permissions.len());
    for grant in &env.permissions {
        grants.push(Grant {
            principal: require_field(
                Some(grant.principal.as_str()),
                "permissions.principal",
                environment,
            )?,
            level: grant.level.parse()?,
        });
    }

    let env_vars = env
        .env_vars
        .iter()
        .map(|v| EnvVar {
            name: v.name.clone(),
            value: v.value.clone(),
        })
        .collect();

    Ok(DesiredState {
        environment: environment.to_string(),
        app_name,
        description: env.description.clone(),
        workspace_path,
        compute_size,
        env_vars,
        grants,
        database: DatabaseSpec {
            instance_name,
            schema,
            capacity,
        },
        exclude_patterns: doc.common.build.exclude_patterns.clone(),
        build: BuildSettings {
            package_command: doc.common.build.package_command.clone(),
            package_output_dir: doc.common.build.package_output_dir.clone(),
            bundle_command: doc.common.build.bundle_command.clone(),
            bundle_dir: doc.common.build.bundle_dir.clone(),
        },
        timeouts: Timeouts {
            deploy: std::time::Duration::from_secs(doc.common.deployment.timeout_seconds),
            poll_interval: std::time::Duration::from_secs(
                doc.common.deployment.poll_interval_seconds,
            ),
        },
    })
}

// ── Credential profiles ───────────────────────────────────────────────────────

/// One authenticated platform identity.
#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    /// Platform base URL, e.g. `https://workspace.example.com`.
    pub host: String,
    /// Bearer token.
    pub token: String,
    /// Identity for `{username}` substitution, when known.
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CredentialsDoc {
    #[serde(default)]
    profiles: BTreeMap<String, Profile>,
}

/// Store for `~/.strato/credentials.yaml`.
pub struct CredentialsStore;

impl CredentialsStore {
    /// Resolve the credentials file path, honoring `STRATO_CREDENTIALS`.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn path() -> Result<PathBuf> {
        if let Ok(val) = std::env::var("STRATO_CREDENTIALS") {
            return Ok(PathBuf::from(val));
        }
        let home =
            dirs::home_dir().ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
        Ok(home.join(".strato").join("credentials.yaml"))
    }

    /// Load one named profile.
    ///
    /// # Errors
    ///
    /// Returns an error when the file is missing or unparsable, the profile
    /// is unknown, or the profile is missing host/token.
    pub fn load_profile(name: &str) -> Result<Profile> {
        let path = Self::path()?;
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("cannot read credentials file {}", path.display()))?;
        let doc: CredentialsDoc = serde_yaml::from_str(&content)
            .with_context(|| format!("cannot parse {}", path.display()))?;

        let profile = doc.profiles.get(name).ok_or_else(|| {
            ConfigError::UnknownProfile {
                name: name.to_string(),
                available: doc.profiles.keys().cloned().collect::<Vec<_>>().join(", "),
            }
        })?;

        anyhow::ensure!(
            !profile.host.trim().is_empty(),
            "profile '{name}' has an empty host"
        );
        anyhow::ensure!(
            !profile.token.trim().is_empty(),
            "profile '{name}' has an empty token"
        );
        Ok(profile.clone())
    }
}

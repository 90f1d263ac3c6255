//! App resource reconciler — create, update, or delete the compute+app
//! resource and poll it to a terminal state.
//!
//! `create` refuses to adopt an existing resource (`AlreadyExists`), and
//! `update` refuses to invent one (`NotFound`) — both are user-facing
//! guidance, distinct from platform outages. Updates are issued as one
//! atomic call; there is no field-by-field partial application at this
//! layer.

use std::time::Duration;

use tokio::time::Instant;

use crate::application::ports::{AppsApi, ProgressReporter};
use crate::domain::config::{DesiredState, Timeouts};
use crate::domain::error::{PlatformError, ReconcileError};
use crate::domain::report::{ActionTaken, Phase, ReconciliationResult};
use crate::domain::resource::{AppSpec, AppState, DatabaseBinding, ResourceStatus};

/// Read-only reconciliation plan for the app phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppPlan {
    Create(AppSpec),
    Update { spec: AppSpec, changes: Vec<String> },
    Unchanged,
    Delete,
    /// Delete requested but the resource is already absent (idempotent).
    AlreadyAbsent,
}

impl AppPlan {
    #[must_use]
    pub fn action(&self) -> ActionTaken {
        match self {
            Self::Create(_) => ActionTaken::Created,
            Self::Update { .. } => ActionTaken::Updated,
            Self::Unchanged | Self::AlreadyAbsent => ActionTaken::Unchanged,
            Self::Delete => ActionTaken::Deleted,
        }
    }

    /// Short human summary, used for dry-run reporting.
    #[must_use]
    pub fn describe(&self) -> Option<String> {
        match self {
            Self::Update { changes, .. } => Some(changes.join(", ")),
            Self::AlreadyAbsent => Some("already absent".into()),
            _ => None,
        }
    }
}

/// Requested action on the app resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppAction {
    Create,
    Update,
    Delete,
}

/// Build the desired app spec from the desired state.
#[must_use]
pub fn spec_from(desired: &DesiredState) -> AppSpec {
    AppSpec {
        name: desired.app_name.clone(),
        description: desired.description.clone(),
        workspace_path: desired.workspace_path.clone(),
        compute_size: desired.compute_size,
        env: desired.env_vars.clone(),
        grants: desired.grants.clone(),
        database: DatabaseBinding {
            instance_name: desired.database.instance_name.clone(),
            schema: desired.database.schema.clone(),
        },
    }
}

/// Compute the app plan from a fresh remote snapshot.
///
/// # Errors
///
/// Returns `AlreadyExists` for `create` on a present resource, `NotFound`
/// for `update` on an absent one, and `Platform` for read failures.
pub async fn plan(
    apps: &impl AppsApi,
    desired: &DesiredState,
    action: AppAction,
) -> Result<AppPlan, ReconcileError> {
    let current = apps.get_app(&desired.app_name).await?;

    match action {
        AppAction::Create => match current {
            Some(_) => Err(ReconcileError::AlreadyExists {
                name: desired.app_name.clone(),
            }),
            None => Ok(AppPlan::Create(spec_from(desired))),
        },
        AppAction::Update => match current {
            None => Err(ReconcileError::NotFound {
                name: desired.app_name.clone(),
            }),
            Some(state) => {
                let spec = spec_from(desired);
                let changes = diff(&spec, &state);
                if changes.is_empty() {
                    Ok(AppPlan::Unchanged)
                } else {
                    Ok(AppPlan::Update { spec, changes })
                }
            }
        },
        AppAction::Delete => match current {
            Some(_) => Ok(AppPlan::Delete),
            None => Ok(AppPlan::AlreadyAbsent),
        },
    }
}

/// Apply the app plan, polling to a terminal state after create/update.
///
/// # Errors
///
/// Returns `ReconcileError` on platform failures, a `FAILED` terminal
/// state (with the platform's diagnostic verbatim), or a poll timeout.
pub async fn apply(
    apps: &impl AppsApi,
    reporter: &impl ProgressReporter,
    desired: &DesiredState,
    plan: &AppPlan,
) -> Result<(ReconciliationResult, Option<String>), ReconcileError> {
    let name = &desired.app_name;
    match plan {
        AppPlan::Create(spec) => {
            reporter.step(&format!("creating app '{name}'..."));
            apps.create_app(spec).await?;
            let state = wait_app_ready(apps, name, &desired.timeouts).await?;
            reporter.success("app created and serving");
            Ok((
                ReconciliationResult::ok(Phase::App, ActionTaken::Created, None),
                state.url,
            ))
        }
        AppPlan::Update { spec, changes } => {
            reporter.step(&format!("updating app '{name}'..."));
            apps.update_app(spec).await?;
            let state = wait_app_ready(apps, name, &desired.timeouts).await?;
            reporter.success("app updated and serving");
            Ok((
                ReconciliationResult::ok(
                    Phase::App,
                    ActionTaken::Updated,
                    Some(changes.join(", ")),
                ),
                state.url,
            ))
        }
        AppPlan::Unchanged => Ok((
            ReconciliationResult::ok(Phase::App, ActionTaken::Unchanged, None),
            None,
        )),
        AppPlan::Delete => {
            reporter.step(&format!("deleting app '{name}'..."));
            match apps.delete_app(name).await {
                // Raced with an external delete; absent is what we wanted.
                Ok(()) | Err(PlatformError::NotFound) => {}
                Err(e) => return Err(e.into()),
            }
            reporter.success("app deleted");
            Ok((
                ReconciliationResult::ok(Phase::App, ActionTaken::Deleted, None),
                None,
            ))
        }
        AppPlan::AlreadyAbsent => Ok((
            ReconciliationResult::ok(
                Phase::App,
                ActionTaken::Unchanged,
                Some("already absent".into()),
            ),
            None,
        )),
    }
}

/// Field-by-field diff of desired spec vs observed state, as human-readable
/// change descriptions. Empty means no update call is needed.
fn diff(spec: &AppSpec, state: &AppState) -> Vec<String> {
    let mut changes = Vec::new();

    if state.compute_size != Some(spec.compute_size) {
        let from = state
            .compute_size
            .map_or_else(|| "unknown".to_string(), |c| c.to_string());
        changes.push(format!("compute size {from} -> {}", spec.compute_size));
    }
    if state.env != spec.env {
        changes.push("env vars".to_string());
    }
    if state.grants != spec.grants {
        changes.push("permission grants".to_string());
    }
    if state.workspace_path.as_deref() != Some(spec.workspace_path.as_str()) {
        changes.push("workspace path binding".to_string());
    }
    if state.database.as_ref() != Some(&spec.database) {
        changes.push("database binding".to_string());
    }

    changes
}

/// Poll the app until READY, FAILED, or the deadline.
async fn wait_app_ready(
    apps: &impl AppsApi,
    name: &str,
    timeouts: &Timeouts,
) -> Result<AppState, ReconcileError> {
    let deadline = Instant::now() + timeouts.deploy;
    let mut last_status = ResourceStatus::Absent.to_string();

    loop {
        match apps.get_app(name).await {
            Ok(Some(state)) => match state.status {
                ResourceStatus::Ready => return Ok(state),
                ResourceStatus::Failed => {
                    return Err(ReconcileError::DeployFailed {
                        name: name.to_string(),
                        diagnostic: state
                            .diagnostics
                            .unwrap_or_else(|| "no diagnostic provided".to_string()),
                    });
                }
                other => last_status = other.to_string(),
            },
            Ok(None) => last_status = ResourceStatus::Absent.to_string(),
            Err(e) if e.is_transient() => last_status = format!("unreachable ({e})"),
            Err(e) => return Err(ReconcileError::Platform(e)),
        }

        if Instant::now() >= deadline {
            return Err(ReconcileError::Timeout { last_status });
        }
        tokio::time::sleep(timeouts.poll_interval.max(Duration::from_millis(1))).await;
    }
}

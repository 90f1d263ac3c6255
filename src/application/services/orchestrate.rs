//! Deployment orchestrator — sequences the pipeline phases, threads the
//! dry-run flag, and aggregates per-phase results into one report.
//!
//! Every reconciler separates "compute plan" from "apply plan"; dry-run is
//! a gate on the apply step, never a separate code path, so the planned
//! actions a dry-run reports are exactly what the real action would do.
//! A fatal error stops all subsequent phases — there is no rollback. This
//! is a forward-converging reconciler: re-running after fixing the root
//! cause is the recovery path.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use chrono::Utc;

use crate::application::ports::{CommandRunner, DatabaseApi, PlatformApi, ProgressReporter};
use crate::application::services::app::{self, AppAction};
use crate::application::services::{build, database, staging, sync};
use crate::domain::config::DesiredState;
use crate::domain::error::{PhaseError, ProvisionError};
use crate::domain::report::{ActionTaken, DeployReport, Phase, ReconciliationResult};

/// Requested deployment action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployAction {
    Create,
    Update,
    Delete { drop_database: bool },
}

impl DeployAction {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete { .. } => "delete",
        }
    }
}

/// Orchestrator options, fixed for the lifetime of one run.
pub struct RunOptions<'a> {
    pub project_root: &'a Path,
    pub dry_run: bool,
    pub sync: sync::SyncOptions,
    /// Cooperative cancellation, set by the interrupt handler.
    pub cancel: Arc<AtomicBool>,
}

/// Execute the requested action and return the ordered report.
///
/// Never returns an error: failures are recorded in the report so the
/// caller can always render a complete account of what was attempted.
pub async fn run(
    platform: &impl PlatformApi,
    runner: &impl CommandRunner,
    reporter: &impl ProgressReporter,
    desired: &DesiredState,
    action: DeployAction,
    opts: &RunOptions<'_>,
) -> DeployReport {
    let started_at = Utc::now();
    let mut results = vec![ReconciliationResult::ok(
        Phase::Config,
        ActionTaken::Unchanged,
        Some("validated".into()),
    )];

    let app_url = match action {
        DeployAction::Delete { drop_database } => {
            run_delete(platform, reporter, desired, drop_database, opts, &mut results).await
        }
        DeployAction::Create | DeployAction::Update => {
            let app_action = if action == DeployAction::Create {
                AppAction::Create
            } else {
                AppAction::Update
            };
            run_deploy(platform, runner, reporter, desired, app_action, opts, &mut results).await
        }
    };

    DeployReport {
        action: action.as_str().to_string(),
        environment: desired.environment.clone(),
        app_name: desired.app_name.clone(),
        dry_run: opts.dry_run,
        started_at,
        finished_at: Utc::now(),
        results,
        app_url,
    }
}

/// Create/update pipeline: build → staging → sync → database → app.
async fn run_deploy(
    platform: &impl PlatformApi,
    runner: &impl CommandRunner,
    reporter: &impl ProgressReporter,
    desired: &DesiredState,
    app_action: AppAction,
    opts: &RunOptions<'_>,
    results: &mut Vec<ReconciliationResult>,
) -> Option<String> {
    // Build. Local and fail-fast: no remote state has been touched yet.
    let artifacts =
        match build::build_artifacts(runner, reporter, opts.project_root, &desired.build).await {
            Ok(artifacts) => {
                let detail = artifacts
                    .package_path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned());
                results.push(ReconciliationResult::ok(
                    Phase::Build,
                    ActionTaken::Created,
                    detail,
                ));
                artifacts
            }
            Err(e) => {
                let err = PhaseError::from(e);
                results.push(ReconciliationResult::failed(
                    Phase::Build,
                    ActionTaken::Created,
                    &err,
                ));
                return None;
            }
        };

    // Staging. Still local; the tree lives in a scoped temp dir.
    let staged = match staging::assemble(opts.project_root, &artifacts, desired, reporter) {
        Ok(staged) => {
            results.push(ReconciliationResult::ok(
                Phase::Staging,
                ActionTaken::Created,
                Some(format!("{} file(s)", staged.manifest.len())),
            ));
            staged
        }
        Err(e) => {
            let err = PhaseError::from(e);
            results.push(ReconciliationResult::failed(
                Phase::Staging,
                ActionTaken::Created,
                &err,
            ));
            return None;
        }
    };

    // Sync. Plan is read-only; apply mutates the workspace file store.
    let sync_plan = match sync::plan(
        platform,
        &staged.manifest,
        &desired.workspace_path,
        opts.sync.prune,
    )
    .await
    {
        Ok(plan) => plan,
        Err(e) => {
            let err = PhaseError::from(e);
            results.push(ReconciliationResult::failed(
                Phase::Sync,
                ActionTaken::Updated,
                &err,
            ));
            return None;
        }
    };
    let sync_action = if sync_plan.is_noop() {
        ActionTaken::Unchanged
    } else {
        ActionTaken::Updated
    };
    if opts.dry_run {
        results.push(ReconciliationResult::ok(
            Phase::Sync,
            sync_action,
            Some(format!("planned: {}", sync_plan.describe())),
        ));
    } else {
        match sync::apply(
            platform,
            reporter,
            staged.root(),
            &sync_plan,
            &desired.workspace_path,
            &opts.sync,
            &opts.cancel,
        )
        .await
        {
            Ok(report) => results.push(ReconciliationResult::ok(
                Phase::Sync,
                sync_action,
                Some(format!(
                    "{} uploaded, {} unchanged, {} deleted",
                    report.uploaded, report.unchanged, report.deleted
                )),
            )),
            Err(e) => {
                let err = PhaseError::from(e);
                results.push(ReconciliationResult::failed(
                    Phase::Sync,
                    sync_action,
                    &err,
                ));
                return None;
            }
        }
    }
    // The staging tree is not needed past the sync phase.
    drop(staged);

    // Database: instance, schema, grants.
    let db_plan = match database::plan(platform, desired).await {
        Ok(plan) => plan,
        Err(e) => {
            let err = PhaseError::from(e);
            results.push(ReconciliationResult::failed(
                Phase::DatabaseInstance,
                ActionTaken::Created,
                &err,
            ));
            return None;
        }
    };
    if opts.dry_run {
        results.push(ReconciliationResult::ok(
            Phase::DatabaseInstance,
            db_plan.instance_action(),
            Some("planned".into()),
        ));
        results.push(ReconciliationResult::ok(
            Phase::Schema,
            db_plan.schema_action(),
            Some("planned".into()),
        ));
        results.push(ReconciliationResult::ok(
            Phase::Grants,
            db_plan.grants_action(),
            Some(format!("planned: {} grant(s)", db_plan.grants_to_add.len())),
        ));
    } else if let Err(e) = database::apply(platform, reporter, desired, &db_plan, results).await {
        let phase = provision_phase(&e);
        let action = match phase {
            Phase::Schema => db_plan.schema_action(),
            Phase::Grants => db_plan.grants_action(),
            _ => db_plan.instance_action(),
        };
        let err = PhaseError::from(e);
        results.push(ReconciliationResult::failed(phase, action, &err));
        return None;
    }

    // App resource last: it references the synced files and the database.
    let app_plan = match app::plan(platform, desired, app_action).await {
        Ok(plan) => plan,
        Err(e) => {
            let attempted = match app_action {
                AppAction::Create => ActionTaken::Created,
                AppAction::Update => ActionTaken::Updated,
                AppAction::Delete => ActionTaken::Deleted,
            };
            let err = PhaseError::from(e);
            results.push(ReconciliationResult::failed(Phase::App, attempted, &err));
            return None;
        }
    };
    if opts.dry_run {
        results.push(ReconciliationResult::ok(
            Phase::App,
            app_plan.action(),
            Some(
                app_plan
                    .describe()
                    .map_or_else(|| "planned".into(), |d| format!("planned: {d}")),
            ),
        ));
        return None;
    }
    match app::apply(platform, reporter, desired, &app_plan).await {
        Ok((result, url)) => {
            results.push(result);
            url
        }
        Err(e) => {
            let err = PhaseError::from(e);
            results.push(ReconciliationResult::failed(
                Phase::App,
                app_plan.action(),
                &err,
            ));
            None
        }
    }
}

/// Delete pipeline: tear down the app, then optionally the database
/// instance. Build/staging/sync have nothing to tear down.
async fn run_delete(
    platform: &impl PlatformApi,
    reporter: &impl ProgressReporter,
    desired: &DesiredState,
    drop_database: bool,
    opts: &RunOptions<'_>,
    results: &mut Vec<ReconciliationResult>,
) -> Option<String> {
    let app_plan = match app::plan(platform, desired, AppAction::Delete).await {
        Ok(plan) => plan,
        Err(e) => {
            let err = PhaseError::from(e);
            results.push(ReconciliationResult::failed(
                Phase::App,
                ActionTaken::Deleted,
                &err,
            ));
            return None;
        }
    };
    if opts.dry_run {
        results.push(ReconciliationResult::ok(
            Phase::App,
            app_plan.action(),
            Some(
                app_plan
                    .describe()
                    .map_or_else(|| "planned".into(), |d| format!("planned: {d}")),
            ),
        ));
    } else {
        match app::apply(platform, reporter, desired, &app_plan).await {
            Ok((result, _)) => results.push(result),
            Err(e) => {
                let err = PhaseError::from(e);
                results.push(ReconciliationResult::failed(
                    Phase::App,
                    app_plan.action(),
                    &err,
                ));
                return None;
            }
        }
    }

    if !drop_database {
        return None;
    }

    let name = &desired.database.instance_name;
    match platform.get_instance(name).await {
        Ok(None) => results.push(ReconciliationResult::ok(
            Phase::DatabaseInstance,
            ActionTaken::Unchanged,
            Some("already absent".into()),
        )),
        Ok(Some(_)) if opts.dry_run => results.push(ReconciliationResult::ok(
            Phase::DatabaseInstance,
            ActionTaken::Deleted,
            Some("planned".into()),
        )),
        Ok(Some(_)) => {
            reporter.step(&format!("deleting database instance '{name}'..."));
            match platform.delete_instance(name).await {
                Ok(()) => {
                    reporter.success("database instance deleted");
                    results.push(ReconciliationResult::ok(
                        Phase::DatabaseInstance,
                        ActionTaken::Deleted,
                        None,
                    ));
                }
                Err(e) => {
                    let err = PhaseError::from(ProvisionError::Platform(e));
                    results.push(ReconciliationResult::failed(
                        Phase::DatabaseInstance,
                        ActionTaken::Deleted,
                        &err,
                    ));
                }
            }
        }
        Err(e) => {
            let err = PhaseError::from(ProvisionError::Platform(e));
            results.push(ReconciliationResult::failed(
                Phase::DatabaseInstance,
                ActionTaken::Deleted,
                &err,
            ));
        }
    }
    None
}

/// Attribute a provisioning error to the sub-phase that raised it.
fn provision_phase(err: &ProvisionError) -> Phase {
    match err {
        ProvisionError::Schema { .. } => Phase::Schema,
        ProvisionError::Grant { .. } => Phase::Grants,
        _ => Phase::DatabaseInstance,
    }
}

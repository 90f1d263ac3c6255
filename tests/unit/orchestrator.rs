//! Orchestrator tests over the in-memory fake platform: idempotence,
//! dry-run parity, retry/abort policy, and the end-to-end scenario.

#![allow(clippy::expect_used)]

use strato_cli::application::services::app::spec_from;
use strato_cli::application::services::orchestrate::{self, DeployAction};
use strato_cli::domain::config::{CapacityTier, ComputeSize, PermissionLevel};
use strato_cli::domain::report::{ActionTaken, DeployReport, Phase};
use strato_cli::domain::resource::ResourceStatus;

use crate::helpers::{desired_state, grant, project_dir, run_options};
use crate::mocks::{AppRecord, FakeBuildRunner, FakePlatform, InstanceRecord, PlatformState, ReporterStub};

fn actions(report: &DeployReport) -> Vec<(Phase, ActionTaken)> {
    report.results.iter().map(|r| (r.phase, r.action)).collect()
}

fn action_of(report: &DeployReport, phase: Phase) -> Option<ActionTaken> {
    report
        .results
        .iter()
        .find(|r| r.phase == phase)
        .map(|r| r.action)
}

async fn run(
    platform: &FakePlatform,
    desired: &strato_cli::domain::config::DesiredState,
    action: DeployAction,
    project: &tempfile::TempDir,
    dry_run: bool,
) -> DeployReport {
    let opts = run_options(project.path(), dry_run);
    orchestrate::run(platform, &FakeBuildRunner, &ReporterStub, desired, action, &opts).await
}

// ── End-to-end scenario ──────────────────────────────────────────────────────

#[tokio::test]
async fn create_then_update_scenario() {
    let platform = FakePlatform::new();
    let project = project_dir();
    let desired = desired_state();

    // First create on an empty environment.
    let report = run(&platform, &desired, DeployAction::Create, &project, false).await;
    assert!(report.ok(), "create failed: {report:?}");
    assert_eq!(
        actions(&report),
        vec![
            (Phase::Config, ActionTaken::Unchanged),
            (Phase::Build, ActionTaken::Created),
            (Phase::Staging, ActionTaken::Created),
            (Phase::Sync, ActionTaken::Updated),
            (Phase::DatabaseInstance, ActionTaken::Created),
            (Phase::Schema, ActionTaken::Created),
            (Phase::Grants, ActionTaken::Unchanged),
            (Phase::App, ActionTaken::Created),
        ]
    );
    assert_eq!(
        report.app_url.as_deref(),
        Some("https://demo.apps.example.com")
    );

    // Second run: update with a larger compute tier. Remote files are
    // unchanged by hash, database already converged, only the app updates.
    let mut desired = desired_state();
    desired.compute_size = ComputeSize::Large;
    let report = run(&platform, &desired, DeployAction::Update, &project, false).await;
    assert!(report.ok(), "update failed: {report:?}");
    assert_eq!(action_of(&report, Phase::Sync), Some(ActionTaken::Unchanged));
    assert_eq!(
        action_of(&report, Phase::DatabaseInstance),
        Some(ActionTaken::Unchanged)
    );
    assert_eq!(action_of(&report, Phase::Schema), Some(ActionTaken::Unchanged));
    assert_eq!(action_of(&report, Phase::Grants), Some(ActionTaken::Unchanged));
    assert_eq!(action_of(&report, Phase::App), Some(ActionTaken::Updated));

    let stored = platform.snapshot(|s| s.app.clone()).expect("app exists");
    assert_eq!(stored.spec.compute_size, ComputeSize::Large);
}

// ── Idempotence ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_twice_fails_with_already_exists_guidance() {
    let platform = FakePlatform::new();
    let project = project_dir();
    let desired = desired_state();

    let first = run(&platform, &desired, DeployAction::Create, &project, false).await;
    assert!(first.ok());

    let second = run(&platform, &desired, DeployAction::Create, &project, false).await;
    assert!(!second.ok());
    let failure = second.failure().expect("failure");
    assert_eq!(failure.phase, Phase::App);
    let error = failure.error.as_ref().expect("error");
    assert_eq!(error.kind, "AlreadyExists");
    assert!(error.message.contains("strato update"));
}

#[tokio::test]
async fn update_twice_yields_updated_then_unchanged() {
    let platform = FakePlatform::new();
    let project = project_dir();
    let report = run(&platform, &desired_state(), DeployAction::Create, &project, false).await;
    assert!(report.ok());

    let mut desired = desired_state();
    desired.compute_size = ComputeSize::Large;
    let first = run(&platform, &desired, DeployAction::Update, &project, false).await;
    assert_eq!(action_of(&first, Phase::App), Some(ActionTaken::Updated));

    let second = run(&platform, &desired, DeployAction::Update, &project, false).await;
    assert!(second.ok());
    assert_eq!(action_of(&second, Phase::App), Some(ActionTaken::Unchanged));
}

#[tokio::test]
async fn update_on_absent_app_fails_with_not_found() {
    let platform = FakePlatform::new();
    let project = project_dir();
    let report = run(&platform, &desired_state(), DeployAction::Update, &project, false).await;
    assert!(!report.ok());
    let failure = report.failure().expect("failure");
    assert_eq!(failure.phase, Phase::App);
    assert_eq!(failure.error.as_ref().expect("error").kind, "NotFound");
}

// ── Synchronizer round-trip ──────────────────────────────────────────────────

#[tokio::test]
async fn unchanged_staging_tree_uploads_zero_files() {
    let platform = FakePlatform::new();
    let project = project_dir();
    let desired = desired_state();

    let first = run(&platform, &desired, DeployAction::Create, &project, false).await;
    assert!(first.ok());
    let uploads_after_create = platform.snapshot(|s| s.upload_count);
    assert!(uploads_after_create > 0);

    let second = run(&platform, &desired, DeployAction::Update, &project, false).await;
    assert!(second.ok());
    assert_eq!(action_of(&second, Phase::Sync), Some(ActionTaken::Unchanged));
    assert_eq!(platform.snapshot(|s| s.upload_count), uploads_after_create);
}

#[tokio::test]
async fn transient_upload_failures_are_retried() {
    let platform = FakePlatform::new();
    platform
        .state
        .lock()
        .expect("lock")
        .upload_failures
        .insert("app.yaml".into(), 2);

    let project = project_dir();
    let report = run(&platform, &desired_state(), DeployAction::Create, &project, false).await;
    assert!(report.ok(), "retries should recover: {report:?}");
    assert!(platform.snapshot(|s| s.files.contains_key("app.yaml")));
}

#[tokio::test]
async fn exhausted_retries_abort_before_any_remote_provisioning() {
    let platform = FakePlatform::new();
    platform
        .state
        .lock()
        .expect("lock")
        .upload_failures
        .insert("app.yaml".into(), 99);

    let project = project_dir();
    let report = run(&platform, &desired_state(), DeployAction::Create, &project, false).await;
    assert!(!report.ok());
    let failure = report.failure().expect("failure");
    assert_eq!(failure.phase, Phase::Sync);
    assert!(failure.error.as_ref().expect("error").message.contains("app.yaml"));

    // Abort policy: no phase after sync ran.
    assert!(action_of(&report, Phase::DatabaseInstance).is_none());
    assert!(action_of(&report, Phase::App).is_none());
    assert!(platform.snapshot(|s| s.instance.is_none()));
    assert!(platform.snapshot(|s| s.app.is_none()));
}

// ── Grant monotonicity ───────────────────────────────────────────────────────

#[tokio::test]
async fn extra_remote_grants_are_never_removed() {
    let platform = FakePlatform::with_state(PlatformState {
        instance: Some(InstanceRecord {
            capacity: CapacityTier::Cu1,
            status: ResourceStatus::Ready,
        }),
        schemas: ["app_data".to_string()].into_iter().collect(),
        grants: vec![
            grant("a@example.com", PermissionLevel::CanUse),
            grant("b@example.com", PermissionLevel::CanManage),
        ],
        ..PlatformState::default()
    });

    let project = project_dir();
    let mut desired = desired_state();
    desired.grants = vec![grant("a@example.com", PermissionLevel::CanUse)];

    let report = run(&platform, &desired, DeployAction::Create, &project, false).await;
    assert!(report.ok(), "create failed: {report:?}");
    assert_eq!(action_of(&report, Phase::Grants), Some(ActionTaken::Unchanged));
    assert!(
        platform.snapshot(|s| s
            .grants
            .contains(&grant("b@example.com", PermissionLevel::CanManage)))
    );
}

#[tokio::test]
async fn missing_grants_are_added_without_touching_existing() {
    let platform = FakePlatform::with_state(PlatformState {
        instance: Some(InstanceRecord {
            capacity: CapacityTier::Cu1,
            status: ResourceStatus::Ready,
        }),
        schemas: ["app_data".to_string()].into_iter().collect(),
        grants: vec![grant("a@example.com", PermissionLevel::CanUse)],
        ..PlatformState::default()
    });

    let project = project_dir();
    let mut desired = desired_state();
    desired.grants = vec![
        grant("a@example.com", PermissionLevel::CanUse),
        grant("c@example.com", PermissionLevel::CanView),
    ];

    let report = run(&platform, &desired, DeployAction::Create, &project, false).await;
    assert!(report.ok());
    assert_eq!(action_of(&report, Phase::Grants), Some(ActionTaken::Updated));
    let grants = platform.snapshot(|s| s.grants.clone());
    assert_eq!(grants.len(), 2);
    assert!(grants.contains(&grant("c@example.com", PermissionLevel::CanView)));
}

// ── Timeout distinctness ─────────────────────────────────────────────────────

#[tokio::test]
async fn stuck_instance_reports_timeout_not_failed() {
    let platform = FakePlatform::new();
    platform.state.lock().expect("lock").instance_stuck_pending = true;

    let project = project_dir();
    let report = run(&platform, &desired_state(), DeployAction::Create, &project, false).await;
    assert!(!report.ok());
    let failure = report.failure().expect("failure");
    assert_eq!(failure.phase, Phase::DatabaseInstance);
    let error = failure.error.as_ref().expect("error");
    assert_eq!(error.kind, "Timeout", "timeout must be distinct from FAILED");
    assert!(error.message.contains("PENDING"));

    // Subsequent phases never ran.
    assert!(action_of(&report, Phase::Schema).is_none());
    assert!(action_of(&report, Phase::App).is_none());
}

// ── Dry-run parity ───────────────────────────────────────────────────────────

#[tokio::test]
async fn dry_run_plans_exactly_what_the_real_action_does() {
    let project = project_dir();
    let desired = desired_state();

    let planned_platform = FakePlatform::new();
    let planned = run(&planned_platform, &desired, DeployAction::Create, &project, true).await;
    assert!(planned.ok(), "dry run failed: {planned:?}");
    assert!(planned.dry_run);

    // Dry-run touched nothing remote.
    assert!(planned_platform.snapshot(|s| s.files.is_empty()));
    assert!(planned_platform.snapshot(|s| s.instance.is_none()));
    assert!(planned_platform.snapshot(|s| s.app.is_none()));

    let real_platform = FakePlatform::new();
    let real = run(&real_platform, &desired, DeployAction::Create, &project, false).await;
    assert!(real.ok(), "real run failed: {real:?}");

    // The planned action set equals the executed action set, phase by phase.
    assert_eq!(actions(&planned), actions(&real));
}

#[tokio::test]
async fn dry_run_after_real_run_plans_all_unchanged() {
    let platform = FakePlatform::new();
    let project = project_dir();
    let desired = desired_state();

    let real = run(&platform, &desired, DeployAction::Update, &project, false).await;
    assert!(!real.ok()); // no app yet

    let created = run(&platform, &desired, DeployAction::Create, &project, false).await;
    assert!(created.ok());

    let planned = run(&platform, &desired, DeployAction::Update, &project, true).await;
    assert!(planned.ok());
    assert_eq!(action_of(&planned, Phase::Sync), Some(ActionTaken::Unchanged));
    assert_eq!(
        action_of(&planned, Phase::DatabaseInstance),
        Some(ActionTaken::Unchanged)
    );
    assert_eq!(action_of(&planned, Phase::App), Some(ActionTaken::Unchanged));
}

// ── Delete ───────────────────────────────────────────────────────────────────

fn platform_with_app(desired: &strato_cli::domain::config::DesiredState) -> FakePlatform {
    FakePlatform::with_state(PlatformState {
        instance: Some(InstanceRecord {
            capacity: CapacityTier::Cu1,
            status: ResourceStatus::Ready,
        }),
        schemas: ["app_data".to_string()].into_iter().collect(),
        app: Some(AppRecord {
            spec: spec_from(desired),
            status: ResourceStatus::Ready,
        }),
        ..PlatformState::default()
    })
}

#[tokio::test]
async fn delete_removes_app_but_keeps_database_by_default() {
    let desired = desired_state();
    let platform = platform_with_app(&desired);
    let project = project_dir();

    let report = run(
        &platform,
        &desired,
        DeployAction::Delete {
            drop_database: false,
        },
        &project,
        false,
    )
    .await;
    assert!(report.ok());
    assert_eq!(action_of(&report, Phase::App), Some(ActionTaken::Deleted));
    assert!(action_of(&report, Phase::DatabaseInstance).is_none());
    assert!(platform.snapshot(|s| s.app.is_none()));
    assert!(platform.snapshot(|s| s.instance.is_some()));
    // Build/staging/sync have nothing to tear down.
    assert!(action_of(&report, Phase::Build).is_none());
    assert!(action_of(&report, Phase::Sync).is_none());
}

#[tokio::test]
async fn delete_twice_is_idempotent() {
    let desired = desired_state();
    let platform = platform_with_app(&desired);
    let project = project_dir();
    let action = DeployAction::Delete {
        drop_database: false,
    };

    let first = run(&platform, &desired, action, &project, false).await;
    assert_eq!(action_of(&first, Phase::App), Some(ActionTaken::Deleted));

    let second = run(&platform, &desired, action, &project, false).await;
    assert!(second.ok(), "absent resource on delete is not an error");
    assert_eq!(action_of(&second, Phase::App), Some(ActionTaken::Unchanged));
}

#[tokio::test]
async fn drop_database_flag_also_deletes_the_instance() {
    let desired = desired_state();
    let platform = platform_with_app(&desired);
    let project = project_dir();

    let report = run(
        &platform,
        &desired,
        DeployAction::Delete {
            drop_database: true,
        },
        &project,
        false,
    )
    .await;
    assert!(report.ok());
    assert_eq!(
        action_of(&report, Phase::DatabaseInstance),
        Some(ActionTaken::Deleted)
    );
    assert!(platform.snapshot(|s| s.instance.is_none()));
}

#[tokio::test]
async fn dry_run_delete_plans_teardown_without_deleting() {
    let desired = desired_state();
    let platform = platform_with_app(&desired);
    let project = project_dir();

    let report = run(
        &platform,
        &desired,
        DeployAction::Delete {
            drop_database: true,
        },
        &project,
        true,
    )
    .await;
    assert!(report.ok());
    assert_eq!(action_of(&report, Phase::App), Some(ActionTaken::Deleted));
    assert_eq!(
        action_of(&report, Phase::DatabaseInstance),
        Some(ActionTaken::Deleted)
    );
    assert!(platform.snapshot(|s| s.app.is_some()));
    assert!(platform.snapshot(|s| s.instance.is_some()));
}

// ── Build failure ────────────────────────────────────────────────────────────

#[tokio::test]
async fn build_failure_stops_the_run_before_any_remote_call() {
    let platform = FakePlatform::new();
    let project = project_dir();
    let mut desired = desired_state();
    desired.build.package_command = vec!["failing-build".into()];

    let report = run(&platform, &desired, DeployAction::Create, &project, false).await;
    assert!(!report.ok());
    let failure = report.failure().expect("failure");
    assert_eq!(failure.phase, Phase::Build);
    assert!(failure.error.as_ref().expect("error").message.contains("compilation error"));
    assert!(platform.snapshot(|s| s.files.is_empty()));
    assert!(platform.snapshot(|s| s.instance.is_none()));
}

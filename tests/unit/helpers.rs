//! Fixture helpers shared by the unit tests.

#![allow(clippy::expect_used)]

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use strato_cli::application::services::orchestrate::RunOptions;
use strato_cli::application::services::sync::SyncOptions;
use strato_cli::domain::config::{
    BuildSettings, CapacityTier, ComputeSize, DatabaseSpec, DesiredState, EnvVar, Grant,
    PermissionLevel, Timeouts,
};

/// Desired state matching the [`FakeBuildRunner`](crate::mocks::FakeBuildRunner)
/// command names, with millisecond-scale timeouts so poll loops finish fast.
pub fn desired_state() -> DesiredState {
    DesiredState {
        environment: "production".into(),
        app_name: "demo".into(),
        description: Some("demo app".into()),
        workspace_path: "/Workspace/apps/demo".into(),
        compute_size: ComputeSize::Medium,
        env_vars: vec![EnvVar {
            name: "LOG_LEVEL".into(),
            value: "info".into(),
        }],
        grants: Vec::new(),
        database: DatabaseSpec {
            instance_name: "demo-db".into(),
            schema: "app_data".into(),
            capacity: CapacityTier::Cu1,
        },
        exclude_patterns: vec!["*.md".into()],
        build: BuildSettings {
            package_command: vec!["package-build".into()],
            package_output_dir: "dist".into(),
            bundle_command: vec!["bundle-build".into()],
            bundle_dir: "frontend/dist".into(),
        },
        timeouts: Timeouts {
            deploy: Duration::from_millis(200),
            poll_interval: Duration::from_millis(1),
        },
    }
}

pub fn grant(principal: &str, level: PermissionLevel) -> Grant {
    Grant {
        principal: principal.into(),
        level,
    }
}

/// Minimal project tree the fake build runner can complete against.
pub fn project_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::create_dir_all(dir.path().join("config")).expect("mkdir");
    std::fs::write(dir.path().join("config/base.yaml"), b"retries: 3\n").expect("write");
    std::fs::write(dir.path().join("config/README.md"), b"# ignored\n").expect("write");
    std::fs::write(
        dir.path().join("app.yaml"),
        b"command: [\"python\", \"-m\", \"server\"]\n",
    )
    .expect("write");
    dir
}

pub fn run_options(project_root: &Path, dry_run: bool) -> RunOptions<'_> {
    RunOptions {
        project_root,
        dry_run,
        sync: SyncOptions {
            prune: false,
            concurrency: 4,
            retry: strato_cli::domain::retry::RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(4),
            },
        },
        cancel: Arc::new(AtomicBool::new(false)),
    }
}

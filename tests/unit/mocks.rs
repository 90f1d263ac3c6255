//! Shared mock infrastructure for unit tests.
//!
//! Provides an in-memory [`FakePlatform`] implementing all three platform
//! ports, plus a build runner that writes canned artifacts, so each test
//! file doesn't have to re-define the same boilerplate.

#![allow(clippy::expect_used)]

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::process::Output;
use std::sync::Mutex;

use sha2::{Digest, Sha256};
use strato_cli::application::ports::{
    AppsApi, CommandRunner, DatabaseApi, FileStore, ProgressReporter, RemoteFile,
};
use strato_cli::domain::config::{CapacityTier, Grant};
use strato_cli::domain::error::PlatformError;
use strato_cli::domain::resource::{
    AppSpec, AppState, DatabaseInstanceState, ResourceStatus,
};

// ── Reporter ─────────────────────────────────────────────────────────────────

pub struct ReporterStub;

impl ProgressReporter for ReporterStub {
    fn step(&self, _: &str) {}
    fn success(&self, _: &str) {}
    fn warn(&self, _: &str) {}
}

// ── Build runner ─────────────────────────────────────────────────────────────

/// Runner that simulates the package and bundle builds by writing canned
/// outputs into the project tree. Output bytes are deterministic so repeated
/// builds hash identically.
pub struct FakeBuildRunner;

impl CommandRunner for FakeBuildRunner {
    async fn run(&self, program: &str, _: &[&str], cwd: &Path) -> anyhow::Result<Output> {
        use std::os::unix::process::ExitStatusExt;
        match program {
            "package-build" => {
                std::fs::create_dir_all(cwd.join("dist"))?;
                std::fs::write(cwd.join("dist/demo-0.3.0.tar.gz"), b"package-bytes")?;
            }
            "bundle-build" => {
                std::fs::create_dir_all(cwd.join("frontend/dist"))?;
                std::fs::write(cwd.join("frontend/dist/index.html"), b"<html>demo</html>")?;
            }
            "failing-build" => {
                return Ok(Output {
                    status: std::process::ExitStatus::from_raw(1 << 8),
                    stdout: Vec::new(),
                    stderr: b"compilation error".to_vec(),
                });
            }
            _ => {}
        }
        Ok(Output {
            status: std::process::ExitStatus::from_raw(0),
            stdout: Vec::new(),
            stderr: Vec::new(),
        })
    }
}

// ── Fake platform ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct InstanceRecord {
    pub capacity: CapacityTier,
    pub status: ResourceStatus,
}

#[derive(Debug, Clone)]
pub struct AppRecord {
    pub spec: AppSpec,
    pub status: ResourceStatus,
}

/// Scriptable in-memory platform state.
#[derive(Debug, Default)]
pub struct PlatformState {
    /// Workspace files: relative path → content SHA-256.
    pub files: BTreeMap<String, String>,
    pub instance: Option<InstanceRecord>,
    pub schemas: BTreeSet<String>,
    pub grants: Vec<Grant>,
    pub app: Option<AppRecord>,
    /// When set, created/existing instances never leave PENDING.
    pub instance_stuck_pending: bool,
    /// Remaining transient failures per relative path.
    pub upload_failures: HashMap<String, u32>,
    /// Total successful uploads across all runs.
    pub upload_count: usize,
}

/// In-memory platform implementing `FileStore + DatabaseApi + AppsApi`.
#[derive(Debug, Default)]
pub struct FakePlatform {
    pub state: Mutex<PlatformState>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: PlatformState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn snapshot<T>(&self, f: impl FnOnce(&PlatformState) -> T) -> T {
        f(&self.state.lock().expect("platform state lock"))
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

impl FileStore for FakePlatform {
    async fn mkdirs(&self, _: &str) -> Result<(), PlatformError> {
        Ok(())
    }

    async fn list(&self, _: &str) -> Result<Vec<RemoteFile>, PlatformError> {
        let state = self.state.lock().expect("lock");
        Ok(state
            .files
            .iter()
            .map(|(path, sha)| RemoteFile {
                path: path.clone(),
                sha256: Some(sha.clone()),
                size_bytes: 1,
            })
            .collect())
    }

    async fn upload(
        &self,
        _: &str,
        relative_path: &str,
        bytes: Vec<u8>,
    ) -> Result<(), PlatformError> {
        let mut state = self.state.lock().expect("lock");
        if let Some(remaining) = state.upload_failures.get_mut(relative_path) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(PlatformError::Transient {
                    detail: "connection reset".into(),
                });
            }
        }
        state
            .files
            .insert(relative_path.to_string(), sha256_hex(&bytes));
        state.upload_count += 1;
        Ok(())
    }

    async fn delete(&self, _: &str, relative_path: &str) -> Result<(), PlatformError> {
        let mut state = self.state.lock().expect("lock");
        match state.files.remove(relative_path) {
            Some(_) => Ok(()),
            None => Err(PlatformError::NotFound),
        }
    }
}

impl DatabaseApi for FakePlatform {
    async fn get_instance(
        &self,
        _: &str,
    ) -> Result<Option<DatabaseInstanceState>, PlatformError> {
        let state = self.state.lock().expect("lock");
        Ok(state.instance.as_ref().map(|record| DatabaseInstanceState {
            status: record.status,
            capacity: Some(record.capacity),
            diagnostics: None,
        }))
    }

    async fn create_instance(
        &self,
        _: &str,
        capacity: CapacityTier,
    ) -> Result<(), PlatformError> {
        let mut state = self.state.lock().expect("lock");
        if state.instance.is_some() {
            return Err(PlatformError::AlreadyExists);
        }
        let status = if state.instance_stuck_pending {
            ResourceStatus::Pending
        } else {
            ResourceStatus::Ready
        };
        state.instance = Some(InstanceRecord { capacity, status });
        Ok(())
    }

    async fn update_instance(
        &self,
        _: &str,
        capacity: CapacityTier,
    ) -> Result<(), PlatformError> {
        let mut state = self.state.lock().expect("lock");
        match state.instance.as_mut() {
            Some(record) => {
                record.capacity = capacity;
                record.status = ResourceStatus::Ready;
                Ok(())
            }
            None => Err(PlatformError::NotFound),
        }
    }

    async fn delete_instance(&self, _: &str) -> Result<(), PlatformError> {
        let mut state = self.state.lock().expect("lock");
        match state.instance.take() {
            Some(_) => Ok(()),
            None => Err(PlatformError::NotFound),
        }
    }

    async fn schema_exists(&self, _: &str, schema: &str) -> Result<bool, PlatformError> {
        let state = self.state.lock().expect("lock");
        Ok(state.schemas.contains(schema))
    }

    async fn create_schema(&self, _: &str, schema: &str) -> Result<(), PlatformError> {
        let mut state = self.state.lock().expect("lock");
        if !state.schemas.insert(schema.to_string()) {
            return Err(PlatformError::AlreadyExists);
        }
        Ok(())
    }

    async fn list_grants(&self, _: &str, _: &str) -> Result<Vec<Grant>, PlatformError> {
        let state = self.state.lock().expect("lock");
        Ok(state.grants.clone())
    }

    async fn add_grant(&self, _: &str, _: &str, grant: &Grant) -> Result<(), PlatformError> {
        let mut state = self.state.lock().expect("lock");
        state.grants.push(grant.clone());
        Ok(())
    }
}

impl AppsApi for FakePlatform {
    async fn get_app(&self, _: &str) -> Result<Option<AppState>, PlatformError> {
        let state = self.state.lock().expect("lock");
        Ok(state.app.as_ref().map(|record| AppState {
            status: record.status,
            compute_size: Some(record.spec.compute_size),
            env: record.spec.env.clone(),
            grants: record.spec.grants.clone(),
            workspace_path: Some(record.spec.workspace_path.clone()),
            database: Some(record.spec.database.clone()),
            url: Some(format!("https://{}.apps.example.com", record.spec.name)),
            diagnostics: None,
        }))
    }

    async fn create_app(&self, spec: &AppSpec) -> Result<(), PlatformError> {
        let mut state = self.state.lock().expect("lock");
        if state.app.is_some() {
            return Err(PlatformError::AlreadyExists);
        }
        state.app = Some(AppRecord {
            spec: spec.clone(),
            status: ResourceStatus::Ready,
        });
        Ok(())
    }

    async fn update_app(&self, spec: &AppSpec) -> Result<(), PlatformError> {
        let mut state = self.state.lock().expect("lock");
        match state.app.as_mut() {
            Some(record) => {
                record.spec = spec.clone();
                record.status = ResourceStatus::Ready;
                Ok(())
            }
            None => Err(PlatformError::NotFound),
        }
    }

    async fn delete_app(&self, _: &str) -> Result<(), PlatformError> {
        let mut state = self.state.lock().expect("lock");
        match state.app.take() {
            Some(_) => Ok(()),
            None => Err(PlatformError::NotFound),
        }
    }
}

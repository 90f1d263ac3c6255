//! Database provisioner — reconciles the managed instance, schema, and
//! grants onto the desired state.
//!
//! Plan and apply are separate steps so dry-run is a gate on apply, not a
//! different code path. Grants are additive-only: extra remote grants are
//! never removed here, because silently under-provisioning access is a
//! correctness-breaking change.

use std::time::Duration;

use tokio::time::Instant;

use crate::application::ports::{DatabaseApi, ProgressReporter};
use crate::domain::config::{CapacityTier, DesiredState, Grant, Timeouts};
use crate::domain::error::{PlatformError, ProvisionError};
use crate::domain::report::{ActionTaken, Phase, ReconciliationResult};
use crate::domain::resource::{DatabaseInstanceState, ResourceStatus};

/// Planned action on the database instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedInstance {
    Create,
    Resize {
        from: Option<CapacityTier>,
        to: CapacityTier,
    },
    Unchanged,
}

/// Read-only reconciliation plan for the database phase.
#[derive(Debug, Clone)]
pub struct DatabasePlan {
    pub instance: PlannedInstance,
    pub create_schema: bool,
    pub grants_to_add: Vec<Grant>,
}

impl DatabasePlan {
    #[must_use]
    pub fn instance_action(&self) -> ActionTaken {
        match self.instance {
            PlannedInstance::Create => ActionTaken::Created,
            PlannedInstance::Resize { .. } => ActionTaken::Updated,
            PlannedInstance::Unchanged => ActionTaken::Unchanged,
        }
    }

    #[must_use]
    pub fn schema_action(&self) -> ActionTaken {
        if self.create_schema {
            ActionTaken::Created
        } else {
            ActionTaken::Unchanged
        }
    }

    #[must_use]
    pub fn grants_action(&self) -> ActionTaken {
        if self.grants_to_add.is_empty() {
            ActionTaken::Unchanged
        } else {
            ActionTaken::Updated
        }
    }
}

/// Compute the database plan from fresh remote state.
///
/// # Errors
///
/// Returns `ProvisionError::Platform` when a read call fails.
pub async fn plan(
    db: &impl DatabaseApi,
    desired: &DesiredState,
) -> Result<DatabasePlan, ProvisionError> {
    let spec = &desired.database;
    let current = db.get_instance(&spec.instance_name).await?;

    let (instance, instance_exists) = match &current {
        None => (PlannedInstance::Create, false),
        Some(state) if state.status == ResourceStatus::Absent => {
            (PlannedInstance::Create, false)
        }
        Some(state) => {
            if state.capacity == Some(spec.capacity) {
                (PlannedInstance::Unchanged, true)
            } else {
                (
                    PlannedInstance::Resize {
                        from: state.capacity,
                        to: spec.capacity,
                    },
                    true,
                )
            }
        }
    };

    let schema_present = if instance_exists {
        db.schema_exists(&spec.instance_name, &spec.schema).await?
    } else {
        false
    };

    let current_grants = if schema_present {
        db.list_grants(&spec.instance_name, &spec.schema).await?
    } else {
        Vec::new()
    };

    // Set difference: add what is desired but absent; never remove extras.
    let mut grants_to_add: Vec<Grant> = desired
        .grants
        .iter()
        .filter(|g| !current_grants.contains(g))
        .cloned()
        .collect();
    grants_to_add.dedup();

    Ok(DatabasePlan {
        instance,
        create_schema: !schema_present,
        grants_to_add,
    })
}

/// Apply the database plan, polling the instance to READY before touching
/// the schema. Sub-phase results are pushed as they complete, so the report
/// stays complete even when a later sub-phase fails.
///
/// # Errors
///
/// Returns `ProvisionError` on instance failure, timeout, or schema/grant
/// failures; all are fatal to the run.
pub async fn apply(
    db: &impl DatabaseApi,
    reporter: &impl ProgressReporter,
    desired: &DesiredState,
    plan: &DatabasePlan,
    results: &mut Vec<ReconciliationResult>,
) -> Result<(), ProvisionError> {
    let spec = &desired.database;

    match &plan.instance {
        PlannedInstance::Create => {
            reporter.step(&format!(
                "creating database instance '{}' ({})...",
                spec.instance_name, spec.capacity
            ));
            db.create_instance(&spec.instance_name, spec.capacity).await?;
            wait_instance_ready(db, &spec.instance_name, &desired.timeouts).await?;
            reporter.success("database instance ready");
            results.push(ReconciliationResult::ok(
                Phase::DatabaseInstance,
                ActionTaken::Created,
                Some(format!("capacity {}", spec.capacity)),
            ));
        }
        PlannedInstance::Resize { from, to } => {
            reporter.step(&format!(
                "resizing database instance '{}' to {to}...",
                spec.instance_name
            ));
            db.update_instance(&spec.instance_name, *to).await?;
            wait_instance_ready(db, &spec.instance_name, &desired.timeouts).await?;
            reporter.success("database instance resized");
            let from_desc = from.map_or_else(|| "unknown".to_string(), |c| c.to_string());
            results.push(ReconciliationResult::ok(
                Phase::DatabaseInstance,
                ActionTaken::Updated,
                Some(format!("capacity {from_desc} -> {to}")),
            ));
        }
        PlannedInstance::Unchanged => {
            // Someone else may be mid-create; converge on READY regardless.
            wait_instance_ready(db, &spec.instance_name, &desired.timeouts).await?;
            results.push(ReconciliationResult::ok(
                Phase::DatabaseInstance,
                ActionTaken::Unchanged,
                None,
            ));
        }
    }

    if plan.create_schema {
        reporter.step(&format!("creating schema '{}'...", spec.schema));
        match db.create_schema(&spec.instance_name, &spec.schema).await {
            // Create-if-not-exists semantics: racing another deploy is fine.
            Ok(()) => {
                reporter.success("schema created");
                results.push(ReconciliationResult::ok(
                    Phase::Schema,
                    ActionTaken::Created,
                    None,
                ));
            }
            Err(PlatformError::AlreadyExists) => {
                results.push(ReconciliationResult::ok(
                    Phase::Schema,
                    ActionTaken::Unchanged,
                    None,
                ));
            }
            Err(e) => {
                return Err(ProvisionError::Schema {
                    schema: spec.schema.clone(),
                    detail: e.to_string(),
                });
            }
        }
    } else {
        results.push(ReconciliationResult::ok(
            Phase::Schema,
            ActionTaken::Unchanged,
            None,
        ));
    }

    if plan.grants_to_add.is_empty() {
        results.push(ReconciliationResult::ok(
            Phase::Grants,
            ActionTaken::Unchanged,
            None,
        ));
    } else {
        for grant in &plan.grants_to_add {
            reporter.step(&format!(
                "granting {} to '{}'...",
                grant.level, grant.principal
            ));
            db.add_grant(&spec.instance_name, &spec.schema, grant)
                .await
                .map_err(|e| ProvisionError::Grant {
                    principal: grant.principal.clone(),
                    level: grant.level.to_string(),
                    detail: e.to_string(),
                })?;
        }
        reporter.success(&format!("{} grant(s) added", plan.grants_to_add.len()));
        results.push(ReconciliationResult::ok(
            Phase::Grants,
            ActionTaken::Updated,
            Some(format!("{} grant(s) added", plan.grants_to_add.len())),
        ));
    }

    Ok(())
}

/// Poll the instance until READY, FAILED, or the deadline.
///
/// Transient read errors keep polling until the deadline. A `FAILED` status
/// is fatal; a deadline hit reports `Timeout` with the last observed status,
/// which is distinct from `FAILED` ("outcome unknown, check manually").
async fn wait_instance_ready(
    db: &impl DatabaseApi,
    name: &str,
    timeouts: &Timeouts,
) -> Result<DatabaseInstanceState, ProvisionError> {
    let deadline = Instant::now() + timeouts.deploy;
    let mut last_status = ResourceStatus::Absent.to_string();

    loop {
        match db.get_instance(name).await {
            Ok(Some(state)) => match state.status {
                ResourceStatus::Ready => return Ok(state),
                ResourceStatus::Failed => {
                    return Err(ProvisionError::InstanceFailed {
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
            Err(e) => return Err(ProvisionError::Platform(e)),
        }

        if Instant::now() >= deadline {
            return Err(ProvisionError::Timeout {
                resource: "database instance".to_string(),
                last_status,
            });
        }
        tokio::time::sleep(poll_delay(timeouts)).await;
    }
}

fn poll_delay(timeouts: &Timeouts) -> Duration {
    timeouts.poll_interval.max(Duration::from_millis(1))
}

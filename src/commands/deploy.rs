//! `strato create` / `strato update` — converge the platform onto the
//! configured desired state.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};

use crate::application::services::orchestrate::{self, DeployAction, RunOptions};
use crate::application::services::sync::SyncOptions;
use crate::commands::DeployArgs;
use crate::domain::config::DesiredState;
use crate::domain::report::DeployReport;
use crate::infra::command_runner::TokioCommandRunner;
use crate::infra::config::{CredentialsStore, load_desired_state};
use crate::infra::platform::PlatformClient;
use crate::output::reporter::TerminalReporter;
use crate::output::{OutputContext, json};

/// Run a create/update deployment.
///
/// # Errors
///
/// Returns an error when configuration or credentials are invalid, or when
/// any phase of the run fails (the exit status must be non-zero).
pub async fn run(
    args: &DeployArgs,
    action: DeployAction,
    ctx: &OutputContext,
    json_output: bool,
) -> Result<()> {
    let profile = CredentialsStore::load_profile(&args.profile)?;
    let desired = load_desired_state(&args.config, &args.env, profile.username.as_deref())
        .with_context(|| format!("loading configuration for environment '{}'", args.env))?;

    if !json_output {
        print_plan_header(ctx, &desired, action, args.dry_run);
    }

    let platform = PlatformClient::new(&profile)?;
    let runner = TokioCommandRunner::default();
    let reporter = TerminalReporter::with_spinner(ctx);

    let cancel = Arc::new(AtomicBool::new(false));
    spawn_interrupt_handler(Arc::clone(&cancel));

    let project_root = std::env::current_dir().context("resolving project root")?;
    let opts = RunOptions {
        project_root: &project_root,
        dry_run: args.dry_run,
        sync: SyncOptions {
            prune: args.prune,
            ..SyncOptions::default()
        },
        cancel,
    };

    let report = orchestrate::run(&platform, &runner, &reporter, &desired, action, &opts).await;
    if report.ok() {
        reporter.finish(if args.dry_run {
            "plan complete"
        } else {
            "all phases complete"
        });
    } else {
        reporter.clear();
    }
    render(ctx, &report, json_output)
}

/// Render the report and convert its status into the process exit status.
///
/// # Errors
///
/// Returns an error when any phase in the report failed.
pub fn render(ctx: &OutputContext, report: &DeployReport, json_output: bool) -> Result<()> {
    if json_output {
        println!("{}", json::format_report(report)?);
    } else {
        ctx.render_report(report);
    }

    match report.failure() {
        None => {
            if report.dry_run && !json_output {
                ctx.info("dry run complete — no remote changes were made");
            }
            Ok(())
        }
        Some(result) => {
            let detail = result
                .error
                .as_ref()
                .map(|e| format!("{} ({})", e.message, e.kind))
                .unwrap_or_default();
            anyhow::bail!("phase '{}' failed: {detail}", result.phase)
        }
    }
}

fn print_plan_header(
    ctx: &OutputContext,
    desired: &DesiredState,
    action: DeployAction,
    dry_run: bool,
) {
    let mode = if dry_run { " (dry run)" } else { "" };
    ctx.header(&format!(
        "{} '{}' in environment '{}'{mode}",
        action.as_str(),
        desired.app_name,
        desired.environment
    ));
    ctx.kv("workspace", &desired.workspace_path);
    ctx.kv("compute  ", desired.compute_size.as_str());
    ctx.kv(
        "database ",
        &format!(
            "{} ({}, schema '{}')",
            desired.database.instance_name, desired.database.capacity, desired.database.schema
        ),
    );
    if !ctx.quiet {
        println!();
    }
}

/// First interrupt stops dispatching new work; the pipeline finishes
/// in-flight uploads and reports what it did.
fn spawn_interrupt_handler(cancel: Arc<AtomicBool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.store(true, Ordering::Relaxed);
        }
    });
}

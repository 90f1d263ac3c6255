//! `strato delete` — tear down the app resource (and optionally the
//! database instance).

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::{Context, Result};

use crate::application::services::orchestrate::{self, DeployAction, RunOptions};
use crate::application::services::sync::SyncOptions;
use crate::commands::DeleteArgs;
use crate::infra::config::{CredentialsStore, load_desired_state};
use crate::infra::platform::PlatformClient;
use crate::output::reporter::TerminalReporter;
use crate::output::OutputContext;

/// Run `strato delete [--drop-database] [--yes]`.
///
/// # Errors
///
/// Returns an error when configuration or credentials are invalid, the user
/// declines the confirmation, or the teardown fails.
pub async fn run(args: &DeleteArgs, ctx: &OutputContext, json_output: bool) -> Result<()> {
    let deploy = &args.deploy;
    let profile = CredentialsStore::load_profile(&deploy.profile)?;
    let desired = load_desired_state(&deploy.config, &deploy.env, profile.username.as_deref())
        .with_context(|| format!("loading configuration for environment '{}'", deploy.env))?;

    if !deploy.dry_run {
        if !ctx.quiet {
            println!();
            println!("This will remove the app '{}'.", desired.app_name);
            if args.drop_database {
                println!(
                    "The database instance '{}' and all of its data will also be deleted.",
                    desired.database.instance_name
                );
            } else {
                println!("The database instance and workspace files will be preserved.");
            }
            println!();
        }
        if !args.yes && !confirm("Continue?")? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let platform = PlatformClient::new(&profile)?;
    let reporter = TerminalReporter::new(ctx);
    // The delete pipeline never runs build tools; the runner is unused but
    // the orchestrator signature is shared with create/update.
    let runner = crate::infra::command_runner::TokioCommandRunner::default();

    let project_root = std::env::current_dir().context("resolving project root")?;
    let opts = RunOptions {
        project_root: &project_root,
        dry_run: deploy.dry_run,
        sync: SyncOptions::default(),
        cancel: Arc::new(AtomicBool::new(false)),
    };

    let action = DeployAction::Delete {
        drop_database: args.drop_database,
    };
    let report = orchestrate::run(&platform, &runner, &reporter, &desired, action, &opts).await;
    super::deploy::render(ctx, &report, json_output)
}

fn confirm(prompt: &str) -> Result<bool> {
    use std::io::{BufRead, Write};
    print!("{prompt} [y/N]: ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    let n = std::io::stdin().lock().read_line(&mut line)?;
    anyhow::ensure!(n > 0, "no input provided");
    Ok(line.trim().eq_ignore_ascii_case("y"))
}

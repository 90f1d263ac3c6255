//! Artifact builder — runs the package and bundle build steps.
//!
//! Both steps are local and deterministic: a failure means bad source, so
//! nothing is retried and no remote state has been touched yet (fail-fast).

use std::path::{Path, PathBuf};

use crate::application::ports::{CommandRunner, ProgressReporter};
use crate::domain::config::BuildSettings;
use crate::domain::error::BuildError;

/// Outputs of a successful build.
#[derive(Debug, Clone)]
pub struct BuildArtifacts {
    /// The single package artifact file.
    pub package_path: PathBuf,
    /// Directory containing the static bundle.
    pub bundle_dir: PathBuf,
}

/// Run both build steps sequentially and locate their outputs.
///
/// # Errors
///
/// Returns `BuildError::StepFailed` when a build command exits non-zero or
/// cannot be spawned, and `BuildError::MissingOutput` when a step succeeds
/// but its expected output is absent.
pub async fn build_artifacts(
    runner: &impl CommandRunner,
    reporter: &impl ProgressReporter,
    project_root: &Path,
    settings: &BuildSettings,
) -> Result<BuildArtifacts, BuildError> {
    reporter.step("building package artifact...");
    let package_path = build_package(runner, project_root, settings).await?;
    reporter.success(&format!(
        "package built: {}",
        package_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    ));

    reporter.step("building static bundle...");
    let bundle_dir = build_bundle(runner, project_root, settings).await?;
    reporter.success("static bundle built");

    Ok(BuildArtifacts {
        package_path,
        bundle_dir,
    })
}

async fn build_package(
    runner: &impl CommandRunner,
    project_root: &Path,
    settings: &BuildSettings,
) -> Result<PathBuf, BuildError> {
    let output_dir = project_root.join(&settings.package_output_dir);

    // Clean previous builds so only the current artifact is found.
    if output_dir.exists() {
        std::fs::remove_dir_all(&output_dir).map_err(|e| BuildError::StepFailed {
            step: "package".into(),
            detail: format!("cleaning {}: {e}", output_dir.display()),
        })?;
    }

    run_step(runner, project_root, "package", &settings.package_command).await?;

    let mut artifacts: Vec<PathBuf> = std::fs::read_dir(&output_dir)
        .map_err(|_| BuildError::MissingOutput {
            step: "package".into(),
            path: output_dir.display().to_string(),
        })?
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    artifacts.sort();

    artifacts.pop().ok_or_else(|| BuildError::MissingOutput {
        step: "package".into(),
        path: format!("{}/*", output_dir.display()),
    })
}

async fn build_bundle(
    runner: &impl CommandRunner,
    project_root: &Path,
    settings: &BuildSettings,
) -> Result<PathBuf, BuildError> {
    run_step(runner, project_root, "bundle", &settings.bundle_command).await?;

    let bundle_dir = project_root.join(&settings.bundle_dir);
    if !bundle_dir.is_dir() {
        return Err(BuildError::MissingOutput {
            step: "bundle".into(),
            path: bundle_dir.display().to_string(),
        });
    }
    Ok(bundle_dir)
}

async fn run_step(
    runner: &impl CommandRunner,
    project_root: &Path,
    step: &str,
    command: &[String],
) -> Result<(), BuildError> {
    let Some((program, args)) = command.split_first() else {
        return Err(BuildError::StepFailed {
            step: step.into(),
            detail: "empty build command".into(),
        });
    };
    let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();

    let output = runner
        .run(program, &arg_refs, project_root)
        .await
        .map_err(|e| BuildError::StepFailed {
            step: step.into(),
            detail: format!("{e:#}"),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(BuildError::StepFailed {
            step: step.into(),
            detail: stderr.into_owned(),
        });
    }
    Ok(())
}

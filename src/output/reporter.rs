//! `TerminalReporter` — Presentation-layer implementation of `ProgressReporter`.
//!
//! Wraps `&OutputContext` and implements the `application::ports::ProgressReporter`
//! trait so application services can emit progress events without depending on
//! any presentation type directly. On an interactive terminal a spinner shows
//! the current step; success lines are printed above it.

use indicatif::ProgressBar;
use owo_colors::OwoColorize as _;

use crate::application::ports::ProgressReporter;
use crate::output::{OutputContext, progress};

/// Terminal progress reporter that wraps an `OutputContext`.
///
/// Without a spinner:
/// - `step()` prints `"  → {message}"` (suppressed when `ctx.quiet`)
/// - `success()` prints `"  ✓ {message}"` (suppressed when `ctx.quiet`)
/// - `warn()` prints `"  ! {message}"` (suppressed when `ctx.quiet`)
pub struct TerminalReporter<'a> {
    ctx: &'a OutputContext,
    spinner: Option<ProgressBar>,
}

impl<'a> TerminalReporter<'a> {
    /// Create a plain reporter (no spinner).
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self { ctx, spinner: None }
    }

    /// Create a reporter with a live spinner when the terminal supports it.
    #[must_use]
    pub fn with_spinner(ctx: &'a OutputContext) -> Self {
        let spinner = ctx
            .show_progress()
            .then(|| progress::spinner("starting deployment..."));
        Self { ctx, spinner }
    }

    /// Finish the spinner with a final success line.
    pub fn finish(&self, message: &str) {
        match &self.spinner {
            Some(pb) => progress::finish_ok(pb, message),
            None => self.ctx.success(message),
        }
    }

    /// Remove the spinner without a final message (failure path — the
    /// report rendering takes over).
    pub fn clear(&self) {
        if let Some(pb) = &self.spinner {
            pb.finish_and_clear();
        }
    }
}

impl ProgressReporter for TerminalReporter<'_> {
    fn step(&self, message: &str) {
        match &self.spinner {
            Some(pb) => pb.set_message(message.to_string()),
            None => {
                if !self.ctx.quiet {
                    println!("  {} {message}", "→".cyan());
                }
            }
        }
    }

    fn success(&self, message: &str) {
        match &self.spinner {
            Some(pb) => pb.println(format!("  {} {message}", "✓".green())),
            None => {
                if !self.ctx.quiet {
                    println!("  {} {message}", "✓".green());
                }
            }
        }
    }

    fn warn(&self, message: &str) {
        match &self.spinner {
            Some(pb) => pb.println(format!("  {} {message}", "!".yellow())),
            None => {
                if !self.ctx.quiet {
                    println!("  {} {message}", "!".yellow());
                }
            }
        }
    }
}

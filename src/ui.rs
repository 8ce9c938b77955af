// UI layer: colored terminal output, spinners, prompts and logging setup
// shared by both binaries. The library modules return data; this module
// decides how it looks.

use crate::api::{Failure, Outcome};
use crate::branding::{Finding, Severity};
use crate::status::{Observer, StatusUpdate};
use anyhow::{Context, Result};
use crossterm::style::Stylize;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt::Display;
use std::io::IsTerminal;
use std::process::Command;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Send `tracing` output to stderr. `RUST_LOG` wins over `verbosity`
/// (0 = warn, 1 = debug, 2+ = trace).
pub fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "aboutmyemail=debug,info",
        _ => "trace",
    };
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| level.into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init();
}

pub fn print_error(msg: impl Display) {
    eprintln!("{}: {}", "ERROR".red().bold(), msg);
}

pub fn print_warning(msg: impl Display) {
    eprintln!("{}: {}", "WARN".yellow().bold(), msg);
}

pub fn print_success(quiet: bool, msg: impl Display) {
    if !quiet {
        println!("{}", msg.to_string().green());
    }
}

/// One `Label:   value` line of the submission summary.
pub fn print_param(label: &str, value: impl Display) {
    println!("{:<9}{}", format!("{label}:"), value.to_string().blue());
}

pub fn print_finding(finding: &Finding) {
    match finding.severity {
        Severity::Warning => print_warning(finding),
        Severity::Error => print_error(finding),
    }
}

/// Dump a failed response: the decoded error body pretty-printed if
/// there was one, the raw body otherwise.
pub fn print_response(failure: &Failure) {
    match failure
        .message
        .as_ref()
        .and_then(|m| serde_json::to_string_pretty(m).ok())
    {
        Some(json) => println!("{json}"),
        None => println!("{}", failure.body),
    }
}

/// Report the outcome of a stage or publish call. Returns whether it
/// succeeded.
pub fn report_outcome<T>(outcome: &Outcome<T>, quiet: bool, success: &str) -> bool {
    match outcome {
        Outcome::Success(_) => {
            print_success(quiet, success);
            true
        }
        Outcome::Throttled => {
            print_warning("Server responded with 429 Too Many Requests");
            false
        }
        Outcome::Failed(failure) => {
            print_warning(format!("Server responded with {}", failure.status));
            match failure_detail(failure) {
                (Severity::Warning, detail) => print_warning(detail),
                (Severity::Error, detail) => print_error(detail),
            }
            false
        }
    }
}

/// The line explaining a failed stage or publish. Error messages are
/// only decoded for 400 and 500; any other status shows the raw body.
fn failure_detail(failure: &Failure) -> (Severity, &str) {
    match (&failure.message, failure.status.as_u16()) {
        (Some(m), 400) => (Severity::Warning, m.message.as_str()),
        (Some(m), 500) => (Severity::Error, m.message.as_str()),
        _ => (Severity::Error, failure.body.as_str()),
    }
}

/// A spinner on stderr, hidden when `quiet`.
pub fn spinner(quiet: bool, msg: &str) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(msg.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Ask a yes/no question. Without a terminal the answer is no.
pub fn confirm(prompt: &str) -> Result<bool> {
    if !std::io::stdin().is_terminal() {
        return Ok(false);
    }
    Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .context("Failed to read answer")
}

/// Open `url` with the platform's browser launcher.
pub fn open_browser(url: &str) -> Result<()> {
    let mut command = if cfg!(target_os = "macos") {
        Command::new("open")
    } else if cfg!(target_os = "windows") {
        let mut c = Command::new("cmd");
        c.args(["/C", "start", ""]);
        c
    } else {
        Command::new("xdg-open")
    };
    let status = command
        .arg(url)
        .status()
        .context("Failed to open browser")?;
    if !status.success() {
        anyhow::bail!("Failed to open browser: launcher exited with {status}");
    }
    Ok(())
}

/// Prints submission progress as it arrives.
pub struct ProgressPrinter {
    quiet: bool,
}

impl ProgressPrinter {
    pub fn new(quiet: bool) -> Self {
        ProgressPrinter { quiet }
    }
}

impl Observer for ProgressPrinter {
    fn update(&mut self, update: &StatusUpdate) {
        if self.quiet {
            return;
        }
        let finished = update.result.finished_url().is_some();
        for msg in update.result.messages() {
            match update.sequence {
                // Callbacks are numbered; the final one is shown in green.
                Some(n) if finished => println!("{n}:  {}", msg.as_str().green()),
                Some(n) => println!("{n}:  {}", msg.as_str().cyan()),
                None => println!("  {}", msg.as_str().cyan()),
            }
        }
    }

    fn throttled(&mut self) {
        if !self.quiet {
            println!("{}", "throttled, sleeping".yellow());
        }
    }

    fn callback_error(&mut self, message: &str) {
        print_error(message);
    }
}

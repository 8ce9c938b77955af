// Entrypoint for the `amemanage` tool: manage white-label branding for
// aboutmy.email. Each subcommand is a short sequence of library calls
// with the results printed by `ui`.

use aboutmyemail::api::{ApiClient, ENV_APIKEY, ENV_SERVER};
use aboutmyemail::branding::{self, manifest, stage, LintReport, SiteIdentity};
use aboutmyemail::config::{Settings, ENV_CONFIG};
use aboutmyemail::dns::{self, CnameVerdict, DnsCheck, WHITELABEL_TARGET};
use aboutmyemail::ui;
use aboutmyemail::Error;
use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use crossterm::style::Stylize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;

/// Tool to manage white label branding for aboutmy.email
#[derive(Parser, Debug)]
#[command(name = "amemanage", version, about)]
struct Cli {
    #[command(flatten)]
    globals: Globals,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct Globals {
    /// The api endpoint to use
    #[arg(long, global = true, env = ENV_SERVER)]
    server: Option<String>,

    /// The api key to use for authorization
    #[arg(long, global = true, env = ENV_APIKEY, hide_env_values = true)]
    api_key: Option<String>,

    /// Settings file (defaults to aboutmyemail/config.toml in the user config directory)
    #[arg(long, global = true, env = ENV_CONFIG, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Don't display parameters or progress
    #[arg(short, long, global = true)]
    quiet: bool,

    /// More logging (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Initialize a directory with default content
    Init {
        /// Generate sample content for a site at this hostname
        #[arg(long)]
        hostname: String,
        /// Generate files in this directory
        #[arg(long)]
        directory: PathBuf,
        /// Overwrite existing files without asking
        #[arg(long)]
        force: bool,
    },
    /// Upload markdown and json files to set branding on staging server
    Stage {
        #[arg(required = true, value_parser = existing_file)]
        files: Vec<PathBuf>,
        /// Upload files even if tests fail
        #[arg(long)]
        force: bool,
    },
    /// Publish branding from staging server to production
    Publish,
    /// Check for basic errors in files
    Lint {
        #[arg(required = true, value_parser = existing_file)]
        files: Vec<PathBuf>,
    },
    /// Check DNS setup for a hostname
    Dns {
        /// Check DNS for this hostname
        #[arg(long)]
        hostname: String,
    },
}

fn existing_file(arg: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(arg);
    if path.is_file() {
        Ok(path)
    } else {
        Err(format!("{arg}: no such file"))
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    ui::init_logging(cli.globals.verbose);
    let result = match cli.command {
        Commands::Init {
            hostname,
            directory,
            force,
        } => init(&cli.globals, &hostname, directory, force),
        Commands::Stage { files, force } => stage_files(&cli.globals, &files, force),
        Commands::Publish => publish(&cli.globals),
        Commands::Lint { files } => lint(&cli.globals, &files),
        Commands::Dns { hostname } => check_dns(&cli.globals, &hostname),
    };
    match result {
        Ok(code) => code,
        Err(e) => {
            ui::print_error(format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}

fn client(globals: &Globals) -> Result<ApiClient> {
    let settings = Settings::discover(globals.config.as_deref())?;
    ApiClient::new(
        &settings.branding_server(globals.server.as_deref()),
        &settings.api_key(globals.api_key.as_deref()),
    )
    .context("Failed to create client")
}

fn init(globals: &Globals, hostname: &str, directory: PathBuf, force: bool) -> Result<ExitCode> {
    let site = SiteIdentity::from_hostname(hostname);
    let written = match manifest::init(&directory, &site, force) {
        Err(Error::WouldOverwrite(existing)) => {
            for path in &existing {
                ui::print_warning(format!("{} already exists", path.display()));
            }
            if !ui::confirm("Overwrite existing files?")? {
                bail!(Error::WouldOverwrite(existing));
            }
            manifest::init(&directory, &site, true)
        }
        written => written,
    }
    .context("Failed to generate content")?;
    debug!(files = written.len(), "initialized {}", directory.display());
    ui::print_success(globals.quiet, "Initialized OK");
    Ok(ExitCode::SUCCESS)
}

/// Lint `files`, printing every finding.
fn run_lint(files: &[PathBuf]) -> LintReport {
    let report = branding::lint(files);
    for finding in &report.findings {
        ui::print_finding(finding);
    }
    report
}

fn lint(globals: &Globals, files: &[PathBuf]) -> Result<ExitCode> {
    if run_lint(files).failed() {
        return Ok(ExitCode::FAILURE);
    }
    ui::print_success(globals.quiet, "Linted OK");
    Ok(ExitCode::SUCCESS)
}

fn stage_files(globals: &Globals, files: &[PathBuf], force: bool) -> Result<ExitCode> {
    let report = run_lint(files);
    let plan = match stage::prepare(&report, files, force) {
        Ok(plan) => plan,
        Err(Error::NothingToUpload { skipped }) => {
            for finding in &skipped {
                ui::print_finding(finding);
            }
            bail!(Error::NothingToUpload { skipped });
        }
        Err(e) => return Err(e.into()),
    };
    if report.failed() {
        ui::print_warning("Tests failed, continuing anyway");
    }
    for finding in &plan.skipped {
        ui::print_finding(finding);
    }
    if !globals.quiet {
        for (path, upload) in &plan.uploads {
            println!("Uploading {} as {}", path.display(), upload.name.as_str().blue());
        }
    }

    let client = client(globals)?;
    let uploads: Vec<_> = plan.uploads.into_iter().map(|(_, upload)| upload).collect();
    let spinner = ui::spinner(globals.quiet, "Uploading...");
    let outcome = client.upload_content(&uploads);
    spinner.finish_and_clear();
    let outcome = outcome.context("Upload failed")?;

    Ok(if ui::report_outcome(&outcome, globals.quiet, "Uploaded OK") {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn publish(globals: &Globals) -> Result<ExitCode> {
    let client = client(globals)?;
    let spinner = ui::spinner(globals.quiet, "Publishing...");
    let outcome = client.publish_style();
    spinner.finish_and_clear();
    let outcome = outcome.context("Failed to publish")?;

    Ok(if ui::report_outcome(&outcome, globals.quiet, "Published OK") {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn check_dns(globals: &Globals, hostname: &str) -> Result<ExitCode> {
    match dns::check_hostname(hostname)? {
        DnsCheck::Verdict(CnameVerdict::Ok) => {
            ui::print_success(globals.quiet, "CNAME OK");
            return Ok(ExitCode::SUCCESS);
        }
        DnsCheck::Verdict(CnameVerdict::Elsewhere(target)) => ui::print_error(format!(
            "CNAME points to {target}, should be {WHITELABEL_TARGET}"
        )),
        DnsCheck::Verdict(CnameVerdict::Missing) => {
            ui::print_error(format!("No CNAME found for {hostname}"))
        }
        DnsCheck::ResolverBroken(answer) => ui::print_error(format!(
            "Test CNAME lookup got wrong answer: {}",
            answer.as_deref().unwrap_or("no CNAME")
        )),
        DnsCheck::LookupFailed(failure) => {
            ui::print_param("Querying", &failure.name);
            if !failure.nameservers.is_empty() {
                ui::print_param("Nameserver", failure.nameservers.join(", "));
            }
            ui::print_param("NXDOMAIN", if failure.nxdomain { "yes" } else { "no" });
            ui::print_error(format!("CNAME lookup failed: {}", failure.error));
        }
    }
    Ok(ExitCode::FAILURE)
}

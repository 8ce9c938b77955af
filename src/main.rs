// Entrypoint for the `aboutmyemail` tool.
// - Reads a raw message, works out the envelope and submits it.
// - Follows processing through callbacks or polling and prints the
//   report url (optionally opening it).

use aboutmyemail::api::{ApiClient, Outcome, ENV_APIKEY, ENV_SERVER};
use aboutmyemail::callback::CallbackListener;
use aboutmyemail::config::{Settings, ENV_CONFIG};
use aboutmyemail::envelope::Envelope;
use aboutmyemail::status::{follow, Poller};
use aboutmyemail::ui::{self, ProgressPrinter};
use anyhow::{bail, Context, Result};
use clap::Parser;
use crossterm::style::Stylize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

const MAX_TIMEOUT_SECS: u64 = 24 * 60 * 60;

/// Tool to submit messages via the aboutmy.email API
#[derive(Parser, Debug)]
#[command(name = "aboutmyemail", version, about)]
struct Cli {
    /// The api endpoint to use
    #[arg(long, env = ENV_SERVER)]
    server: Option<String>,

    /// The api key to use for authorization
    #[arg(long, env = ENV_APIKEY, hide_env_values = true)]
    api_key: Option<String>,

    /// Settings file (defaults to aboutmyemail/config.toml in the user config directory)
    #[arg(long, env = ENV_CONFIG, value_name = "FILE")]
    config: Option<PathBuf>,

    /// File containing raw email
    email: PathBuf,

    /// Email address for return path
    #[arg(long, value_name = "EMAIL@ADDRESS")]
    from: Option<String>,

    /// Email address for recipient
    #[arg(long, value_name = "EMAIL@ADDRESS")]
    to: Option<String>,

    /// IP address of mailserver
    #[arg(long, value_name = "DOTTED-QUAD")]
    ip: Option<String>,

    /// Value for mailserver HELO
    #[arg(long, value_name = "HOST.NAME")]
    helo: Option<String>,

    /// Disable internationalization
    #[arg(long)]
    ascii: bool,

    /// Don't display parameters or progress
    #[arg(short, long)]
    quiet: bool,

    /// Display result using staged whitelabel configuration
    #[arg(long)]
    staged: bool,

    /// Open result in browser
    #[arg(long)]
    open: bool,

    /// Start local webserver for callbacks
    #[arg(long, value_name = "ADDRESS:PORT")]
    callbacks: Option<String>,

    /// Seconds to wait for the report (at most a day)
    #[arg(
        long,
        default_value_t = 60,
        value_name = "SECONDS",
        value_parser = clap::value_parser!(u64).range(1..=MAX_TIMEOUT_SECS)
    )]
    timeout: u64,

    /// More logging (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    ui::init_logging(cli.verbose);
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            ui::print_error(format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let raw = std::fs::read(&cli.email)
        .with_context(|| format!("Failed to read {}", cli.email.display()))?;
    let settings = Settings::discover(cli.config.as_deref())?;

    let mut envelope = Envelope {
        from: cli.from.unwrap_or_default(),
        to: cli.to.unwrap_or_default(),
        ip: cli.ip.unwrap_or_default(),
        helo: cli.helo.unwrap_or_default(),
    };
    envelope.fill_from_message(&raw);
    envelope.fill_from_host();

    if !cli.quiet {
        ui::print_param("From", &envelope.from);
        ui::print_param("To", &envelope.to);
        ui::print_param("IP", &envelope.ip);
        ui::print_param("Helo", &envelope.helo);
        ui::print_param("Payload", format!("{} bytes", raw.len()));
    }

    let client = ApiClient::new(
        &settings.submit_server(cli.server.as_deref()),
        &settings.api_key(cli.api_key.as_deref()),
    )
    .context("Failed to create client")?;
    let deadline = Instant::now() + Duration::from_secs(cli.timeout);

    // Bind before submitting so the first callback cannot be missed.
    let listener = cli
        .callbacks
        .as_deref()
        .map(CallbackListener::bind)
        .transpose()?;

    let mut request = envelope.submission(&raw, !cli.ascii, cli.staged);
    if let Some(listener) = &listener {
        request.progress_url = Some(listener.url().to_string());
        request.finished_url = Some(listener.url().to_string());
    }

    let id = match client
        .submit_email(&request)
        .context("Failed to submit email")?
    {
        Outcome::Success(success) => success.id,
        Outcome::Throttled => bail!("Server rejected request: 429 Too Many Requests"),
        Outcome::Failed(failure) => {
            ui::print_error(format!("Server rejected request: {}", failure.status));
            ui::print_response(&failure);
            return Ok(ExitCode::FAILURE);
        }
    };

    if !cli.quiet {
        println!("Processing {} ...", id.as_str().cyan());
    }

    let mut printer = ProgressPrinter::new(cli.quiet);
    let url = match listener {
        Some(mut listener) => follow(&mut listener, &mut printer, deadline),
        None => follow(&mut Poller::new(&client, &id), &mut printer, deadline),
    }
    .context("While waiting for results")?;

    if !cli.quiet || !cli.open {
        println!("{url}");
    }
    if cli.open {
        ui::open_browser(&url)?;
    }
    Ok(ExitCode::SUCCESS)
}

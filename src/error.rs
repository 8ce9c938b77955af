// Error types shared by the library modules. The binaries wrap these in
// `anyhow` and only care about the message, but callers of the library
// can match on the variants.

use crate::branding::Finding;
use reqwest::StatusCode;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Everything that can go wrong while talking to the API or handling
/// branding content locally.
#[derive(Debug, Error)]
pub enum Error {
    /// The configured server is not a usable base URL.
    #[error("Invalid server URL '{url}': {source}")]
    InvalidServer {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// The API key cannot be sent as a header value.
    #[error("API key contains characters not allowed in an HTTP header")]
    InvalidApiKey,

    /// The request could not be sent or the response could not be read.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a status that ends the operation.
    #[error("Server rejected request: {status}{}", message_suffix(.message))]
    Rejected {
        status: StatusCode,
        message: Option<String>,
    },

    /// The server answered 200 but the body was not what the API promises.
    #[error("Unexpected response from server: {0}")]
    UnexpectedResponse(String),

    /// No terminal status was observed before the deadline.
    #[error("Timed out waiting for results")]
    TimedOut,

    /// The local callback listener failed or went away.
    #[error("Callback listener: {0}")]
    Callback(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Lint found problems and staging was not forced.
    #[error("Tests failed, not uploading. Use --force to override")]
    LintFailed,

    /// None of the files given to stage can be uploaded.
    #[error("Nothing to upload")]
    NothingToUpload { skipped: Vec<Finding> },

    /// `init` would replace these files and was not forced.
    #[error("Not overwriting existing files. Use --force to override")]
    WouldOverwrite(Vec<PathBuf>),

    #[error("Failed to render template: {0}")]
    Template(#[from] tera::Error),

    #[error("Failed to read config file: {0}")]
    Config(#[from] toml::de::Error),

    #[error("DNS lookup timed out after {} seconds", .0.as_secs())]
    DnsTimeout(Duration),

    #[error("DNS lookup failed: {0}")]
    Dns(#[from] hickory_resolver::ResolveError),
}

fn message_suffix(message: &Option<String>) -> String {
    match message {
        Some(m) => format!(" ({m})"),
        None => String::new(),
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

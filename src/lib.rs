// Library root
// -----------
// Client library for the AboutMy.email API and the shared pieces of the
// `aboutmyemail` and `amemanage` command-line tools.
//
// Module responsibilities:
// - `api`: blocking HTTP client and the request/response types.
// - `envelope`: sender, recipient and host details for a submission.
// - `status`: following a submission by polling or callbacks.
// - `callback`: the local listener that receives progress callbacks.
// - `branding`: white-label templates, lint rules and upload preparation.
// - `dns`: checking a white-label hostname's CNAME.
// - `config`: the optional settings file.
// - `ui`: terminal output, prompts and logging setup for the binaries.
pub mod api;
pub mod branding;
pub mod callback;
pub mod config;
pub mod dns;
pub mod envelope;
pub mod error;
pub mod status;
pub mod ui;

pub use api::ApiClient;
pub use error::{Error, Result};

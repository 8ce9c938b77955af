// White-label branding content: the embedded file manifest and
// templates, lint rules for local files, and preparing uploads.

pub mod languages;
pub mod lint;
pub mod manifest;
pub mod stage;

pub use lint::{lint, Finding, LintReport, Severity};
pub use manifest::{SiteIdentity, Template};
pub use stage::StagePlan;

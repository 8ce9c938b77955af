// Basic checks on branding files before they are uploaded.

use super::languages;
use super::manifest::manifest;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;
use tracing::debug;

/// Keys a branding JSON file may set.
pub const JSON_KEYS: &[&str] = &["HomeLink", "LogoHTML", "MobileLogoHTML"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub severity: Severity,
    pub message: String,
}

impl Finding {
    pub(crate) fn warning(message: String) -> Self {
        Finding {
            severity: Severity::Warning,
            message,
        }
    }

    pub(crate) fn error(message: String) -> Self {
        Finding {
            severity: Severity::Error,
            message,
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Everything `lint` found, in the order the files were given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LintReport {
    pub findings: Vec<Finding>,
    /// Languages seen in localized markdown names.
    pub languages: BTreeSet<String>,
}

impl LintReport {
    pub fn failed(&self) -> bool {
        !self.findings.is_empty()
    }
}

fn localized_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([a-zA-Z0-9]+)\.([a-zA-Z0-9_-]+)\.md$").expect("static regex")
    })
}

/// Check `files` against the embedded manifest.
pub fn lint<P: AsRef<Path>>(files: &[P]) -> LintReport {
    let expected = manifest();
    let mut report = LintReport::default();

    for file in files {
        let file = file.as_ref();
        let base = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = file.extension().and_then(|e| e.to_str()).unwrap_or_default();
        debug!(file = %file.display(), "linting");

        match ext {
            "json" => {
                if !expected.contains(base.as_str()) {
                    report
                        .findings
                        .push(Finding::warning(format!("Unexpected file: {base}")));
                    continue;
                }
                report.findings.extend(check_json(file));
            }
            "md" => {
                let (manifest_name, language) = match localized_re().captures(&base) {
                    Some(caps) => (format!("{}.md", &caps[1]), Some(caps[2].to_string())),
                    None => (base.clone(), None),
                };
                if !expected.contains(manifest_name.as_str()) {
                    report
                        .findings
                        .push(Finding::warning(format!("Unexpected file: {base}")));
                    continue;
                }
                if let Some(language) = language {
                    report.languages.insert(language);
                }
            }
            _ => report
                .findings
                .push(Finding::warning(format!("Unexpected file: {base}"))),
        }
    }

    let unsupported: Vec<Finding> = report
        .languages
        .iter()
        .filter(|lang| !languages::is_supported(lang))
        .map(|lang| Finding::warning(format!("Unexpected language: '{lang}'")))
        .collect();
    report.findings.extend(unsupported);
    report
}

/// A branding JSON file must be an object of strings using only the
/// known keys.
fn check_json(file: &Path) -> Vec<Finding> {
    let display = file.display();
    let contents = match std::fs::read_to_string(file) {
        Ok(contents) => contents,
        Err(e) => return vec![Finding::error(format!("Failed to open {display}: {e}"))],
    };
    let values: BTreeMap<String, String> = match serde_json::from_str(&contents) {
        Ok(values) => values,
        Err(e) => return vec![Finding::error(format!("Failed to parse {display}: {e}"))],
    };
    values
        .keys()
        .filter(|key| !JSON_KEYS.contains(&key.as_str()))
        .map(|key| Finding::warning(format!("Unexpected key in {display}: {key}")))
        .collect()
}

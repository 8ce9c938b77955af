// Gathering branding files for upload to the staging server.

use super::lint::{Finding, LintReport};
use crate::api::UploadFile;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Files read and ready to upload, plus the ones left behind.
#[derive(Debug, Default)]
pub struct StagePlan {
    pub uploads: Vec<(PathBuf, UploadFile)>,
    pub skipped: Vec<Finding>,
}

/// Only markdown and JSON are branding content.
pub fn is_uploadable(file: &Path) -> bool {
    matches!(
        file.extension().and_then(|e| e.to_str()),
        Some("md") | Some("json")
    )
}

/// Read every uploadable file in `files`. Files of other types, and
/// files that cannot be read, are recorded in `skipped`.
pub fn plan<P: AsRef<Path>>(files: &[P]) -> StagePlan {
    let mut plan = StagePlan::default();
    for file in files {
        let file = file.as_ref();
        if !is_uploadable(file) {
            plan.skipped.push(Finding::warning(format!(
                "Skipping non-markdown, non-json file: {}",
                file.display()
            )));
            continue;
        }
        match UploadFile::from_path(file) {
            Ok(upload) => plan.uploads.push((file.to_path_buf(), upload)),
            Err(e) => plan.skipped.push(Finding::error(format!(
                "Failed to open {}, skipping: {e}",
                file.display()
            ))),
        }
    }
    plan
}

/// Decide whether `files` go up given their lint `report`. Findings stop
/// the upload unless `force` is set, and so does having nothing left
/// to send.
pub fn prepare<P: AsRef<Path>>(report: &LintReport, files: &[P], force: bool) -> Result<StagePlan> {
    if report.failed() {
        if !force {
            return Err(Error::LintFailed);
        }
        debug!(findings = report.findings.len(), "staging despite lint findings");
    }
    let plan = plan(files);
    if plan.uploads.is_empty() {
        return Err(Error::NothingToUpload {
            skipped: plan.skipped,
        });
    }
    Ok(plan)
}

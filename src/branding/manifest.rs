// Embedded branding templates. The set of template names (without the
// `.tpl` suffix) is also the list of files the service accepts.

use crate::error::{Error, Result};
use include_dir::{include_dir, Dir};
use regex::Regex;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tera::{Context, Tera};
use tracing::debug;

static TEMPLATES: Dir = include_dir!("$CARGO_MANIFEST_DIR/templates");

const TEMPLATE_SUFFIX: &str = ".tpl";
const DEFAULT_BASE_URL: &str = "https://e.g.example.net";
const DEFAULT_BRAND: &str = "Your Brand";

/// One embedded template.
#[derive(Debug, Clone, Copy)]
pub struct Template {
    /// File name the template renders to.
    pub name: &'static str,
    pub source: &'static str,
}

/// All embedded templates, sorted by name.
pub fn templates() -> Vec<Template> {
    let mut templates: Vec<Template> = TEMPLATES
        .files()
        .filter_map(|file| {
            let file_name = file.path().file_name()?.to_str()?;
            let name = file_name.strip_suffix(TEMPLATE_SUFFIX)?;
            Some(Template {
                name,
                source: file.contents_utf8()?,
            })
        })
        .collect();
    templates.sort_by_key(|t| t.name);
    templates
}

/// Names of the files a branding directory may contain.
pub fn manifest() -> BTreeSet<&'static str> {
    templates().into_iter().map(|t| t.name).collect()
}

/// Values substituted into the templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteIdentity {
    pub base_url: String,
    pub brand_name: String,
}

impl SiteIdentity {
    /// Derive the site from a white-label hostname such as
    /// `reports.example.com`: the base url drops the first label and the
    /// brand is the second label. Anything else gets placeholder values.
    pub fn from_hostname(hostname: &str) -> Self {
        static HOST_RE: OnceLock<Regex> = OnceLock::new();
        let re = HOST_RE.get_or_init(|| {
            Regex::new(r"(?:https?://)?([a-zA-Z0-9-]+)\.([a-zA-Z0-9-]+)\.([a-zA-Z0-9-]+)")
                .expect("static regex")
        });
        match re.captures(hostname) {
            Some(caps) => SiteIdentity {
                base_url: format!("https://{}.{}", &caps[2], &caps[3]),
                brand_name: caps[2].to_lowercase(),
            },
            None => SiteIdentity {
                base_url: DEFAULT_BASE_URL.to_string(),
                brand_name: DEFAULT_BRAND.to_string(),
            },
        }
    }

    fn context(&self) -> Context {
        let mut context = Context::new();
        context.insert("base_url", &self.base_url);
        context.insert("brand_name", &self.brand_name);
        context
    }
}

/// Render one template for `site`.
pub fn render(template: &Template, site: &SiteIdentity) -> Result<String> {
    Ok(Tera::one_off(template.source, &site.context(), false)?)
}

/// Files in `directory` that `init` would overwrite.
pub fn existing_files(directory: &Path) -> Vec<PathBuf> {
    templates()
        .iter()
        .map(|t| directory.join(t.name))
        .filter(|path| path.exists())
        .collect()
}

/// Create `directory` and write every rendered template into it.
/// Returns the paths written. Unless `overwrite` is set, nothing is
/// written when any of the files already exists.
pub fn init(directory: &Path, site: &SiteIdentity, overwrite: bool) -> Result<Vec<PathBuf>> {
    let existing = existing_files(directory);
    if !overwrite && !existing.is_empty() {
        return Err(Error::WouldOverwrite(existing));
    }
    fs::create_dir_all(directory)?;
    let mut written = Vec::new();
    for template in templates() {
        let path = directory.join(template.name);
        let contents = render(&template, site)?;
        fs::write(&path, contents)?;
        debug!(path = %path.display(), "wrote template");
        written.push(path);
    }
    Ok(written)
}

// Optional settings file. Command-line flags and environment variables
// are handled by clap in the binaries; whatever they leave unset is taken
// from here, and whatever is still unset gets the built-in default.

use crate::api::{BRANDING_SERVER, DEFAULT_SERVER};
use crate::error::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const ENV_CONFIG: &str = "MYEMAIL_CONFIG";

/// Contents of `config.toml`. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Endpoint for message submission.
    pub server: Option<String>,
    /// Endpoint for branding management.
    pub branding_server: Option<String>,
    pub api_key: Option<String>,
}

/// `<config dir>/aboutmyemail/config.toml`, if the platform has a config
/// directory.
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("aboutmyemail").join("config.toml"))
}

impl Settings {
    /// Read settings from `path`. A missing file is not an error.
    pub fn load(path: &Path) -> Result<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file");
                return Ok(Settings::default());
            }
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), "loaded config file");
        Ok(toml::from_str(&text)?)
    }

    /// Load from `explicit` if given, else from the default location.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        match explicit.map(Path::to_path_buf).or_else(default_path) {
            Some(path) => Self::load(&path),
            None => Ok(Settings::default()),
        }
    }

    /// Submission endpoint: `flag`, then the file, then the default.
    pub fn submit_server(&self, flag: Option<&str>) -> String {
        pick(flag, self.server.as_deref(), DEFAULT_SERVER)
    }

    /// Branding endpoint: `flag`, then the file, then the default.
    pub fn branding_server(&self, flag: Option<&str>) -> String {
        pick(flag, self.branding_server.as_deref(), BRANDING_SERVER)
    }

    pub fn api_key(&self, flag: Option<&str>) -> String {
        pick(flag, self.api_key.as_deref(), "")
    }
}

fn pick(flag: Option<&str>, file: Option<&str>, default: &str) -> String {
    flag.filter(|v| !v.is_empty())
        .or(file.filter(|v| !v.is_empty()))
        .unwrap_or(default)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("config.toml")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn flags_beat_file_beats_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "server = \"http://127.0.0.1:3000/api/v1\"\napi_key = \"myemail_file\"\n",
        )
        .unwrap();
        let settings = Settings::discover(Some(&path)).unwrap();

        assert_eq!(settings.submit_server(None), "http://127.0.0.1:3000/api/v1");
        assert_eq!(
            settings.submit_server(Some("http://localhost:9/api/v1")),
            "http://localhost:9/api/v1"
        );
        assert_eq!(settings.submit_server(Some("")), "http://127.0.0.1:3000/api/v1");
        assert_eq!(settings.branding_server(None), BRANDING_SERVER);
        assert_eq!(settings.api_key(None), "myemail_file");
        assert_eq!(settings.api_key(Some("myemail_flag")), "myemail_flag");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "apikey = \"typo\"\n").unwrap();
        assert!(Settings::load(&path).is_err());
    }
}

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// One invocation of the tool: which byggfil, where, and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    pub file: PathBuf,
    pub base_dir: PathBuf,
    pub target: String,
    pub dry_run: bool,
    pub verbose: bool,
    pub very_verbose: bool,
    pub watch: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from(default_build_file()),
            base_dir: PathBuf::from("."),
            target: default_target(),
            dry_run: false,
            verbose: false,
            very_verbose: false,
            watch: false,
        }
    }
}

impl BuildConfig {
    /// The byggfil location, relative files being taken from the base directory.
    pub fn build_file_path(&self) -> PathBuf {
        if self.file.is_absolute() {
            self.file.clone()
        } else {
            self.base_dir.join(&self.file)
        }
    }
}

pub fn default_build_file() -> String {
    "byggfil".to_string()
}

pub fn default_target() -> String {
    "all".to_string()
}

/// User settings read from `~/.config/bygg/bygg.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub watch: WatchSettings,
    #[serde(default)]
    pub http: HttpSettings,
    #[serde(default)]
    pub display: DisplaySettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchSettings {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSettings {
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplaySettings {
    #[serde(default = "default_true")]
    pub colors: bool,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
        }
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self { colors: true }
    }
}

impl WatchSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

impl HttpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_poll_interval() -> u64 {
    500
}

fn default_timeout() -> u64 {
    60
}

fn default_user_agent() -> String {
    format!("bygg/{}", env!("CARGO_PKG_VERSION"))
}

fn default_true() -> bool {
    true
}

impl Settings {
    /// Loads settings from `path`, or from the global location when `None`.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => Self::load_from_file(Self::global_path()),
        }
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = Self::expand_path(&path.as_ref().to_string_lossy());

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;

        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))?;

        Ok(settings)
    }

    pub fn global_path() -> PathBuf {
        Self::expand_path("~/.config/bygg/bygg.toml")
    }

    pub fn expand_path(path: &str) -> PathBuf {
        let expanded = shellexpand::tilde(path);
        PathBuf::from(expanded.as_ref())
    }
}

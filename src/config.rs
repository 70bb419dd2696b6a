use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure for github-backup
///
/// Every section is optional; a missing file means defaults throughout.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    /// GitHub API and enumeration settings
    #[serde(default)]
    pub github: GitHubConfig,

    /// Git executable settings
    #[serde(default)]
    pub git: GitConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// GitHub configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GitHubConfig {
    /// Base URL of the REST API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Items requested per page
    #[serde(default = "default_per_page")]
    pub per_page: u8,

    /// Which clone URL to take from each repository entry
    #[serde(default)]
    pub clone_protocol: CloneProtocol,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Clone URL preference for a repository
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CloneProtocol {
    /// git://github.com/owner/repo.git
    #[default]
    Git,
    /// https://github.com/owner/repo.git
    Https,
    /// git@github.com:owner/repo.git
    Ssh,
}

/// Git configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GitConfig {
    /// Executable name or path
    #[serde(default = "default_git_executable")]
    pub executable: String,

    /// Timeout for a single git command in seconds (unset waits forever)
    #[serde(default)]
    pub timeout: Option<u64>,

    /// What to do when an existing directory tracks a different remote
    #[serde(default)]
    pub on_remote_mismatch: MismatchPolicy,
}

/// Handling of an existing directory whose origin is not the expected URL
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MismatchPolicy {
    /// Log a warning and pull anyway
    #[default]
    Warn,
    /// Log a warning and leave the directory alone
    Skip,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Log file, appended to on every run
    #[serde(default = "default_log_file")]
    pub file: String,

    /// Log level for the crate's own events
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_api_url() -> String {
    "https://api.github.com".to_string()
}
fn default_per_page() -> u8 {
    100
}
fn default_user_agent() -> String {
    format!("github-backup/{}", env!("CARGO_PKG_VERSION"))
}
fn default_git_executable() -> String {
    "git".to_string()
}
fn default_log_file() -> String {
    "github_backup.log".to_string()
}
fn default_log_level() -> String {
    "debug".to_string()
}

// Default implementations
impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            per_page: default_per_page(),
            clone_protocol: CloneProtocol::default(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            executable: default_git_executable(),
            timeout: None,
            on_remote_mismatch: MismatchPolicy::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: default_log_file(),
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, falling back to defaults
    pub fn load_or_default() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load(&config_path)
        } else {
            let mut config = Self::default();
            config.expand_paths()?;
            Ok(config)
        }
    }

    /// Load configuration from a specific file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        config.expand_paths()?;

        Ok(config)
    }

    /// Get the default configuration file path (XDG compliant)
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to get user config directory")?;

        Ok(config_dir.join("github-backup").join("config.yml"))
    }

    /// Expand `~` and environment variables in configuration paths
    pub fn expand_paths(&mut self) -> Result<()> {
        self.git.executable = shellexpand::full(&self.git.executable)
            .context("Failed to expand git executable path")?
            .into_owned();

        self.logging.file = shellexpand::full(&self.logging.file)
            .context("Failed to expand log file path")?
            .into_owned();

        Ok(())
    }

    /// Apply a per-page value the API accepts (1..=100)
    pub fn per_page(&self) -> u8 {
        self.github.per_page.clamp(1, 100)
    }
}

use async_trait::async_trait;
use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command as AsyncCommand;
use tokio::time::timeout;
use tracing::debug;

use crate::config::GitConfig;
use crate::error::GitError;

/// Version-control operations the backup driver needs
///
/// Every method takes the directory it works on; nothing here touches the
/// process working directory.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Vcs: Send + Sync {
    /// Whether the executable can be launched and answers `--version`
    async fn is_available(&self) -> bool;

    /// Clone `url` into `directory`
    async fn clone_repository(&self, url: &str, directory: &Path) -> Result<(), GitError>;

    /// Pull inside an existing checkout
    async fn update_repository(&self, directory: &Path) -> Result<(), GitError>;

    /// Configured `remote.origin.url`, if any
    async fn remote_url(&self, directory: &Path) -> Result<Option<String>, GitError>;

    /// Whether `directory` tracks `url` as its origin
    async fn is_tracking(&self, directory: &Path, url: &str) -> Result<bool, GitError>;
}

/// Git operations over the `git` command line client
#[derive(Debug, Clone)]
pub struct GitClient {
    executable: String,
    timeout: Option<Duration>,
}

impl GitClient {
    /// Create a new Git client with the given configuration
    pub fn new(config: &GitConfig) -> Self {
        Self {
            executable: config.executable.clone(),
            timeout: config.timeout.map(Duration::from_secs),
        }
    }

    fn command(&self) -> AsyncCommand {
        let mut cmd = AsyncCommand::new(&self.executable);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env("GIT_TERMINAL_PROMPT", "0")
            .kill_on_drop(true);
        cmd
    }

    /// Run a prepared command, applying the timeout if one is configured
    async fn output(
        &self,
        mut cmd: AsyncCommand,
        subcommand: &'static str,
    ) -> Result<Output, GitError> {
        let result = match self.timeout {
            Some(limit) => timeout(limit, cmd.output())
                .await
                .map_err(|_| GitError::TimedOut {
                    subcommand,
                    seconds: limit.as_secs(),
                })?,
            None => cmd.output().await,
        };

        result.map_err(|source| GitError::Spawn {
            program: self.executable.clone(),
            source,
        })
    }

    /// Like `output`, but a non-zero exit becomes an error
    async fn run(&self, cmd: AsyncCommand, subcommand: &'static str) -> Result<Output, GitError> {
        let output = self.output(cmd, subcommand).await?;

        if !output.status.success() {
            return Err(GitError::Failed {
                subcommand,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(output)
    }
}

#[async_trait]
impl Vcs for GitClient {
    async fn is_available(&self) -> bool {
        AsyncCommand::new(&self.executable)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }

    async fn clone_repository(&self, url: &str, directory: &Path) -> Result<(), GitError> {
        debug!("git clone {} {}", url, directory.display());

        let mut cmd = self.command();
        cmd.arg("clone").arg(url).arg(directory);
        self.run(cmd, "clone").await?;

        Ok(())
    }

    async fn update_repository(&self, directory: &Path) -> Result<(), GitError> {
        debug!("git pull in {}", directory.display());

        let mut cmd = self.command();
        cmd.arg("pull").current_dir(directory);
        self.run(cmd, "pull").await?;

        Ok(())
    }

    async fn remote_url(&self, directory: &Path) -> Result<Option<String>, GitError> {
        let mut cmd = self.command();
        cmd.args(["config", "remote.origin.url"]).current_dir(directory);
        let output = self.output(cmd, "config").await?;

        if output.status.success() {
            let url = String::from_utf8_lossy(&output.stdout).trim().to_string();
            Ok(Some(url))
        } else {
            Ok(None)
        }
    }

    async fn is_tracking(&self, directory: &Path, url: &str) -> Result<bool, GitError> {
        Ok(self
            .remote_url(directory)
            .await?
            .map(|actual| remote_urls_match(&actual, url))
            .unwrap_or(false))
    }
}

/// Compare two remote URLs, ignoring protocol spelling differences
pub fn remote_urls_match(actual: &str, expected: &str) -> bool {
    // git@host:path, ssh://git@host/path and git://host/path all name the
    // same repository as https://host/path
    let normalize = |url: &str| -> String {
        let url = url.trim().to_lowercase();
        let url = if let Some(rest) = url.strip_prefix("ssh://git@") {
            format!("https://{}", rest)
        } else if let Some(rest) = url.strip_prefix("git@") {
            format!("https://{}", rest.replacen(':', "/", 1))
        } else if let Some(rest) = url.strip_prefix("git://") {
            format!("https://{}", rest)
        } else {
            url
        };

        let url = url.trim_end_matches('/');
        url.strip_suffix(".git").unwrap_or(url).to_string()
    };

    normalize(actual) == normalize(expected)
}

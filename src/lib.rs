//! github-backup - mirror a GitHub user's repositories locally
//!
//! Lists the organizations a user belongs to, then every repository of those
//! organizations and of the user (optionally with starred repositories), and
//! keeps one local checkout per repository: cloned when missing, pulled when
//! present.
//!
//! ## Modules
//!
//! - [`config`]: YAML configuration with XDG lookup
//! - [`github`]: unauthenticated GitHub REST enumeration with pagination
//! - [`git`]: git command line operations behind the [`Vcs`] trait
//! - [`backup`]: the driver tying enumeration and mirroring together
//! - [`logging`]: console and log file sinks

pub mod backup;
pub mod config;
pub mod error;
pub mod git;
pub mod github;
pub mod logging;

pub use backup::{Backup, BackupOptions, BackupSummary, MirrorOutcome};
pub use config::Config;
pub use error::{GitError, GitHubError};
pub use git::{GitClient, Vcs};
pub use github::{GitHubClient, RepositoryRef};

//! Backup driver - mirrors every repository of a user and its organizations
//!
//! Owners are processed one at a time: the user's organizations first, the
//! user last. Each repository is cloned when its directory is absent and
//! pulled when it is present. Failures are recorded per repository or per
//! owner and never stop the run.

use anyhow::{Context, Result};
use futures::StreamExt;
use path_clean::PathClean;
use std::path::{Component, Path, PathBuf};
use std::pin::pin;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::config::MismatchPolicy;
use crate::git::Vcs;
use crate::github::{GitHubClient, RepositoryRef};

/// What the run should do, as given on the command line
#[derive(Debug, Clone)]
pub struct BackupOptions {
    /// GitHub account whose repositories are mirrored
    pub user: String,
    /// Destination directory, before expansion
    pub root: String,
    /// Also mirror the repositories each owner has starred
    pub include_starred: bool,
    /// Log what would happen without running git
    pub dry_run: bool,
    /// Handling of directories that track a different remote
    pub on_remote_mismatch: MismatchPolicy,
}

/// Result of mirroring one repository
#[derive(Debug)]
pub enum MirrorOutcome {
    /// Directory was absent and the clone succeeded
    Cloned { path: PathBuf },
    /// Directory was present and the pull succeeded
    Updated { path: PathBuf },
    /// Dry run, nothing was touched
    Planned { path: PathBuf },
    /// Left alone on purpose
    Skipped { path: PathBuf, reason: String },
    /// git or validation failed
    Failed { path: PathBuf, error: String },
}

/// An owner whose repositories could not be listed (completely or partly)
#[derive(Debug, Clone)]
pub struct OwnerFailure {
    pub owner: String,
    pub error: String,
}

/// Tally of a complete run
#[derive(Debug, Default)]
pub struct BackupSummary {
    pub clones: usize,
    pub updates: usize,
    pub planned: usize,
    pub skipped: usize,
    pub outcomes: Vec<MirrorOutcome>,
    pub owner_failures: Vec<OwnerFailure>,
    pub duration: Duration,
}

impl BackupSummary {
    fn record(&mut self, outcome: MirrorOutcome) {
        match &outcome {
            MirrorOutcome::Cloned { .. } => self.clones += 1,
            MirrorOutcome::Updated { .. } => self.updates += 1,
            MirrorOutcome::Planned { .. } => self.planned += 1,
            MirrorOutcome::Skipped { .. } => self.skipped += 1,
            MirrorOutcome::Failed { .. } => {}
        }
        self.outcomes.push(outcome);
    }

    /// Repository operations that failed
    pub fn failed(&self) -> impl Iterator<Item = (&Path, &str)> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            MirrorOutcome::Failed { path, error } => Some((path.as_path(), error.as_str())),
            _ => None,
        })
    }

    /// Whether anything went wrong during the run
    fn has_failures(&self) -> bool {
        !self.owner_failures.is_empty() || self.failed().next().is_some()
    }

    /// The closing line of every run
    pub fn tally_line(&self) -> String {
        format!("{} new repositories, {} updated.", self.clones, self.updates)
    }
}

/// Orchestrates enumeration and mirroring
pub struct Backup<V: Vcs> {
    github: GitHubClient,
    vcs: V,
    options: BackupOptions,
}

impl<V: Vcs> Backup<V> {
    pub fn new(github: GitHubClient, vcs: V, options: BackupOptions) -> Self {
        Self {
            github,
            vcs,
            options,
        }
    }

    /// Run the whole backup and log the summary
    ///
    /// Only a root directory that cannot be created is fatal.
    pub async fn run(&self) -> Result<BackupSummary> {
        let start_time = Instant::now();

        let root = prepare_root(&self.options.root)?;
        info!("Backing up to {}...", root.display());

        let mut summary = BackupSummary::default();

        for owner in self.owners(&mut summary).await {
            debug!("{}", owner);
            self.backup_owner(&owner, &root, &mut summary).await;
        }

        summary.duration = start_time.elapsed();
        log_summary(&summary);

        Ok(summary)
    }

    /// Organizations first, the user last
    async fn owners(&self, summary: &mut BackupSummary) -> Vec<String> {
        let user = &self.options.user;

        let mut owners = match self.github.organizations(user).await {
            Ok(orgs) => orgs,
            Err(e) => {
                error!("Failed to list organizations for {}: {}", user, e);
                summary.owner_failures.push(OwnerFailure {
                    owner: user.clone(),
                    error: format!("organizations: {}", e),
                });
                Vec::new()
            }
        };

        owners.push(user.clone());
        owners
    }

    async fn backup_owner(&self, owner: &str, root: &Path, summary: &mut BackupSummary) {
        let mut repositories = pin!(self
            .github
            .repositories(owner, self.options.include_starred));

        while let Some(item) = repositories.next().await {
            match item {
                Ok(repo) => {
                    let outcome = self.mirror(&repo, root).await;
                    summary.record(outcome);
                }
                Err(e) => {
                    error!("Failed to list repositories for {}: {}", owner, e);
                    summary.owner_failures.push(OwnerFailure {
                        owner: owner.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }
    }

    /// Clone, update or just report a single repository
    async fn mirror(&self, repo: &RepositoryRef, root: &Path) -> MirrorOutcome {
        let path = root.join(&repo.name);

        if !is_safe_name(&repo.name) {
            error!("Refusing unsafe repository name {:?}", repo.name);
            return MirrorOutcome::Failed {
                path,
                error: format!("unsafe repository name {:?}", repo.name),
            };
        }

        if self.options.dry_run {
            info!("Not cloning / updating {}...", repo.name);
            return MirrorOutcome::Planned { path };
        }

        if path.exists() {
            if let Some(reason) = self.check_tracking(repo, &path).await {
                return MirrorOutcome::Skipped { path, reason };
            }

            info!("Updating {}...", repo.name);
            match self.vcs.update_repository(&path).await {
                Ok(()) => MirrorOutcome::Updated { path },
                Err(e) => {
                    error!("Failed to update {}: {}", repo.name, e);
                    MirrorOutcome::Failed {
                        path,
                        error: e.to_string(),
                    }
                }
            }
        } else {
            info!("Cloning {}...", repo.name);
            match self.vcs.clone_repository(&repo.clone_url, &path).await {
                Ok(()) => MirrorOutcome::Cloned { path },
                Err(e) => {
                    error!("Failed to clone {}: {}", repo.name, e);
                    MirrorOutcome::Failed {
                        path,
                        error: e.to_string(),
                    }
                }
            }
        }
    }

    /// Returns a skip reason when the directory should not be pulled
    async fn check_tracking(&self, repo: &RepositoryRef, path: &Path) -> Option<String> {
        let reason = match self.vcs.is_tracking(path, &repo.clone_url).await {
            Ok(true) => return None,
            Ok(false) => format!("{} does not track {}", path.display(), repo.clone_url),
            Err(e) => format!("could not read the remote of {}: {}", path.display(), e),
        };

        match self.options.on_remote_mismatch {
            MismatchPolicy::Warn => {
                warn!("{}; updating anyway", reason);
                None
            }
            MismatchPolicy::Skip => {
                warn!("{}; skipping {}", reason, repo.name);
                Some(reason)
            }
        }
    }
}

/// Expand, absolutize, create and canonicalize the backup root
pub fn prepare_root(root: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(root)
        .with_context(|| format!("Failed to expand root directory: {}", root))?;

    let mut path = PathBuf::from(expanded.as_ref());
    if path.is_relative() {
        path = std::env::current_dir()
            .context("Failed to get current directory")?
            .join(path);
    }
    let path = path.clean();

    std::fs::create_dir_all(&path)
        .with_context(|| format!("Failed to create root directory: {:?}", path))?;

    path.canonicalize()
        .with_context(|| format!("Failed to resolve root directory: {:?}", path))
}

/// A repository name must map to exactly one directory directly under root
fn is_safe_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !name.contains(['/', '\\'])
}

fn log_summary(summary: &BackupSummary) {
    if summary.has_failures() {
        for failure in &summary.owner_failures {
            warn!("Could not list {}: {}", failure.owner, failure.error);
        }
        for (path, error) in summary.failed() {
            warn!("Failed {}: {}", path.display(), error);
        }
    }
    if summary.skipped > 0 {
        warn!("{} repositories skipped", summary.skipped);
    }

    debug!("Backup finished in {:.1?}", summary.duration);
    info!("{}", summary.tally_line());
}

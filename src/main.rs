use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, error};

use github_backup::{logging, Backup, BackupOptions, Config, GitClient, GitHubClient, Vcs};

#[derive(Parser)]
#[command(name = "github-backup")]
#[command(about = "Backs up all your public GitHub repositories.")]
#[command(version)]
struct Cli {
    /// Your GitHub user name
    user: String,

    /// The target directory
    root: String,

    /// Also back up starred repositories
    #[arg(long)]
    stars: bool,

    /// Simulate the run (no git)
    #[arg(long = "dry_run", alias = "dry-run")]
    dry_run: bool,

    /// Configuration file path (defaults to XDG config location)
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    logging::init(&config.logging)?;
    debug!("github-backup v{}", env!("CARGO_PKG_VERSION"));

    let git = GitClient::new(&config.git);
    if !git.is_available().await {
        error!("The git executable is missing.");
        std::process::exit(1);
    }

    let github = GitHubClient::new(&config).context("Failed to create GitHub client")?;

    let options = BackupOptions {
        user: cli.user,
        root: cli.root,
        include_starred: cli.stars,
        dry_run: cli.dry_run,
        on_remote_mismatch: config.git.on_remote_mismatch,
    };

    Backup::new(github, git, options).run().await?;

    Ok(())
}

/// Load configuration from specified path or default location
fn load_config(config_path: Option<&std::path::Path>) -> Result<Config> {
    match config_path {
        Some(path) => Config::load(path),
        None => Config::load_or_default(),
    }
}

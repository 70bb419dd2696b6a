//! Error types for the GitHub API and git layers

use std::process::ExitStatus;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur while talking to the GitHub REST API
#[derive(Error, Debug)]
pub enum GitHubError {
    /// The request could not be sent or the body could not be read
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The API answered with a non-success status
    #[error("GitHub API returned {status} for {url}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    /// Unauthenticated rate limit exhausted
    #[error("GitHub rate limit exceeded for {url}, resets at {when}", when = reset_display(.reset))]
    RateLimited {
        url: String,
        reset: Option<DateTime<Utc>>,
    },

    /// The body was not the JSON shape we expected
    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// A repository entry carried no usable clone URL
    #[error("repository {name} has no clone URL")]
    MissingCloneUrl { name: String },

    /// The HTTP client could not be built
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

fn reset_display(reset: &Option<DateTime<Utc>>) -> String {
    match reset {
        Some(at) => at.to_rfc3339(),
        None => "an unknown time".to_string(),
    }
}

/// Errors from invoking the git executable
#[derive(Error, Debug)]
pub enum GitError {
    /// The executable could not be launched at all
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// git ran but exited unsuccessfully
    #[error("git {subcommand} exited with {status}: {stderr}")]
    Failed {
        subcommand: &'static str,
        status: ExitStatus,
        stderr: String,
    },

    /// git did not finish within the configured timeout
    #[error("git {subcommand} timed out after {seconds}s")]
    TimedOut {
        subcommand: &'static str,
        seconds: u64,
    },
}

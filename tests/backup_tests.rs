//! End-to-end runs of the backup driver against a mock GitHub API and a
//! scripted git executable.

#![cfg(unix)]

mod common;

use common::{mock_github, TestEnvironment};
use github_backup::config::{GitConfig, MismatchPolicy};
use github_backup::{Backup, BackupOptions, Config, GitClient, GitHubClient, Vcs};
use serial_test::serial;
use wiremock::MockServer;

fn backup_for(
    env: &TestEnvironment,
    server: &MockServer,
    dry_run: bool,
) -> Backup<GitClient> {
    let mut config = Config::default();
    config.github.api_url = server.uri();

    let git = GitClient::new(&GitConfig {
        executable: env.git_path.to_string_lossy().into_owned(),
        ..Default::default()
    });

    Backup::new(
        GitHubClient::new(&config).unwrap(),
        git,
        BackupOptions {
            user: "alice".to_string(),
            root: env.root.to_string_lossy().into_owned(),
            include_starred: false,
            dry_run,
            on_remote_mismatch: MismatchPolicy::Warn,
        },
    )
}

#[tokio::test]
#[serial]
async fn test_fake_git_is_available() {
    let env = TestEnvironment::new();
    let git = GitClient::new(&GitConfig {
        executable: env.git_path.to_string_lossy().into_owned(),
        ..Default::default()
    });

    assert!(git.is_available().await);
}

#[tokio::test]
#[serial]
async fn test_empty_root_clones_both_repositories() {
    let env = TestEnvironment::new();
    let server = mock_github("alice", &[], &[("alice", vec![("a", "u1"), ("b", "u2")])]).await;

    let summary = backup_for(&env, &server, false).run().await.unwrap();

    assert!(env.root.join("a/.git").is_dir());
    assert!(env.root.join("b/.git").is_dir());
    assert_eq!(
        std::fs::read_to_string(env.root.join("b/.git/origin")).unwrap().trim(),
        "u2"
    );
    assert_eq!(summary.tally_line(), "2 new repositories, 0 updated.");
}

#[tokio::test]
#[serial]
async fn test_existing_checkout_is_pulled_in_place() {
    let env = TestEnvironment::new();
    let existing = env.existing_checkout("a", "u1");
    let server = mock_github("alice", &[], &[("alice", vec![("a", "u1"), ("b", "u2")])]).await;

    let summary = backup_for(&env, &server, false).run().await.unwrap();

    // The pull ran with the checkout as its working directory
    assert_eq!(
        std::fs::read_to_string(existing.join(".git/pulls")).unwrap(),
        "pulled\n"
    );
    assert!(env.root.join("b/.git").is_dir());
    assert_eq!(summary.tally_line(), "1 new repositories, 1 updated.");
}

#[tokio::test]
#[serial]
async fn test_mismatched_checkout_is_still_pulled_by_default() {
    let env = TestEnvironment::new();
    let existing = env.existing_checkout("a", "git://github.com/someone-else/a.git");
    let server = mock_github("alice", &[], &[("alice", vec![("a", "u1")])]).await;

    let summary = backup_for(&env, &server, false).run().await.unwrap();

    assert!(existing.join(".git/pulls").exists());
    assert_eq!((summary.clones, summary.updates), (0, 1));
}

#[tokio::test]
#[serial]
async fn test_dry_run_leaves_root_untouched() {
    let env = TestEnvironment::new();
    let existing = env.existing_checkout("a", "u1");
    let server = mock_github("alice", &[], &[("alice", vec![("a", "u1"), ("b", "u2")])]).await;

    let summary = backup_for(&env, &server, true).run().await.unwrap();

    assert!(!env.root.join("b").exists());
    assert!(!existing.join(".git/pulls").exists());
    assert_eq!((summary.clones, summary.updates), (0, 0));
}

#[tokio::test]
#[serial]
async fn test_organization_and_user_share_a_name() {
    let env = TestEnvironment::new();
    let server = mock_github(
        "alice",
        &["acme"],
        &[
            ("acme", vec![("tool", "git://github.com/acme/tool.git")]),
            ("alice", vec![("tool", "git://github.com/alice/tool.git")]),
        ],
    )
    .await;

    let summary = backup_for(&env, &server, false).run().await.unwrap();

    // The organization's copy is cloned first, the user's pass pulls into it
    let checkout = env.root.join("tool");
    assert_eq!(
        std::fs::read_to_string(checkout.join(".git/origin")).unwrap().trim(),
        "git://github.com/acme/tool.git"
    );
    assert!(checkout.join(".git/pulls").exists());
    assert_eq!(summary.tally_line(), "1 new repositories, 1 updated.");
}

//! Common test utilities and helpers for github-backup tests

#![allow(dead_code)]

use assert_fs::prelude::*;
use assert_fs::TempDir;
use serde_json::json;
use std::path::PathBuf;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Stand-in for git: clone records the URL as the origin, pull appends to a
/// marker file, config prints the recorded origin.
#[cfg(unix)]
const FAKE_GIT: &str = r#"#!/bin/sh
case "$1" in
  --version)
    echo "git version 0.0.0-test"
    ;;
  clone)
    mkdir -p "$3/.git" && printf '%s\n' "$2" > "$3/.git/origin"
    ;;
  pull)
    echo pulled >> .git/pulls
    ;;
  config)
    cat .git/origin 2>/dev/null || exit 1
    ;;
  *)
    exit 2
    ;;
esac
"#;

/// Temporary workspace holding a fake git executable and a backup root
pub struct TestEnvironment {
    pub temp_dir: TempDir,
    pub git_path: PathBuf,
    pub root: PathBuf,
}

impl TestEnvironment {
    #[cfg(unix)]
    pub fn new() -> Self {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        temp_dir
            .child("bin")
            .create_dir_all()
            .expect("Failed to create bin dir");
        let git = temp_dir.child("bin/git");
        git.write_str(FAKE_GIT).expect("Failed to write fake git");
        std::fs::set_permissions(git.path(), std::fs::Permissions::from_mode(0o755))
            .expect("Failed to make fake git executable");

        let root = temp_dir.path().join("backup");

        Self {
            git_path: git.path().to_path_buf(),
            root,
            temp_dir,
        }
    }

    /// Pretend a repository was already mirrored from `origin`
    pub fn existing_checkout(&self, name: &str, origin: &str) -> PathBuf {
        let dir = self.root.join(name);
        std::fs::create_dir_all(dir.join(".git")).expect("Failed to create checkout");
        std::fs::write(dir.join(".git/origin"), format!("{}\n", origin))
            .expect("Failed to write origin");
        dir
    }

    /// Write a YAML config pointing at the fake git and the mock API
    pub fn write_config(&self, api_url: &str) -> PathBuf {
        let config = self.temp_dir.child("config.yml");
        config
            .write_str(&format!(
                "github:\n  api_url: \"{}\"\ngit:\n  executable: \"{}\"\nlogging:\n  file: \"{}\"\n",
                api_url,
                self.git_path.display(),
                self.log_path().display()
            ))
            .expect("Failed to write config");
        config.path().to_path_buf()
    }

    pub fn log_path(&self) -> PathBuf {
        self.temp_dir.path().join("github_backup.log")
    }
}

/// Serve `orgs` as the user's organizations and `repos` per owner
pub async fn mock_github(user: &str, orgs: &[&str], repos: &[(&str, Vec<(&str, &str)>)]) -> MockServer {
    let server = MockServer::start().await;

    let logins: Vec<_> = orgs.iter().map(|login| json!({ "login": login })).collect();
    Mock::given(method("GET"))
        .and(path(format!("/users/{}/orgs", user)))
        .respond_with(ResponseTemplate::new(200).set_body_json(logins))
        .mount(&server)
        .await;

    for (owner, entries) in repos {
        let body: Vec<_> = entries
            .iter()
            .map(|(name, url)| json!({ "name": name, "git_url": url }))
            .collect();
        Mock::given(method("GET"))
            .and(path(format!("/users/{}/repos", owner)))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;
    }

    server
}

/// Assertion helper for log output
pub fn assert_contains_all(text: &str, expected: &[&str]) {
    for item in expected {
        assert!(
            text.contains(item),
            "Expected text to contain '{}', but it didn't. Text: {}",
            item,
            text
        );
    }
}

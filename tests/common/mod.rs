#![allow(dead_code)]

//! # Test Utilities for branchwise
//!
//! `TestRepo` creates an isolated git repository in a temporary directory,
//! with a private gitconfig and deterministic timestamps. Each test gets a
//! fresh repo that is removed when the test ends.
//!
//! Git commands run with per-command environments (`Command::env()`), so tests
//! can run in parallel without touching global state.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use rstest::fixture;
use tempfile::TempDir;

/// Fixed epoch for deterministic commit dates (2025-01-02T00:00:00Z).
pub const TEST_EPOCH: u64 = 1735776000;

const NULL_DEVICE: &str = "/dev/null";

/// Fresh repository on `main` with one commit.
#[fixture]
pub fn repo() -> TestRepo {
    TestRepo::new()
}

/// Configure a git command with an isolated environment.
pub fn configure_git_cmd(cmd: &mut Command, git_config_path: &Path) {
    cmd.env("GIT_CONFIG_GLOBAL", git_config_path);
    cmd.env("GIT_CONFIG_SYSTEM", NULL_DEVICE);
    cmd.env("GIT_AUTHOR_DATE", "2025-01-01T00:00:00Z");
    cmd.env("GIT_COMMITTER_DATE", "2025-01-01T00:00:00Z");
    cmd.env("LC_ALL", "C");
    cmd.env("LANG", "C");
    cmd.env("SOURCE_DATE_EPOCH", TEST_EPOCH.to_string());
    cmd.env("GIT_TERMINAL_PROMPT", "0");
}

/// Isolate a `branchwise` invocation from the host's git and branchwise settings.
pub fn configure_cli_command(cmd: &mut Command) {
    for (key, _) in std::env::vars() {
        if key.starts_with("GIT_") || key.starts_with("BRANCHWISE_") {
            cmd.env_remove(&key);
        }
    }
    // Non-existent path so the user's real config never loads.
    cmd.env("BRANCHWISE_CONFIG_PATH", "/nonexistent/test/config.toml");
    cmd.env("SOURCE_DATE_EPOCH", TEST_EPOCH.to_string());
    cmd.env("RUST_LOG", "warn");
}

pub fn check_git_status(output: &Output, cmd_desc: &str) {
    if !output.status.success() {
        panic!(
            "git {} failed:\nstdout: {}\nstderr: {}",
            cmd_desc,
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
    }
}

pub struct TestRepo {
    temp_dir: TempDir, // Must keep to ensure cleanup on drop
    root: PathBuf,
    /// Git config file with test settings (identity, default branch)
    git_config_path: PathBuf,
}

impl TestRepo {
    /// Create a repository on `main` with one initial commit.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("repo");
        std::fs::create_dir(&root).unwrap();
        // macOS: /var is a symlink to /private/var
        let root = dunce::canonicalize(&root).unwrap();

        let git_config_path = temp_dir.path().join("test-gitconfig");
        std::fs::write(
            &git_config_path,
            "[user]\n\tname = Test User\n\temail = test@example.com\n\
             [advice]\n\tdetachedHead = false\n\
             [init]\n\tdefaultBranch = main\n",
        )
        .unwrap();

        let repo = Self {
            temp_dir,
            root,
            git_config_path,
        };
        repo.run_git(&["init", "-q", "-b", "main"]);
        repo.commit("initial");
        repo
    }

    pub fn root_path(&self) -> &Path {
        &self.root
    }

    pub fn git_config_path(&self) -> &Path {
        &self.git_config_path
    }

    #[must_use]
    pub fn git_command(&self) -> Command {
        let mut cmd = Command::new("git");
        configure_git_cmd(&mut cmd, &self.git_config_path);
        cmd.current_dir(&self.root);
        cmd
    }

    /// Run a git command in the repo root, panicking on failure.
    pub fn run_git(&self, args: &[&str]) {
        let output = self.git_command().args(args).output().unwrap();
        check_git_status(&output, &args.join(" "));
    }

    /// Run a git command and return stdout, trimmed.
    pub fn git_output(&self, args: &[&str]) -> String {
        let output = self.git_command().args(args).output().unwrap();
        check_git_status(&output, &args.join(" "));
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }

    /// Commit a change to a file named after the message.
    pub fn commit(&self, message: &str) {
        let file = format!("{}.txt", message.replace([' ', '/'], "-"));
        std::fs::write(self.root.join(&file), format!("{message}\n")).unwrap();
        self.run_git(&["add", &file]);
        self.run_git(&["commit", "-q", "-m", message]);
    }

    pub fn checkout(&self, branch: &str) {
        self.run_git(&["checkout", "-q", branch]);
    }

    /// `git checkout -b <branch> [<start>]`
    pub fn create_branch(&self, branch: &str, start: Option<&str>) {
        let mut args = vec!["checkout", "-q", "-b", branch];
        args.extend(start);
        self.run_git(&args);
    }

    pub fn head_sha(&self) -> String {
        self.git_output(&["rev-parse", "HEAD"])
    }

    pub fn set_config(&self, key: &str, value: &str) {
        self.run_git(&["config", key, value]);
    }

    /// Remove every reflog and stop git from writing new ones, leaving only
    /// config and ancestry as evidence.
    pub fn clear_reflogs(&self) {
        self.set_config("core.logAllRefUpdates", "false");
        let logs = self.root.join(".git/logs");
        if logs.exists() {
            std::fs::remove_dir_all(logs).unwrap();
        }
    }

    /// Create a bare repository and register it as `name`.
    pub fn add_remote(&self, name: &str) -> PathBuf {
        let path = self.temp_dir.path().join(format!("{name}.git"));
        let output = Command::new("git")
            .args(["init", "-q", "--bare"])
            .arg(&path)
            .env("GIT_CONFIG_GLOBAL", &self.git_config_path)
            .env("GIT_CONFIG_SYSTEM", NULL_DEVICE)
            .output()
            .unwrap();
        check_git_status(&output, "init --bare");
        self.run_git(&["remote", "add", name, path.to_str().unwrap()]);
        path
    }

    pub fn push(&self, remote: &str, branches: &[&str]) {
        let mut args = vec!["push", "-q", remote];
        args.extend(branches);
        self.run_git(&args);
    }

    /// A `branchwise` command isolated from host settings, run from the repo root.
    #[must_use]
    pub fn branchwise_command(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_branchwise"));
        configure_cli_command(&mut cmd);
        configure_git_cmd(&mut cmd, &self.git_config_path);
        cmd.current_dir(&self.root);
        cmd
    }
}

impl Default for TestRepo {
    fn default() -> Self {
        Self::new()
    }
}

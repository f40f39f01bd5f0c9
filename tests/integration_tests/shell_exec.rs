use std::time::{Duration, Instant};

use branchwise::git::{GitError, Repository};
use branchwise::shell_exec::{self, SENTINEL_EXIT_CODE};
use rstest::rstest;

use crate::common::{TestRepo, repo};

#[rstest]
fn test_execute_captures_exit_code_and_output(repo: TestRepo) {
    let result = shell_exec::execute(
        &["rev-parse", "--abbrev-ref", "HEAD"],
        repo.root_path(),
        Duration::from_secs(10),
    );
    assert!(result.success());
    assert_eq!(result.output.trim(), "main");

    let result = shell_exec::execute(
        &["rev-parse", "--verify", "refs/heads/missing"],
        repo.root_path(),
        Duration::from_secs(10),
    );
    assert_eq!(result.exit_code, 128);
    assert!(result.output.contains("fatal"), "{}", result.output);
    assert!(!result.timed_out);
}

#[rstest]
fn test_execute_kills_hung_alias_and_its_children(repo: TestRepo) {
    // The alias runs through a shell, so git has a grandchild to clean up.
    let start = Instant::now();
    let result = shell_exec::execute(
        &["-c", "alias.hang=!sleep 30; sleep 30", "hang"],
        repo.root_path(),
        Duration::from_secs(1),
    );

    assert!(result.timed_out);
    assert_eq!(result.exit_code, SENTINEL_EXIT_CODE);
    assert!(
        start.elapsed() < Duration::from_secs(10),
        "took {:?}",
        start.elapsed()
    );
}

#[rstest]
fn test_repository_maps_timeout_to_git_error(repo: TestRepo) {
    let repo = Repository::at(repo.root_path()).with_timeout(Duration::from_secs(1));
    let err = repo
        .run_command(&["-c", "alias.hang=!sleep 30", "hang"])
        .unwrap_err();
    assert!(
        matches!(
            err.downcast_ref::<GitError>(),
            Some(GitError::CommandTimeout { .. })
        ),
        "{err:?}"
    );
}

#[test]
fn test_execute_in_missing_directory_does_not_panic() {
    let dir = tempfile::tempdir().unwrap();
    let result = shell_exec::execute(
        &["status"],
        &dir.path().join("gone"),
        Duration::from_secs(5),
    );
    assert!(!result.success());
    assert_eq!(result.exit_code, SENTINEL_EXIT_CODE);
}

use branchwise::git::{BaseBranch, BranchResolver, Evidence, Strategy, resolve_base_branch};
use rstest::rstest;

use crate::common::{TestRepo, repo};

fn base(remote: &str, branch: &str) -> Option<BaseBranch> {
    Some(BaseBranch::new(remote, branch))
}

#[rstest]
fn test_created_from_explicit_start_point(repo: TestRepo) {
    repo.create_branch("feature/x", Some("main"));
    repo.commit("work on x");

    assert_eq!(
        resolve_base_branch(repo.root_path(), "feature/x", "origin"),
        base("origin", "main")
    );
}

#[rstest]
fn test_created_from_head_uses_head_reflog(repo: TestRepo) {
    repo.create_branch("develop", None);
    repo.commit("develop work");
    // Own reflog says "Created from HEAD"; the checkout entry names develop.
    repo.create_branch("feature", None);

    let resolver = BranchResolver::at(repo.root_path());
    assert_eq!(
        resolver.evaluate(Strategy::Reflog, "feature", "origin"),
        Evidence::Found(BaseBranch::new("origin", "develop"))
    );
}

#[rstest]
fn test_reflog_remote_prefix_names_remote(repo: TestRepo) {
    repo.add_remote("upstream");
    repo.push("upstream", &["main"]);
    repo.run_git(&["checkout", "-q", "--no-track", "-b", "feature", "upstream/main"]);

    assert_eq!(
        resolve_base_branch(repo.root_path(), "feature", "origin"),
        base("upstream", "main")
    );
}

#[rstest]
fn test_remote_probed_when_reflog_has_no_prefix(repo: TestRepo) {
    repo.add_remote("origin");
    repo.add_remote("upstream");
    repo.push("upstream", &["main"]);
    repo.create_branch("feature", Some("main"));

    // main only exists under upstream.
    assert_eq!(
        resolve_base_branch(repo.root_path(), "feature", "origin"),
        base("upstream", "main")
    );
}

#[rstest]
fn test_tracking_config(repo: TestRepo) {
    repo.create_branch("develop", None);
    repo.create_branch("feature", None);
    repo.commit("feature work");
    repo.clear_reflogs();
    repo.set_config("branch.feature.merge", "refs/heads/develop");

    let resolver = BranchResolver::at(repo.root_path());
    assert_eq!(
        resolver.evaluate(Strategy::Reflog, "feature", "origin"),
        Evidence::NoEvidence
    );
    assert_eq!(
        resolver.base_branch("feature", "origin"),
        base("origin", "develop")
    );
}

#[rstest]
fn test_tracking_config_uses_configured_remote(repo: TestRepo) {
    repo.add_remote("upstream");
    repo.create_branch("feature", None);
    repo.clear_reflogs();
    repo.set_config("branch.feature.remote", "upstream");
    repo.set_config("branch.feature.merge", "refs/heads/release/2.0");

    assert_eq!(
        resolve_base_branch(repo.root_path(), "feature", "origin"),
        base("upstream", "release/2.0")
    );
}

#[rstest]
fn test_tracking_config_pointing_at_itself_is_ignored(repo: TestRepo) {
    repo.create_branch("feature", None);
    repo.commit("feature work");
    repo.clear_reflogs();
    repo.set_config("branch.feature.merge", "refs/heads/feature");

    let resolver = BranchResolver::at(repo.root_path());
    assert_eq!(
        resolver.evaluate(Strategy::TrackingConfig, "feature", "origin"),
        Evidence::NoEvidence
    );
    // Falls through to ancestry.
    assert_eq!(
        resolver.base_branch("feature", "origin"),
        base("origin", "main")
    );
}

#[rstest]
fn test_merge_base_picks_nearest_ancestor(repo: TestRepo) {
    repo.create_branch("develop", None);
    repo.commit("develop work");
    repo.create_branch("feature", None);
    repo.commit("feature work");
    repo.clear_reflogs();

    assert_eq!(
        resolve_base_branch(repo.root_path(), "feature", "origin"),
        base("origin", "develop")
    );
}

#[rstest]
fn test_merge_base_finds_base_that_moved_on(repo: TestRepo) {
    repo.create_branch("feature", Some("main"));
    repo.commit("feature work");
    repo.checkout("main");
    repo.commit("main moved on");
    repo.checkout("feature");
    repo.clear_reflogs();

    let resolver = BranchResolver::at(repo.root_path());
    assert_eq!(
        resolver.evaluate(Strategy::MergeBase, "feature", "origin"),
        Evidence::Found(BaseBranch::new("origin", "main"))
    );
    assert_eq!(
        resolver.base_branch("feature", "origin"),
        base("origin", "main")
    );
}

#[rstest]
fn test_merge_base_prefers_nearest_base_after_it_moved_on(repo: TestRepo) {
    repo.create_branch("develop", None);
    repo.commit("develop work");
    repo.create_branch("feature", None);
    repo.commit("feature work");
    repo.checkout("develop");
    repo.commit("develop moved on");
    repo.checkout("feature");
    repo.clear_reflogs();

    // develop has moved on but still descends from main, so it wins the fold.
    let resolver = BranchResolver::at(repo.root_path());
    assert_eq!(
        resolver.evaluate(Strategy::MergeBase, "feature", "origin"),
        Evidence::Found(BaseBranch::new("origin", "develop"))
    );
}

#[rstest]
fn test_merge_base_diverged_candidates_are_ambiguous(repo: TestRepo) {
    repo.create_branch("develop", None);
    repo.commit("develop work");
    repo.create_branch("feature", None);
    repo.commit("feature work");
    repo.checkout("main");
    repo.commit("main moved on");
    repo.checkout("feature");
    repo.clear_reflogs();

    // main no longer contains develop, and develop lacks main's new commit.
    let resolver = BranchResolver::at(repo.root_path());
    assert_eq!(
        resolver.evaluate(Strategy::MergeBase, "feature", "origin"),
        Evidence::Ambiguous { survivors: 2 }
    );
}

#[rstest]
fn test_unrelated_candidates_are_unresolved(repo: TestRepo) {
    repo.create_branch("topic-a", None);
    repo.commit("topic a");
    repo.checkout("main");
    repo.create_branch("topic-b", None);
    repo.commit("topic b");
    repo.create_branch("feature", Some("topic-a"));
    repo.run_git(&["merge", "-q", "--no-edit", "topic-b"]);
    repo.commit("feature work");
    repo.clear_reflogs();

    let resolver = BranchResolver::at(repo.root_path());
    assert_eq!(
        resolver.evaluate(Strategy::MergeBase, "feature", "origin"),
        Evidence::Ambiguous { survivors: 2 }
    );
    assert_eq!(resolver.base_branch("feature", "origin"), None);
}

#[rstest]
fn test_no_evidence_is_unresolved(repo: TestRepo) {
    repo.create_branch("feature", None);
    repo.clear_reflogs();

    // Same commit as main: no commits of its own, no config, no reflog.
    assert_eq!(
        resolve_base_branch(repo.root_path(), "feature", "origin"),
        None
    );
    assert_eq!(resolve_base_branch(repo.root_path(), "main", "origin"), None);
}

#[rstest]
fn test_remote_only_candidate(repo: TestRepo) {
    repo.add_remote("origin");
    repo.create_branch("release", None);
    repo.commit("release prep");
    repo.push("origin", &["main", "release"]);
    repo.create_branch("feature", None);
    repo.commit("feature work");
    repo.run_git(&["branch", "-q", "-D", "release"]);
    repo.clear_reflogs();

    assert_eq!(
        resolve_base_branch(repo.root_path(), "feature", "origin"),
        base("origin", "release")
    );
}

#[rstest]
#[case::branch_injection("main; rm -rf /", "origin")]
#[case::option_like_branch("--all", "origin")]
#[case::bad_remote("feature", "../origin")]
fn test_invalid_names_resolve_to_none(repo: TestRepo, #[case] branch: &str, #[case] remote: &str) {
    assert_eq!(resolve_base_branch(repo.root_path(), branch, remote), None);
}

#[rstest]
fn test_resolution_is_read_only(repo: TestRepo) {
    repo.create_branch("feature", Some("main"));
    repo.commit("feature work");
    let refs_before = repo.git_output(&["for-each-ref"]);
    let config_before = repo.git_output(&["config", "--local", "--list"]);

    resolve_base_branch(repo.root_path(), "feature", "origin");

    assert_eq!(repo.git_output(&["for-each-ref"]), refs_before);
    assert_eq!(
        repo.git_output(&["config", "--local", "--list"]),
        config_before
    );
}

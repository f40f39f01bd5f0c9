use std::io::Write;
use std::process::Stdio;

use rstest::rstest;
use serde_json::{Value, json};

use crate::common::{TestRepo, repo};

/// Feed `requests` to `branchwise serve`, one per line, and parse every response line.
fn serve(repo: &TestRepo, requests: &[Value]) -> Vec<Value> {
    let mut child = repo
        .branchwise_command()
        .arg("serve")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    {
        let mut stdin = child.stdin.take().unwrap();
        for request in requests {
            writeln!(stdin, "{request}").unwrap();
        }
    }

    let output = child.wait_with_output().unwrap();
    assert!(
        output.status.success(),
        "serve failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[rstest]
fn test_serve_answers_each_request_in_order(repo: TestRepo) {
    repo.create_branch("feature/x", Some("main"));
    repo.commit("change");

    let responses = serve(
        &repo,
        &[
            json!({"id": 1, "method": "current_branch"}),
            json!({"id": 2, "method": "base_branch"}),
            json!({"id": 3, "method": "diff_stat"}),
            json!({"id": 4, "method": "shutdown"}),
        ],
    );

    assert_eq!(
        responses,
        vec![
            json!({"id": 1, "result": {"branch": "feature/x"}}),
            json!({"id": 2, "result": {"remote": "origin", "branch": "main", "resolved": true}}),
            json!({"id": 3, "result": {
                "base": "main",
                "head": "feature/x",
                "files": 1,
                "insertions": 1,
                "deletions": 0
            }}),
            json!({"id": 4, "result": null}),
        ]
    );
}

#[rstest]
fn test_serve_base_branch_fallback(repo: TestRepo) {
    let responses = serve(
        &repo,
        &[
            json!({"id": "a", "method": "base_branch", "params": {"branch": "main"}}),
            json!({"id": "b", "method": "base_branch", "params": {
                "branch": "main",
                "remote": "upstream",
                "fallback": "develop"
            }}),
        ],
    );

    assert_eq!(responses[0], json!({"id": "a", "result": null}));
    assert_eq!(
        responses[1],
        json!({"id": "b", "result": {"remote": "upstream", "branch": "develop", "resolved": false}})
    );
}

#[rstest]
fn test_serve_survives_bad_requests(repo: TestRepo) {
    let mut child = repo
        .branchwise_command()
        .arg("serve")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();
    {
        let mut stdin = child.stdin.take().unwrap();
        writeln!(stdin, "not json").unwrap();
        writeln!(stdin).unwrap();
        writeln!(stdin, r#"{{"id": 1, "method": "rebase"}}"#).unwrap();
        writeln!(
            stdin,
            r#"{{"id": 2, "method": "base_branch", "params": {{"branch": "x; rm -rf /"}}}}"#
        )
        .unwrap();
        writeln!(stdin, r#"{{"id": 3, "method": "current_branch"}}"#).unwrap();
    }
    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());

    let responses: Vec<Value> = String::from_utf8(output.stdout)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(responses.len(), 4, "{responses:?}");
    assert_eq!(responses[0]["id"], Value::Null);
    assert_eq!(responses[0]["error"]["code"], -32700);
    assert_eq!(responses[1]["error"]["code"], -32601);
    assert_eq!(responses[2]["error"]["code"], -32602);
    assert_eq!(responses[3], json!({"id": 3, "result": {"branch": "main"}}));
}

#[rstest]
fn test_serve_detached_head(repo: TestRepo) {
    let sha = repo.head_sha();
    repo.run_git(&["checkout", "-q", "--detach", &sha]);

    let responses = serve(
        &repo,
        &[
            json!({"id": 1, "method": "current_branch"}),
            json!({"id": 2, "method": "base_branch"}),
        ],
    );
    assert_eq!(responses[0], json!({"id": 1, "result": {"branch": null}}));
    assert_eq!(responses[1]["error"]["code"], -32000);
    assert!(
        responses[1]["error"]["message"]
            .as_str()
            .unwrap()
            .contains("detached HEAD"),
        "{}",
        responses[1]
    );
}

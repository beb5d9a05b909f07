//! HTTP-level tests for `DevOpsClient` against a mock hosting API.

use std::time::Duration;

use devops::DevOpsClient;
use httpmock::prelude::*;
use pipeline::{
    ApiVersions, BranchName, ChangeType, CodeRepository, CommitSha, DevOpsSettings, ErrorKind,
    FileChange, HostError, PullRequestDraft, PullRequestManager, PushRequest, RepoPath, Secret,
    WorkItemId, WorkItemTracker,
};
use serde_json::json;

/// Basic auth header for an empty user name and the password `pat`.
const AUTH_HEADER: &str = "Basic OnBhdA==";
const HEAD: &str = "1111111111111111111111111111111111111111";

fn client(server: &MockServer) -> DevOpsClient {
    let settings = DevOpsSettings {
        organization_url: server.base_url(),
        project: "web".to_string(),
        repository: "scripts".to_string(),
        pat: Secret::new("pat"),
        api_versions: ApiVersions::default(),
        request_timeout: Duration::from_secs(5),
    };
    DevOpsClient::new(&settings).expect("client")
}

fn branch(name: &str) -> BranchName {
    BranchName::new(name).expect("branch name")
}

// ---------------------------------------------------------------------------
// Work items
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_work_item_combines_title_and_description() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/web/_apis/wit/workitems/42")
            .query_param("api-version", "6.0")
            .header("authorization", AUTH_HEADER);
        then.status(200).json_body(json!({
            "id": 42,
            "fields": {
                "System.Title": "Add logging",
                "System.Description": "Log every request"
            }
        }));
    });

    let item = client(&server)
        .work_item(WorkItemId::new(42))
        .await
        .expect("work item");

    mock.assert();
    assert_eq!(item.title, "Add logging");
    assert_eq!(item.summary(), "Task: Add logging\nDescription: Log every request");
}

#[tokio::test]
async fn test_work_item_without_fields_uses_defaults() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/web/_apis/wit/workitems/7");
        then.status(200).json_body(json!({ "id": 7, "fields": {} }));
    });

    let item = client(&server)
        .work_item(WorkItemId::new(7))
        .await
        .expect("work item");

    assert_eq!(item.title, "No Title");
    assert_eq!(item.description, "No Description");
}

#[tokio::test]
async fn test_work_item_rejected_credential_is_authentication_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/web/_apis/wit/workitems/42");
        then.status(401).body("unauthorized");
    });

    let err = client(&server)
        .work_item(WorkItemId::new(42))
        .await
        .unwrap_err();

    assert!(matches!(err, HostError::Authentication { .. }));
    assert_eq!(err.kind(), ErrorKind::AuthenticationFailure);
}

#[tokio::test]
async fn test_work_item_other_status_keeps_status_and_body() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/web/_apis/wit/workitems/404404");
        then.status(404)
            .body("TF401232: Work item 404404 does not exist.");
    });

    let err = client(&server)
        .work_item(WorkItemId::new(404404))
        .await
        .unwrap_err();

    match err {
        HostError::Status { status, body, .. } => {
            assert_eq!(status, 404);
            assert_eq!(body, "TF401232: Work item 404404 does not exist.");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Branches
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_latest_commit_returns_first_commit() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/web/_apis/git/repositories/scripts/commits")
            .query_param("searchCriteria.itemVersion.version", "main")
            .query_param("api-version", "7.1");
        then.status(200).json_body(json!({
            "count": 2,
            "value": [ { "commitId": HEAD }, { "commitId": "2222" } ]
        }));
    });

    let head = client(&server)
        .latest_commit(&branch("main"))
        .await
        .expect("commit");

    mock.assert();
    assert_eq!(head.as_str(), HEAD);
}

#[tokio::test]
async fn test_latest_commit_on_empty_branch_fails_fast() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET)
            .path("/web/_apis/git/repositories/scripts/commits");
        then.status(200).json_body(json!({ "count": 0, "value": [] }));
    });

    let err = client(&server)
        .latest_commit(&branch("main"))
        .await
        .unwrap_err();

    assert!(matches!(err, HostError::NoCommitsFound { ref branch } if branch.as_str() == "main"));
}

#[tokio::test]
async fn test_create_branch_posts_zero_old_object_id() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/web/_apis/git/repositories/scripts/refs")
            .query_param("api-version", "7.1")
            .json_body(json!([{
                "name": "refs/heads/feature/workitem-42",
                "oldObjectId": "0000000000000000000000000000000000000000",
                "newObjectId": HEAD
            }]));
        then.status(200).json_body(json!({
            "count": 1,
            "value": [{
                "name": "refs/heads/feature/workitem-42",
                "success": true,
                "updateStatus": "succeeded"
            }]
        }));
    });

    client(&server)
        .create_branch(
            &BranchName::for_work_item(WorkItemId::new(42)),
            &CommitSha::new(HEAD).unwrap(),
        )
        .await
        .expect("branch created");

    mock.assert();
}

#[tokio::test]
async fn test_create_branch_reports_per_ref_rejection() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST)
            .path("/web/_apis/git/repositories/scripts/refs");
        then.status(200).json_body(json!({
            "count": 1,
            "value": [{
                "name": "refs/heads/feature/workitem-42",
                "success": false,
                "updateStatus": "failedToCreateRefAlreadyExists"
            }]
        }));
    });

    let err = client(&server)
        .create_branch(&branch("feature/workitem-42"), &CommitSha::new(HEAD).unwrap())
        .await
        .unwrap_err();

    match err {
        HostError::RefRejected { name, reason } => {
            assert_eq!(name, "refs/heads/feature/workitem-42");
            assert_eq!(reason, "failedToCreateRefAlreadyExists");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_branch_head_ignores_prefix_matches() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET)
            .path("/web/_apis/git/repositories/scripts/refs")
            .query_param("filter", "heads/feature/workitem-4");
        then.status(200).json_body(json!({
            "count": 2,
            "value": [
                { "name": "refs/heads/feature/workitem-42", "objectId": "4242" },
                { "name": "refs/heads/feature/workitem-4", "objectId": HEAD }
            ]
        }));
    });

    let head = client(&server)
        .branch_head(&branch("feature/workitem-4"))
        .await
        .expect("ref lookup");

    assert_eq!(head.unwrap().as_str(), HEAD);
}

// ---------------------------------------------------------------------------
// File existence
// ---------------------------------------------------------------------------

async fn check_file_with_status(status: u16) -> Result<bool, HostError> {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET)
            .path("/web/_apis/git/repositories/scripts/items")
            .query_param("path", "/generated_scripts/script_42.java")
            .query_param("versionDescriptor.version", "feature/workitem-42");
        then.status(status).body("host body");
    });
    client(&server)
        .file_exists(
            &RepoPath::new("/generated_scripts/script_42.java").unwrap(),
            &branch("feature/workitem-42"),
        )
        .await
}

#[tokio::test]
async fn test_file_check_200_means_edit() {
    let exists = check_file_with_status(200).await.expect("check");
    assert_eq!(ChangeType::for_existing(exists), ChangeType::Edit);
}

#[tokio::test]
async fn test_file_check_404_means_add() {
    let exists = check_file_with_status(404).await.expect("check");
    assert_eq!(ChangeType::for_existing(exists), ChangeType::Add);
}

#[tokio::test]
async fn test_file_check_other_status_is_hard_failure() {
    let err = check_file_with_status(500).await.unwrap_err();
    match err {
        HostError::RepoProbe { status, body, .. } => {
            assert_eq!(status, 500);
            assert_eq!(body, "host body");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Push and pull request
// ---------------------------------------------------------------------------

fn push_request() -> PushRequest {
    PushRequest {
        branch: branch("feature/workitem-42"),
        expected_parent: CommitSha::new(HEAD).unwrap(),
        comment: "Generated script for Work Item 42 via AI Agent".to_string(),
        change: FileChange {
            path: RepoPath::new("/generated_scripts/script_42.java").unwrap(),
            change_type: ChangeType::Add,
            content: "class A {}".to_string(),
        },
    }
}

#[tokio::test]
async fn test_push_sends_single_raw_text_change() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/web/_apis/git/repositories/scripts/pushes")
            .query_param("api-version", "7.1")
            .json_body(json!({
                "refUpdates": [{
                    "name": "refs/heads/feature/workitem-42",
                    "oldObjectId": HEAD
                }],
                "commits": [{
                    "comment": "Generated script for Work Item 42 via AI Agent",
                    "changes": [{
                        "changeType": "add",
                        "item": { "path": "/generated_scripts/script_42.java" },
                        "newContent": { "content": "class A {}", "contentType": "rawtext" }
                    }]
                }]
            }));
        then.status(201).json_body(json!({
            "pushId": 9,
            "refUpdates": [{ "name": "refs/heads/feature/workitem-42", "newObjectId": "3333" }],
            "commits": [{ "commitId": "3333" }]
        }));
    });

    let head = client(&server).push(&push_request()).await.expect("push");

    mock.assert();
    assert_eq!(head.expect("reported head").as_str(), "3333");
}

#[tokio::test]
async fn test_push_created_without_commit_reads_branch_head() {
    let server = MockServer::start();
    let push = server.mock(|when, then| {
        when.method(POST)
            .path("/web/_apis/git/repositories/scripts/pushes");
        then.status(201).json_body(json!({ "pushId": 9 }));
    });
    let refs = server.mock(|when, then| {
        when.method(GET)
            .path("/web/_apis/git/repositories/scripts/refs")
            .query_param("filter", "heads/feature/workitem-42");
        then.status(200).json_body(json!({
            "count": 1,
            "value": [ { "name": "refs/heads/feature/workitem-42", "objectId": "3333" } ]
        }));
    });

    let head = client(&server).push(&push_request()).await.expect("push");

    push.assert();
    refs.assert();
    assert_eq!(head.expect("head read back").as_str(), "3333");
}

#[tokio::test]
async fn test_push_created_succeeds_when_head_cannot_be_read() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST)
            .path("/web/_apis/git/repositories/scripts/pushes");
        then.status(201).body("");
    });
    server.mock(|when, then| {
        when.method(GET).path("/web/_apis/git/repositories/scripts/refs");
        then.status(500).body("unavailable");
    });

    let head = client(&server).push(&push_request()).await.expect("push");

    assert_eq!(head, None);
}

#[tokio::test]
async fn test_push_conflict_is_reported() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST)
            .path("/web/_apis/git/repositories/scripts/pushes");
        then.status(409).body("TF401028: The reference has already been updated");
    });

    let err = client(&server).push(&push_request()).await.unwrap_err();

    assert!(matches!(err, HostError::Status { status: 409, .. }));
    assert_eq!(err.kind(), ErrorKind::ServerOrClientError);
}

#[tokio::test]
async fn test_create_pull_request() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/web/_apis/git/repositories/scripts/pullrequests")
            .query_param("api-version", "6.0")
            .json_body(json!({
                "sourceRefName": "refs/heads/feature/workitem-42",
                "targetRefName": "refs/heads/main",
                "title": "AI Generated Script for Work Item 42",
                "description": "This pull request was automatically generated by the AI Agent."
            }));
        then.status(201).json_body(json!({
            "pullRequestId": 17,
            "url": "https://dev.example.test/web/_apis/git/pullRequests/17"
        }));
    });

    let pr = client(&server)
        .create_pull_request(&PullRequestDraft {
            source: branch("feature/workitem-42"),
            target: branch("main"),
            title: "AI Generated Script for Work Item 42".to_string(),
            description: "This pull request was automatically generated by the AI Agent."
                .to_string(),
        })
        .await
        .expect("pull request");

    mock.assert();
    assert_eq!(pr.id.map(|id| id.as_u64()), Some(17));
    assert!(pr.url.expect("url").ends_with("/pullRequests/17"));
}

#[tokio::test]
async fn test_pull_request_created_without_id_still_succeeds() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/web/_apis/git/repositories/scripts/pullrequests");
        then.status(201).json_body(json!({ "url": "https://x/pr/1" }));
    });

    let pr = client(&server)
        .create_pull_request(&PullRequestDraft {
            source: branch("feature/workitem-42"),
            target: branch("main"),
            title: "AI Generated Script for Work Item 42".to_string(),
            description: String::new(),
        })
        .await
        .expect("pull request");

    mock.assert();
    assert_eq!(pr.id, None);
    assert_eq!(pr.url.as_deref(), Some("https://x/pr/1"));
}

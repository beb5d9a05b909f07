//! End-to-end runs of the work-item sequence against the in-memory fakes.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use nodes::{AutomationOptions, ScriptGenerator, WorkItemAutomation};
use pipeline::fakes::{HostOperation, MemoryDevOps, ScriptedAgent};
use pipeline::{
    AgentId, AutomationError, BranchName, ChangeType, ErrorKind, HostError, ScriptLanguage,
    Timestamp, VectorStoreId, WorkItem, WorkItemId,
};

const REPLY: &str = "Sure.\n```java\npublic class RequestLogger {}\n```";

fn devops() -> Arc<MemoryDevOps> {
    Arc::new(
        MemoryDevOps::new()
            .with_work_item(WorkItem::from_fields(
                WorkItemId::new(42),
                Some("Add logging".into()),
                Some("Log every request".into()),
            ))
            .with_branch("main", &[("/README.md", "# scripts")]),
    )
}

fn automation(devops: &Arc<MemoryDevOps>, agent: &Arc<ScriptedAgent>) -> WorkItemAutomation {
    let generator = ScriptGenerator::new(
        agent.clone(),
        AgentId::new("asst_1").unwrap(),
        VectorStoreId::new("vs_1"),
    );
    WorkItemAutomation::new(devops.clone(), devops.clone(), devops.clone(), generator)
}

fn options(output_dir: PathBuf) -> AutomationOptions {
    let mut options =
        AutomationOptions::new(WorkItemId::new(42), BranchName::new("main").unwrap());
    options.output_dir = output_dir;
    options.repository_dir = Some(PathBuf::from("generated_scripts"));
    options.timestamp = Timestamp::from_utc(Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 5).unwrap());
    options
}

#[tokio::test]
async fn test_work_item_becomes_pull_request() {
    let dir = tempfile::tempdir().unwrap();
    let devops = devops();
    let agent = Arc::new(ScriptedAgent::new().with_reply(REPLY));

    let report = automation(&devops, &agent)
        .run(&options(dir.path().join("generated_scripts")))
        .await
        .expect("automation");

    let expected_local = dir
        .path()
        .join("generated_scripts/script_42_20260301093005.java");
    assert_eq!(report.script.path, expected_local);
    assert_eq!(
        std::fs::read_to_string(&expected_local).unwrap(),
        "public class RequestLogger {}"
    );
    assert_eq!(
        report.repository_path.as_str(),
        "/generated_scripts/script_42_20260301093005.java"
    );
    assert_eq!(report.branch.as_str(), "feature/workitem-42");
    assert_eq!(report.change_type, ChangeType::Add);

    let prompt = &agent.posted()[0].content;
    assert!(prompt.contains("Task: Add logging\nDescription: Log every request"));

    let prs = devops.pull_requests();
    assert_eq!(prs.len(), 1);
    assert!(prs[0].title.contains("42"));
    assert_eq!(prs[0].source.as_str(), "feature/workitem-42");
    assert_eq!(prs[0].target.as_str(), "main");
    assert_eq!(
        devops
            .file("feature/workitem-42", "/generated_scripts/script_42_20260301093005.java")
            .as_deref(),
        Some("public class RequestLogger {}")
    );
}

#[tokio::test]
async fn test_second_run_with_file_present_edits() {
    let dir = tempfile::tempdir().unwrap();
    let devops = devops();
    let agent = Arc::new(ScriptedAgent::new().with_reply(REPLY).with_reply(
        "```java\npublic class RequestLogger { void log() {} }\n```",
    ));
    let automation = automation(&devops, &agent);
    let options = options(dir.path().join("generated_scripts"));

    automation.run(&options).await.expect("first run");
    devops.complete_merge("feature/workitem-42", "main");
    let second = automation.run(&options).await.expect("second run");

    assert_eq!(second.change_type, ChangeType::Edit);
    assert_eq!(
        devops
            .file("feature/workitem-42", "/generated_scripts/script_42_20260301093005.java")
            .as_deref(),
        Some("public class RequestLogger { void log() {} }")
    );
}

#[tokio::test]
async fn test_failed_commit_deletes_the_new_branch() {
    let dir = tempfile::tempdir().unwrap();
    let devops = devops();
    devops.fail(HostOperation::Push, 500);
    let agent = Arc::new(ScriptedAgent::new().with_reply(REPLY));

    let err = automation(&devops, &agent)
        .run(&options(dir.path().to_path_buf()))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AutomationError::Commit {
            source: HostError::Status { status: 500, .. },
            ..
        }
    ));
    assert_eq!(devops.head("feature/workitem-42"), None);
    assert!(devops.calls().contains(&HostOperation::DeleteBranch));
    assert!(devops.pull_requests().is_empty());
}

#[tokio::test]
async fn test_cleanup_disabled_keeps_the_branch() {
    let dir = tempfile::tempdir().unwrap();
    let devops = devops();
    devops.fail(HostOperation::CreatePullRequest, 400);
    let agent = Arc::new(ScriptedAgent::new().with_reply(REPLY));
    let mut options = options(dir.path().to_path_buf());
    options.cleanup_on_failure = false;

    let err = automation(&devops, &agent).run(&options).await.unwrap_err();

    assert!(matches!(err, AutomationError::PullRequest { .. }));
    assert!(devops.head("feature/workitem-42").is_some());
    assert!(!devops.calls().contains(&HostOperation::DeleteBranch));
}

#[tokio::test]
async fn test_unknown_work_item_stops_before_generation() {
    let dir = tempfile::tempdir().unwrap();
    let devops = devops();
    let agent = Arc::new(ScriptedAgent::new().with_reply(REPLY));
    let mut options = options(dir.path().to_path_buf());
    options.work_item = WorkItemId::new(7);

    let err = automation(&devops, &agent).run(&options).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(agent.calls().is_empty());
    assert_eq!(devops.calls(), vec![HostOperation::WorkItem]);
}

#[tokio::test]
async fn test_rejected_credential_is_authentication_failure() {
    let dir = tempfile::tempdir().unwrap();
    let devops = devops();
    devops.fail(HostOperation::WorkItem, 401);
    let agent = Arc::new(ScriptedAgent::new());

    let err = automation(&devops, &agent)
        .run(&options(dir.path().to_path_buf()))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::AuthenticationFailure);
}

#[tokio::test]
async fn test_missing_reply_stops_before_branch_creation() {
    let dir = tempfile::tempdir().unwrap();
    let devops = devops();
    let agent = Arc::new(ScriptedAgent::new());

    let err = automation(&devops, &agent)
        .run(&options(dir.path().to_path_buf()))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::GenerationFailure);
    assert!(!devops.calls().contains(&HostOperation::CreateBranch));
    assert_eq!(devops.head("feature/workitem-42"), None);
}

#[tokio::test]
async fn test_python_scripts_use_py_extension() {
    let dir = tempfile::tempdir().unwrap();
    let devops = devops();
    let agent = Arc::new(ScriptedAgent::new().with_reply("```python\nprint('hi')\n```"));
    let mut options = options(dir.path().to_path_buf());
    options.language = ScriptLanguage::Python;

    let report = automation(&devops, &agent).run(&options).await.unwrap();

    assert!(report.repository_path.as_str().ends_with(".py"));
    assert_eq!(report.script.content, "print('hi')");
}

//! In-memory fakes for the port traits (testing only).
//!
//! [`MemoryDevOps`] models a repository as commits with full file snapshots
//! and branches pointing at commits, which is enough to exercise add/edit
//! selection, stale-parent rejection, and branch cleanup.
//! [`ScriptedAgent`] replays canned assistant replies.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::ports::{AgentBackend, CodeRepository, PullRequestManager, WorkItemTracker};
use crate::{
    AgentBlueprint, AgentError, AgentId, BranchName, ChangeType, CommitSha, FileId, HostError,
    MessageId, MessageRole, PullRequest, PullRequestDraft, PullRequestId, PushRequest, RepoPath,
    RunId, RunOutcome, RunStatus, ThreadId, ThreadMessage, VectorStoreId, WorkItem, WorkItemId,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// MemoryDevOps
// ---------------------------------------------------------------------------

/// Operations recorded by [`MemoryDevOps`], in call order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostOperation {
    WorkItem,
    LatestCommit,
    BranchHead,
    CreateBranch,
    DeleteBranch,
    FileExists,
    Push,
    CreatePullRequest,
}

type Tree = HashMap<String, String>;

#[derive(Debug, Default)]
struct DevOpsState {
    work_items: HashMap<WorkItemId, WorkItem>,
    commits: HashMap<CommitSha, Tree>,
    branches: HashMap<BranchName, CommitSha>,
    pull_requests: Vec<PullRequestDraft>,
    failures: HashMap<HostOperation, u16>,
    omit_push_head: bool,
    calls: Vec<HostOperation>,
    next_commit: u64,
}

impl DevOpsState {
    fn new_commit(&mut self, tree: Tree) -> CommitSha {
        self.next_commit += 1;
        let sha = CommitSha::new(format!("{:040x}", self.next_commit))
            .unwrap_or_else(CommitSha::zero);
        self.commits.insert(sha.clone(), tree);
        sha
    }

    fn tree_of(&self, branch: &BranchName) -> Option<&Tree> {
        self.branches
            .get(branch)
            .and_then(|head| self.commits.get(head))
    }

    fn record(&mut self, op: HostOperation, name: &'static str) -> Result<(), HostError> {
        self.calls.push(op);
        match self.failures.get(&op).copied() {
            None => Ok(()),
            Some(401) => Err(HostError::Authentication { operation: name }),
            Some(status) => Err(HostError::Status {
                operation: name,
                status,
                body: format!("injected failure for {name}"),
            }),
        }
    }
}

/// In-memory hosting system: tracker, repository, and pull requests.
#[derive(Debug, Default)]
pub struct MemoryDevOps {
    state: Mutex<DevOpsState>,
}

impl MemoryDevOps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a work item to the tracker.
    pub fn with_work_item(self, item: WorkItem) -> Self {
        lock(&self.state).work_items.insert(item.id, item);
        self
    }

    /// Creates `branch` on a fresh commit holding `files` (`(path, content)`).
    pub fn with_branch(self, branch: &str, files: &[(&str, &str)]) -> Self {
        {
            let mut state = lock(&self.state);
            let tree = files
                .iter()
                .map(|(p, c)| (p.to_string(), c.to_string()))
                .collect();
            let head = state.new_commit(tree);
            if let Some(name) = BranchName::new(branch) {
                state.branches.insert(name, head);
            }
        }
        self
    }

    /// Makes every later call of `op` fail with `status`.
    pub fn fail(&self, op: HostOperation, status: u16) {
        lock(&self.state).failures.insert(op, status);
    }

    /// Makes pushes succeed without reporting the new head.
    pub fn omit_push_head(&self) {
        lock(&self.state).omit_push_head = true;
    }

    /// Operations issued so far.
    pub fn calls(&self) -> Vec<HostOperation> {
        lock(&self.state).calls.clone()
    }

    pub fn head(&self, branch: &str) -> Option<CommitSha> {
        let name = BranchName::new(branch)?;
        lock(&self.state).branches.get(&name).cloned()
    }

    pub fn file(&self, branch: &str, path: &str) -> Option<String> {
        let name = BranchName::new(branch)?;
        let state = lock(&self.state);
        state.tree_of(&name).and_then(|t| t.get(path).cloned())
    }

    pub fn pull_requests(&self) -> Vec<PullRequestDraft> {
        lock(&self.state).pull_requests.clone()
    }

    /// Fast-forwards `target` to `source` and deletes `source`, as a
    /// completed pull request would.
    pub fn complete_merge(&self, source: &str, target: &str) {
        let (Some(source), Some(target)) = (BranchName::new(source), BranchName::new(target))
        else {
            return;
        };
        let mut state = lock(&self.state);
        if let Some(head) = state.branches.remove(&source) {
            state.branches.insert(target, head);
        }
    }
}

#[async_trait]
impl WorkItemTracker for MemoryDevOps {
    async fn work_item(&self, id: WorkItemId) -> Result<WorkItem, HostError> {
        let mut state = lock(&self.state);
        state.record(HostOperation::WorkItem, "fetch work item")?;
        state
            .work_items
            .get(&id)
            .cloned()
            .ok_or_else(|| HostError::Status {
                operation: "fetch work item",
                status: 404,
                body: format!("work item {id} does not exist"),
            })
    }
}

#[async_trait]
impl CodeRepository for MemoryDevOps {
    async fn latest_commit(&self, branch: &BranchName) -> Result<CommitSha, HostError> {
        let mut state = lock(&self.state);
        state.record(HostOperation::LatestCommit, "fetch latest commit")?;
        state
            .branches
            .get(branch)
            .cloned()
            .ok_or_else(|| HostError::NoCommitsFound {
                branch: branch.clone(),
            })
    }

    async fn branch_head(&self, branch: &BranchName) -> Result<Option<CommitSha>, HostError> {
        let mut state = lock(&self.state);
        state.record(HostOperation::BranchHead, "read branch ref")?;
        Ok(state.branches.get(branch).cloned())
    }

    async fn create_branch(&self, branch: &BranchName, at: &CommitSha) -> Result<(), HostError> {
        let mut state = lock(&self.state);
        state.record(HostOperation::CreateBranch, "create branch")?;
        if state.branches.contains_key(branch) {
            return Err(HostError::RefRejected {
                name: branch.ref_name(),
                reason: "failed to create the ref because it already exists".into(),
            });
        }
        if !state.commits.contains_key(at) {
            return Err(HostError::RefRejected {
                name: branch.ref_name(),
                reason: format!("commit {at} does not exist"),
            });
        }
        state.branches.insert(branch.clone(), at.clone());
        Ok(())
    }

    async fn delete_branch(&self, branch: &BranchName, head: &CommitSha) -> Result<(), HostError> {
        let mut state = lock(&self.state);
        state.record(HostOperation::DeleteBranch, "delete branch")?;
        match state.branches.get(branch) {
            Some(current) if current == head => {
                state.branches.remove(branch);
                Ok(())
            }
            _ => Err(HostError::RefRejected {
                name: branch.ref_name(),
                reason: "stale object id".into(),
            }),
        }
    }

    async fn file_exists(&self, path: &RepoPath, branch: &BranchName) -> Result<bool, HostError> {
        let mut state = lock(&self.state);
        state.calls.push(HostOperation::FileExists);
        if let Some(status) = state.failures.get(&HostOperation::FileExists) {
            return Err(HostError::RepoProbe {
                path: path.clone(),
                status: *status,
                body: "injected failure for file check".into(),
            });
        }
        Ok(state
            .tree_of(branch)
            .is_some_and(|tree| tree.contains_key(path.as_str())))
    }

    async fn push(&self, push: &PushRequest) -> Result<Option<CommitSha>, HostError> {
        let mut state = lock(&self.state);
        state.record(HostOperation::Push, "push commit")?;
        let conflict = |body: String| HostError::Status {
            operation: "push commit",
            status: 409,
            body,
        };
        let head = state
            .branches
            .get(&push.branch)
            .cloned()
            .ok_or_else(|| conflict(format!("branch {} does not exist", push.branch)))?;
        if head != push.expected_parent {
            return Err(conflict(format!(
                "expected parent {} but {} is at {head}",
                push.expected_parent, push.branch
            )));
        }
        let mut tree = state.commits.get(&head).cloned().unwrap_or_default();
        let path = push.change.path.as_str().to_string();
        match (push.change.change_type, tree.contains_key(&path)) {
            (ChangeType::Add, true) => {
                return Err(conflict(format!("{path} already exists")));
            }
            (ChangeType::Edit, false) => {
                return Err(conflict(format!("{path} does not exist")));
            }
            _ => {}
        }
        tree.insert(path, push.change.content.clone());
        let new_head = state.new_commit(tree);
        state.branches.insert(push.branch.clone(), new_head.clone());
        Ok((!state.omit_push_head).then_some(new_head))
    }
}

#[async_trait]
impl PullRequestManager for MemoryDevOps {
    async fn create_pull_request(&self, draft: &PullRequestDraft) -> Result<PullRequest, HostError> {
        let mut state = lock(&self.state);
        state.record(HostOperation::CreatePullRequest, "create pull request")?;
        for branch in [&draft.source, &draft.target] {
            if !state.branches.contains_key(branch) {
                return Err(HostError::Status {
                    operation: "create pull request",
                    status: 404,
                    body: format!("branch {branch} does not exist"),
                });
            }
        }
        state.pull_requests.push(draft.clone());
        let id = state.pull_requests.len() as u64;
        Ok(PullRequest {
            id: Some(PullRequestId::new(id)),
            url: Some(format!("https://dev.example.test/pullrequests/{id}")),
        })
    }
}

// ---------------------------------------------------------------------------
// ScriptedAgent
// ---------------------------------------------------------------------------

/// A message posted to a [`ScriptedAgent`] thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedMessage {
    pub thread: ThreadId,
    pub content: String,
    pub attachments: Vec<FileId>,
}

#[derive(Debug, Default)]
struct AgentState {
    replies: VecDeque<String>,
    run_status: Option<RunStatus>,
    threads: HashMap<ThreadId, Vec<ThreadMessage>>,
    thread_stores: Vec<Option<VectorStoreId>>,
    posted: Vec<PostedMessage>,
    uploads: Vec<PathBuf>,
    vector_stores: Vec<(String, Vec<FileId>)>,
    agents: Vec<AgentBlueprint>,
    calls: Vec<&'static str>,
    clock: i64,
    next_id: u64,
}

impl AgentState {
    fn next(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}_{}", self.next_id)
    }

    fn tick(&mut self) -> i64 {
        self.clock += 1;
        self.clock
    }
}

/// Agent backend that answers each run with the next queued reply.
///
/// A run with no queued reply completes without adding an assistant message.
#[derive(Debug, Default)]
pub struct ScriptedAgent {
    state: Mutex<AgentState>,
}

impl ScriptedAgent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a reply for the next run.
    pub fn with_reply(self, reply: impl Into<String>) -> Self {
        lock(&self.state).replies.push_back(reply.into());
        self
    }

    /// Makes every run end in `status` without replying.
    pub fn with_run_status(self, status: RunStatus) -> Self {
        lock(&self.state).run_status = Some(status);
        self
    }

    pub fn posted(&self) -> Vec<PostedMessage> {
        lock(&self.state).posted.clone()
    }

    pub fn uploads(&self) -> Vec<PathBuf> {
        lock(&self.state).uploads.clone()
    }

    pub fn thread_stores(&self) -> Vec<Option<VectorStoreId>> {
        lock(&self.state).thread_stores.clone()
    }

    pub fn vector_stores(&self) -> Vec<(String, Vec<FileId>)> {
        lock(&self.state).vector_stores.clone()
    }

    pub fn agents(&self) -> Vec<AgentBlueprint> {
        lock(&self.state).agents.clone()
    }

    /// Backend methods called so far, by name.
    pub fn calls(&self) -> Vec<&'static str> {
        lock(&self.state).calls.clone()
    }
}

fn missing_thread(thread: &ThreadId) -> AgentError {
    AgentError::Status {
        operation: "thread lookup",
        status: 404,
        body: format!("no thread with id {thread}"),
    }
}

#[async_trait]
impl AgentBackend for ScriptedAgent {
    async fn create_thread(
        &self,
        vector_store: Option<&VectorStoreId>,
    ) -> Result<ThreadId, AgentError> {
        let mut state = lock(&self.state);
        state.calls.push("create_thread");
        let id = ThreadId::new(state.next("thread")).ok_or_else(|| missing_id("thread"))?;
        state.threads.insert(id.clone(), Vec::new());
        state.thread_stores.push(vector_store.cloned());
        Ok(id)
    }

    async fn post_message(
        &self,
        thread: &ThreadId,
        content: &str,
        attachments: &[FileId],
    ) -> Result<MessageId, AgentError> {
        let mut state = lock(&self.state);
        state.calls.push("post_message");
        let id = MessageId::new(state.next("msg")).ok_or_else(|| missing_id("message"))?;
        let created_at = state.tick();
        let messages = state
            .threads
            .get_mut(thread)
            .ok_or_else(|| missing_thread(thread))?;
        messages.push(ThreadMessage {
            id: id.clone(),
            thread_id: thread.clone(),
            role: MessageRole::User,
            created_at,
            assistant_id: None,
            text: content.to_string(),
        });
        state.posted.push(PostedMessage {
            thread: thread.clone(),
            content: content.to_string(),
            attachments: attachments.to_vec(),
        });
        Ok(id)
    }

    async fn run_to_completion(
        &self,
        thread: &ThreadId,
        agent: &AgentId,
    ) -> Result<RunOutcome, AgentError> {
        let mut state = lock(&self.state);
        state.calls.push("run_to_completion");
        let run = RunId::new(state.next("run")).ok_or_else(|| missing_id("run"))?;
        if !state.threads.contains_key(thread) {
            return Err(missing_thread(thread));
        }
        if let Some(status) = state.run_status {
            return Ok(RunOutcome {
                id: run,
                status,
                last_error: Some(format!("scripted status {status}")),
            });
        }
        if let Some(reply) = state.replies.pop_front() {
            let id = MessageId::new(state.next("msg")).ok_or_else(|| missing_id("message"))?;
            let created_at = state.tick();
            if let Some(messages) = state.threads.get_mut(thread) {
                messages.push(ThreadMessage {
                    id,
                    thread_id: thread.clone(),
                    role: MessageRole::Assistant,
                    created_at,
                    assistant_id: Some(agent.clone()),
                    text: reply,
                });
            }
        }
        Ok(RunOutcome {
            id: run,
            status: RunStatus::Completed,
            last_error: None,
        })
    }

    async fn list_messages(&self, thread: &ThreadId) -> Result<Vec<ThreadMessage>, AgentError> {
        let mut state = lock(&self.state);
        state.calls.push("list_messages");
        let mut messages = state
            .threads
            .get(thread)
            .cloned()
            .ok_or_else(|| missing_thread(thread))?;
        messages.reverse();
        Ok(messages)
    }

    async fn upload_file(&self, path: &Path) -> Result<FileId, AgentError> {
        let mut state = lock(&self.state);
        state.calls.push("upload_file");
        state.uploads.push(path.to_path_buf());
        FileId::new(state.next("file")).ok_or_else(|| missing_id("file"))
    }

    async fn create_vector_store(
        &self,
        name: &str,
        files: &[FileId],
    ) -> Result<VectorStoreId, AgentError> {
        let mut state = lock(&self.state);
        state.calls.push("create_vector_store");
        state.vector_stores.push((name.to_string(), files.to_vec()));
        VectorStoreId::new(state.next("vs")).ok_or_else(|| missing_id("vector store"))
    }

    async fn create_agent(&self, blueprint: &AgentBlueprint) -> Result<AgentId, AgentError> {
        let mut state = lock(&self.state);
        state.calls.push("create_agent");
        state.agents.push(blueprint.clone());
        AgentId::new(state.next("asst")).ok_or_else(|| missing_id("agent"))
    }
}

fn missing_id(what: &'static str) -> AgentError {
    AgentError::Decode {
        operation: what,
        message: "generated an empty id".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_push_rejects_stale_parent() {
        let devops = MemoryDevOps::new().with_branch("main", &[]);
        let main = BranchName::new("main").unwrap();
        let push = PushRequest {
            branch: main.clone(),
            expected_parent: CommitSha::zero(),
            comment: "c".into(),
            change: crate::FileChange {
                path: RepoPath::new("/a.txt").unwrap(),
                change_type: ChangeType::Add,
                content: "x".into(),
            },
        };
        let err = devops.push(&push).await.unwrap_err();
        assert!(matches!(err, HostError::Status { status: 409, .. }));
    }

    #[tokio::test]
    async fn test_scripted_agent_lists_newest_first() {
        let agent = ScriptedAgent::new().with_reply("hello back");
        let thread = agent.create_thread(None).await.unwrap();
        agent.post_message(&thread, "hello", &[]).await.unwrap();
        let asst = AgentId::new("asst_x").unwrap();
        agent.run_to_completion(&thread, &asst).await.unwrap();
        let messages = agent.list_messages(&thread).await.unwrap();
        assert_eq!(messages[0].role, MessageRole::Assistant);
        assert_eq!(messages[1].role, MessageRole::User);
    }
}

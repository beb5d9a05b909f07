//! Port traits implemented by the infrastructure crates.
//!
//! | Trait | Implemented by |
//! |-------|----------------|
//! | [`WorkItemTracker`] | `devops::DevOpsClient` |
//! | [`CodeRepository`] | `devops::DevOpsClient` |
//! | [`PullRequestManager`] | `devops::DevOpsClient` |
//! | [`AgentBackend`] | `agents::AgentClient` |
//!
//! In-memory implementations of all four live in [`crate::fakes`].

use std::path::Path;

use async_trait::async_trait;

use crate::{
    AgentBlueprint, AgentError, AgentId, BranchName, CommitSha, FileId, HostError, MessageId,
    PullRequest, PullRequestDraft, PushRequest, RepoPath, RunOutcome, ThreadId, ThreadMessage,
    VectorStoreId, WorkItem, WorkItemId,
};

/// Read access to the hosting system's issue tracker.
#[async_trait]
pub trait WorkItemTracker: Send + Sync {
    /// Fetches one work item. 401 maps to [`HostError::Authentication`];
    /// any other non-200 maps to [`HostError::Status`] with the body verbatim.
    async fn work_item(&self, id: WorkItemId) -> Result<WorkItem, HostError>;
}

/// Git operations on the remote repository.
#[async_trait]
pub trait CodeRepository: Send + Sync {
    /// Latest commit on `branch`. An empty history is [`HostError::NoCommitsFound`].
    async fn latest_commit(&self, branch: &BranchName) -> Result<CommitSha, HostError>;

    /// Current head of `branch` read from its ref, `None` if the ref does not exist.
    async fn branch_head(&self, branch: &BranchName) -> Result<Option<CommitSha>, HostError>;

    /// Creates `branch` pointing at `at`. Fails if the branch already exists.
    async fn create_branch(&self, branch: &BranchName, at: &CommitSha) -> Result<(), HostError>;

    /// Deletes `branch`, which must currently point at `head`.
    async fn delete_branch(&self, branch: &BranchName, head: &CommitSha) -> Result<(), HostError>;

    /// Returns whether `path` exists on `branch`: 200 is `true`, 404 is
    /// `false`, anything else is [`HostError::RepoProbe`].
    async fn file_exists(&self, path: &RepoPath, branch: &BranchName) -> Result<bool, HostError>;

    /// Pushes a single commit. Returns the new head when the host reports it
    /// or the branch ref can be read back, `None` otherwise.
    async fn push(&self, push: &PushRequest) -> Result<Option<CommitSha>, HostError>;
}

/// Pull request creation.
#[async_trait]
pub trait PullRequestManager: Send + Sync {
    async fn create_pull_request(&self, draft: &PullRequestDraft) -> Result<PullRequest, HostError>;
}

/// The hosted agent service.
///
/// A conversation is: [`create_thread`](Self::create_thread),
/// [`post_message`](Self::post_message), [`run_to_completion`](Self::run_to_completion),
/// [`list_messages`](Self::list_messages). The remaining methods provision
/// the agent and its knowledge base.
#[async_trait]
pub trait AgentBackend: Send + Sync {
    /// Opens a thread. When `vector_store` is given, the thread's file-search
    /// tool searches it.
    async fn create_thread(
        &self,
        vector_store: Option<&VectorStoreId>,
    ) -> Result<ThreadId, AgentError>;

    /// Posts a user message. Each attachment is made available to the
    /// file-search tool.
    async fn post_message(
        &self,
        thread: &ThreadId,
        content: &str,
        attachments: &[FileId],
    ) -> Result<MessageId, AgentError>;

    /// Starts a run and waits until it reaches a terminal state.
    ///
    /// Returns the outcome whatever the terminal status; callers decide
    /// whether anything other than `completed` is an error.
    async fn run_to_completion(
        &self,
        thread: &ThreadId,
        agent: &AgentId,
    ) -> Result<RunOutcome, AgentError>;

    /// All messages in the thread.
    async fn list_messages(&self, thread: &ThreadId) -> Result<Vec<ThreadMessage>, AgentError>;

    /// Uploads a local file for use by agents and waits until it is processed.
    async fn upload_file(&self, path: &Path) -> Result<FileId, AgentError>;

    /// Creates a vector store over `files` and waits until indexing finishes.
    async fn create_vector_store(
        &self,
        name: &str,
        files: &[FileId],
    ) -> Result<VectorStoreId, AgentError>;

    /// Creates an agent with a file-search tool bound to the blueprint's store.
    async fn create_agent(&self, blueprint: &AgentBlueprint) -> Result<AgentId, AgentError>;
}

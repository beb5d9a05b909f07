//! Shared value types for the automation domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! records that flow between the work-item reader, the script generator, and
//! the repository mutator. All of them are transient: they live for the
//! duration of one run and are never persisted by this workspace.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    AgentId, BranchName, CommitSha, MessageId, PullRequestId, RepoPath, RunId, ThreadId,
    VectorStoreId, WorkItemId,
};

// ---------------------------------------------------------------------------
// Work items
// ---------------------------------------------------------------------------

/// Title used when the tracker returns a work item without `System.Title`.
pub const DEFAULT_TITLE: &str = "No Title";

/// Description used when the tracker returns a work item without
/// `System.Description`.
pub const DEFAULT_DESCRIPTION: &str = "No Description";

/// A task read from the hosting system's tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: WorkItemId,
    pub title: String,
    pub description: String,
}

impl WorkItem {
    /// Builds a work item from optional tracker fields, substituting the
    /// defaults for missing values.
    pub fn from_fields(id: WorkItemId, title: Option<String>, description: Option<String>) -> Self {
        Self {
            id,
            title: title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            description: description.unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
        }
    }

    /// The text handed to the agent: title and description on two lines.
    pub fn summary(&self) -> String {
        format!("Task: {}\nDescription: {}", self.title, self.description)
    }
}

// ---------------------------------------------------------------------------
// Generated scripts
// ---------------------------------------------------------------------------

/// Target language of a generated or refactored script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptLanguage {
    Java,
    Python,
}

impl ScriptLanguage {
    /// Human-readable name used inside prompts.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Java => "Java",
            Self::Python => "Python",
        }
    }

    /// Info string that tags a fenced code block in agent replies.
    pub fn fence_tag(self) -> &'static str {
        match self {
            Self::Java => "java",
            Self::Python => "python",
        }
    }

    /// File extension (without the dot) for saved scripts.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Java => "java",
            Self::Python => "py",
        }
    }
}

impl std::fmt::Display for ScriptLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.fence_tag())
    }
}

impl std::str::FromStr for ScriptLanguage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "java" => Ok(Self::Java),
            "python" | "py" => Ok(Self::Python),
            other => Err(format!("unsupported script language '{other}'")),
        }
    }
}

/// Extracted script text and the local path it was written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedScript {
    pub path: PathBuf,
    pub content: String,
}

/// Local path for a freshly generated script:
/// `{output_dir}/script_{id}_{YYYYmmddHHMMSS}.{ext}`.
pub fn generated_script_path(
    output_dir: &Path,
    id: WorkItemId,
    language: ScriptLanguage,
    at: Timestamp,
) -> PathBuf {
    output_dir.join(format!(
        "script_{id}_{}.{}",
        at.file_stamp(),
        language.extension()
    ))
}

// ---------------------------------------------------------------------------
// Repository changes
// ---------------------------------------------------------------------------

/// Whether a push adds a new file or edits an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Add,
    Edit,
}

impl ChangeType {
    /// Selects the change type from the result of an existence check.
    pub fn for_existing(exists: bool) -> Self {
        if exists {
            Self::Edit
        } else {
            Self::Add
        }
    }
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Add => f.write_str("add"),
            Self::Edit => f.write_str("edit"),
        }
    }
}

/// One file change inside a push. Content is sent verbatim as raw text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: RepoPath,
    pub change_type: ChangeType,
    pub content: String,
}

/// A single-commit push to one branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushRequest {
    /// Branch receiving the commit.
    pub branch: BranchName,
    /// Object id the host must see as the branch's current head.
    pub expected_parent: CommitSha,
    /// Commit message.
    pub comment: String,
    pub change: FileChange,
}

/// Pull request to be opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestDraft {
    pub source: BranchName,
    pub target: BranchName,
    pub title: String,
    pub description: String,
}

/// A pull request as reported by the host after creation.
///
/// The creation status alone proves the pull request exists; the identifier
/// and URL are whatever the response body carried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub id: Option<PullRequestId>,
    pub url: Option<String>,
}

impl std::fmt::Display for PullRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.url, self.id) {
            (Some(url), _) => f.write_str(url),
            (None, Some(id)) => write!(f, "pull request {id}"),
            (None, None) => f.write_str("pull request"),
        }
    }
}

// ---------------------------------------------------------------------------
// Agent conversations
// ---------------------------------------------------------------------------

/// Author of a thread message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    #[serde(other)]
    Other,
}

/// A message read back from a thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub id: MessageId,
    pub thread_id: ThreadId,
    pub role: MessageRole,
    /// Creation time in seconds since the Unix epoch.
    pub created_at: i64,
    pub assistant_id: Option<AgentId>,
    /// Value of the first text content element; empty when there is none.
    pub text: String,
}

/// Returns the most recent assistant message, or `None` if the agent never
/// replied. Ties on `created_at` resolve to the earlier position in `messages`.
pub fn latest_assistant_reply(messages: &[ThreadMessage]) -> Option<&ThreadMessage> {
    messages
        .iter()
        .filter(|m| m.role == MessageRole::Assistant)
        .reduce(|best, m| if m.created_at > best.created_at { m } else { best })
}

/// One assistant reply as printed by the `chat` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentReply {
    pub message_id: MessageId,
    pub created_at: i64,
    pub assistant_id: Option<AgentId>,
    pub thread_id: ThreadId,
    pub response: String,
}

impl From<&ThreadMessage> for AgentReply {
    fn from(message: &ThreadMessage) -> Self {
        Self {
            message_id: message.id.clone(),
            created_at: message.created_at,
            assistant_id: message.assistant_id.clone(),
            thread_id: message.thread_id.clone(),
            response: message.text.clone(),
        }
    }
}

/// Lifecycle state of an agent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Expired,
    Incomplete,
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    /// Returns `true` once the run can no longer change state on its own.
    ///
    /// `RequiresAction` counts as terminal: this workspace registers no
    /// client-side tools, so nothing would ever submit the tool outputs.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::RequiresAction
                | Self::Cancelled
                | Self::Failed
                | Self::Completed
                | Self::Expired
                | Self::Incomplete
        )
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::RequiresAction => "requires_action",
            Self::Cancelling => "cancelling",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
            Self::Completed => "completed",
            Self::Expired => "expired",
            Self::Incomplete => "incomplete",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Final state of a run after the backend stopped processing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub id: RunId,
    pub status: RunStatus,
    /// Error message reported by the service for failed runs.
    pub last_error: Option<String>,
}

/// Everything needed to create an agent bound to a coding-standards store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentBlueprint {
    /// Model deployment name on the agent service.
    pub model: String,
    pub name: String,
    pub instructions: String,
    pub vector_store: VectorStoreId,
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a [`Timestamp`] from a [`DateTime<Utc>`].
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }

    /// Compact form used in generated file names, e.g. `20250301143000`.
    pub fn file_stamp(self) -> String {
        self.0.format("%Y%m%d%H%M%S").to_string()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

//! Error taxonomy shared by every remote-call wrapper and orchestration step.
//!
//! Each component has its own `thiserror` enum ([`HostError`] for the hosting
//! REST API, [`AgentError`] for the agent service, [`GenerationError`] for the
//! script generator, [`AutomationError`] for the orchestration sequence).
//! All of them map onto the single [`ErrorKind`] classification so callers can
//! branch on *what went wrong* without matching every variant.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ConfigError;
use crate::{BranchName, FileId, RepoPath, RunId, RunStatus, ThreadId, VectorStoreId, WorkItemId};

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Coarse classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A required credential or identifier is absent or malformed.
    ConfigurationMissing,
    /// A remote API rejected the credential (HTTP 401).
    AuthenticationFailure,
    /// The requested remote resource (branch, file, work item) does not exist.
    NotFound,
    /// Any other non-success response, transport failure, or malformed body.
    ServerOrClientError,
    /// The agent produced no usable reply or its run did not complete.
    GenerationFailure,
    /// Reading or writing a local file failed.
    LocalIo,
    /// An operation was attempted out of order.
    InvalidTransition,
}

fn kind_for_status(status: u16) -> ErrorKind {
    match status {
        401 => ErrorKind::AuthenticationFailure,
        404 => ErrorKind::NotFound,
        _ => ErrorKind::ServerOrClientError,
    }
}

// ---------------------------------------------------------------------------
// Hosting REST API
// ---------------------------------------------------------------------------

/// Failures from the hosting REST API (work items, refs, pushes, pull requests).
#[derive(Debug, Error)]
pub enum HostError {
    /// The personal access token was rejected.
    #[error("{operation}: authentication failed, check the personal access token's permissions")]
    Authentication { operation: &'static str },

    /// The host answered with an unexpected status. Body is kept verbatim.
    #[error("{operation}: unexpected status {status}: {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },

    /// The base branch has no commits (or does not exist).
    #[error("no commits found in branch '{branch}'")]
    NoCommitsFound { branch: BranchName },

    /// The existence check returned something other than 200 or 404.
    #[error("failed to check whether '{path}' exists: status {status}: {body}")]
    RepoProbe {
        path: RepoPath,
        status: u16,
        body: String,
    },

    /// The host accepted the request but refused the ref update itself
    /// (e.g. the branch already exists).
    #[error("ref update for '{name}' rejected: {reason}")]
    RefRejected { name: String, reason: String },

    #[error("{operation}: request failed: {message}")]
    Transport {
        operation: &'static str,
        message: String,
    },

    #[error("{operation}: malformed response: {message}")]
    Decode {
        operation: &'static str,
        message: String,
    },
}

impl HostError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Authentication { .. } => ErrorKind::AuthenticationFailure,
            Self::Status { status, .. } => kind_for_status(*status),
            Self::NoCommitsFound { .. } => ErrorKind::NotFound,
            Self::RepoProbe { .. }
            | Self::RefRejected { .. }
            | Self::Transport { .. }
            | Self::Decode { .. } => ErrorKind::ServerOrClientError,
        }
    }
}

// ---------------------------------------------------------------------------
// Agent service
// ---------------------------------------------------------------------------

/// Failures from the agent service (threads, runs, files, vector stores).
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("{operation}: the agent service rejected the access token")]
    Authentication { operation: &'static str },

    #[error("{operation}: unexpected status {status}: {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },

    /// The run reached a terminal state other than `completed`.
    #[error("run {run} ended with status '{status}'{}", describe_last_error(.last_error))]
    RunNotCompleted {
        run: RunId,
        status: RunStatus,
        last_error: Option<String>,
    },

    /// Vector-store indexing finished without processing every file.
    #[error("vector store {vector_store} finished indexing with status '{status}'")]
    IndexingFailed {
        vector_store: VectorStoreId,
        status: String,
    },

    /// The service could not process an uploaded file.
    #[error("file {file} could not be processed: {reason}")]
    UploadFailed { file: FileId, reason: String },

    /// Polling gave up before the backend reached a terminal state.
    #[error("{operation}: gave up after waiting {waited:?}")]
    Timeout {
        operation: &'static str,
        waited: Duration,
    },

    /// A local file to upload could not be read.
    #[error("cannot read {} for upload: {message}", .path.display())]
    LocalFile { path: PathBuf, message: String },

    #[error("{operation}: request failed: {message}")]
    Transport {
        operation: &'static str,
        message: String,
    },

    #[error("{operation}: malformed response: {message}")]
    Decode {
        operation: &'static str,
        message: String,
    },
}

impl AgentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Authentication { .. } => ErrorKind::AuthenticationFailure,
            Self::Status { status, .. } => kind_for_status(*status),
            Self::RunNotCompleted { .. }
            | Self::IndexingFailed { .. }
            | Self::UploadFailed { .. }
            | Self::Timeout { .. } => {
                ErrorKind::GenerationFailure
            }
            Self::LocalFile { .. } => ErrorKind::LocalIo,
            Self::Transport { .. } | Self::Decode { .. } => ErrorKind::ServerOrClientError,
        }
    }
}

fn describe_last_error(last_error: &Option<String>) -> String {
    last_error
        .as_deref()
        .map(|e| format!(": {e}"))
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Script generation
// ---------------------------------------------------------------------------

/// Failures of the generate / refactor / chat / provision flows.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// The run completed but the thread holds no assistant message.
    #[error("agent produced no assistant message in thread {thread}")]
    NoAssistantMessage { thread: ThreadId },

    /// An input file the flow depends on does not exist locally.
    #[error("the file {} does not exist", .path.display())]
    FileNotFound { path: PathBuf },

    #[error("i/o error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl GenerationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Agent(e) => e.kind(),
            Self::NoAssistantMessage { .. } => ErrorKind::GenerationFailure,
            Self::FileNotFound { .. } => ErrorKind::NotFound,
            Self::Io { .. } => ErrorKind::LocalIo,
        }
    }
}

// ---------------------------------------------------------------------------
// Orchestration
// ---------------------------------------------------------------------------

/// Errors that stop the orchestration sequence.
///
/// Each variant names the step that failed; the wrapped component error
/// carries the detail.
#[derive(Debug, Error)]
pub enum AutomationError {
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    #[error("failed to fetch work item {id}: {source}")]
    WorkItem {
        id: WorkItemId,
        #[source]
        source: HostError,
    },

    #[error("script generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("branch creation failed for '{branch}': {source}")]
    Branch {
        branch: BranchName,
        #[source]
        source: HostError,
    },

    #[error("commit to '{branch}' failed: {source}")]
    Commit {
        branch: BranchName,
        #[source]
        source: HostError,
    },

    #[error("pull request from '{branch}' failed: {source}")]
    PullRequest {
        branch: BranchName,
        #[source]
        source: HostError,
    },

    /// The generated script's path has no repository equivalent.
    #[error("cannot map {} to a repository path", .path.display())]
    UnmappablePath { path: PathBuf },

    /// A repository operation was requested in the wrong state.
    #[error("cannot {operation} while the repository is in state '{state}'")]
    InvalidTransition {
        operation: &'static str,
        state: &'static str,
    },
}

impl AutomationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::ConfigurationMissing,
            Self::WorkItem { source, .. }
            | Self::Branch { source, .. }
            | Self::Commit { source, .. }
            | Self::PullRequest { source, .. } => source.kind(),
            Self::Generation(e) => e.kind(),
            Self::UnmappablePath { .. } => ErrorKind::LocalIo,
            Self::InvalidTransition { .. } => ErrorKind::InvalidTransition,
        }
    }
}

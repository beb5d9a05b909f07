//! Core domain for Scriptwright.
//!
//! This crate contains every domain concept, newtype identifier, value type,
//! error type, and port trait used by the work-item automation. Infrastructure
//! crates implement the traits defined here; they never add domain rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate performs no network I/O.
//! It defines *what* is needed; infrastructure crates define *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`WorkItemId`, `BranchName`, `ThreadId`, etc.) |
//! | [`types`] | Shared value types (`WorkItem`, `PushRequest`, `ThreadMessage`, etc.) |
//! | [`errors`] | Error taxonomy and the shared [`ErrorKind`] classification |
//! | [`config`] | Environment-backed configuration, validated once |
//! | [`ports`] | Traits implemented by the `devops` and `agents` crates |
//! | [`extraction`] | Code-fence extraction from agent replies |
//! | [`prompts`] | Fixed prompt, commit, and pull-request texts |
//! | [`fakes`] | In-memory port implementations for tests |

pub mod config;
pub mod errors;
pub mod extraction;
pub mod fakes;
pub mod identifiers;
pub mod ports;
pub mod prompts;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use config::{
    AgentSettings, ApiVersions, AutomationConfig, CommitParent, ConfigError, DevOpsSettings,
    ProjectConnection, Secret,
};
pub use errors::{AgentError, AutomationError, ErrorKind, GenerationError, HostError};
pub use extraction::extract_code;
pub use identifiers::{
    AgentId, AutomationRunId, BranchName, CommitSha, FileId, MessageId, PullRequestId, RepoPath,
    RunId, ThreadId, VectorStoreId, WorkItemId,
};
pub use ports::{AgentBackend, CodeRepository, PullRequestManager, WorkItemTracker};
pub use types::{
    generated_script_path, latest_assistant_reply, AgentBlueprint, AgentReply, ChangeType,
    FileChange, GeneratedScript, MessageRole, PullRequest, PullRequestDraft, PushRequest,
    RunOutcome, RunStatus, ScriptLanguage, ThreadMessage, Timestamp, WorkItem,
};

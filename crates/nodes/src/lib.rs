//! Scriptwright orchestration.
//!
//! Sequences calls between the domain rules in the [`pipeline`] crate and
//! the port traits implemented by the infrastructure crates.
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** Every type here receives its ports as
//! `Arc<dyn …>` and contains no transport code. Tests drive it with the
//! fakes in [`pipeline::fakes`].
//!
//! | Type | Command | Flow |
//! |------|---------|------|
//! | [`WorkItemAutomation`] | `run` | work item → script → branch → commit → pull request |
//! | [`ScriptGenerator`] | `run` | thread → prompt → run → latest reply → extract → save |
//! | [`RepositoryMutator`] | `run` | guarded `NoBranch → BranchCreated → Committed → PullRequestOpened` |
//! | [`ScriptRefactorer`] | `refactor` | upload → thread → prompt with attachment → extract → save |
//! | [`AgentChat`] | `chat` | thread → question → every assistant reply |
//! | [`AgentProvisioner`] | `setup-agent` | upload standards → vector store → agent |

mod automation;
mod chat;
mod conversation;
mod generator;
mod provision;
mod refactor;
mod repository;

pub use automation::{AutomationOptions, AutomationReport, WorkItemAutomation, DEFAULT_OUTPUT_DIR};
pub use chat::AgentChat;
pub use generator::ScriptGenerator;
pub use provision::{AgentProvisioner, ProvisionRequest, Provisioned};
pub use refactor::ScriptRefactorer;
pub use repository::{RepositoryMutator, RepositoryState};

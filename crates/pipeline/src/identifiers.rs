//! Newtype domain identifiers.
//!
//! Every concept that has an identity is a distinct newtype wrapping a
//! primitive. This prevents accidentally interchanging, for example, a
//! [`ThreadId`] with an [`AgentId`] even though both are strings on the wire.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.trim().is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Macro for u64-wrapped newtypes (host-assigned integers).
// Generates: struct (Copy), new(), as_u64(), Display, FromStr.
// ---------------------------------------------------------------------------
macro_rules! u64_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(u64);

        impl $name {
            /// Creates a new identifier from a raw integer.
            pub fn new(value: u64) -> Self {
                Self(value)
            }

            /// Returns the underlying integer value.
            pub fn as_u64(self) -> u64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse::<u64>().map(Self)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Identifiers: host-integer-backed
// ---------------------------------------------------------------------------

u64_id! {
    /// Identifies a work item in the hosting system's tracker.
    WorkItemId
}

u64_id! {
    /// Identifies a pull request created by the repository mutator.
    PullRequestId
}

// ---------------------------------------------------------------------------
// Identifiers: UUID-backed (internally generated)
// ---------------------------------------------------------------------------

/// Identifies a single automation run (one CLI invocation).
///
/// Attached to the root tracing span so every log line of a run can be
/// correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AutomationRunId(Uuid);

impl AutomationRunId {
    /// Generates a new random run identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying [`Uuid`].
    pub fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for AutomationRunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Identifiers: String-backed (Git names)
// ---------------------------------------------------------------------------

string_id! {
    /// A Git branch name without the `refs/heads/` prefix (e.g. `"main"`,
    /// `"feature/workitem-42"`).
    BranchName
}

impl BranchName {
    /// The feature branch a work item's generated script is committed to.
    pub fn for_work_item(id: WorkItemId) -> Self {
        Self(format!("feature/workitem-{id}"))
    }

    /// Fully-qualified ref name, e.g. `refs/heads/main`.
    pub fn ref_name(&self) -> String {
        format!("refs/heads/{}", self.0)
    }
}

string_id! {
    /// A Git commit SHA (40-character lowercase hex string).
    CommitSha
}

impl CommitSha {
    /// The all-zero object id the host uses for "no commit" in ref updates.
    pub fn zero() -> Self {
        Self("0".repeat(40))
    }

    /// Returns `true` for the all-zero object id.
    pub fn is_zero(&self) -> bool {
        self.0.bytes().all(|b| b == b'0')
    }
}

string_id! {
    /// A path inside the remote repository, always starting with `/`.
    RepoPath
}

impl RepoPath {
    /// Builds a repository path from a local relative path.
    ///
    /// Platform separators become `/` and a leading `/` is added.
    pub fn from_relative(path: &std::path::Path) -> Option<Self> {
        let joined = path
            .components()
            .filter_map(|c| match c {
                std::path::Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/");
        Self::new(format!("/{joined}")).filter(|p| p.as_str() != "/")
    }
}

// ---------------------------------------------------------------------------
// Identifiers: String-backed (agent service)
// ---------------------------------------------------------------------------

string_id! {
    /// Identifies a hosted agent (the service calls it an assistant).
    AgentId
}

string_id! {
    /// Identifies a server-side conversation thread.
    ThreadId
}

string_id! {
    /// Identifies a message within a thread.
    MessageId
}

string_id! {
    /// Identifies one execution of an agent against a thread.
    RunId
}

string_id! {
    /// Identifies a file uploaded to the agent service.
    FileId
}

string_id! {
    /// Identifies a vector store used by the file-search tool.
    VectorStoreId
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_branch_name_for_work_item() {
        let branch = BranchName::for_work_item(WorkItemId::new(42));
        assert_eq!(branch.as_str(), "feature/workitem-42");
        assert_eq!(branch.ref_name(), "refs/heads/feature/workitem-42");
    }

    #[test]
    fn test_empty_string_ids_are_rejected() {
        assert!(AgentId::new("").is_none());
        assert!(AgentId::new("   ").is_none());
        assert!(AgentId::new("asst_1").is_some());
    }

    #[test]
    fn test_zero_commit() {
        let zero = CommitSha::zero();
        assert_eq!(zero.as_str().len(), 40);
        assert!(zero.is_zero());
        assert!(!CommitSha::new("abc123").unwrap().is_zero());
    }

    #[test]
    fn test_repo_path_from_relative() {
        let path = RepoPath::from_relative(Path::new("generated_scripts/script_42.java")).unwrap();
        assert_eq!(path.as_str(), "/generated_scripts/script_42.java");

        let dotted = RepoPath::from_relative(Path::new("./out/a.py")).unwrap();
        assert_eq!(dotted.as_str(), "/out/a.py");

        assert!(RepoPath::from_relative(Path::new("")).is_none());
    }

    #[test]
    fn test_work_item_id_parses() {
        let id: WorkItemId = " 42 ".parse().unwrap();
        assert_eq!(id.as_u64(), 42);
        assert!("forty-two".parse::<WorkItemId>().is_err());
    }
}

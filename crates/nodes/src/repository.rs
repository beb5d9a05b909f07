//! Remote repository mutation as an explicit state machine.
//!
//! ```text
//! NoBranch ──create_branch──▶ BranchCreated ──commit_script──▶ Committed
//!                                                                 │
//!                               PullRequestOpened ◀──create_pull_request
//! ```
//!
//! Each operation checks the current state first and fails with
//! [`AutomationError::InvalidTransition`] without touching the host when
//! called out of order. [`RepositoryMutator::rollback`] deletes the branch
//! created by this mutator, and is a no-op in any other state. The host may
//! accept a push without naming the new commit, so the head recorded after a
//! commit is optional and rollback reads the branch ref again before deleting.

use std::sync::Arc;

use pipeline::{
    AutomationError, BranchName, ChangeType, CodeRepository, CommitParent, CommitSha,
    FileChange, PullRequest, PullRequestDraft, PullRequestManager, PushRequest, RepoPath,
};
use tracing::{error, info, instrument, warn};

/// Where the mutator is in its sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryState {
    NoBranch,
    BranchCreated { head: CommitSha },
    Committed { head: Option<CommitSha>, change: ChangeType },
    PullRequestOpened { pull_request: PullRequest },
}

impl RepositoryState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::NoBranch => "no branch",
            Self::BranchCreated { .. } => "branch created",
            Self::Committed { .. } => "committed",
            Self::PullRequestOpened { .. } => "pull request opened",
        }
    }

    fn owns_branch(&self) -> bool {
        matches!(self, Self::BranchCreated { .. } | Self::Committed { .. })
    }

    /// Last head recorded for the owned feature branch, if known.
    fn recorded_head(&self) -> Option<&CommitSha> {
        match self {
            Self::BranchCreated { head } => Some(head),
            Self::Committed { head, .. } => head.as_ref(),
            Self::NoBranch | Self::PullRequestOpened { .. } => None,
        }
    }
}

/// Creates one feature branch, commits one file to it and opens one pull
/// request back to the base branch.
pub struct RepositoryMutator {
    repository: Arc<dyn CodeRepository>,
    pull_requests: Arc<dyn PullRequestManager>,
    base: BranchName,
    branch: BranchName,
    commit_parent: CommitParent,
    state: RepositoryState,
}

impl RepositoryMutator {
    pub fn new(
        repository: Arc<dyn CodeRepository>,
        pull_requests: Arc<dyn PullRequestManager>,
        base: BranchName,
        branch: BranchName,
        commit_parent: CommitParent,
    ) -> Self {
        Self {
            repository,
            pull_requests,
            base,
            branch,
            commit_parent,
            state: RepositoryState::NoBranch,
        }
    }

    pub fn state(&self) -> &RepositoryState {
        &self.state
    }

    pub fn branch(&self) -> &BranchName {
        &self.branch
    }

    fn invalid(&self, operation: &'static str) -> AutomationError {
        AutomationError::InvalidTransition {
            operation,
            state: self.state.name(),
        }
    }

    /// Creates the feature branch at the base branch's latest commit.
    #[instrument(skip(self), fields(base = %self.base, branch = %self.branch))]
    pub async fn create_branch(&mut self) -> Result<CommitSha, AutomationError> {
        if self.state != RepositoryState::NoBranch {
            return Err(self.invalid("create a branch"));
        }
        let wrap = |source| AutomationError::Branch {
            branch: self.branch.clone(),
            source,
        };
        let head = self
            .repository
            .latest_commit(&self.base)
            .await
            .map_err(wrap)?;
        self.repository
            .create_branch(&self.branch, &head)
            .await
            .map_err(wrap)?;
        info!(commit = %head, "Created branch '{}' from '{}'", self.branch, self.base);
        self.state = RepositoryState::BranchCreated { head: head.clone() };
        Ok(head)
    }

    /// Probes the feature branch for `path`: present means edit, absent means add.
    #[instrument(skip(self), fields(branch = %self.branch))]
    pub async fn check_file_exists(&self, path: &RepoPath) -> Result<ChangeType, AutomationError> {
        if !matches!(self.state, RepositoryState::BranchCreated { .. }) {
            return Err(self.invalid("check for a file"));
        }
        let exists = self
            .repository
            .file_exists(path, &self.branch)
            .await
            .map_err(|source| AutomationError::Commit {
                branch: self.branch.clone(),
                source,
            })?;
        Ok(ChangeType::for_existing(exists))
    }

    /// Pushes `content` to `path` on the feature branch as a single commit.
    ///
    /// The change type comes from [`check_file_exists`](Self::check_file_exists).
    /// The expected parent follows the configured [`CommitParent`].
    #[instrument(skip(self, content, comment), fields(branch = %self.branch, path = %path))]
    pub async fn commit_script(
        &mut self,
        path: &RepoPath,
        content: &str,
        comment: &str,
    ) -> Result<ChangeType, AutomationError> {
        let created_at = match &self.state {
            RepositoryState::BranchCreated { head } => head.clone(),
            _ => return Err(self.invalid("commit")),
        };
        let change_type = self.check_file_exists(path).await?;
        let wrap = |source| AutomationError::Commit {
            branch: self.branch.clone(),
            source,
        };

        let expected_parent = match self.commit_parent {
            CommitParent::BaseBranch => self
                .repository
                .latest_commit(&self.base)
                .await
                .map_err(wrap)?,
            CommitParent::FeatureBranch => self
                .repository
                .branch_head(&self.branch)
                .await
                .map_err(wrap)?
                .unwrap_or(created_at),
        };
        let push = PushRequest {
            branch: self.branch.clone(),
            expected_parent,
            comment: comment.to_string(),
            change: FileChange {
                path: path.clone(),
                change_type,
                content: content.to_string(),
            },
        };
        let head = self.repository.push(&push).await.map_err(wrap)?;
        info!(commit = ?head, change = %change_type, "Committed '{}' to '{}'", path, self.branch);
        self.state = RepositoryState::Committed {
            head,
            change: change_type,
        };
        Ok(change_type)
    }

    /// Opens a pull request from the feature branch into the base branch.
    #[instrument(skip(self, description), fields(branch = %self.branch))]
    pub async fn create_pull_request(
        &mut self,
        title: &str,
        description: &str,
    ) -> Result<PullRequest, AutomationError> {
        if !matches!(self.state, RepositoryState::Committed { .. }) {
            return Err(self.invalid("open a pull request"));
        }
        let draft = PullRequestDraft {
            source: self.branch.clone(),
            target: self.base.clone(),
            title: title.to_string(),
            description: description.to_string(),
        };
        let pull_request = self
            .pull_requests
            .create_pull_request(&draft)
            .await
            .map_err(|source| AutomationError::PullRequest {
                branch: self.branch.clone(),
                source,
            })?;
        info!(pull_request = ?pull_request.id, url = ?pull_request.url, "Pull request created");
        self.state = RepositoryState::PullRequestOpened {
            pull_request: pull_request.clone(),
        };
        Ok(pull_request)
    }

    /// Deletes the feature branch if this mutator created it and no pull
    /// request was opened. Failures are logged and otherwise ignored.
    #[instrument(skip(self), fields(branch = %self.branch, state = self.state.name()))]
    pub async fn rollback(&mut self) {
        if !self.state.owns_branch() {
            return;
        }
        let head = match self.repository.branch_head(&self.branch).await {
            Ok(Some(head)) => head,
            Ok(None) => {
                info!("Branch '{}' already gone, nothing to roll back", self.branch);
                self.state = RepositoryState::NoBranch;
                return;
            }
            Err(e) => match self.state.recorded_head() {
                Some(head) => {
                    warn!(error = %e, "could not read branch head, using recorded head");
                    head.clone()
                }
                None => {
                    error!(error = %e, "branch head unknown, leaving branch in place");
                    return;
                }
            },
        };
        warn!("Rolling back: deleting branch '{}'", self.branch);
        match self.repository.delete_branch(&self.branch, &head).await {
            Ok(()) => self.state = RepositoryState::NoBranch,
            Err(e) => error!(error = %e, "failed to delete branch during rollback"),
        }
    }
}

impl std::fmt::Debug for RepositoryMutator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryMutator")
            .field("base", &self.base)
            .field("branch", &self.branch)
            .field("commit_parent", &self.commit_parent)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use pipeline::fakes::{HostOperation, MemoryDevOps};
    use pipeline::{ErrorKind, HostError};

    use super::*;

    fn mutator(devops: &Arc<MemoryDevOps>, parent: CommitParent) -> RepositoryMutator {
        RepositoryMutator::new(
            devops.clone(),
            devops.clone(),
            BranchName::new("main").unwrap(),
            BranchName::new("feature/workitem-7").unwrap(),
            parent,
        )
    }

    fn path() -> RepoPath {
        RepoPath::new("/generated_scripts/script_7.java").unwrap()
    }

    #[tokio::test]
    async fn test_full_sequence_reaches_pull_request_opened() {
        let devops = Arc::new(MemoryDevOps::new().with_branch("main", &[("/README.md", "hi")]));
        let mut repo = mutator(&devops, CommitParent::BaseBranch);

        let head = repo.create_branch().await.unwrap();
        assert_eq!(devops.head("feature/workitem-7"), Some(head));

        let change = repo.commit_script(&path(), "class A {}", "msg").await.unwrap();
        assert_eq!(change, ChangeType::Add);
        assert_eq!(
            devops.file("feature/workitem-7", "/generated_scripts/script_7.java").as_deref(),
            Some("class A {}")
        );

        let pr = repo.create_pull_request("title", "description").await.unwrap();
        assert_eq!(
            repo.state(),
            &RepositoryState::PullRequestOpened { pull_request: pr }
        );
        assert_eq!(devops.pull_requests()[0].target.as_str(), "main");
    }

    #[tokio::test]
    async fn test_out_of_order_operations_are_rejected_without_host_calls() {
        let devops = Arc::new(MemoryDevOps::new().with_branch("main", &[]));
        let mut repo = mutator(&devops, CommitParent::BaseBranch);

        let err = repo.commit_script(&path(), "x", "msg").await.unwrap_err();
        assert!(matches!(
            err,
            AutomationError::InvalidTransition { state: "no branch", .. }
        ));
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);

        let err = repo.create_pull_request("t", "d").await.unwrap_err();
        assert!(matches!(err, AutomationError::InvalidTransition { .. }));
        assert!(devops.calls().is_empty());

        repo.create_branch().await.unwrap();
        let err = repo.create_branch().await.unwrap_err();
        assert!(matches!(
            err,
            AutomationError::InvalidTransition { state: "branch created", .. }
        ));
    }

    #[tokio::test]
    async fn test_empty_base_branch_fails_with_no_commits_found() {
        let devops = Arc::new(MemoryDevOps::new());
        let mut repo = mutator(&devops, CommitParent::BaseBranch);

        let err = repo.create_branch().await.unwrap_err();

        assert!(matches!(
            err,
            AutomationError::Branch {
                source: HostError::NoCommitsFound { .. },
                ..
            }
        ));
        assert_eq!(repo.state(), &RepositoryState::NoBranch);
    }

    #[tokio::test]
    async fn test_base_branch_parent_rejected_after_feature_branch_moved() {
        let devops = Arc::new(MemoryDevOps::new().with_branch("main", &[]));
        let mut repo = mutator(&devops, CommitParent::BaseBranch);
        repo.create_branch().await.unwrap();
        let other = RepoPath::new("/other.txt").unwrap();
        let moved = PushRequest {
            branch: repo.branch().clone(),
            expected_parent: devops.head("main").unwrap(),
            comment: "concurrent".into(),
            change: FileChange {
                path: other,
                change_type: ChangeType::Add,
                content: "x".into(),
            },
        };
        devops.push(&moved).await.unwrap();

        let err = repo.commit_script(&path(), "x", "msg").await.unwrap_err();
        assert!(matches!(
            err,
            AutomationError::Commit {
                source: HostError::Status { status: 409, .. },
                ..
            }
        ));

        let mut repo = mutator(&devops, CommitParent::FeatureBranch);
        repo.state = RepositoryState::BranchCreated {
            head: devops.head("main").unwrap(),
        };
        assert_eq!(
            repo.commit_script(&path(), "x", "msg").await.unwrap(),
            ChangeType::Add
        );
    }

    #[tokio::test]
    async fn test_rollback_deletes_created_branch() {
        let devops = Arc::new(MemoryDevOps::new().with_branch("main", &[]));
        devops.fail(HostOperation::Push, 500);
        let mut repo = mutator(&devops, CommitParent::BaseBranch);
        repo.create_branch().await.unwrap();

        assert!(repo.commit_script(&path(), "x", "msg").await.is_err());
        repo.rollback().await;

        assert_eq!(devops.head("feature/workitem-7"), None);
        assert_eq!(repo.state(), &RepositoryState::NoBranch);
    }

    #[tokio::test]
    async fn test_rollback_after_commit_with_unreported_head_deletes_branch() {
        let devops = Arc::new(MemoryDevOps::new().with_branch("main", &[]));
        devops.omit_push_head();
        devops.fail(HostOperation::CreatePullRequest, 500);
        let mut repo = mutator(&devops, CommitParent::BaseBranch);
        repo.create_branch().await.unwrap();
        repo.commit_script(&path(), "x", "msg").await.unwrap();
        assert!(matches!(
            repo.state(),
            RepositoryState::Committed { head: None, .. }
        ));

        assert!(repo.create_pull_request("t", "d").await.is_err());
        repo.rollback().await;

        assert_eq!(devops.head("feature/workitem-7"), None);
        assert_eq!(repo.state(), &RepositoryState::NoBranch);
    }

    #[tokio::test]
    async fn test_rollback_uses_current_head_when_recorded_one_is_stale() {
        let devops = Arc::new(MemoryDevOps::new().with_branch("main", &[]));
        let mut repo = mutator(&devops, CommitParent::BaseBranch);
        let created = repo.create_branch().await.unwrap();
        devops
            .push(&PushRequest {
                branch: repo.branch().clone(),
                expected_parent: created,
                comment: "landed despite error".into(),
                change: FileChange {
                    path: path(),
                    change_type: ChangeType::Add,
                    content: "x".into(),
                },
            })
            .await
            .unwrap();

        repo.rollback().await;

        assert_eq!(devops.head("feature/workitem-7"), None);
        assert_eq!(repo.state(), &RepositoryState::NoBranch);
    }

    #[tokio::test]
    async fn test_failed_rollback_is_swallowed() {
        let devops = Arc::new(MemoryDevOps::new().with_branch("main", &[]));
        let mut repo = mutator(&devops, CommitParent::BaseBranch);
        repo.create_branch().await.unwrap();
        devops.fail(HostOperation::DeleteBranch, 403);

        repo.rollback().await;

        assert!(devops.head("feature/workitem-7").is_some());
        assert!(matches!(repo.state(), RepositoryState::BranchCreated { .. }));
    }
}

use std::path::PathBuf;
use std::sync::Arc;

use pipeline::prompts::{commit_comment, pull_request_title, PULL_REQUEST_DESCRIPTION};
use pipeline::{
    generated_script_path, AutomationError, BranchName, ChangeType, CodeRepository,
    CommitParent, GeneratedScript, PullRequest, PullRequestManager, RepoPath, ScriptLanguage,
    Timestamp, WorkItem, WorkItemId, WorkItemTracker,
};
use tracing::{info, instrument, warn};

use crate::{RepositoryMutator, ScriptGenerator};

/// Default local directory for generated scripts.
pub const DEFAULT_OUTPUT_DIR: &str = "generated_scripts";

/// Per-run choices for [`WorkItemAutomation::run`].
#[derive(Debug, Clone)]
pub struct AutomationOptions {
    pub work_item: WorkItemId,
    pub language: ScriptLanguage,
    /// Local directory the script is written to.
    pub output_dir: PathBuf,
    /// Repository directory the script is committed to. Defaults to
    /// `output_dir` with any root or prefix removed.
    pub repository_dir: Option<PathBuf>,
    pub base_branch: BranchName,
    /// Delete the feature branch when a later step fails.
    pub cleanup_on_failure: bool,
    pub commit_parent: CommitParent,
    /// Stamp embedded in the script's file name.
    pub timestamp: Timestamp,
}

impl AutomationOptions {
    pub fn new(work_item: WorkItemId, base_branch: BranchName) -> Self {
        Self {
            work_item,
            language: ScriptLanguage::Java,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            repository_dir: None,
            base_branch,
            cleanup_on_failure: true,
            commit_parent: CommitParent::default(),
            timestamp: Timestamp::now(),
        }
    }

    fn repository_path(&self, script: &GeneratedScript) -> Result<RepoPath, AutomationError> {
        let dir = self.repository_dir.as_ref().unwrap_or(&self.output_dir);
        let local = match script.path.file_name() {
            Some(name) => dir.join(name),
            None => script.path.clone(),
        };
        RepoPath::from_relative(&local).ok_or(AutomationError::UnmappablePath { path: local })
    }
}

/// What a successful run produced.
#[derive(Debug, Clone)]
pub struct AutomationReport {
    pub work_item: WorkItem,
    pub script: GeneratedScript,
    pub repository_path: RepoPath,
    pub branch: BranchName,
    pub change_type: ChangeType,
    pub pull_request: PullRequest,
}

/// Turns one work item into a pull request carrying a generated script.
///
/// Steps run strictly in order and the first failure stops the sequence.
/// Nothing is retried.
pub struct WorkItemAutomation {
    tracker: Arc<dyn WorkItemTracker>,
    repository: Arc<dyn CodeRepository>,
    pull_requests: Arc<dyn PullRequestManager>,
    generator: ScriptGenerator,
}

impl WorkItemAutomation {
    pub fn new(
        tracker: Arc<dyn WorkItemTracker>,
        repository: Arc<dyn CodeRepository>,
        pull_requests: Arc<dyn PullRequestManager>,
        generator: ScriptGenerator,
    ) -> Self {
        Self {
            tracker,
            repository,
            pull_requests,
            generator,
        }
    }

    #[instrument(skip(self, options), fields(work_item = %options.work_item, language = %options.language))]
    pub async fn run(&self, options: &AutomationOptions) -> Result<AutomationReport, AutomationError> {
        let id = options.work_item;

        info!("Retrieving work item {id}");
        let work_item = self
            .tracker
            .work_item(id)
            .await
            .map_err(|source| AutomationError::WorkItem { id, source })?;
        info!(title = %work_item.title, "Retrieved work item {id}");

        info!("Generating {} script", options.language);
        let target =
            generated_script_path(&options.output_dir, id, options.language, options.timestamp);
        let script = self
            .generator
            .generate(&work_item.summary(), options.language, &target)
            .await?;
        info!(path = %script.path.display(), "Script saved");
        let repository_path = options.repository_path(&script)?;

        let mut mutator = RepositoryMutator::new(
            self.repository.clone(),
            self.pull_requests.clone(),
            options.base_branch.clone(),
            BranchName::for_work_item(id),
            options.commit_parent,
        );
        mutator.create_branch().await?;

        match publish(&mut mutator, id, &repository_path, &script.content).await {
            Ok((change_type, pull_request)) => {
                info!(pull_request = %pull_request, "Work item {id} automated");
                Ok(AutomationReport {
                    work_item,
                    script,
                    repository_path,
                    branch: mutator.branch().clone(),
                    change_type,
                    pull_request,
                })
            }
            Err(e) => {
                if options.cleanup_on_failure {
                    mutator.rollback().await;
                } else {
                    warn!(branch = %mutator.branch(), "Leaving branch in place, cleanup disabled");
                }
                Err(e)
            }
        }
    }
}

async fn publish(
    mutator: &mut RepositoryMutator,
    id: WorkItemId,
    path: &RepoPath,
    content: &str,
) -> Result<(ChangeType, PullRequest), AutomationError> {
    let change_type = mutator
        .commit_script(path, content, &commit_comment(id))
        .await?;
    let pull_request = mutator
        .create_pull_request(&pull_request_title(id), PULL_REQUEST_DESCRIPTION)
        .await?;
    Ok((change_type, pull_request))
}

impl std::fmt::Debug for WorkItemAutomation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkItemAutomation")
            .field("generator", &self.generator)
            .finish_non_exhaustive()
    }
}

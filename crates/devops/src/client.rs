use async_trait::async_trait;
use pipeline::{
    ApiVersions, BranchName, CodeRepository, CommitSha, DevOpsSettings, HostError,
    PullRequest, PullRequestDraft, PullRequestId, PullRequestManager, PushRequest, RepoPath,
    Secret, WorkItem, WorkItemId, WorkItemTracker,
};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};

use crate::wire::{
    CommitSummary, GitRef, ListResponse, NewContent, PullRequestPayload, PullRequestResponse,
    PushChange, PushCommit, PushItem, PushPayload, PushRefUpdate, PushResponse, RefUpdate,
    RefUpdateResult, WorkItemResponse,
};

/// Client for one repository in one project of the hosting REST API.
///
/// Authenticates every request with basic auth: empty user name, personal
/// access token as the password.
#[derive(Debug, Clone)]
pub struct DevOpsClient {
    http: reqwest::Client,
    api_root: String,
    repository: String,
    pat: Secret,
    versions: ApiVersions,
}

impl DevOpsClient {
    pub fn new(settings: &DevOpsSettings) -> Result<Self, HostError> {
        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .user_agent(concat!("scriptwright/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| HostError::Transport {
                operation: "build http client",
                message: e.to_string(),
            })?;
        Ok(Self {
            http,
            api_root: settings.api_root(),
            repository: settings.repository.clone(),
            pat: settings.pat.clone(),
            versions: settings.api_versions.clone(),
        })
    }

    fn git_url(&self, resource: &str) -> String {
        format!(
            "{}/git/repositories/{}/{resource}",
            self.api_root, self.repository
        )
    }

    /// Sends `request` and returns the status and the raw body.
    async fn send(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<(StatusCode, String), HostError> {
        let response = request
            .basic_auth("", Some(self.pat.expose()))
            .send()
            .await
            .map_err(|e| HostError::Transport {
                operation,
                message: e.to_string(),
            })?;
        let status = response.status();
        let body = response.text().await.map_err(|e| HostError::Transport {
            operation,
            message: e.to_string(),
        })?;
        debug!(operation, status = status.as_u16(), "hosting API responded");
        Ok((status, body))
    }

    async fn update_ref(
        &self,
        operation: &'static str,
        branch: &BranchName,
        old: &CommitSha,
        new: &CommitSha,
    ) -> Result<(), HostError> {
        let payload = [RefUpdate {
            name: branch.ref_name(),
            old_object_id: old.as_str(),
            new_object_id: new.as_str(),
        }];
        let request = self
            .http
            .post(self.git_url("refs"))
            .query(&[("api-version", self.versions.git.as_str())])
            .json(&payload);
        let (status, body) = self.send(operation, request).await?;
        if status != StatusCode::OK && status != StatusCode::CREATED {
            return Err(unexpected(operation, status, body));
        }
        // A 200 can still carry a per-ref rejection, e.g. when the ref exists.
        if let Ok(results) = serde_json::from_str::<ListResponse<RefUpdateResult>>(&body) {
            if let Some(rejected) = results.value.into_iter().find(|r| !r.success) {
                return Err(HostError::RefRejected {
                    name: rejected.name,
                    reason: rejected
                        .custom_message
                        .or(rejected.update_status)
                        .unwrap_or_else(|| "rejected".to_string()),
                });
            }
        }
        Ok(())
    }
}

fn unexpected(operation: &'static str, status: StatusCode, body: String) -> HostError {
    if status == StatusCode::UNAUTHORIZED {
        HostError::Authentication { operation }
    } else {
        HostError::Status {
            operation,
            status: status.as_u16(),
            body,
        }
    }
}

fn decode<T: DeserializeOwned>(operation: &'static str, body: &str) -> Result<T, HostError> {
    serde_json::from_str(body).map_err(|e| HostError::Decode {
        operation,
        message: e.to_string(),
    })
}

/// Reads a body whose status already proved success. A body that does not
/// parse yields the default shape.
fn decode_created<T: DeserializeOwned + Default>(operation: &'static str, body: &str) -> T {
    serde_json::from_str(body).unwrap_or_else(|e| {
        warn!(operation, error = %e, "ignoring unreadable response body");
        T::default()
    })
}

#[async_trait]
impl WorkItemTracker for DevOpsClient {
    #[instrument(skip(self), fields(work_item = %id))]
    async fn work_item(&self, id: WorkItemId) -> Result<WorkItem, HostError> {
        const OP: &str = "fetch work item";
        let request = self
            .http
            .get(format!("{}/wit/workitems/{id}", self.api_root))
            .query(&[("api-version", self.versions.work_items.as_str())]);
        let (status, body) = self.send(OP, request).await?;
        if status != StatusCode::OK {
            return Err(unexpected(OP, status, body));
        }
        let response: WorkItemResponse = decode(OP, &body)?;
        let item = WorkItem::from_fields(id, response.fields.title, response.fields.description);
        info!(title = %item.title, "retrieved work item");
        Ok(item)
    }
}

#[async_trait]
impl CodeRepository for DevOpsClient {
    #[instrument(skip(self), fields(branch = %branch))]
    async fn latest_commit(&self, branch: &BranchName) -> Result<CommitSha, HostError> {
        const OP: &str = "fetch latest commit";
        let request = self.http.get(self.git_url("commits")).query(&[
            ("searchCriteria.itemVersion.version", branch.as_str()),
            ("searchCriteria.$top", "1"),
            ("api-version", self.versions.git.as_str()),
        ]);
        let (status, body) = self.send(OP, request).await?;
        if status != StatusCode::OK {
            return Err(unexpected(OP, status, body));
        }
        let commits: ListResponse<CommitSummary> = decode(OP, &body)?;
        let head = commits
            .value
            .into_iter()
            .next()
            .and_then(|c| CommitSha::new(c.commit_id))
            .ok_or_else(|| HostError::NoCommitsFound {
                branch: branch.clone(),
            })?;
        info!(commit = %head, "resolved latest commit");
        Ok(head)
    }

    #[instrument(skip(self), fields(branch = %branch))]
    async fn branch_head(&self, branch: &BranchName) -> Result<Option<CommitSha>, HostError> {
        const OP: &str = "read branch ref";
        let filter = format!("heads/{branch}");
        let request = self.http.get(self.git_url("refs")).query(&[
            ("filter", filter.as_str()),
            ("api-version", self.versions.git.as_str()),
        ]);
        let (status, body) = self.send(OP, request).await?;
        if status != StatusCode::OK {
            return Err(unexpected(OP, status, body));
        }
        // `filter` is a prefix match; keep only the exact ref.
        let wanted = branch.ref_name();
        let refs: ListResponse<GitRef> = decode(OP, &body)?;
        Ok(refs
            .value
            .into_iter()
            .find(|r| r.name == wanted)
            .and_then(|r| CommitSha::new(r.object_id)))
    }

    #[instrument(skip(self), fields(branch = %branch, at = %at))]
    async fn create_branch(&self, branch: &BranchName, at: &CommitSha) -> Result<(), HostError> {
        self.update_ref("create branch", branch, &CommitSha::zero(), at)
            .await?;
        info!("created branch");
        Ok(())
    }

    #[instrument(skip(self), fields(branch = %branch))]
    async fn delete_branch(&self, branch: &BranchName, head: &CommitSha) -> Result<(), HostError> {
        self.update_ref("delete branch", branch, head, &CommitSha::zero())
            .await?;
        warn!("deleted branch");
        Ok(())
    }

    #[instrument(skip(self), fields(path = %path, branch = %branch))]
    async fn file_exists(&self, path: &RepoPath, branch: &BranchName) -> Result<bool, HostError> {
        const OP: &str = "check file";
        let request = self.http.get(self.git_url("items")).query(&[
            ("path", path.as_str()),
            ("versionDescriptor.version", branch.as_str()),
            ("versionDescriptor.versionType", "branch"),
            ("api-version", self.versions.git.as_str()),
        ]);
        let (status, body) = self.send(OP, request).await?;
        match status {
            StatusCode::OK => {
                info!("file exists, the commit will edit it");
                Ok(true)
            }
            StatusCode::NOT_FOUND => {
                info!("file does not exist, the commit will add it");
                Ok(false)
            }
            other => Err(HostError::RepoProbe {
                path: path.clone(),
                status: other.as_u16(),
                body,
            }),
        }
    }

    #[instrument(skip(self, push), fields(branch = %push.branch, change = %push.change.change_type))]
    async fn push(&self, push: &PushRequest) -> Result<Option<CommitSha>, HostError> {
        const OP: &str = "push commit";
        let payload = PushPayload {
            ref_updates: vec![PushRefUpdate {
                name: push.branch.ref_name(),
                old_object_id: push.expected_parent.as_str(),
            }],
            commits: vec![PushCommit {
                comment: &push.comment,
                changes: vec![PushChange {
                    change_type: push.change.change_type,
                    item: PushItem {
                        path: push.change.path.as_str(),
                    },
                    new_content: NewContent {
                        content: &push.change.content,
                        content_type: "rawtext",
                    },
                }],
            }],
        };
        let request = self
            .http
            .post(self.git_url("pushes"))
            .query(&[("api-version", self.versions.git.as_str())])
            .json(&payload);
        let (status, body) = self.send(OP, request).await?;
        if status != StatusCode::CREATED {
            return Err(unexpected(OP, status, body));
        }
        let response: PushResponse = decode_created(OP, &body);
        let reported = response
            .ref_updates
            .into_iter()
            .map(|r| r.new_object_id)
            .chain(response.commits.into_iter().map(|c| c.commit_id))
            .find_map(CommitSha::new);
        let head = match reported {
            Some(head) => Some(head),
            None => {
                debug!(branch = %push.branch, "push response names no commit, reading branch ref");
                match self.branch_head(&push.branch).await {
                    Ok(head) => head,
                    Err(e) => {
                        warn!(branch = %push.branch, error = %e, "could not read pushed branch head");
                        None
                    }
                }
            }
        };
        match &head {
            Some(head) => info!(commit = %head, "pushed commit"),
            None => info!("pushed commit, new head unknown"),
        }
        Ok(head)
    }
}

#[async_trait]
impl PullRequestManager for DevOpsClient {
    #[instrument(skip(self, draft), fields(source = %draft.source, target = %draft.target))]
    async fn create_pull_request(&self, draft: &PullRequestDraft) -> Result<PullRequest, HostError> {
        const OP: &str = "create pull request";
        let payload = PullRequestPayload {
            source_ref_name: draft.source.ref_name(),
            target_ref_name: draft.target.ref_name(),
            title: &draft.title,
            description: &draft.description,
        };
        let request = self
            .http
            .post(self.git_url("pullrequests"))
            .query(&[("api-version", self.versions.pull_requests.as_str())])
            .json(&payload);
        let (status, body) = self.send(OP, request).await?;
        if status != StatusCode::CREATED {
            return Err(unexpected(OP, status, body));
        }
        let response: PullRequestResponse = decode_created(OP, &body);
        let pr = PullRequest {
            id: response.pull_request_id.map(PullRequestId::new),
            url: response.url.filter(|url| !url.is_empty()),
        };
        info!(pull_request = ?pr.id, url = ?pr.url, "opened pull request");
        Ok(pr)
    }
}

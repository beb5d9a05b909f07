//! JSON shapes exchanged with the hosting REST API.

use serde::{Deserialize, Serialize};

/// Envelope the API wraps list results in.
#[derive(Debug, Deserialize)]
pub(crate) struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
}

// ---------------------------------------------------------------------------
// Work items
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct WorkItemResponse {
    #[serde(default)]
    pub fields: WorkItemFields,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct WorkItemFields {
    #[serde(rename = "System.Title")]
    pub title: Option<String>,
    #[serde(rename = "System.Description")]
    pub description: Option<String>,
}

// ---------------------------------------------------------------------------
// Refs and commits
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CommitSummary {
    pub commit_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GitRef {
    pub name: String,
    pub object_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RefUpdate<'a> {
    pub name: String,
    pub old_object_id: &'a str,
    pub new_object_id: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RefUpdateResult {
    pub name: String,
    #[serde(default = "default_true")]
    pub success: bool,
    #[serde(default)]
    pub update_status: Option<String>,
    #[serde(default)]
    pub custom_message: Option<String>,
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Pushes
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PushPayload<'a> {
    pub ref_updates: Vec<PushRefUpdate<'a>>,
    pub commits: Vec<PushCommit<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PushRefUpdate<'a> {
    pub name: String,
    pub old_object_id: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct PushCommit<'a> {
    pub comment: &'a str,
    pub changes: Vec<PushChange<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PushChange<'a> {
    pub change_type: pipeline::ChangeType,
    pub item: PushItem<'a>,
    pub new_content: NewContent<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PushItem<'a> {
    pub path: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NewContent<'a> {
    pub content: &'a str,
    pub content_type: &'static str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PushResponse {
    #[serde(default)]
    pub ref_updates: Vec<PushedRef>,
    #[serde(default)]
    pub commits: Vec<CommitSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PushedRef {
    pub new_object_id: String,
}

// ---------------------------------------------------------------------------
// Pull requests
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PullRequestPayload<'a> {
    pub source_ref_name: String,
    pub target_ref_name: String,
    pub title: &'a str,
    pub description: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PullRequestResponse {
    #[serde(default)]
    pub pull_request_id: Option<u64>,
    #[serde(default)]
    pub url: Option<String>,
}

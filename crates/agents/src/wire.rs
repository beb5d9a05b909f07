//! JSON shapes exchanged with the agent service.

use pipeline::{MessageRole, RunStatus};
use serde::{Deserialize, Serialize};

pub(crate) const FILE_SEARCH: &str = "file_search";

/// Any response of which only the identifier matters.
#[derive(Debug, Deserialize)]
pub(crate) struct Created {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ToolDefinition {
    #[serde(rename = "type")]
    pub kind: &'static str,
}

impl ToolDefinition {
    pub fn file_search() -> Self {
        Self { kind: FILE_SEARCH }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ToolResources<'a> {
    pub file_search: FileSearchResources<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct FileSearchResources<'a> {
    pub vector_store_ids: Vec<&'a str>,
}

impl<'a> ToolResources<'a> {
    pub fn searching(vector_store: &'a str) -> Self {
        Self {
            file_search: FileSearchResources {
                vector_store_ids: vec![vector_store],
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Threads and messages
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub(crate) struct ThreadRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_resources: Option<ToolResources<'a>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct MessageRequest<'a> {
    pub role: &'static str,
    pub content: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment<'a>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct Attachment<'a> {
    pub file_id: &'a str,
    pub tools: Vec<ToolDefinition>,
}

/// One page of `GET threads/{thread}/messages`.
#[derive(Debug, Deserialize)]
pub(crate) struct MessageList {
    #[serde(default)]
    pub data: Vec<MessageObject>,
    #[serde(default)]
    pub has_more: bool,
    pub last_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessageObject {
    pub id: String,
    pub thread_id: String,
    pub role: MessageRole,
    #[serde(default)]
    pub created_at: i64,
    pub assistant_id: Option<String>,
    #[serde(default)]
    pub content: Vec<MessageContent>,
}

impl MessageObject {
    /// Value of the first text element, empty when there is none.
    pub fn first_text(&self) -> String {
        self.content
            .iter()
            .find_map(|c| match (c.kind.as_str(), &c.text) {
                ("text", Some(text)) => Some(text.value.clone()),
                _ => None,
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessageContent {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: Option<TextContent>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TextContent {
    #[serde(default)]
    pub value: String,
}

// ---------------------------------------------------------------------------
// Runs
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub(crate) struct RunRequest<'a> {
    pub assistant_id: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RunObject {
    pub id: String,
    pub status: RunStatus,
    pub last_error: Option<RunError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RunError {
    #[serde(default)]
    pub message: String,
}

// ---------------------------------------------------------------------------
// Files, vector stores, assistants
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct FileObject {
    pub id: String,
    /// Absent on services that process uploads synchronously.
    pub status: Option<String>,
    pub status_details: Option<String>,
}

impl FileObject {
    pub fn is_settled(&self) -> bool {
        matches!(self.status.as_deref(), None | Some("processed") | Some("error"))
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct VectorStoreRequest<'a> {
    pub name: &'a str,
    pub file_ids: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VectorStoreObject {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub file_counts: FileCounts,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct FileCounts {
    #[serde(default)]
    pub failed: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct AssistantRequest<'a> {
    pub model: &'a str,
    pub name: &'a str,
    pub instructions: &'a str,
    pub tools: Vec<ToolDefinition>,
    pub tool_resources: ToolResources<'a>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_text_skips_non_text_content() {
        let message: MessageObject = serde_json::from_value(serde_json::json!({
            "id": "msg_1",
            "thread_id": "thread_1",
            "role": "assistant",
            "created_at": 5,
            "content": [
                { "type": "image_file", "image_file": { "file_id": "f" } },
                { "type": "text", "text": { "value": "hello", "annotations": [] } }
            ]
        }))
        .unwrap();
        assert_eq!(message.first_text(), "hello");
        assert_eq!(message.role, MessageRole::Assistant);
    }

    #[test]
    fn test_unknown_role_and_status_still_decode() {
        let message: MessageObject = serde_json::from_value(serde_json::json!({
            "id": "msg_1", "thread_id": "t", "role": "system", "content": []
        }))
        .unwrap();
        assert_eq!(message.role, MessageRole::Other);
        assert_eq!(message.first_text(), "");

        let run: RunObject =
            serde_json::from_value(serde_json::json!({ "id": "run_1", "status": "paused" }))
                .unwrap();
        assert_eq!(run.status, RunStatus::Unknown);
    }

    #[test]
    fn test_thread_request_without_store_is_empty_object() {
        let body = serde_json::to_value(ThreadRequest { tool_resources: None }).unwrap();
        assert_eq!(body, serde_json::json!({}));
    }
}

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use pipeline::{
    AgentBackend, AgentBlueprint, AgentError, AgentId, AgentSettings, FileId, MessageId,
    ProjectConnection, RunId, RunOutcome, Secret, ThreadId, ThreadMessage, VectorStoreId,
};
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, instrument, warn};

use crate::wire::{
    AssistantRequest, Attachment, Created, FileObject, MessageList, MessageObject,
    MessageRequest, RunObject, RunRequest, ThreadRequest, ToolDefinition, ToolResources,
    VectorStoreObject, VectorStoreRequest,
};

/// API version sent with every agent service request.
pub const API_VERSION: &str = "2024-12-01-preview";

const PAGE_SIZE: &str = "100";

/// Base URL of the agent service for a project.
pub fn endpoint_for(connection: &ProjectConnection) -> String {
    format!(
        "https://{}/agents/v1.0/subscriptions/{}/resourceGroups/{}/providers/Microsoft.MachineLearningServices/workspaces/{}",
        connection.host, connection.subscription_id, connection.resource_group, connection.project_name
    )
}

/// Client for the agent service of one project.
#[derive(Debug, Clone)]
pub struct AgentClient {
    http: reqwest::Client,
    endpoint: String,
    token: Secret,
    poll_interval: Duration,
    max_wait: Duration,
}

impl AgentClient {
    pub fn new(settings: &AgentSettings) -> Result<Self, AgentError> {
        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .user_agent(concat!("scriptwright/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AgentError::Transport {
                operation: "build http client",
                message: e.to_string(),
            })?;
        let endpoint = settings
            .endpoint_override
            .clone()
            .unwrap_or_else(|| endpoint_for(&settings.connection));
        Ok(Self {
            http,
            endpoint,
            token: settings.access_token.clone(),
            poll_interval: settings.poll_interval,
            max_wait: settings.max_wait,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, resource: &str) -> String {
        format!("{}/{resource}", self.endpoint)
    }

    /// Sends `request` and decodes a 2xx body as `T`.
    async fn send<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<T, AgentError> {
        let response = request
            .bearer_auth(self.token.expose())
            .query(&[("api-version", API_VERSION)])
            .send()
            .await
            .map_err(|e| AgentError::Transport {
                operation,
                message: e.to_string(),
            })?;
        let status = response.status();
        let body = response.text().await.map_err(|e| AgentError::Transport {
            operation,
            message: e.to_string(),
        })?;
        debug!(operation, status = status.as_u16(), "agent service responded");
        if status == StatusCode::UNAUTHORIZED {
            return Err(AgentError::Authentication { operation });
        }
        if !status.is_success() {
            return Err(AgentError::Status {
                operation,
                status: status.as_u16(),
                body,
            });
        }
        serde_json::from_str(&body).map_err(|e| AgentError::Decode {
            operation,
            message: e.to_string(),
        })
    }

    /// Calls `poll` until `settled` accepts its result or `max_wait` elapses.
    async fn wait_until<T, F, Fut>(
        &self,
        operation: &'static str,
        mut poll: F,
        settled: impl Fn(&T) -> bool,
    ) -> Result<T, AgentError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AgentError>>,
    {
        let started = Instant::now();
        loop {
            let value = poll().await?;
            if settled(&value) {
                return Ok(value);
            }
            let waited = started.elapsed();
            if waited >= self.max_wait {
                return Err(AgentError::Timeout { operation, waited });
            }
            debug!(operation, waited_ms = waited.as_millis() as u64, "still waiting");
            sleep(self.poll_interval).await;
        }
    }
}

fn identifier<T>(
    operation: &'static str,
    raw: String,
    make: impl FnOnce(String) -> Option<T>,
) -> Result<T, AgentError> {
    make(raw).ok_or(AgentError::Decode {
        operation,
        message: "response carries an empty identifier".to_string(),
    })
}

fn thread_message(message: MessageObject) -> Result<ThreadMessage, AgentError> {
    const OP: &str = "list messages";
    let text = message.first_text();
    Ok(ThreadMessage {
        id: identifier(OP, message.id, |id| MessageId::new(id))?,
        thread_id: identifier(OP, message.thread_id, |id| ThreadId::new(id))?,
        role: message.role,
        created_at: message.created_at,
        assistant_id: message.assistant_id.and_then(|id| AgentId::new(id)),
        text,
    })
}

#[async_trait]
impl AgentBackend for AgentClient {
    #[instrument(skip(self), fields(vector_store = ?vector_store.map(VectorStoreId::as_str)))]
    async fn create_thread(
        &self,
        vector_store: Option<&VectorStoreId>,
    ) -> Result<ThreadId, AgentError> {
        const OP: &str = "create thread";
        let payload = ThreadRequest {
            tool_resources: vector_store.map(|store| ToolResources::searching(store.as_str())),
        };
        let request = self.http.post(self.url("threads")).json(&payload);
        let created: Created = self.send(OP, request).await?;
        let thread = identifier(OP, created.id, |id| ThreadId::new(id))?;
        info!(thread = %thread, "created thread");
        Ok(thread)
    }

    #[instrument(skip(self, content, attachments), fields(thread = %thread, attachments = attachments.len()))]
    async fn post_message(
        &self,
        thread: &ThreadId,
        content: &str,
        attachments: &[FileId],
    ) -> Result<MessageId, AgentError> {
        const OP: &str = "post message";
        let payload = MessageRequest {
            role: "user",
            content,
            attachments: attachments
                .iter()
                .map(|file| Attachment {
                    file_id: file.as_str(),
                    tools: vec![ToolDefinition::file_search()],
                })
                .collect(),
        };
        let request = self
            .http
            .post(self.url(&format!("threads/{thread}/messages")))
            .json(&payload);
        let created: Created = self.send(OP, request).await?;
        let message = identifier(OP, created.id, |id| MessageId::new(id))?;
        info!(message = %message, "posted message");
        Ok(message)
    }

    #[instrument(skip(self), fields(thread = %thread, agent = %agent))]
    async fn run_to_completion(
        &self,
        thread: &ThreadId,
        agent: &AgentId,
    ) -> Result<RunOutcome, AgentError> {
        const OP: &str = "run agent";
        let request = self
            .http
            .post(self.url(&format!("threads/{thread}/runs")))
            .json(&RunRequest {
                assistant_id: agent.as_str(),
            });
        let mut run: RunObject = self.send(OP, request).await?;
        info!(run = %run.id, status = %run.status, "started run");

        if !run.status.is_terminal() {
            let url = self.url(&format!("threads/{thread}/runs/{}", run.id));
            run = self
                .wait_until(
                    OP,
                    || self.send::<RunObject>(OP, self.http.get(&url)),
                    |r: &RunObject| r.status.is_terminal(),
                )
                .await?;
        }

        let outcome = RunOutcome {
            id: identifier(OP, run.id, |id| RunId::new(id))?,
            status: run.status,
            last_error: run.last_error.map(|e| e.message).filter(|m| !m.is_empty()),
        };
        info!(run = %outcome.id, status = %outcome.status, "run finished");
        Ok(outcome)
    }

    #[instrument(skip(self), fields(thread = %thread))]
    async fn list_messages(&self, thread: &ThreadId) -> Result<Vec<ThreadMessage>, AgentError> {
        const OP: &str = "list messages";
        let url = self.url(&format!("threads/{thread}/messages"));
        let mut messages = Vec::new();
        let mut after: Option<String> = None;
        loop {
            let mut request = self
                .http
                .get(&url)
                .query(&[("limit", PAGE_SIZE), ("order", "desc")]);
            if let Some(cursor) = &after {
                request = request.query(&[("after", cursor.as_str())]);
            }
            let page: MessageList = self.send(OP, request).await?;
            for message in page.data {
                messages.push(thread_message(message)?);
            }
            match page.last_id {
                Some(last) if page.has_more => after = Some(last),
                _ => break,
            }
        }
        debug!(count = messages.len(), "listed messages");
        Ok(messages)
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn upload_file(&self, path: &Path) -> Result<FileId, AgentError> {
        const OP: &str = "upload file";
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| AgentError::LocalFile {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let form = Form::new()
            .text("purpose", "assistants")
            .part("file", Part::bytes(bytes).file_name(file_name));
        let request = self.http.post(self.url("files")).multipart(form);
        let mut file: FileObject = self.send(OP, request).await?;

        if !file.is_settled() {
            let url = self.url(&format!("files/{}", file.id));
            file = self
                .wait_until(
                    OP,
                    || self.send::<FileObject>(OP, self.http.get(&url)),
                    FileObject::is_settled,
                )
                .await?;
        }

        let failed = file.status.as_deref() == Some("error");
        let id = identifier(OP, file.id, |id| FileId::new(id))?;
        if failed {
            warn!(file = %id, "service could not process the upload");
            return Err(AgentError::UploadFailed {
                file: id,
                reason: file
                    .status_details
                    .unwrap_or_else(|| "error".to_string()),
            });
        }
        info!(file = %id, "uploaded file");
        Ok(id)
    }

    #[instrument(skip(self, files), fields(files = files.len()))]
    async fn create_vector_store(
        &self,
        name: &str,
        files: &[FileId],
    ) -> Result<VectorStoreId, AgentError> {
        const OP: &str = "create vector store";
        let payload = VectorStoreRequest {
            name,
            file_ids: files.iter().map(FileId::as_str).collect(),
        };
        let request = self.http.post(self.url("vector_stores")).json(&payload);
        let mut store: VectorStoreObject = self.send(OP, request).await?;

        if store.status == "in_progress" {
            let url = self.url(&format!("vector_stores/{}", store.id));
            store = self
                .wait_until(
                    OP,
                    || self.send::<VectorStoreObject>(OP, self.http.get(&url)),
                    |s: &VectorStoreObject| s.status != "in_progress",
                )
                .await?;
        }

        let id = identifier(OP, store.id, |id| VectorStoreId::new(id))?;
        if store.status != "completed" || store.file_counts.failed > 0 {
            return Err(AgentError::IndexingFailed {
                vector_store: id,
                status: if store.file_counts.failed > 0 {
                    format!("{} ({} files failed)", store.status, store.file_counts.failed)
                } else {
                    store.status
                },
            });
        }
        info!(vector_store = %id, "vector store indexed");
        Ok(id)
    }

    #[instrument(skip(self, blueprint), fields(name = %blueprint.name, model = %blueprint.model))]
    async fn create_agent(&self, blueprint: &AgentBlueprint) -> Result<AgentId, AgentError> {
        const OP: &str = "create agent";
        let payload = AssistantRequest {
            model: &blueprint.model,
            name: &blueprint.name,
            instructions: &blueprint.instructions,
            tools: vec![ToolDefinition::file_search()],
            tool_resources: ToolResources::searching(blueprint.vector_store.as_str()),
        };
        let request = self.http.post(self.url("assistants")).json(&payload);
        let created: Created = self.send(OP, request).await?;
        let agent = identifier(OP, created.id, |id| AgentId::new(id))?;
        info!(agent = %agent, "created agent");
        Ok(agent)
    }
}

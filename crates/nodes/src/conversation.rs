//! One prompt/response exchange with the agent, shared by every flow.

use std::path::Path;

use pipeline::{
    AgentBackend, AgentError, AgentId, FileId, GenerationError, RunStatus, ThreadId,
    ThreadMessage, VectorStoreId,
};
use tracing::{debug, info};

/// A thread after the agent has answered.
#[derive(Debug)]
pub(crate) struct Exchange {
    pub thread: ThreadId,
    pub messages: Vec<ThreadMessage>,
}

/// Opens a thread, posts `content`, runs `agent` to completion and reads the
/// thread back. A run ending in any status other than `completed` is an error.
pub(crate) async fn converse(
    backend: &dyn AgentBackend,
    agent: &AgentId,
    vector_store: Option<&VectorStoreId>,
    content: &str,
    attachments: &[FileId],
) -> Result<Exchange, GenerationError> {
    let thread = backend.create_thread(vector_store).await?;
    backend.post_message(&thread, content, attachments).await?;
    info!(thread = %thread, agent = %agent, "waiting for the agent");

    let outcome = backend.run_to_completion(&thread, agent).await?;
    if outcome.status != RunStatus::Completed {
        return Err(AgentError::RunNotCompleted {
            run: outcome.id,
            status: outcome.status,
            last_error: outcome.last_error,
        }
        .into());
    }

    let messages = backend.list_messages(&thread).await?;
    debug!(thread = %thread, count = messages.len(), "read thread");
    Ok(Exchange { thread, messages })
}

/// Writes `content` to `path`, creating parent directories and overwriting
/// any existing file.
pub(crate) async fn save(path: &Path, content: &str) -> Result<(), GenerationError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| GenerationError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
    }
    tokio::fs::write(path, content)
        .await
        .map_err(|source| GenerationError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    info!(path = %path.display(), bytes = content.len(), "saved script");
    Ok(())
}

/// Fails with [`GenerationError::FileNotFound`] unless `path` is an existing file.
pub(crate) async fn require_file(path: &Path) -> Result<(), GenerationError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(()),
        Ok(_) => Err(GenerationError::FileNotFound {
            path: path.to_path_buf(),
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(GenerationError::FileNotFound {
            path: path.to_path_buf(),
        }),
        Err(source) => Err(GenerationError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

use std::path::Path;
use std::sync::Arc;

use pipeline::prompts::refactor_prompt;
use pipeline::{
    extract_code, latest_assistant_reply, AgentBackend, AgentId, GeneratedScript,
    GenerationError, ScriptLanguage, VectorStoreId,
};
use tracing::{info, instrument};

use crate::conversation::{converse, require_file, save};

/// Has the agent rewrite an existing script against the coding standards
/// held in a vector store.
#[derive(Clone)]
pub struct ScriptRefactorer {
    backend: Arc<dyn AgentBackend>,
    agent: AgentId,
    vector_store: VectorStoreId,
}

impl ScriptRefactorer {
    pub fn new(backend: Arc<dyn AgentBackend>, agent: AgentId, vector_store: VectorStoreId) -> Self {
        Self {
            backend,
            agent,
            vector_store,
        }
    }

    /// Uploads `source`, asks for a refactored version and writes the
    /// extracted code to `output`.
    ///
    /// A missing `source` fails before anything is sent to the service.
    #[instrument(skip(self), fields(agent = %self.agent, source = %source.display()))]
    pub async fn refactor(
        &self,
        source: &Path,
        output: &Path,
        language: ScriptLanguage,
    ) -> Result<GeneratedScript, GenerationError> {
        require_file(source).await?;

        let file = self.backend.upload_file(source).await?;
        info!(file = %file, "Uploaded script for refactoring");

        let file_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let exchange = converse(
            self.backend.as_ref(),
            &self.agent,
            Some(&self.vector_store),
            &refactor_prompt(language, &file_name),
            &[file],
        )
        .await?;

        let reply = latest_assistant_reply(&exchange.messages).ok_or(
            GenerationError::NoAssistantMessage {
                thread: exchange.thread.clone(),
            },
        )?;
        info!(message_id = %reply.id, reply = ?reply.text, "Refactor reply received");
        let content = extract_code(&reply.text, language);
        save(output, &content).await?;
        Ok(GeneratedScript {
            path: output.to_path_buf(),
            content,
        })
    }
}

impl std::fmt::Debug for ScriptRefactorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptRefactorer")
            .field("agent", &self.agent)
            .field("vector_store", &self.vector_store)
            .finish_non_exhaustive()
    }
}

use std::path::PathBuf;
use std::sync::Arc;

use pipeline::{AgentBackend, AgentBlueprint, AgentId, GenerationError, VectorStoreId};
use tracing::{info, instrument};

use crate::conversation::require_file;

/// Inputs of [`AgentProvisioner::provision`].
#[derive(Debug, Clone)]
pub struct ProvisionRequest {
    /// Model deployment name on the agent service.
    pub model: String,
    pub agent_name: String,
    /// File whose content becomes the agent's instructions.
    pub instructions_file: PathBuf,
    /// Coding-standards document indexed for file search.
    pub standards_file: PathBuf,
    pub vector_store_name: String,
}

/// Identifiers to put in `AGENT_ID` and `VECTOR_STORE_ID`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provisioned {
    pub agent: AgentId,
    pub vector_store: VectorStoreId,
}

/// Creates an agent whose file-search tool reads a coding-standards store.
#[derive(Clone)]
pub struct AgentProvisioner {
    backend: Arc<dyn AgentBackend>,
}

impl AgentProvisioner {
    pub fn new(backend: Arc<dyn AgentBackend>) -> Self {
        Self { backend }
    }

    #[instrument(skip(self, request), fields(agent = %request.agent_name, model = %request.model))]
    pub async fn provision(&self, request: &ProvisionRequest) -> Result<Provisioned, GenerationError> {
        require_file(&request.instructions_file).await?;
        require_file(&request.standards_file).await?;
        let instructions = tokio::fs::read_to_string(&request.instructions_file)
            .await
            .map_err(|source| GenerationError::Io {
                path: request.instructions_file.clone(),
                source,
            })?;

        let file = self.backend.upload_file(&request.standards_file).await?;
        info!(file = %file, "Uploaded coding standards");

        let vector_store = self
            .backend
            .create_vector_store(&request.vector_store_name, &[file])
            .await?;
        info!(vector_store = %vector_store, "Vector store ready");

        let agent = self
            .backend
            .create_agent(&AgentBlueprint {
                model: request.model.clone(),
                name: request.agent_name.clone(),
                instructions,
                vector_store: vector_store.clone(),
            })
            .await?;
        info!(agent = %agent, "Agent created");

        Ok(Provisioned {
            agent,
            vector_store,
        })
    }
}

impl std::fmt::Debug for AgentProvisioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentProvisioner").finish_non_exhaustive()
    }
}

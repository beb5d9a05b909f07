use std::sync::Arc;

use pipeline::{
    AgentBackend, AgentId, AgentReply, GenerationError, MessageRole, VectorStoreId,
};
use tracing::{info, instrument};

use crate::conversation::converse;

/// Asks the agent one question and collects its answers.
#[derive(Clone)]
pub struct AgentChat {
    backend: Arc<dyn AgentBackend>,
    agent: AgentId,
    vector_store: Option<VectorStoreId>,
}

impl AgentChat {
    pub fn new(
        backend: Arc<dyn AgentBackend>,
        agent: AgentId,
        vector_store: Option<VectorStoreId>,
    ) -> Self {
        Self {
            backend,
            agent,
            vector_store,
        }
    }

    /// Returns every assistant message in the thread, in the order the
    /// service lists them (newest first).
    #[instrument(skip(self, question), fields(agent = %self.agent))]
    pub async fn ask(&self, question: &str) -> Result<Vec<AgentReply>, GenerationError> {
        let exchange = converse(
            self.backend.as_ref(),
            &self.agent,
            self.vector_store.as_ref(),
            question,
            &[],
        )
        .await?;
        let replies: Vec<AgentReply> = exchange
            .messages
            .iter()
            .filter(|m| m.role == MessageRole::Assistant)
            .map(AgentReply::from)
            .collect();
        if replies.is_empty() {
            return Err(GenerationError::NoAssistantMessage {
                thread: exchange.thread,
            });
        }
        info!(replies = replies.len(), "Agent answered");
        Ok(replies)
    }
}

impl std::fmt::Debug for AgentChat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentChat")
            .field("agent", &self.agent)
            .field("vector_store", &self.vector_store)
            .finish_non_exhaustive()
    }
}

use std::path::Path;
use std::sync::Arc;

use pipeline::prompts::generation_prompt;
use pipeline::{
    extract_code, latest_assistant_reply, AgentBackend, AgentId, GeneratedScript,
    GenerationError, ScriptLanguage, VectorStoreId,
};
use tracing::{info, instrument};

use crate::conversation::{converse, save};

/// Asks the agent for a script implementing a task and saves the code.
#[derive(Clone)]
pub struct ScriptGenerator {
    backend: Arc<dyn AgentBackend>,
    agent: AgentId,
    vector_store: Option<VectorStoreId>,
}

impl ScriptGenerator {
    /// `vector_store`, when given, is bound to every thread for file search.
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

    /// Generates a `language` script for `task` and writes it to `target`.
    ///
    /// The most recent assistant message is the reply. When it holds a code
    /// fence tagged with the language, only the fenced code is kept.
    #[instrument(skip(self, task), fields(agent = %self.agent, target = %target.display()))]
    pub async fn generate(
        &self,
        task: &str,
        language: ScriptLanguage,
        target: &Path,
    ) -> Result<GeneratedScript, GenerationError> {
        let prompt = generation_prompt(language, task);
        let exchange = converse(
            self.backend.as_ref(),
            &self.agent,
            self.vector_store.as_ref(),
            &prompt,
            &[],
        )
        .await?;

        let reply = latest_assistant_reply(&exchange.messages).ok_or(
            GenerationError::NoAssistantMessage {
                thread: exchange.thread.clone(),
            },
        )?;
        info!(message = %reply.id, "agent replied");

        let content = extract_code(&reply.text, language);
        save(target, &content).await?;
        Ok(GeneratedScript {
            path: target.to_path_buf(),
            content,
        })
    }
}

impl std::fmt::Debug for ScriptGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptGenerator")
            .field("agent", &self.agent)
            .field("vector_store", &self.vector_store)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use pipeline::fakes::ScriptedAgent;
    use pipeline::{AgentError, ErrorKind, RunStatus};

    use super::*;

    fn generator(agent: Arc<ScriptedAgent>) -> ScriptGenerator {
        ScriptGenerator::new(
            agent,
            AgentId::new("asst_1").unwrap(),
            VectorStoreId::new("vs_1"),
        )
    }

    #[tokio::test]
    async fn test_generate_extracts_fenced_code_and_saves() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested/out/script.java");
        let agent = Arc::new(
            ScriptedAgent::new().with_reply("Here you go:\n```java\nclass Logger {}\n```\nEnjoy."),
        );

        let script = generator(agent.clone())
            .generate("Task: Add logging", ScriptLanguage::Java, &target)
            .await
            .unwrap();

        assert_eq!(script.content, "class Logger {}");
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "class Logger {}");
        assert_eq!(agent.thread_stores(), vec![VectorStoreId::new("vs_1")]);
        let posted = agent.posted();
        assert_eq!(posted.len(), 1);
        assert!(posted[0].content.contains("Task: Add logging"));
    }

    #[tokio::test]
    async fn test_generate_overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("script.py");
        std::fs::write(&target, "old").unwrap();
        let agent = Arc::new(ScriptedAgent::new().with_reply("print('new')"));

        generator(agent)
            .generate("Task: t", ScriptLanguage::Python, &target)
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(&target).unwrap(), "print('new')");
    }

    #[tokio::test]
    async fn test_no_assistant_message_is_a_failure_not_an_empty_script() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("script.java");
        let agent = Arc::new(ScriptedAgent::new());

        let err = generator(agent)
            .generate("Task: t", ScriptLanguage::Java, &target)
            .await
            .unwrap_err();

        assert!(matches!(err, GenerationError::NoAssistantMessage { .. }));
        assert_eq!(err.kind(), ErrorKind::GenerationFailure);
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn test_failed_run_is_a_generation_failure() {
        let dir = tempfile::tempdir().unwrap();
        let agent = Arc::new(ScriptedAgent::new().with_run_status(RunStatus::Failed));

        let err = generator(agent)
            .generate("Task: t", ScriptLanguage::Java, &dir.path().join("s.java"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            GenerationError::Agent(AgentError::RunNotCompleted {
                status: RunStatus::Failed,
                ..
            })
        ));
    }
}

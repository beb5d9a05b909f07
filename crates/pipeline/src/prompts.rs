//! Fixed message templates sent to the agent and the hosting API.

use crate::{ScriptLanguage, WorkItemId};

/// Prompt asking the agent to write a script for a task.
pub fn generation_prompt(language: ScriptLanguage, task: &str) -> String {
    format!(
        "Please generate a {} script based on the following task requirements:\n\n\
         {task}\n\n\
         Ensure that the script follows the company standards and best practices, \
         is well-documented with comments, and includes error handling.",
        language.display_name()
    )
}

/// Prompt asking the agent to refactor an attached script.
pub fn refactor_prompt(language: ScriptLanguage, file_name: &str) -> String {
    let name = language.display_name();
    format!(
        "I have attached a {name} script (`{file_name}`). \
         Please refactor this script according to our company coding standards. \
         Use the {name} coding standards stored in the knowledge base (File Search Tool). \
         Make sure to fix any non-standard practices and improve readability."
    )
}

/// Default question for the `chat` command.
pub fn standards_question(language: ScriptLanguage) -> String {
    format!("What is our {} coding standard?", language.display_name())
}

/// Message of the commit that adds the generated script.
pub fn commit_comment(id: WorkItemId) -> String {
    format!("Generated script for Work Item {id} via AI Agent")
}

/// Title of the pull request opened for a work item.
pub fn pull_request_title(id: WorkItemId) -> String {
    format!("AI Generated Script for Work Item {id}")
}

/// Body of every pull request the automation opens.
pub const PULL_REQUEST_DESCRIPTION: &str =
    "This pull request was automatically generated by the AI Agent.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_prompt_embeds_task_and_language() {
        let prompt = generation_prompt(ScriptLanguage::Java, "Task: Add logging");
        assert!(prompt.starts_with("Please generate a Java script"));
        assert!(prompt.contains("\n\nTask: Add logging\n\n"));
        assert!(prompt.ends_with("includes error handling."));
    }

    #[test]
    fn test_refactor_prompt_names_file() {
        let prompt = refactor_prompt(ScriptLanguage::Python, "legacy.py");
        assert!(prompt.contains("Python script (`legacy.py`)"));
        assert!(prompt.contains("Use the Python coding standards"));
    }

    #[test]
    fn test_pull_request_title_mentions_work_item() {
        assert!(pull_request_title(WorkItemId::new(42)).contains("42"));
        assert_eq!(
            commit_comment(WorkItemId::new(42)),
            "Generated script for Work Item 42 via AI Agent"
        );
    }
}

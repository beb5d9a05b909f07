//! Scriptwright CLI entry point.
//!
//! This binary is the composition root. Responsibilities:
//!
//! 1. **Load configuration**: read `.env` (if present) with `dotenvy`, then
//!    build the typed settings from [`pipeline::config`]. Missing required
//!    variables abort before any network call.
//! 2. **Wire observability**: install the `tracing` subscriber (see
//!    [`telemetry`]) and open a root span carrying a fresh
//!    [`pipeline::AutomationRunId`].
//! 3. **Construct infrastructure**: create [`devops::DevOpsClient`] and
//!    [`agents::AgentClient`] and inject them into the `nodes` flows.
//! 4. **Report**: exit 0 on success, 1 on any failure with the error chain
//!    on stderr.
//!
//! | Command | Flow |
//! |---------|------|
//! | `run` | [`nodes::WorkItemAutomation`] |
//! | `refactor` | [`nodes::ScriptRefactorer`] |
//! | `chat` | [`nodes::AgentChat`] |
//! | `setup-agent` | [`nodes::AgentProvisioner`] |

mod telemetry;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use agents::AgentClient;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use devops::DevOpsClient;
use nodes::{
    AgentChat, AgentProvisioner, AutomationOptions, ProvisionRequest, ScriptGenerator,
    ScriptRefactorer, WorkItemAutomation, DEFAULT_OUTPUT_DIR,
};
use pipeline::config::{agent_id_from_lookup, vector_store_from_lookup};
use pipeline::prompts::standards_question;
use pipeline::{
    AgentSettings, AutomationConfig, AutomationRunId, BranchName, CommitParent, ScriptLanguage,
    WorkItemId,
};
use tracing::{error, info, info_span, Instrument};

#[derive(Parser, Debug)]
#[command(name = "scriptwright")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Generate scripts with a hosted agent and deliver them as pull requests", long_about = None)]
struct Cli {
    /// Emit JSON-formatted log lines
    #[arg(long, global = true, env = "SCRIPTWRIGHT_LOG_JSON")]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Turn a work item into a generated script and a pull request
    Run {
        /// Work item to automate
        #[arg(long)]
        work_item: WorkItemId,

        /// Script language (java or python)
        #[arg(short, long, default_value = "java")]
        language: ScriptLanguage,

        /// Local directory for generated scripts
        #[arg(short, long, default_value = DEFAULT_OUTPUT_DIR)]
        output_dir: PathBuf,

        /// Repository directory to commit into (default: the output directory)
        #[arg(long)]
        repo_dir: Option<PathBuf>,

        /// Branch the feature branch starts from and the pull request targets
        #[arg(long, default_value = "main")]
        base_branch: String,

        /// Keep the feature branch when a later step fails
        #[arg(long)]
        no_cleanup: bool,

        /// Head the commit is pushed on top of
        #[arg(long, value_enum, default_value_t = ParentArg::Base)]
        commit_parent: ParentArg,
    },

    /// Refactor an existing script against the stored coding standards
    Refactor {
        /// Script to refactor
        source: PathBuf,

        /// Where to write the result (default: `<name>_refactored.<ext>` next to the source)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(short, long, default_value = "java")]
        language: ScriptLanguage,
    },

    /// Ask the agent a question and print its replies as JSON
    Chat {
        /// Question to ask (default: the language's coding-standard question)
        question: Option<String>,

        #[arg(short, long, default_value = "java")]
        language: ScriptLanguage,
    },

    /// Upload coding standards, index them, and create an agent that searches them
    SetupAgent {
        /// Model deployment name
        #[arg(long)]
        model: String,

        /// Agent name
        #[arg(long)]
        name: String,

        /// File holding the agent's instructions
        #[arg(long)]
        instructions: PathBuf,

        /// Coding-standards document to index
        #[arg(long)]
        standards: PathBuf,

        /// Name of the vector store to create
        #[arg(long, default_value = "coding-standards")]
        vector_store_name: String,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Self::Run { .. } => "run",
            Self::Refactor { .. } => "refactor",
            Self::Chat { .. } => "chat",
            Self::SetupAgent { .. } => "setup-agent",
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum ParentArg {
    /// Latest commit of the base branch
    Base,
    /// Current head of the feature branch
    Feature,
}

impl From<ParentArg> for CommitParent {
    fn from(arg: ParentArg) -> Self {
        match arg {
            ParentArg::Base => CommitParent::BaseBranch,
            ParentArg::Feature => CommitParent::FeatureBranch,
        }
    }
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn refactored_path(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "script".to_string());
    let name = match source.extension() {
        Some(ext) => format!("{stem}_refactored.{}", ext.to_string_lossy()),
        None => format!("{stem}_refactored"),
    };
    source.with_file_name(name)
}

async fn execute(command: Commands) -> Result<()> {
    match command {
        Commands::Run {
            work_item,
            language,
            output_dir,
            repo_dir,
            base_branch,
            no_cleanup,
            commit_parent,
        } => {
            let config = AutomationConfig::from_lookup(env_lookup)?;
            let base_branch = BranchName::new(base_branch).context("base branch must not be empty")?;
            let devops = Arc::new(DevOpsClient::new(&config.devops)?);
            let agent = Arc::new(AgentClient::new(&config.agent)?);
            let generator = ScriptGenerator::new(
                agent,
                config.agent_id.clone(),
                Some(config.vector_store.clone()),
            );
            let automation =
                WorkItemAutomation::new(devops.clone(), devops.clone(), devops, generator);

            let mut options = AutomationOptions::new(work_item, base_branch);
            options.language = language;
            options.output_dir = output_dir;
            options.repository_dir = repo_dir;
            options.cleanup_on_failure = !no_cleanup;
            options.commit_parent = commit_parent.into();

            let report = automation.run(&options).await?;
            info!(
                work_item = %report.work_item.id,
                script = %report.script.path.display(),
                branch = %report.branch,
                change = %report.change_type,
                pull_request = %report.pull_request,
                "Completed"
            );
            println!("{}", report.pull_request);
        }
        Commands::Refactor {
            source,
            output,
            language,
        } => {
            let settings = AgentSettings::from_lookup(env_lookup)?;
            let agent_id = agent_id_from_lookup(env_lookup)?;
            let vector_store = vector_store_from_lookup(env_lookup)?;
            let output = output.unwrap_or_else(|| refactored_path(&source));
            let client = Arc::new(AgentClient::new(&settings)?);

            let script = ScriptRefactorer::new(client, agent_id, vector_store)
                .refactor(&source, &output, language)
                .await?;
            println!("{}", script.path.display());
        }
        Commands::Chat { question, language } => {
            let settings = AgentSettings::from_lookup(env_lookup)?;
            let agent_id = agent_id_from_lookup(env_lookup)?;
            let vector_store = vector_store_from_lookup(env_lookup).ok();
            let client = Arc::new(AgentClient::new(&settings)?);
            let question = question.unwrap_or_else(|| standards_question(language));

            let replies = AgentChat::new(client, agent_id, vector_store)
                .ask(&question)
                .await?;
            println!("{}", serde_json::to_string_pretty(&replies)?);
        }
        Commands::SetupAgent {
            model,
            name,
            instructions,
            standards,
            vector_store_name,
        } => {
            let settings = AgentSettings::from_lookup(env_lookup)?;
            let client = Arc::new(AgentClient::new(&settings)?);

            let provisioned = AgentProvisioner::new(client)
                .provision(&ProvisionRequest {
                    model,
                    agent_name: name,
                    instructions_file: instructions,
                    standards_file: standards,
                    vector_store_name,
                })
                .await?;
            println!("AGENT_ID={}", provisioned.agent);
            println!("VECTOR_STORE_ID={}", provisioned.vector_store);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let telemetry = telemetry::init(cli.json);

    let run_id = AutomationRunId::new_random();
    let span = info_span!("scriptwright", run_id = %run_id, command = cli.command.name());
    let result = execute(cli.command).instrument(span).await;

    let code = match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(run_id = %run_id, error = %format!("{e:#}"), "scriptwright failed");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    };
    telemetry.shutdown();
    code
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_defaults() {
        let cli = Cli::try_parse_from(["scriptwright", "run", "--work-item", "42"]).unwrap();
        match cli.command {
            Commands::Run {
                work_item,
                language,
                output_dir,
                base_branch,
                no_cleanup,
                commit_parent,
                ..
            } => {
                assert_eq!(work_item, WorkItemId::new(42));
                assert_eq!(language, ScriptLanguage::Java);
                assert_eq!(output_dir, PathBuf::from("generated_scripts"));
                assert_eq!(base_branch, "main");
                assert!(!no_cleanup);
                assert_eq!(CommitParent::from(commit_parent), CommitParent::BaseBranch);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_run_rejects_non_numeric_work_item() {
        assert!(Cli::try_parse_from(["scriptwright", "run", "--work-item", "abc"]).is_err());
    }

    #[test]
    fn test_refactor_accepts_python_alias() {
        let cli = Cli::try_parse_from(["scriptwright", "refactor", "legacy.py", "-l", "py"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Refactor {
                language: ScriptLanguage::Python,
                ..
            }
        ));
    }

    #[test]
    fn test_refactored_path_sits_next_to_source() {
        assert_eq!(
            refactored_path(Path::new("scripts/Legacy.java")),
            PathBuf::from("scripts/Legacy_refactored.java")
        );
    }
}

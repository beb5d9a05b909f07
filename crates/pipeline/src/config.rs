//! Typed configuration, validated once at startup.
//!
//! Every setting comes from an environment lookup. The lookup is injected
//! (`from_lookup`) so tests never touch the process environment; `from_env`
//! is the thin production wrapper. Empty values count as missing.
//!
//! | Variable | Required by |
//! |----------|-------------|
//! | `ADO_PAT` | every hosting API call (checked first) |
//! | `ADO_ORG` or `ADO_BASE_URL` | hosting API base URL |
//! | `ADO_PROJECT`, `ADO_REPO` | hosting API paths |
//! | `PROJECT_CONNECTION_STRING` | agent service endpoint |
//! | `AGENT_ACCESS_TOKEN` | agent service bearer token |
//! | `AGENT_ENDPOINT` | optional override of the derived endpoint |
//! | `AGENT_ID`, `VECTOR_STORE_ID` | the orchestration sequence and `refactor` |
//! | `SCRIPTWRIGHT_REQUEST_TIMEOUT_SECS` | optional, default 60 |

use std::time::Duration;

use thiserror::Error;

use crate::{AgentId, VectorStoreId};

pub const ENV_ADO_PAT: &str = "ADO_PAT";
pub const ENV_ADO_ORG: &str = "ADO_ORG";
pub const ENV_ADO_BASE_URL: &str = "ADO_BASE_URL";
pub const ENV_ADO_PROJECT: &str = "ADO_PROJECT";
pub const ENV_ADO_REPO: &str = "ADO_REPO";
pub const ENV_CONNECTION_STRING: &str = "PROJECT_CONNECTION_STRING";
pub const ENV_AGENT_ACCESS_TOKEN: &str = "AGENT_ACCESS_TOKEN";
pub const ENV_AGENT_ENDPOINT: &str = "AGENT_ENDPOINT";
pub const ENV_AGENT_ID: &str = "AGENT_ID";
pub const ENV_VECTOR_STORE_ID: &str = "VECTOR_STORE_ID";
pub const ENV_REQUEST_TIMEOUT: &str = "SCRIPTWRIGHT_REQUEST_TIMEOUT_SECS";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(600);

/// Invalid or incomplete configuration. Raised before any network call.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{variable} is not set")]
    Missing { variable: &'static str },

    #[error("{variable} is invalid: {message}")]
    Invalid {
        variable: &'static str,
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Secrets
// ---------------------------------------------------------------------------

/// A credential that must never appear in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the raw credential for placing in an auth header.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret(***)")
    }
}

// ---------------------------------------------------------------------------
// Lookup helpers
// ---------------------------------------------------------------------------

fn optional(lookup: &impl Fn(&str) -> Option<String>, variable: &'static str) -> Option<String> {
    lookup(variable)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(
    lookup: &impl Fn(&str) -> Option<String>,
    variable: &'static str,
) -> Result<String, ConfigError> {
    optional(lookup, variable).ok_or(ConfigError::Missing { variable })
}

fn request_timeout(lookup: &impl Fn(&str) -> Option<String>) -> Result<Duration, ConfigError> {
    match optional(lookup, ENV_REQUEST_TIMEOUT) {
        None => Ok(DEFAULT_REQUEST_TIMEOUT),
        Some(raw) => match raw.parse::<u64>() {
            Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
            _ => Err(ConfigError::Invalid {
                variable: ENV_REQUEST_TIMEOUT,
                message: format!("expected a positive number of seconds, got '{raw}'"),
            }),
        },
    }
}

fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

// ---------------------------------------------------------------------------
// Hosting API
// ---------------------------------------------------------------------------

/// API versions pinned per call family.
///
/// The hosting API accepts different versions per endpoint; the defaults are
/// the versions these calls were written against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiVersions {
    pub work_items: String,
    pub git: String,
    pub pull_requests: String,
}

impl Default for ApiVersions {
    fn default() -> Self {
        Self {
            work_items: "6.0".to_string(),
            git: "7.1".to_string(),
            pull_requests: "6.0".to_string(),
        }
    }
}

/// Connection settings for the hosting REST API.
#[derive(Debug, Clone)]
pub struct DevOpsSettings {
    /// Organisation URL without a trailing slash, e.g. `https://dev.azure.com/contoso`.
    pub organization_url: String,
    pub project: String,
    pub repository: String,
    pub pat: Secret,
    pub api_versions: ApiVersions,
    pub request_timeout: Duration,
}

impl DevOpsSettings {
    /// Reads the settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(process_env)
    }

    /// Reads the settings through `lookup`. The access token is validated first.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let pat = Secret::new(required(&lookup, ENV_ADO_PAT)?);
        let organization_url = match optional(&lookup, ENV_ADO_BASE_URL) {
            Some(url) => url,
            None => format!("https://dev.azure.com/{}", required(&lookup, ENV_ADO_ORG)?),
        };
        Ok(Self {
            organization_url: organization_url.trim_end_matches('/').to_string(),
            project: required(&lookup, ENV_ADO_PROJECT)?,
            repository: required(&lookup, ENV_ADO_REPO)?,
            pat,
            api_versions: ApiVersions::default(),
            request_timeout: request_timeout(&lookup)?,
        })
    }

    /// Project-scoped API root, e.g. `https://dev.azure.com/contoso/web/_apis`.
    pub fn api_root(&self) -> String {
        format!("{}/{}/_apis", self.organization_url, self.project)
    }
}

// ---------------------------------------------------------------------------
// Agent service
// ---------------------------------------------------------------------------

/// Parsed project connection string: `<host>;<subscription>;<resource group>;<project>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectConnection {
    pub host: String,
    pub subscription_id: String,
    pub resource_group: String,
    pub project_name: String,
}

impl std::str::FromStr for ProjectConnection {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(';').map(str::trim).collect();
        match parts.as_slice() {
            [host, subscription, group, project]
                if [host, subscription, group, project].iter().all(|p| !p.is_empty()) =>
            {
                Ok(Self {
                    host: host
                        .trim_start_matches("https://")
                        .trim_end_matches('/')
                        .to_string(),
                    subscription_id: subscription.to_string(),
                    resource_group: group.to_string(),
                    project_name: project.to_string(),
                })
            }
            _ => Err(ConfigError::Invalid {
                variable: ENV_CONNECTION_STRING,
                message: "expected '<host>;<subscription id>;<resource group>;<project name>'"
                    .to_string(),
            }),
        }
    }
}

/// Connection settings for the agent service.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub connection: ProjectConnection,
    /// Replaces the endpoint derived from `connection` when set.
    pub endpoint_override: Option<String>,
    pub access_token: Secret,
    pub request_timeout: Duration,
    /// Delay between status polls for runs, files, and vector stores.
    pub poll_interval: Duration,
    /// Upper bound on any single polling loop.
    pub max_wait: Duration,
}

impl AgentSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(process_env)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let connection = required(&lookup, ENV_CONNECTION_STRING)?.parse()?;
        Ok(Self {
            connection,
            endpoint_override: optional(&lookup, ENV_AGENT_ENDPOINT)
                .map(|url| url.trim_end_matches('/').to_string()),
            access_token: Secret::new(required(&lookup, ENV_AGENT_ACCESS_TOKEN)?),
            request_timeout: request_timeout(&lookup)?,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_wait: DEFAULT_MAX_WAIT,
        })
    }
}

/// Reads the agent identifier (required by `run`, `refactor`, `chat`).
pub fn agent_id_from_lookup(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<AgentId, ConfigError> {
    AgentId::new(required(&lookup, ENV_AGENT_ID)?).ok_or(ConfigError::Missing {
        variable: ENV_AGENT_ID,
    })
}

/// Reads the vector-store identifier (required by `run` and `refactor`).
pub fn vector_store_from_lookup(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<VectorStoreId, ConfigError> {
    VectorStoreId::new(required(&lookup, ENV_VECTOR_STORE_ID)?).ok_or(ConfigError::Missing {
        variable: ENV_VECTOR_STORE_ID,
    })
}

// ---------------------------------------------------------------------------
// Orchestration
// ---------------------------------------------------------------------------

/// Which head the commit step sends as the push's expected parent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CommitParent {
    /// Re-fetch the base branch's latest commit. Equal to the feature branch
    /// head as long as nothing moved the feature branch since it was created.
    #[default]
    BaseBranch,
    /// Use the feature branch's own current head.
    FeatureBranch,
}

/// Everything the orchestration sequence needs, validated as a whole.
#[derive(Debug, Clone)]
pub struct AutomationConfig {
    pub devops: DevOpsSettings,
    pub agent: AgentSettings,
    pub agent_id: AgentId,
    pub vector_store: VectorStoreId,
}

impl AutomationConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(process_env)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let devops = DevOpsSettings::from_lookup(&lookup)?;
        let agent = AgentSettings::from_lookup(&lookup)?;
        Ok(Self {
            devops,
            agent,
            agent_id: agent_id_from_lookup(&lookup)?,
            vector_store: vector_store_from_lookup(&lookup)?,
        })
    }
}

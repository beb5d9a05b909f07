//! Scriptwright agent service adapter.
//!
//! Implements [`pipeline::AgentBackend`] over the agent service's REST API
//! with a single [`AgentClient`].
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Endpoint derivation from the project connection
//! string, bearer authentication, API-version pinning, JSON shapes, and the
//! polling of long-running operations live here. The [`pipeline`] crate
//! sees only [`pipeline::AgentBackend`].
//!
//! ## Long-running operations
//!
//! | Operation | Polled resource | Done when |
//! |-----------|-----------------|-----------|
//! | run | `threads/{thread}/runs/{run}` | status is terminal |
//! | file upload | `files/{file}` | `processed` (or `error` → `UploadFailed`) |
//! | vector store | `vector_stores/{store}` | `completed` (failed files or `expired` → `IndexingFailed`) |
//!
//! Every loop sleeps [`pipeline::AgentSettings::poll_interval`] between
//! polls and gives up with [`pipeline::AgentError::Timeout`] after
//! [`pipeline::AgentSettings::max_wait`].

mod client;
mod wire;

pub use client::{endpoint_for, AgentClient, API_VERSION};

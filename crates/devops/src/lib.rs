//! Scriptwright hosting REST API adapter.
//!
//! Implements the hosting-facing traits defined in the [`pipeline`] crate
//! ([`pipeline::WorkItemTracker`], [`pipeline::CodeRepository`],
//! [`pipeline::PullRequestManager`]) with a single [`DevOpsClient`] over
//! `reqwest`.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** This crate must not contain domain rules. URL layout,
//! API-version pinning, authentication, JSON shapes, and the mapping from HTTP
//! status codes to [`pipeline::HostError`] all live here; the [`pipeline`]
//! crate never sees them.
//!
//! ## Status mapping
//!
//! | Call | Success | Other outcomes |
//! |------|---------|----------------|
//! | work item | 200 | 401 → `Authentication`, else `Status` with body |
//! | latest commit | 200 with ≥ 1 commit | empty list → `NoCommitsFound` |
//! | create / delete branch | 200 or 201, no per-ref rejection | `RefRejected` |
//! | file check | 200 → exists, 404 → absent | anything else → `RepoProbe` |
//! | push | 201, head from body or the branch ref | `Status` |
//! | pull request | 201, id and URL if the body has them | `Status` |

mod client;
mod wire;

pub use client::DevOpsClient;

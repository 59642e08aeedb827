//! # nightwatch_github
//!
//! Code-host client for Nightwatch.
//!
//! Three concerns, behind the [`CodeHost`] trait so the pipeline can be
//! tested without the network:
//!
//! - **Run logs**: download the workflow-run zip archive and split it into
//!   per-job log texts.
//! - **Review requests and escalation issues**: thin REST calls returning
//!   the created resource URL.
//! - **Git plumbing** ([`GitWorkspace`]): shallow clone at a commit for
//!   reproduction workspaces, plus branch/commit/push for publishing fixes.

pub mod client;
pub mod error;
pub mod git;
pub mod logs;
pub mod mock;

pub use client::{CodeHost, GithubClient, PullRequestSpec};
pub use error::{HostError, HostResult};
pub use git::{GitWorkspace, CLONE_DEPTH};
pub use logs::{extract_job_logs, JobLog};
pub use mock::{CapturedIssue, CapturedPullRequest, MockCodeHost};

//! # nightwatch_core
//!
//! The healing pipeline: the stateful orchestrator that drives each failed
//! CI run from ingestion to a terminal outcome.
//!
//! # Architecture
//!
//! - **Events** ([`event`]): ingestion shape, accept/ignore screening, and
//!   webhook signature verification
//! - **Logs** ([`logs`]): localize the failing job's log and truncate it to
//!   an error-relevant excerpt
//! - **Stages** ([`analysis`], [`testgen`], [`fixgen`]): the three
//!   structured LLM call sites with strict parsing and normalization
//! - **Reproduction** ([`repro`]): clone at the failing commit and re-run
//!   the suite in a sandbox
//! - **Fix loop** ([`fix_loop`]): bounded synthesize/apply/verify cycles
//!   with revert between attempts
//! - **Orchestrator** ([`pipeline`]): the state machine tying it together,
//!   persisting every transition before the next stage
//! - **Janitor** ([`janitor`]): timed sweep of stale sandboxes and
//!   workspaces

pub mod analysis;
pub mod config;
pub mod error;
pub mod event;
pub mod fix_loop;
pub mod fixgen;
pub mod janitor;
pub mod logs;
pub mod patch;
pub mod pipeline;
pub mod repro;
pub mod testgen;

pub use analysis::{analyze_failure, AnalysisArtifact, ErrorKind, LOW_CONFIDENCE_THRESHOLD};
pub use config::{AgentConfig, DEFAULT_SANDBOX_IMAGE};
pub use error::{PatchError, PipelineError, PipelineResult};
pub use event::{
    screen_event, sign_body, verify_signature, EventDecision, FailureEvent, WorkflowRunEvent,
};
pub use fix_loop::{run_fix_loop, AttemptOutcome, FixLoopContext, FixOutcome, MAX_FIX_ATTEMPTS};
pub use fixgen::{synthesize_fix, PriorAttempt};
pub use janitor::{Janitor, SweepReport, DEFAULT_MAX_AGE};
pub use logs::{localize_failure_log, truncate_log, DEFAULT_LOG_BUDGET};
pub use patch::{apply_patch, revert_patch, PatchArtifact};
pub use pipeline::{Ack, Pipeline, PipelineConfig};
pub use repro::{
    default_test_command, detect_harness, reproduce, run_test_suite, Harness, Reproduction,
    ReproRequest, DEFAULT_TEST_TIMEOUT,
};
pub use testgen::{derive_test_path, synthesize_test, GeneratedTest};

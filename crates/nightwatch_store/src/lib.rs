//! # nightwatch_store
//!
//! Durable state for the repair pipeline: failures, fix attempts, and
//! generated tests in a single SQLite database (WAL mode). The pipeline
//! persists every status transition before starting the next stage, so an
//! external observer only ever sees monotone progress.

pub mod store;

pub use store::{
    AnalysisUpdate, AttemptVerdict, FailureRecord, FailureStatus, FailureStore, FixAttemptRecord,
    GeneratedTestRecord, NewFailure, NewFixAttempt, StoreError, StoreResult,
};

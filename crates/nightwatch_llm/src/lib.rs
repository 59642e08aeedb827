//! # nightwatch_llm
//!
//! LLM completion transport for Nightwatch.
//!
//! The repair pipeline delegates all log interpretation to a completion
//! provider behind the [`CompletionModel`] trait: one prompt string in, one
//! UTF-8 text response out. The three structured call sites (failure
//! analysis, test synthesis, fix synthesis) live in `nightwatch_core`; this
//! crate only knows how to move prompts over HTTP reliably.
//!
//! [`ChatClient`] speaks the OpenAI and Anthropic APIs with a 60 s request
//! timeout and retry on transient failures. [`MockModel`] scripts responses
//! for tests.

pub mod client;
pub mod error;
pub mod mock;

pub use client::{ChatClient, CompletionModel, LlmProvider};
pub use error::{LlmError, LlmResult};
pub use mock::{CapturedPrompt, MockModel};

//! proofbench-llm: chat-completion access for proofbench
//!
//! The benchmark runner only depends on the [`ChatClient`] trait. This crate
//! supplies the OpenAI-compatible HTTP implementation, environment-based
//! endpoint resolution, and in-memory fakes for tests.

pub mod client;
pub mod config;
pub mod error;
pub mod fakes;

pub use client::{extract_text, ChatClient, ChatRequest, ChatResponse, OpenAiChatClient};
pub use config::{EndpointConfig, DEFAULT_API_PATH, DEFAULT_MODEL, DEFAULT_TIMEOUT_SECS};
pub use error::ChatError;

/// Result type for chat operations.
pub type Result<T> = std::result::Result<T, ChatError>;

//! Generation provider surface for castpage.
//!
//! Defines the provider-neutral chat types and the `LlmClient` contract the
//! artifact generator calls, plus an OpenAI-compatible HTTP client.
mod openai;
mod retry;
mod types;

pub use openai::{OpenAiClient, OpenAiConfig};
pub use retry::{next_backoff_ms, parse_retry_after_ms, should_retry_status};
pub use types::{
    AiError, ChatRequest, ChatResponse, ChatUsage, LlmClient, Message, MessageRole,
};

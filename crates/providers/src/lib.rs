//! Language model providers.
//!
//! Only OpenAI-compatible chat completions are supported; other backends
//! plug in through [`LlmProvider`].

pub mod model;
pub mod openai;

pub use {
    model::{ChatMessage, CompletionOptions, CompletionResponse, LlmProvider, Usage},
    openai::OpenAiProvider,
};

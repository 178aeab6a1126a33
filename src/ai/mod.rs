//! AI Integration Layer
//!
//! Provider abstraction, model-output parsing, timeouts, and the
//! [`Inference`] collaborator the planner and responder talk to.

pub mod inference;
pub mod json;
pub mod provider;
pub mod timeout;

pub use inference::{Completion, Inference};
pub use json::parse_model_json;
pub use provider::{
    LlmProvider, LlmResponse, OllamaProvider, OpenAiProvider, SharedProvider, TokenUsage,
    create_provider,
};
pub use timeout::{TimeoutConfig, with_timeout};

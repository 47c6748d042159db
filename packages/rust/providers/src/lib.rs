//! External collaborators consumed by the research pipeline.
//!
//! Each collaborator sits behind a trait so the pipeline can run against
//! real HTTP APIs or scripted test doubles:
//! - [`LanguageModel`]: chat completion ([`OpenAiChatModel`])
//! - [`SearchProvider`]: web search ([`TavilySearch`])

mod model;
mod search;

pub use model::{LanguageModel, OpenAiChatModel, Prompt, PromptKind};
pub use search::{SearchProvider, TavilySearch};

/// User-Agent string for outbound requests.
pub(crate) const USER_AGENT: &str = concat!("researcher/", env!("CARGO_PKG_VERSION"));

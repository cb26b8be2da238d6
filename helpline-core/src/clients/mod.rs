//! Outbound HTTP clients: the text classifier service and the per-workspace
//! chat providers.

pub mod classifier;
pub mod llm;

pub use classifier::{Classification, ClassifierClient, TagOccurrence};
pub use llm::{
    AnythingLlmProvider, ChatProvider, LlmProviderFactory, OllamaProvider, OpenAiCompatProvider,
    ProviderFactory, StaticProvider, StaticProviderFactory,
};

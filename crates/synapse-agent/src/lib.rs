//! Language-model access for Synapse.
//!
//! The coordinator talks to models in two places: the quality judge that
//! scores every orchestrated call, and the default agent invoker used by
//! downstream triggers. Both go through the [`LlmBackend`] trait so tests can
//! swap in deterministic mocks.

/// Provider backends and the [`LlmBackend`] trait.
pub mod backends;
/// Model configuration.
pub mod config;
/// Provider-dispatching client.
pub mod llm;

pub use backends::LlmBackend;
pub use config::{LlmProvider, ModelConfig};
pub use llm::LlmClient;

//! Core types and error definitions for the Synapse agent coordinator.
//!
//! This crate provides the foundational types shared across all Synapse crates:
//! the unified error enum, the closed set of agent names, and small text helpers
//! used when summarising agent input and output.
//!
//! # Main types
//!
//! - [`SynapseError`]: Unified error enum for all Synapse subsystems.
//! - [`SynapseResult`]: Convenience alias for `Result<T, SynapseError>`.
//! - [`AgentName`]: The closed set of agents the coordinator knows about.

/// The closed set of agent identifiers.
pub mod agent;
/// Error types.
pub mod error;
/// Bounded text helpers for log summaries.
pub mod text;

pub use agent::AgentName;
pub use error::{SynapseError, SynapseResult};
pub use text::{truncate, truncate_json};

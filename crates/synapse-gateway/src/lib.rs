//! HTTP transport for Synapse.
//!
//! Exposes orchestrator state, the live event feed (SSE with replay), and
//! checklist CRUD over axum. Handlers call the [`SynapseContext`] accessors
//! directly and hold no state of their own.
//!
//! [`SynapseContext`]: synapse_orchestrator::SynapseContext

pub mod server;

pub use server::GatewayServer;

//! Agent wiring - credentials, tools, the chat client, and workflows
//!
//! This crate is the glue between the core availability query and a hosted
//! language-model service:
//! - `credential` - scoped token acquisition (default chain or managed identity)
//! - `tools` - the callable-capability table with declared parameter schemas
//! - `client` - the chat backend seam, the HTTP backend, and the agent run loop
//! - `workflow` - named agent nodes wired by directed edges, run sequentially
//!
//! # Key Types
//!
//! - `Agent` - a named, instructed participant, optionally equipped with tools
//! - `ChatBackend` - pluggable trait hiding the remote model service
//! - `Workflow` - a validated linear chain of agents served like one agent
//!
//! The agent never computes hotel availability itself; it only relays the text
//! the registered tool returns.

pub mod client;
pub mod credential;
pub mod tools;
pub mod workflow;

pub use client::{
    Agent, AgentClient, AgentDefinition, AgentError, AgentMessage, AgentResponse, ChatBackend,
    ChatMessage, ChatRequest, ChatTurn, HttpChatBackend, Runnable, ToolCallRequest,
};
pub use credential::{
    select_provider, AccessToken, CredentialError, CredentialProvider, DefaultCredential,
    ManagedIdentityCredential,
};
pub use tools::{FindHotelsTool, Tool, ToolError, ToolRegistry, ToolSpec};
pub use workflow::{Workflow, WorkflowBuilder, WorkflowError};

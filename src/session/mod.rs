//! Agent runtime sessions
//!
//! This module provides the runtime boundary (traits and session
//! configuration), the typed message stream, the invoker that scopes one
//! task to one isolated session, and a subprocess-backed runtime for the
//! agent CLI.

pub mod cli;
pub mod invoker;
pub mod message;
pub mod runtime;

pub use cli::CliRuntime;
pub use invoker::{SessionInvoker, SessionResult};
pub use message::{AgentMessage, ContentBlock, ConversationMessage, MessageContent, ResultMessage};
pub use runtime::{
    receive_response, AgentRuntime, AgentSession, ServerDescriptor, SessionConfig, SessionError,
    StdioServer,
};

//! Agent runtime boundary
//!
//! The runtime itself (model calls, tool execution, context accounting) is an
//! external collaborator. This module defines the seam it is reached through:
//! [`AgentRuntime`] opens sessions from a [`SessionConfig`], and an
//! [`AgentSession`] carries exactly one request/response exchange.

use super::message::AgentMessage;
use crate::tools::ToolServer;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// External tool-server process, forwarded to the runtime untouched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StdioServer {
    pub command: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
}

/// How the runtime reaches a named tool-server
#[derive(Clone)]
pub enum ServerDescriptor {
    /// Spawned by the runtime as a child process
    Stdio(StdioServer),
    /// Hosted in this process and reached over the session's control channel
    InProcess(Arc<ToolServer>),
}

impl ServerDescriptor {
    /// Entry for the runtime's `mcpServers` configuration object
    pub fn to_mcp_config(&self, name: &str) -> Value {
        match self {
            ServerDescriptor::Stdio(server) => json!({
                "command": server.command,
                "args": server.args,
                "env": server.env,
            }),
            ServerDescriptor::InProcess(_) => json!({
                "type": "sdk",
                "name": name,
            }),
        }
    }
}

impl fmt::Debug for ServerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerDescriptor::Stdio(server) => f.debug_tuple("Stdio").field(server).finish(),
            ServerDescriptor::InProcess(server) => f
                .debug_tuple("InProcess")
                .field(&format_args!("{}@{}", server.name(), server.version()))
                .finish(),
        }
    }
}

impl PartialEq for ServerDescriptor {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ServerDescriptor::Stdio(a), ServerDescriptor::Stdio(b)) => a == b,
            (ServerDescriptor::InProcess(a), ServerDescriptor::InProcess(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Everything a runtime needs to open one isolated session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionConfig {
    /// The only tool-servers the session may see
    pub mcp_servers: BTreeMap<String, ServerDescriptor>,
    pub system_prompt: Option<String>,
    /// Explicit tool allow-list; `None` keeps the runtime default
    pub allowed_tools: Option<Vec<String>>,
}

impl SessionConfig {
    pub fn server_names(&self) -> Vec<&str> {
        self.mcp_servers.keys().map(String::as_str).collect()
    }

    /// `{"mcpServers": {...}}` document understood by the agent CLI
    pub fn mcp_config(&self) -> Value {
        let servers: Map<String, Value> = self
            .mcp_servers
            .iter()
            .map(|(name, descriptor)| (name.clone(), descriptor.to_mcp_config(name)))
            .collect();
        json!({ "mcpServers": servers })
    }

    /// In-process servers keyed by the name the runtime will address them by
    pub fn in_process_servers(&self) -> BTreeMap<String, Arc<ToolServer>> {
        self.mcp_servers
            .iter()
            .filter_map(|(name, descriptor)| match descriptor {
                ServerDescriptor::InProcess(server) => Some((name.clone(), Arc::clone(server))),
                ServerDescriptor::Stdio(_) => None,
            })
            .collect()
    }
}

/// Session failures; none are retried locally
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SessionError {
    /// Runtime unreachable, failed to start, or rejected a server descriptor
    #[error("Connection failed: {message}")]
    Connection { message: String },

    /// Runtime answered but reported an authentication or configuration error
    #[error("Runtime reported an error: {message}")]
    Runtime { message: String },

    /// Response stream terminated abnormally mid-exchange
    #[error("Response stream failed: {message}")]
    Stream { message: String },

    #[error("Session timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("Session cancelled")]
    Cancelled,
}

impl SessionError {
    pub fn connection<S: Into<String>>(message: S) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    pub fn runtime<S: Into<String>>(message: S) -> Self {
        Self::Runtime {
            message: message.into(),
        }
    }

    pub fn stream<S: Into<String>>(message: S) -> Self {
        Self::Stream {
            message: message.into(),
        }
    }
}

/// Agent runtime client, injected so tests can script it
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    /// Runtime name for logs
    fn name(&self) -> &str;

    /// Open a session that sees exactly the servers in `config`
    async fn open(&self, config: &SessionConfig) -> Result<Box<dyn AgentSession>, SessionError>;
}

/// One bounded request/response exchange
///
/// Dropping a session must release whatever it holds, so a cancelled or
/// timed-out invocation never leaks the underlying connection.
#[async_trait]
pub trait AgentSession: Send {
    /// Send the user turn
    async fn send(&mut self, prompt: &str) -> Result<(), SessionError>;

    /// Next message of the current turn; `Ok(None)` once the turn has ended
    async fn next_message(&mut self) -> Result<Option<AgentMessage>, SessionError>;

    /// Release the session
    async fn close(&mut self) -> Result<(), SessionError>;
}

/// Lazily drain one turn as a stream
///
/// Yields messages in arrival order and stops after the first error.
pub fn receive_response(
    session: &mut dyn AgentSession,
) -> BoxStream<'_, Result<AgentMessage, SessionError>> {
    stream::unfold((session, false), |(session, failed)| async move {
        if failed {
            return None;
        }
        match session.next_message().await {
            Ok(Some(message)) => Some((Ok(message), (session, false))),
            Ok(None) => None,
            Err(error) => Some((Err(error), (session, true))),
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filesystem_server() -> ServerDescriptor {
        ServerDescriptor::Stdio(StdioServer {
            command: "npx".to_string(),
            args: vec![
                "-y".to_string(),
                "@modelcontextprotocol/server-filesystem".to_string(),
            ],
            env: BTreeMap::from([("ALLOWED_PATHS".to_string(), "/srv".to_string())]),
        })
    }

    #[test]
    fn test_mcp_config_lists_only_configured_servers() {
        let config = SessionConfig {
            mcp_servers: BTreeMap::from([("filesystem".to_string(), filesystem_server())]),
            system_prompt: None,
            allowed_tools: None,
        };

        let document = config.mcp_config();
        let servers = document["mcpServers"].as_object().unwrap();

        assert_eq!(servers.len(), 1);
        assert_eq!(servers["filesystem"]["command"], "npx");
        assert_eq!(servers["filesystem"]["env"]["ALLOWED_PATHS"], "/srv");
    }

    #[test]
    fn test_in_process_server_config_entry() {
        let server = Arc::new(ToolServer::new("code-tools", "1.0.0"));
        let config = SessionConfig {
            mcp_servers: BTreeMap::from([(
                "code-tools".to_string(),
                ServerDescriptor::InProcess(server),
            )]),
            ..Default::default()
        };

        assert_eq!(
            config.mcp_config()["mcpServers"]["code-tools"],
            json!({"type": "sdk", "name": "code-tools"})
        );
        assert_eq!(config.in_process_servers().len(), 1);
    }

    #[test]
    fn test_empty_config_has_no_servers() {
        let config = SessionConfig::default();
        assert!(config.server_names().is_empty());
        assert_eq!(config.mcp_config(), json!({"mcpServers": {}}));
    }

    #[test]
    fn test_in_process_descriptors_compare_by_identity() {
        let a = Arc::new(ToolServer::new("code-tools", "1.0.0"));
        let b = Arc::new(ToolServer::new("code-tools", "1.0.0"));

        assert_eq!(
            ServerDescriptor::InProcess(Arc::clone(&a)),
            ServerDescriptor::InProcess(a)
        );
        assert_ne!(
            ServerDescriptor::InProcess(b),
            ServerDescriptor::InProcess(Arc::new(ToolServer::new("code-tools", "1.0.0")))
        );
    }
}

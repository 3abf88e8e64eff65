//! MCP isolation: per-task tool-server visibility for an LLM agent runtime
//!
//! Every task gets its own agent session configured with only the
//! tool-servers, system prompt and tool allow-list of one capability profile.
//!
//! # Overview
//!
//! - [`routing`]: capability profiles, the profile registry, and the keyword
//!   classifier that maps a free-text task to exactly one profile
//! - [`session`]: the runtime boundary, typed stream messages, the session
//!   invoker, and a subprocess runtime for the agent CLI
//! - [`tools`]: in-process tool servers with schema-validated tools
//! - [`agent`]: the orchestrator for single tasks, batches and cancellable
//!   background invocations
//!
//! # Quick Start
//!
//! ```rust
//! use mcp_isolation::config::{AppConfig, MatchMode};
//! use mcp_isolation::routing::{CapabilityProfile, ProfileRegistry, TaskClassifier};
//! use std::sync::Arc;
//!
//! let registry = Arc::new(ProfileRegistry::from_config(&AppConfig::default()).unwrap());
//! let classifier = TaskClassifier::new(Arc::clone(&registry), MatchMode::Substring);
//!
//! assert_eq!(
//!     classifier.classify("Scrape product data from example.com"),
//!     CapabilityProfile::Browser
//! );
//!
//! let session = registry.session_config(CapabilityProfile::Browser);
//! assert_eq!(session.server_names(), vec!["playwright"]);
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod observability;
pub mod routing;
pub mod session;
pub mod testing;
pub mod tools;

pub use agent::{BatchReport, InvocationHandle, Orchestrator, TaskOutcome, TaskReport};
pub use config::{AppConfig, ConfigError};
pub use error::{AgentError, AgentResult, FailureKind};
pub use routing::{CapabilityProfile, ProfileRegistry, TaskAnalysis, TaskClassifier};
pub use session::{AgentRuntime, AgentSession, SessionConfig, SessionError, SessionResult};
pub use tools::{Tool, ToolDescription, ToolError, ToolServer};

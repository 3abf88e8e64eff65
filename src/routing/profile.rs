//! Capability profiles and the immutable registry that backs them
//!
//! A profile is a named bundle of tool-server visibility plus prompt and
//! allow-list settings. The [`ProfileRegistry`] is built once from
//! configuration and shared read-only by the classifier and the invoker.

use crate::config::{AppConfig, ConfigError, ProfileSpec};
use crate::session::{ServerDescriptor, SessionConfig, StdioServer};
use crate::tools::{builtin, ToolServer};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Closed set of capability profiles, listed in classification priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityProfile {
    Browser,
    Filesystem,
    Database,
    General,
}

impl CapabilityProfile {
    /// All profiles in priority order; General is the fallback and comes last
    pub const ALL: [CapabilityProfile; 4] = [
        CapabilityProfile::Browser,
        CapabilityProfile::Filesystem,
        CapabilityProfile::Database,
        CapabilityProfile::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityProfile::Browser => "browser",
            CapabilityProfile::Filesystem => "filesystem",
            CapabilityProfile::Database => "database",
            CapabilityProfile::General => "general",
        }
    }
}

impl fmt::Display for CapabilityProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CapabilityProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "browser" => Ok(CapabilityProfile::Browser),
            "filesystem" => Ok(CapabilityProfile::Filesystem),
            "database" => Ok(CapabilityProfile::Database),
            "general" => Ok(CapabilityProfile::General),
            other => Err(format!("unknown capability profile '{other}'")),
        }
    }
}

/// Rough task complexity attached to a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    Complex,
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Complexity::Simple => f.write_str("simple"),
            Complexity::Complex => f.write_str("complex"),
        }
    }
}

/// Fully materialized profile: session settings plus routing metadata
#[derive(Debug, Clone)]
pub struct ProfileDefinition {
    pub profile: CapabilityProfile,
    pub session: SessionConfig,
    pub keywords: Vec<String>,
    pub complexity: Complexity,
}

impl ProfileDefinition {
    /// Names of the tool-servers this profile exposes
    pub fn server_names(&self) -> Vec<String> {
        self.session.mcp_servers.keys().cloned().collect()
    }
}

/// Immutable table of every profile's definition
#[derive(Debug, Clone)]
pub struct ProfileRegistry {
    profiles: HashMap<CapabilityProfile, ProfileDefinition>,
    tool_servers: BTreeMap<String, Arc<ToolServer>>,
}

impl ProfileRegistry {
    /// Build the registry from configuration
    ///
    /// Every server a profile names must exist in `[servers]` or
    /// `[sdk_servers]`; in-process servers are assembled from builtin tools.
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        let mut sdk_servers: BTreeMap<String, Arc<ToolServer>> = BTreeMap::new();
        for (name, spec) in &config.sdk_servers {
            let mut server = ToolServer::new(name.clone(), spec.version.clone());
            for tool_name in &spec.tools {
                let tool = builtin::create_builtin_tool(tool_name).ok_or_else(|| {
                    ConfigError::UnknownTool {
                        server: name.clone(),
                        tool: tool_name.clone(),
                    }
                })?;
                server.register(tool);
            }
            sdk_servers.insert(name.clone(), Arc::new(server));
        }

        let mut profiles = HashMap::new();
        for profile in CapabilityProfile::ALL {
            let spec = config.profiles.get(profile);
            let definition = Self::build_definition(profile, spec, config, &sdk_servers)?;
            profiles.insert(profile, definition);
        }

        Ok(Self {
            profiles,
            tool_servers: sdk_servers,
        })
    }

    fn build_definition(
        profile: CapabilityProfile,
        spec: &ProfileSpec,
        config: &AppConfig,
        sdk_servers: &BTreeMap<String, Arc<ToolServer>>,
    ) -> Result<ProfileDefinition, ConfigError> {
        let mut mcp_servers = BTreeMap::new();
        for server_name in &spec.servers {
            let descriptor = if let Some(stdio) = config.servers.get(server_name) {
                ServerDescriptor::Stdio(StdioServer {
                    command: stdio.command.clone(),
                    args: stdio.args.clone(),
                    env: stdio.env.clone(),
                })
            } else if let Some(server) = sdk_servers.get(server_name) {
                ServerDescriptor::InProcess(Arc::clone(server))
            } else {
                return Err(ConfigError::UnknownServer {
                    profile: profile.to_string(),
                    server: server_name.clone(),
                });
            };
            mcp_servers.insert(server_name.clone(), descriptor);
        }

        let keywords = if profile == CapabilityProfile::General {
            // General is the fallback; keywords on it would never be consulted
            Vec::new()
        } else {
            spec.keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect()
        };

        Ok(ProfileDefinition {
            profile,
            session: SessionConfig {
                mcp_servers,
                system_prompt: spec.system_prompt.clone(),
                allowed_tools: spec.allowed_tools.clone(),
            },
            keywords,
            complexity: spec.complexity,
        })
    }

    /// Definition for a profile; every profile is always present
    pub fn get(&self, profile: CapabilityProfile) -> &ProfileDefinition {
        &self.profiles[&profile]
    }

    /// Session configuration for a profile, cloned for one invocation
    pub fn session_config(&self, profile: CapabilityProfile) -> SessionConfig {
        self.get(profile).session.clone()
    }

    /// Every configured in-process tool server, referenced or not, by name
    pub fn tool_servers(&self) -> impl Iterator<Item = &Arc<ToolServer>> {
        self.tool_servers.values()
    }
}

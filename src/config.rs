//! Configuration system for routed, isolated agent sessions
//!
//! Loaded from TOML. Every section has defaults, so an empty file (or no
//! file at all) yields the reference routing tables: a Playwright browser
//! server, a filesystem server, a Postgres server, and a general profile
//! with no tool-servers and a local-tool allow-list.

use crate::routing::{CapabilityProfile, Complexity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub runtime: RuntimeSection,
    #[serde(default)]
    pub routing: RoutingSection,
    #[serde(default)]
    pub batch: BatchSection,
    /// External tool-server processes, by name
    #[serde(default = "default_servers")]
    pub servers: BTreeMap<String, StdioServerSpec>,
    /// In-process tool servers assembled from builtin tools, by name
    #[serde(default = "default_sdk_servers")]
    pub sdk_servers: BTreeMap<String, SdkServerSpec>,
    #[serde(default)]
    pub profiles: ProfilesSection,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            runtime: RuntimeSection::default(),
            routing: RoutingSection::default(),
            batch: BatchSection::default(),
            servers: default_servers(),
            sdk_servers: default_sdk_servers(),
            profiles: ProfilesSection::default(),
        }
    }
}

/// Agent runtime section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuntimeSection {
    /// Agent CLI executable
    #[serde(default = "default_runtime_command")]
    pub command: String,
    /// Extra arguments placed before the session flags
    #[serde(default)]
    pub args: Vec<String>,
    /// Per-invocation timeout in seconds; 0 disables it
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Working directory for the runtime process
    pub working_dir: Option<PathBuf>,
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            command: default_runtime_command(),
            args: Vec::new(),
            timeout_secs: default_timeout_secs(),
            working_dir: None,
        }
    }
}

impl RuntimeSection {
    /// Timeout as a duration, `None` when disabled
    pub fn timeout(&self) -> Option<std::time::Duration> {
        (self.timeout_secs > 0).then(|| std::time::Duration::from_secs(self.timeout_secs))
    }
}

fn default_runtime_command() -> String {
    "claude".to_string()
}

fn default_timeout_secs() -> u64 {
    600
}

/// Keyword routing section
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RoutingSection {
    #[serde(default)]
    pub match_mode: MatchMode,
}

/// How keywords are matched against the lower-cased task text
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Plain containment: "database" matches inside "nondatabase", "table" inside "stable"
    #[default]
    Substring,
    /// Keyword must be bounded by non-alphanumeric characters or the string ends
    Word,
}

/// Batch execution section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchSection {
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    /// Number of tasks in flight at once; 1 runs strictly sequentially
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl Default for BatchSection {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::default(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

fn default_max_concurrency() -> usize {
    1
}

/// What a batch does when one task fails
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop at the first failure and return it
    #[default]
    Abort,
    /// Record the failure in place and keep going
    Continue,
}

/// External tool-server process descriptor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StdioServerSpec {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// In-process tool server built from builtin tools
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SdkServerSpec {
    #[serde(default = "default_sdk_version")]
    pub version: String,
    pub tools: Vec<String>,
}

fn default_sdk_version() -> String {
    "1.0.0".to_string()
}

/// Per-profile settings
///
/// A `[profiles.<name>]` table overrides only the fields it sets; every
/// other field keeps the built-in value for that profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(from = "ProfileOverrides")]
pub struct ProfilesSection {
    pub browser: ProfileSpec,
    pub filesystem: ProfileSpec,
    pub database: ProfileSpec,
    pub general: ProfileSpec,
}

impl Default for ProfilesSection {
    fn default() -> Self {
        Self {
            browser: default_browser_profile(),
            filesystem: default_filesystem_profile(),
            database: default_database_profile(),
            general: default_general_profile(),
        }
    }
}

impl ProfilesSection {
    pub fn get(&self, profile: CapabilityProfile) -> &ProfileSpec {
        match profile {
            CapabilityProfile::Browser => &self.browser,
            CapabilityProfile::Filesystem => &self.filesystem,
            CapabilityProfile::Database => &self.database,
            CapabilityProfile::General => &self.general,
        }
    }
}

/// Settings for one capability profile
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProfileSpec {
    /// Tool-server names visible to the session (from `servers` or `sdk_servers`)
    pub servers: Vec<String>,
    pub system_prompt: Option<String>,
    /// Explicit tool allow-list; `None` leaves the runtime's default
    pub allowed_tools: Option<Vec<String>>,
    /// Lower-cased before matching; ignored for the general profile
    pub keywords: Vec<String>,
    pub complexity: Complexity,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProfileOverrides {
    #[serde(default)]
    browser: ProfileOverride,
    #[serde(default)]
    filesystem: ProfileOverride,
    #[serde(default)]
    database: ProfileOverride,
    #[serde(default)]
    general: ProfileOverride,
}

impl From<ProfileOverrides> for ProfilesSection {
    fn from(overrides: ProfileOverrides) -> Self {
        Self {
            browser: overrides.browser.apply(default_browser_profile()),
            filesystem: overrides.filesystem.apply(default_filesystem_profile()),
            database: overrides.database.apply(default_database_profile()),
            general: overrides.general.apply(default_general_profile()),
        }
    }
}

/// Fields set in one `[profiles.<name>]` table
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProfileOverride {
    servers: Option<Vec<String>>,
    /// An empty prompt removes the built-in one
    system_prompt: Option<String>,
    allowed_tools: Option<Vec<String>>,
    keywords: Option<Vec<String>>,
    complexity: Option<Complexity>,
}

impl ProfileOverride {
    fn apply(self, mut base: ProfileSpec) -> ProfileSpec {
        if let Some(servers) = self.servers {
            base.servers = servers;
        }
        if let Some(prompt) = self.system_prompt {
            base.system_prompt = (!prompt.is_empty()).then_some(prompt);
        }
        if let Some(tools) = self.allowed_tools {
            base.allowed_tools = Some(tools);
        }
        if let Some(keywords) = self.keywords {
            base.keywords = keywords;
        }
        if let Some(complexity) = self.complexity {
            base.complexity = complexity;
        }
        base
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_servers() -> BTreeMap<String, StdioServerSpec> {
    let mut servers = BTreeMap::new();
    servers.insert(
        "playwright".to_string(),
        StdioServerSpec {
            command: "npx".to_string(),
            args: strings(&["-y", "@modelcontextprotocol/server-playwright"]),
            env: BTreeMap::new(),
        },
    );
    servers.insert(
        "filesystem".to_string(),
        StdioServerSpec {
            command: "npx".to_string(),
            args: strings(&["-y", "@modelcontextprotocol/server-filesystem"]),
            env: BTreeMap::from([(
                "ALLOWED_PATHS".to_string(),
                "/home/user/projects".to_string(),
            )]),
        },
    );
    servers.insert(
        "database".to_string(),
        StdioServerSpec {
            command: "npx".to_string(),
            args: strings(&["-y", "@modelcontextprotocol/server-postgres"]),
            env: BTreeMap::from([(
                "DATABASE_URL".to_string(),
                "postgresql://localhost/mydb".to_string(),
            )]),
        },
    );
    servers
}

fn default_sdk_servers() -> BTreeMap<String, SdkServerSpec> {
    BTreeMap::from([
        (
            "code-tools".to_string(),
            SdkServerSpec {
                version: default_sdk_version(),
                tools: strings(&["analyze_code"]),
            },
        ),
        (
            "docs-tools".to_string(),
            SdkServerSpec {
                version: default_sdk_version(),
                tools: strings(&["generate_docs"]),
            },
        ),
    ])
}

fn default_browser_profile() -> ProfileSpec {
    ProfileSpec {
        servers: strings(&["playwright"]),
        system_prompt: Some("You are a browser automation expert.".to_string()),
        allowed_tools: None,
        keywords: strings(&["browser", "web scraping", "web", "scrape", "scraping"]),
        complexity: Complexity::Complex,
    }
}

fn default_filesystem_profile() -> ProfileSpec {
    ProfileSpec {
        servers: strings(&["filesystem"]),
        system_prompt: Some("You are a file operations expert.".to_string()),
        allowed_tools: None,
        keywords: strings(&["file", "directory", "folder"]),
        complexity: Complexity::Simple,
    }
}

fn default_database_profile() -> ProfileSpec {
    ProfileSpec {
        servers: strings(&["database"]),
        system_prompt: Some("You are a database expert.".to_string()),
        allowed_tools: None,
        keywords: strings(&["database", "sql", "query", "table"]),
        complexity: Complexity::Complex,
    }
}

fn default_general_profile() -> ProfileSpec {
    ProfileSpec {
        servers: Vec::new(),
        system_prompt: Some("You are a helpful assistant.".to_string()),
        allowed_tools: Some(strings(&["Read", "Write", "Bash", "Grep", "Glob"])),
        keywords: Vec::new(),
        complexity: Complexity::Simple,
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Profile '{profile}' references unknown server '{server}'")]
    UnknownServer { profile: String, server: String },
    #[error("Server '{server}' references unknown builtin tool '{tool}'")]
    UnknownTool { server: String, tool: String },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl AppConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-section consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.runtime.command.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "runtime.command must not be empty".to_string(),
            ));
        }

        if self.batch.max_concurrency == 0 {
            return Err(ConfigError::InvalidConfig(
                "batch.max_concurrency must be at least 1".to_string(),
            ));
        }

        if let Some(name) = self
            .servers
            .keys()
            .find(|name| self.sdk_servers.contains_key(*name))
        {
            return Err(ConfigError::InvalidConfig(format!(
                "server '{name}' is defined in both [servers] and [sdk_servers]"
            )));
        }

        for profile in CapabilityProfile::ALL {
            for server in &self.profiles.get(profile).servers {
                if !self.servers.contains_key(server) && !self.sdk_servers.contains_key(server) {
                    return Err(ConfigError::UnknownServer {
                        profile: profile.to_string(),
                        server: server.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

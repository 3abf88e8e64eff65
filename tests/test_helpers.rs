//! Test helpers and utilities for integration tests

use mcp_isolation::agent::Orchestrator;
use mcp_isolation::config::AppConfig;
use mcp_isolation::routing::ProfileRegistry;
use mcp_isolation::testing::MockRuntime;
use std::sync::Arc;

/// Task used across tests for each reference route
#[allow(dead_code)]
pub const BROWSER_TASK: &str = "Scrape product data from example.com";
#[allow(dead_code)]
pub const FILESYSTEM_TASK: &str = "List all files in the current directory";
#[allow(dead_code)]
pub const DATABASE_TASK: &str = "Query users table for active accounts";
#[allow(dead_code)]
pub const GENERAL_TASK: &str = "Explain the difference between TCP and UDP";

/// Registry built from the default configuration
#[allow(dead_code)]
pub fn default_registry() -> Arc<ProfileRegistry> {
    Arc::new(ProfileRegistry::from_config(&AppConfig::default()).unwrap())
}

/// Orchestrator over the default configuration and the given mock runtime
#[allow(dead_code)]
pub fn mock_orchestrator(runtime: &MockRuntime) -> Orchestrator {
    Orchestrator::from_config(&AppConfig::default(), Arc::new(runtime.clone())).unwrap()
}

/// Configuration whose general profile also sees the in-process code tools
#[allow(dead_code)]
pub fn config_with_code_tools() -> AppConfig {
    AppConfig::from_toml_str(
        r#"
[profiles.general]
servers = ["code-tools"]
system_prompt = "You are a code reviewer."
allowed_tools = ["Read", "mcp__code-tools__analyze_code"]
"#,
    )
    .unwrap()
}

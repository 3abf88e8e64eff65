//! Configuration loading and validation tests
//!
//! Tests focus on the observable outcome of loading a file: defaults filled
//! in, overrides applied, and invalid references rejected.

use mcp_isolation::config::{AppConfig, ConfigError, FailurePolicy, MatchMode};
use mcp_isolation::routing::{CapabilityProfile, Complexity, ProfileRegistry};
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    write!(temp_file, "{content}").unwrap();
    temp_file
}

#[test]
fn test_config_loads_successfully_from_valid_toml() {
    let temp_file = write_config(
        r#"
[runtime]
command = "/usr/local/bin/claude"
args = ["--model", "sonnet"]
timeout_secs = 120

[routing]
match_mode = "word"

[batch]
failure_policy = "continue"
max_concurrency = 4
"#,
    );

    let config = AppConfig::load_from_file(temp_file.path()).unwrap();

    assert_eq!(config.runtime.command, "/usr/local/bin/claude");
    assert_eq!(config.runtime.args, vec!["--model", "sonnet"]);
    assert_eq!(config.runtime.timeout(), Some(Duration::from_secs(120)));
    assert_eq!(config.routing.match_mode, MatchMode::Word);
    assert_eq!(config.batch.failure_policy, FailurePolicy::Continue);
    assert_eq!(config.batch.max_concurrency, 4);
}

#[test]
fn test_empty_file_yields_reference_profiles() {
    let temp_file = write_config("");
    let config = AppConfig::load_from_file(temp_file.path()).unwrap();
    let registry = ProfileRegistry::from_config(&config).unwrap();

    let browser = registry.session_config(CapabilityProfile::Browser);
    assert_eq!(browser.server_names(), vec!["playwright"]);
    assert_eq!(
        browser.system_prompt.as_deref(),
        Some("You are a browser automation expert.")
    );

    let general = registry.session_config(CapabilityProfile::General);
    assert!(general.mcp_servers.is_empty());
    assert_eq!(
        general.allowed_tools,
        Some(
            ["Read", "Write", "Bash", "Grep", "Glob"]
                .map(String::from)
                .to_vec()
        )
    );
}

#[test]
fn test_zero_timeout_disables_it() {
    let config = AppConfig::from_toml_str("[runtime]\ntimeout_secs = 0\n").unwrap();
    assert_eq!(config.runtime.timeout(), None);
}

#[test]
fn test_custom_server_and_profile() {
    let temp_file = write_config(
        r#"
# Declaring [servers] replaces the default table, so keep the other profiles' servers
[servers.playwright]
command = "npx"
args = ["-y", "@modelcontextprotocol/server-playwright"]

[servers.filesystem]
command = "npx"
args = ["-y", "@modelcontextprotocol/server-filesystem"]

[servers.sqlite]
command = "uvx"
args = ["mcp-server-sqlite", "--db-path", "/tmp/test.db"]

[profiles.database]
servers = ["sqlite"]
system_prompt = "You are a SQLite expert."
keywords = ["SQLite", "query"]
complexity = "complex"
"#,
    );

    let config = AppConfig::load_from_file(temp_file.path()).unwrap();
    let registry = ProfileRegistry::from_config(&config).unwrap();
    let database = registry.get(CapabilityProfile::Database);

    assert_eq!(database.server_names(), vec!["sqlite"]);
    assert_eq!(database.keywords, vec!["sqlite", "query"]);
    assert_eq!(database.complexity, Complexity::Complex);
}

#[test]
fn test_replacing_servers_drops_defaults() {
    let result = AppConfig::from_toml_str(
        r#"
[servers.sqlite]
command = "uvx"
"#,
    );

    // The default browser profile still points at playwright
    assert!(matches!(result, Err(ConfigError::UnknownServer { .. })));
}

#[test]
fn test_unknown_server_reference_is_rejected() {
    let temp_file = write_config(
        r#"
[profiles.browser]
servers = ["puppeteer"]
"#,
    );

    let result = AppConfig::load_from_file(temp_file.path());

    match result {
        Err(ConfigError::UnknownServer { profile, server }) => {
            assert_eq!(profile, "browser");
            assert_eq!(server, "puppeteer");
        }
        other => panic!("expected UnknownServer, got {other:?}"),
    }
}

#[test]
fn test_unknown_builtin_tool_is_rejected_by_registry() {
    let config = AppConfig::from_toml_str(
        r#"
[sdk_servers.extra-tools]
tools = ["format_code"]
"#,
    )
    .unwrap();

    let result = ProfileRegistry::from_config(&config);
    assert!(matches!(
        result,
        Err(ConfigError::UnknownTool { ref server, ref tool })
            if server == "extra-tools" && tool == "format_code"
    ));
}

#[test]
fn test_zero_concurrency_is_rejected() {
    let result = AppConfig::from_toml_str("[batch]\nmax_concurrency = 0\n");
    assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
}

#[test]
fn test_invalid_enum_value_is_a_parse_error() {
    let result = AppConfig::from_toml_str("[routing]\nmatch_mode = \"fuzzy\"\n");
    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn test_missing_file_is_a_read_error() {
    let result = AppConfig::load_from_file(std::path::Path::new("/nonexistent/mcp-isolation.toml"));
    assert!(matches!(result, Err(ConfigError::FileRead(_))));
}

#[test]
fn test_shown_config_reloads_unchanged() {
    let config = AppConfig::default();
    let rendered = toml::to_string_pretty(&config).unwrap();

    assert_eq!(AppConfig::from_toml_str(&rendered).unwrap(), config);
}

#[test]
fn test_partial_profile_table_keeps_routing() {
    let temp_file = write_config(
        r#"
[profiles.browser]
system_prompt = "You drive a headless browser."
"#,
    );

    let config = AppConfig::load_from_file(temp_file.path()).unwrap();
    let registry = std::sync::Arc::new(ProfileRegistry::from_config(&config).unwrap());
    let classifier = mcp_isolation::routing::TaskClassifier::new(registry.clone(), MatchMode::Substring);

    assert_eq!(
        classifier.classify("Scrape product data from example.com"),
        CapabilityProfile::Browser
    );
    let browser = registry.get(CapabilityProfile::Browser);
    assert_eq!(browser.server_names(), vec!["playwright"]);
    assert_eq!(
        browser.session.system_prompt.as_deref(),
        Some("You drive a headless browser.")
    );
}

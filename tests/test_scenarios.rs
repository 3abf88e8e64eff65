//! End-to-end routing scenarios
//!
//! A task goes in, exactly one isolated session comes out, configured with
//! only the tool-servers of the selected profile.

mod test_helpers;

use mcp_isolation::routing::CapabilityProfile;
use mcp_isolation::session::ServerDescriptor;
use mcp_isolation::testing::MockRuntime;
use mcp_isolation::AgentError;
use mcp_isolation::SessionError;
use test_helpers::mock_orchestrator;

async fn run_scenario(task: &str) -> (CapabilityProfile, mcp_isolation::SessionConfig) {
    let runtime = MockRuntime::new();
    let orchestrator = mock_orchestrator(&runtime);

    let report = orchestrator.execute_task(task).await.unwrap();

    let configs = runtime.opened_configs().await;
    assert_eq!(configs.len(), 1, "exactly one session per task");
    assert_eq!(runtime.live_sessions(), 0);
    assert_eq!(report.result.final_text(), Some(format!("Handled: {task}").as_str()));

    (report.analysis.profile, configs[0].clone())
}

#[tokio::test]
async fn test_scrape_task_gets_only_the_browser_server() {
    let (profile, config) = run_scenario("Scrape product data from example.com").await;

    assert_eq!(profile, CapabilityProfile::Browser);
    assert_eq!(config.server_names(), vec!["playwright"]);
    match &config.mcp_servers["playwright"] {
        ServerDescriptor::Stdio(server) => {
            assert_eq!(server.command, "npx");
            assert!(server.args.contains(&"@modelcontextprotocol/server-playwright".to_string()));
        }
        other => panic!("expected an external server, got {other:?}"),
    }
}

#[tokio::test]
async fn test_file_listing_task_gets_only_the_filesystem_server() {
    let (profile, config) = run_scenario("List all Python files in src/").await;

    assert_eq!(profile, CapabilityProfile::Filesystem);
    assert_eq!(config.server_names(), vec!["filesystem"]);
    assert_eq!(
        config.system_prompt.as_deref(),
        Some("You are a file operations expert.")
    );
}

#[tokio::test]
async fn test_query_task_gets_only_the_database_server() {
    let (profile, config) = run_scenario("Query users table for active accounts").await;

    assert_eq!(profile, CapabilityProfile::Database);
    assert_eq!(config.server_names(), vec!["database"]);
    let ServerDescriptor::Stdio(server) = &config.mcp_servers["database"] else {
        panic!("expected an external server");
    };
    assert_eq!(server.env["DATABASE_URL"], "postgresql://localhost/mydb");
}

#[tokio::test]
async fn test_general_task_gets_no_servers_and_local_tools() {
    let (profile, config) = run_scenario("Explain what MCP servers are").await;

    assert_eq!(profile, CapabilityProfile::General);
    assert!(config.mcp_servers.is_empty());
    assert_eq!(
        config.allowed_tools,
        Some(
            ["Read", "Write", "Bash", "Grep", "Glob"]
                .map(String::from)
                .to_vec()
        )
    );
}

#[tokio::test]
async fn test_mid_stream_failure_surfaces_without_partial_result() {
    let runtime = MockRuntime::new().fail_after(1);
    let orchestrator = mock_orchestrator(&runtime);

    let result = orchestrator
        .execute_task("Scrape product data from example.com")
        .await;

    let error = result.unwrap_err();
    assert!(matches!(error, AgentError::Session(SessionError::Stream { .. })));
    assert_eq!(runtime.live_sessions(), 0);
}

#[tokio::test]
async fn test_in_process_servers_are_passed_by_handle() {
    let runtime = MockRuntime::new();
    let orchestrator = mcp_isolation::agent::Orchestrator::from_config(
        &test_helpers::config_with_code_tools(),
        std::sync::Arc::new(runtime.clone()),
    )
    .unwrap();

    orchestrator
        .execute_task("Explain what MCP servers are")
        .await
        .unwrap();

    let configs = runtime.opened_configs().await;
    match &configs[0].mcp_servers["code-tools"] {
        ServerDescriptor::InProcess(server) => {
            assert_eq!(server.name(), "code-tools");
            assert_eq!(
                server.qualified_tool_names(),
                vec!["mcp__code-tools__analyze_code"]
            );
        }
        other => panic!("expected an in-process server, got {other:?}"),
    }
}

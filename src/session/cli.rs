//! Subprocess runtime for the agent CLI
//!
//! Each session spawns the CLI with stream-json input and output. The user
//! turn is written to stdin as one JSON line; stdout is read line by line
//! until a `result` message ends the turn. Requests the CLI routes to
//! in-process tool servers arrive on the same pipe as `control_request`
//! lines and are answered with `control_response` lines.
//!
//! The child is spawned with kill-on-drop, so dropping a session (timeout,
//! cancellation) terminates the process.

use super::message::AgentMessage;
use super::runtime::{AgentRuntime, AgentSession, SessionConfig, SessionError};
use crate::config::RuntimeSection;
use crate::tools::ToolServer;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeMap, VecDeque};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tracing::{debug, warn};

const STDERR_TAIL_LINES: usize = 20;
const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// Agent runtime reached by spawning its CLI
#[derive(Debug, Clone)]
pub struct CliRuntime {
    command: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
}

impl CliRuntime {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    pub fn from_config(runtime: &RuntimeSection) -> Self {
        Self {
            command: runtime.command.clone(),
            args: runtime.args.clone(),
            working_dir: runtime.working_dir.clone(),
        }
    }

    /// Arguments placed before the session flags
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Full argument list for one session
    ///
    /// `--strict-mcp-config` keeps the CLI from merging in servers from the
    /// user's own configuration, so the session sees only `config`'s servers.
    pub fn session_args(&self, config: &SessionConfig) -> Vec<String> {
        let mut args = self.args.clone();
        args.extend(
            [
                "--output-format",
                "stream-json",
                "--input-format",
                "stream-json",
                "--verbose",
                "--strict-mcp-config",
                "--mcp-config",
            ]
            .map(String::from),
        );
        args.push(config.mcp_config().to_string());

        if let Some(prompt) = &config.system_prompt {
            args.push("--system-prompt".to_string());
            args.push(prompt.clone());
        }

        if let Some(tools) = &config.allowed_tools {
            args.push("--allowedTools".to_string());
            args.push(tools.join(","));
        }

        args
    }
}

#[async_trait]
impl AgentRuntime for CliRuntime {
    fn name(&self) -> &str {
        &self.command
    }

    async fn open(&self, config: &SessionConfig) -> Result<Box<dyn AgentSession>, SessionError> {
        let mut command = Command::new(&self.command);
        command
            .args(self.session_args(config))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|e| {
            SessionError::connection(format!("failed to start '{}': {e}", self.command))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SessionError::connection("runtime stdin unavailable"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SessionError::connection("runtime stdout unavailable"))?;

        let stderr_tail = Arc::new(Mutex::new(VecDeque::new()));
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(drain_stderr(stderr, Arc::clone(&stderr_tail)));
        }

        debug!(pid = ?child.id(), command = %self.command, "Runtime process started");

        Ok(Box::new(CliSession {
            child,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout).lines(),
            servers: config.in_process_servers(),
            stderr_tail,
            finished: false,
        }))
    }
}

async fn drain_stderr(stderr: ChildStderr, tail: Arc<Mutex<VecDeque<String>>>) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(line = %line, "Runtime stderr");
        if let Ok(mut tail) = tail.lock() {
            if tail.len() == STDERR_TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line);
        }
    }
}

struct CliSession {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Lines<BufReader<ChildStdout>>,
    servers: BTreeMap<String, Arc<ToolServer>>,
    stderr_tail: Arc<Mutex<VecDeque<String>>>,
    finished: bool,
}

impl CliSession {
    async fn write_line(&mut self, value: &Value) -> Result<(), SessionError> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| SessionError::connection("runtime input already closed"))?;

        let mut line = value.to_string();
        line.push('\n');

        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| SessionError::connection(format!("failed to write to runtime: {e}")))?;
        stdin
            .flush()
            .await
            .map_err(|e| SessionError::connection(format!("failed to write to runtime: {e}")))
    }

    fn stderr_context(&self) -> String {
        self.stderr_tail
            .lock()
            .map(|tail| tail.iter().cloned().collect::<Vec<_>>().join("; "))
            .unwrap_or_default()
    }

    async fn answer_control_request(&mut self, request: &Value) -> Result<(), SessionError> {
        let request_id = request.get("request_id").cloned().unwrap_or(Value::Null);
        let body = &request["request"];

        let response = match body.get("subtype").and_then(Value::as_str) {
            Some("mcp_message") => {
                let server_name = body["server_name"].as_str().unwrap_or_default();
                match self.servers.get(server_name).cloned() {
                    Some(server) => {
                        debug!(server = server_name, "Routing MCP message to in-process server");
                        let reply = server
                            .handle_message(&body["message"])
                            .await
                            .unwrap_or_else(|| json!({"jsonrpc": "2.0", "result": {}}));
                        json!({
                            "subtype": "success",
                            "request_id": request_id,
                            "response": {"mcp_response": reply},
                        })
                    }
                    None => control_error(
                        &request_id,
                        format!("unknown in-process server '{server_name}'"),
                    ),
                }
            }
            other => control_error(
                &request_id,
                format!("unsupported control request: {}", other.unwrap_or("<none>")),
            ),
        };

        self.write_line(&json!({"type": "control_response", "response": response}))
            .await
    }
}

fn control_error(request_id: &Value, message: String) -> Value {
    warn!(error = %message, "Rejecting control request");
    json!({
        "subtype": "error",
        "request_id": request_id,
        "error": message,
    })
}

#[async_trait]
impl AgentSession for CliSession {
    async fn send(&mut self, prompt: &str) -> Result<(), SessionError> {
        let turn = json!({
            "type": "user",
            "message": {"role": "user", "content": prompt},
            "parent_tool_use_id": null,
        });
        self.write_line(&turn).await
    }

    async fn next_message(&mut self) -> Result<Option<AgentMessage>, SessionError> {
        if self.finished {
            return Ok(None);
        }

        loop {
            let line = self
                .stdout
                .next_line()
                .await
                .map_err(|e| SessionError::stream(format!("failed to read runtime output: {e}")))?;

            let Some(line) = line else {
                let context = self.stderr_context();
                let message = if context.is_empty() {
                    "runtime exited before the end of the turn".to_string()
                } else {
                    format!("runtime exited before the end of the turn: {context}")
                };
                return Err(SessionError::stream(message));
            };

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let value: Value = serde_json::from_str(trimmed)
                .map_err(|e| SessionError::stream(format!("malformed runtime output: {e}")))?;

            if value.get("type").and_then(Value::as_str) == Some("control_request") {
                self.answer_control_request(&value).await?;
                continue;
            }

            match serde_json::from_value::<AgentMessage>(value) {
                Ok(message) => {
                    if message.is_end_of_turn() {
                        self.finished = true;
                    }
                    return Ok(Some(message));
                }
                Err(e) => debug!(error = %e, "Skipping unrecognized runtime message"),
            }
        }
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        // Closing stdin tells the CLI no further turns are coming
        self.stdin.take();

        if !self.finished {
            if let Err(e) = self.child.start_kill() {
                debug!(error = %e, "Runtime process already gone");
            }
        }

        match tokio::time::timeout(CLOSE_GRACE, self.child.wait()).await {
            Ok(Ok(status)) => {
                debug!(status = %status, "Runtime process exited");
                Ok(())
            }
            Ok(Err(e)) => Err(SessionError::connection(format!(
                "failed to reap runtime process: {e}"
            ))),
            Err(_) => {
                warn!("Runtime did not exit after close, killing it");
                self.child.kill().await.map_err(|e| {
                    SessionError::connection(format!("failed to kill runtime process: {e}"))
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{ServerDescriptor, StdioServer};

    fn browser_config() -> SessionConfig {
        SessionConfig {
            mcp_servers: BTreeMap::from([(
                "playwright".to_string(),
                ServerDescriptor::Stdio(StdioServer {
                    command: "npx".to_string(),
                    args: vec![
                        "-y".to_string(),
                        "@modelcontextprotocol/server-playwright".to_string(),
                    ],
                    env: BTreeMap::new(),
                }),
            )]),
            system_prompt: Some("You are a browser automation expert.".to_string()),
            allowed_tools: None,
        }
    }

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn test_session_args_carry_isolated_mcp_config() {
        let args = CliRuntime::new("claude").session_args(&browser_config());

        assert!(args.contains(&"--strict-mcp-config".to_string()));
        let mcp: Value = serde_json::from_str(value_after(&args, "--mcp-config").unwrap()).unwrap();
        let servers = mcp["mcpServers"].as_object().unwrap();
        assert_eq!(servers.len(), 1);
        assert!(servers.contains_key("playwright"));
        assert_eq!(
            value_after(&args, "--system-prompt"),
            Some("You are a browser automation expert.")
        );
        assert!(!args.contains(&"--allowedTools".to_string()));
    }

    #[test]
    fn test_session_args_join_allow_list() {
        let config = SessionConfig {
            allowed_tools: Some(vec![
                "Read".to_string(),
                "mcp__filesystem__read_file".to_string(),
            ]),
            ..Default::default()
        };

        let args = CliRuntime::new("claude").session_args(&config);
        assert_eq!(
            value_after(&args, "--allowedTools"),
            Some("Read,mcp__filesystem__read_file")
        );
        assert!(!args.contains(&"--system-prompt".to_string()));
    }

    #[test]
    fn test_configured_args_come_first() {
        let runtime = CliRuntime::new("claude").with_args(vec!["--model".to_string(), "sonnet".to_string()]);
        let args = runtime.session_args(&SessionConfig::default());

        assert_eq!(&args[..2], &["--model".to_string(), "sonnet".to_string()]);
        assert_eq!(args[2], "--output-format");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_close_after_early_exit_still_reaps() {
        let runtime = CliRuntime::new("sh").with_args(vec!["-c".to_string(), "exit 0".to_string()]);
        let mut session = runtime.open(&SessionConfig::default()).await.unwrap();

        let next = session.next_message().await;
        assert!(matches!(next, Err(SessionError::Stream { .. })));
        assert!(session.close().await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_executable_is_a_connection_error() {
        let runtime = CliRuntime::new("definitely-not-an-agent-cli-3f9a");
        let result = runtime.open(&SessionConfig::default()).await;

        assert!(matches!(result, Err(SessionError::Connection { .. })));
    }
}

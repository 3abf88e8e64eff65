//! Mock agent runtime for testing
//!
//! `MockRuntime` records every session it opens and replays a scripted
//! response, with optional failures injected at open, mid-stream, or for
//! prompts containing a marker. Live sessions are counted so tests can
//! assert that every exit path releases its session.

use crate::session::{AgentMessage, AgentRuntime, AgentSession, SessionConfig, SessionError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Default)]
struct MockScript {
    /// Fixed reply; `None` echoes the prompt
    messages: Option<Vec<AgentMessage>>,
    open_failure: Option<String>,
    fail_after: Option<usize>,
    fail_on_prompt: Option<String>,
    message_delay: Option<Duration>,
}

#[derive(Debug, Default)]
struct MockState {
    opened_configs: Mutex<Vec<SessionConfig>>,
    prompts: Mutex<Vec<String>>,
    live: AtomicUsize,
    peak_live: AtomicUsize,
    closed: AtomicUsize,
}

impl MockState {
    fn session_started(&self) {
        let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_live.fetch_max(live, Ordering::SeqCst);
    }
}

/// Scripted runtime; clones share recorded state
#[derive(Debug, Clone, Default)]
pub struct MockRuntime {
    script: MockScript,
    state: Arc<MockState>,
}

impl MockRuntime {
    /// Runtime that answers every prompt with `Handled: <prompt>`
    pub fn new() -> Self {
        Self::default()
    }

    /// Runtime that replays `messages` for every session
    pub fn with_messages(messages: Vec<AgentMessage>) -> Self {
        Self {
            script: MockScript {
                messages: Some(messages),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Runtime whose turns end with a runtime-reported error
    pub fn with_runtime_error(message: impl Into<String>) -> Self {
        Self::with_messages(vec![
            AgentMessage::assistant_text("Starting"),
            AgentMessage::result_error(message),
        ])
    }

    /// Fail every `open` with a connection error
    pub fn with_open_failure(mut self, message: impl Into<String>) -> Self {
        self.script.open_failure = Some(message.into());
        self
    }

    /// Break the stream after `count` messages
    pub fn fail_after(mut self, count: usize) -> Self {
        self.script.fail_after = Some(count);
        self
    }

    /// Break the stream after one message for prompts containing `marker`
    pub fn fail_on_prompt(mut self, marker: impl Into<String>) -> Self {
        self.script.fail_on_prompt = Some(marker.into());
        self
    }

    /// Wait before yielding each message
    pub fn with_message_delay(mut self, delay: Duration) -> Self {
        self.script.message_delay = Some(delay);
        self
    }

    pub async fn opened_configs(&self) -> Vec<SessionConfig> {
        self.state.opened_configs.lock().await.clone()
    }

    pub async fn prompts(&self) -> Vec<String> {
        self.state.prompts.lock().await.clone()
    }

    /// Sessions opened and not yet dropped
    pub fn live_sessions(&self) -> usize {
        self.state.live.load(Ordering::SeqCst)
    }

    /// Highest number of sessions alive at once
    pub fn peak_live_sessions(&self) -> usize {
        self.state.peak_live.load(Ordering::SeqCst)
    }

    /// Sessions released through `close()`
    pub fn closed_sessions(&self) -> usize {
        self.state.closed.load(Ordering::SeqCst)
    }

    fn reply_for(&self, prompt: &str) -> Vec<AgentMessage> {
        match &self.script.messages {
            Some(messages) => messages.clone(),
            None => {
                let reply = format!("Handled: {prompt}");
                vec![
                    AgentMessage::assistant_text(reply.clone()),
                    AgentMessage::result_success(reply),
                ]
            }
        }
    }

    fn failure_point(&self, prompt: &str) -> Option<usize> {
        let prompt_marked = self
            .script
            .fail_on_prompt
            .as_deref()
            .is_some_and(|marker| prompt.contains(marker));

        if prompt_marked {
            Some(1)
        } else {
            self.script.fail_after
        }
    }
}

#[async_trait]
impl AgentRuntime for MockRuntime {
    fn name(&self) -> &str {
        "mock"
    }

    async fn open(&self, config: &SessionConfig) -> Result<Box<dyn AgentSession>, SessionError> {
        self.state.opened_configs.lock().await.push(config.clone());

        if let Some(message) = &self.script.open_failure {
            return Err(SessionError::connection(message.clone()));
        }

        self.state.session_started();
        Ok(Box::new(MockSession {
            runtime: self.clone(),
            pending: VecDeque::new(),
            fail_at: None,
            delivered: 0,
            closed: false,
        }))
    }
}

/// Session produced by [`MockRuntime`]
pub struct MockSession {
    runtime: MockRuntime,
    pending: VecDeque<AgentMessage>,
    fail_at: Option<usize>,
    delivered: usize,
    closed: bool,
}

#[async_trait]
impl AgentSession for MockSession {
    async fn send(&mut self, prompt: &str) -> Result<(), SessionError> {
        self.runtime
            .state
            .prompts
            .lock()
            .await
            .push(prompt.to_string());

        self.pending = self.runtime.reply_for(prompt).into();
        self.fail_at = self.runtime.failure_point(prompt);
        self.delivered = 0;
        Ok(())
    }

    async fn next_message(&mut self) -> Result<Option<AgentMessage>, SessionError> {
        if let Some(delay) = self.runtime.script.message_delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_at == Some(self.delivered) {
            return Err(SessionError::stream("mock stream interrupted"));
        }

        let message = self.pending.pop_front();
        if message.is_some() {
            self.delivered += 1;
        }
        Ok(message)
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        if !self.closed {
            self.closed = true;
            self.runtime.state.closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

impl Drop for MockSession {
    fn drop(&mut self) {
        self.runtime.state.live.fetch_sub(1, Ordering::SeqCst);
    }
}

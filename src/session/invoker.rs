//! Session invoker
//!
//! Opens exactly one session for a profile, sends the task as the sole user
//! turn and drains the response stream into a [`SessionResult`]. The session
//! is released on every exit path: `close()` runs after both successful and
//! failed exchanges, and a dropped invocation (timeout, cancellation) drops
//! the session with it.

use super::message::AgentMessage;
use super::runtime::{receive_response, AgentRuntime, AgentSession, SessionConfig, SessionError};
use crate::observability::MetricsCollector;
use crate::routing::{CapabilityProfile, ProfileRegistry};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

/// Messages from one invocation, in arrival order
#[derive(Debug, Clone, Serialize)]
pub struct SessionResult {
    pub session_id: Uuid,
    pub profile: CapabilityProfile,
    pub messages: Vec<AgentMessage>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SessionResult {
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Text of the end-of-turn message, if the runtime sent one
    pub fn final_text(&self) -> Option<&str> {
        self.messages.iter().rev().find_map(|message| match message {
            AgentMessage::Result(result) => result.result.as_deref(),
            _ => None,
        })
    }

    /// All assistant text in order, one message per line
    pub fn assistant_text(&self) -> String {
        self.messages
            .iter()
            .filter_map(AgentMessage::text)
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Opens profile-scoped sessions against an agent runtime
pub struct SessionInvoker {
    runtime: Arc<dyn AgentRuntime>,
    registry: Arc<ProfileRegistry>,
    timeout: Option<Duration>,
    metrics: Arc<MetricsCollector>,
}

impl SessionInvoker {
    pub fn new(runtime: Arc<dyn AgentRuntime>, registry: Arc<ProfileRegistry>) -> Self {
        Self {
            runtime,
            registry,
            timeout: None,
            metrics: Arc::new(MetricsCollector::new()),
        }
    }

    /// Bound each invocation; `None` waits for the runtime indefinitely
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn registry(&self) -> &Arc<ProfileRegistry> {
        &self.registry
    }

    /// Run one task in a session configured for `profile`
    pub async fn invoke(
        &self,
        profile: CapabilityProfile,
        task: &str,
    ) -> Result<SessionResult, SessionError> {
        let session_id = Uuid::new_v4();
        let span = crate::session_span!(
            session_id = %session_id,
            profile = %profile,
            runtime = self.runtime.name()
        );

        async move {
            let config = self.registry.session_config(profile);
            info!(
                servers = ?config.server_names(),
                allowed_tools = ?config.allowed_tools,
                "Opening isolated session"
            );

            let started_at = Utc::now();
            let clock = Instant::now();
            let mut accounting = SessionAccounting::open(&self.metrics, profile);

            let exchange = self.run_session(&config, task);
            let outcome = match self.timeout {
                Some(limit) => match tokio::time::timeout(limit, exchange).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(SessionError::Timeout { after: limit }),
                },
                None => exchange.await,
            };

            let elapsed = clock.elapsed();
            match outcome {
                Ok(messages) => {
                    accounting.completed(elapsed, messages.len() as u64);
                    info!(
                        messages = messages.len(),
                        duration_ms = elapsed.as_millis() as u64,
                        "Session completed"
                    );
                    Ok(SessionResult {
                        session_id,
                        profile,
                        messages,
                        started_at,
                        finished_at: Utc::now(),
                    })
                }
                Err(error) => {
                    accounting.failed(&error, elapsed);
                    warn!(
                        error = %error,
                        duration_ms = elapsed.as_millis() as u64,
                        "Session failed"
                    );
                    Err(error)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run_session(
        &self,
        config: &SessionConfig,
        task: &str,
    ) -> Result<Vec<AgentMessage>, SessionError> {
        let mut session = self.runtime.open(config).await?;
        debug!("Session opened");

        let exchanged = exchange(session.as_mut(), task).await;
        let closed = session.close().await;

        match (exchanged, closed) {
            (Ok(messages), Ok(())) => Ok(messages),
            (Ok(messages), Err(error)) => {
                // The turn is complete; a failed release does not invalidate it
                warn!(error = %error, "Session close failed after a complete response");
                Ok(messages)
            }
            (Err(error), _) => Err(error),
        }
    }
}

/// Settles the session counters exactly once; an invocation dropped
/// mid-flight (aborted task) is recorded as cancelled
struct SessionAccounting<'a> {
    metrics: &'a MetricsCollector,
    profile: CapabilityProfile,
    settled: bool,
}

impl<'a> SessionAccounting<'a> {
    fn open(metrics: &'a MetricsCollector, profile: CapabilityProfile) -> Self {
        metrics.session_opened();
        Self {
            metrics,
            profile,
            settled: false,
        }
    }

    fn completed(&mut self, elapsed: Duration, messages: u64) {
        self.settled = true;
        self.metrics.session_completed(self.profile, elapsed, messages);
    }

    fn failed(&mut self, error: &SessionError, elapsed: Duration) {
        self.settled = true;
        self.metrics.session_failed(self.profile, error, elapsed);
    }
}

impl Drop for SessionAccounting<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.metrics.session_abandoned(self.profile);
        }
    }
}

/// Send the task and collect the turn; any failure discards what arrived so far
async fn exchange(
    session: &mut dyn AgentSession,
    task: &str,
) -> Result<Vec<AgentMessage>, SessionError> {
    session.send(task).await?;

    let mut messages = Vec::new();
    let mut stream = receive_response(session);

    while let Some(item) = stream.next().await {
        let message = match item {
            Ok(message) => message,
            Err(error) => {
                warn!(
                    discarded = messages.len(),
                    "Response stream failed, discarding partial result"
                );
                return Err(error);
            }
        };

        if let AgentMessage::Result(result) = &message {
            if result.is_error {
                let detail = result
                    .result
                    .clone()
                    .unwrap_or_else(|| result.subtype.clone());
                warn!(discarded = messages.len(), "Runtime ended the turn with an error");
                return Err(SessionError::runtime(detail));
            }
        }

        debug!(kind = message.kind(), index = messages.len(), "Message received");
        messages.push(message);
    }

    Ok(messages)
}

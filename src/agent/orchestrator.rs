//! Task orchestrator
//!
//! Classifies each task, opens one isolated session for its profile and
//! collects the results. Batches run in input order; with
//! `max_concurrency > 1` several sessions are in flight at once but results
//! are still reported in input order.

use crate::config::{AppConfig, FailurePolicy, MatchMode};
use crate::error::{sanitize_error_message, AgentError, AgentResult, FailureKind};
use crate::observability::MetricsCollector;
use crate::routing::{CapabilityProfile, ProfileRegistry, TaskAnalysis, TaskClassifier};
use crate::session::{AgentRuntime, SessionError, SessionInvoker, SessionResult};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

/// A routed and completed task
#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    pub task: String,
    pub analysis: TaskAnalysis,
    pub result: SessionResult,
}

/// Failure marker for one task of a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskFailure {
    pub task: String,
    pub profile: CapabilityProfile,
    pub kind: FailureKind,
    /// Sanitized error text
    pub message: String,
}

impl TaskFailure {
    fn new(task: &str, profile: CapabilityProfile, error: &AgentError) -> Self {
        Self {
            task: task.to_string(),
            profile,
            kind: error.failure_kind(),
            message: error.sanitized_message(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskOutcome {
    Completed(TaskReport),
    Failed(TaskFailure),
}

impl TaskOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, TaskOutcome::Completed(_))
    }

    pub fn task(&self) -> &str {
        match self {
            TaskOutcome::Completed(report) => &report.task,
            TaskOutcome::Failed(failure) => &failure.task,
        }
    }
}

/// Outcomes of a batch, one per task in input order
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub outcomes: Vec<TaskOutcome>,
}

impl From<TaskReport> for BatchReport {
    fn from(report: TaskReport) -> Self {
        Self {
            outcomes: vec![TaskOutcome::Completed(report)],
        }
    }
}

impl BatchReport {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn completed(&self) -> impl Iterator<Item = &TaskReport> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            TaskOutcome::Completed(report) => Some(report),
            TaskOutcome::Failed(_) => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = &TaskFailure> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            TaskOutcome::Failed(failure) => Some(failure),
            TaskOutcome::Completed(_) => None,
        })
    }

    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(TaskOutcome::is_completed)
    }
}

/// Routes tasks to profile-scoped sessions
pub struct Orchestrator {
    classifier: TaskClassifier,
    invoker: SessionInvoker,
    failure_policy: FailurePolicy,
    max_concurrency: usize,
    metrics: Arc<MetricsCollector>,
}

impl Orchestrator {
    /// Orchestrator with default matching, no timeout, sequential abort-on-failure batches
    pub fn new(registry: Arc<ProfileRegistry>, runtime: Arc<dyn AgentRuntime>) -> Self {
        let metrics = Arc::new(MetricsCollector::new());
        Self {
            classifier: TaskClassifier::new(Arc::clone(&registry), MatchMode::default()),
            invoker: SessionInvoker::new(runtime, registry).with_metrics(Arc::clone(&metrics)),
            failure_policy: FailurePolicy::default(),
            max_concurrency: 1,
            metrics,
        }
    }

    /// Build the registry from configuration and apply its routing, batch and timeout settings
    pub fn from_config(config: &AppConfig, runtime: Arc<dyn AgentRuntime>) -> AgentResult<Self> {
        let registry = Arc::new(ProfileRegistry::from_config(config)?);

        Ok(Self::new(registry, runtime)
            .with_match_mode(config.routing.match_mode)
            .with_timeout(config.runtime.timeout())
            .with_failure_policy(config.batch.failure_policy)
            .with_max_concurrency(config.batch.max_concurrency))
    }

    pub fn with_match_mode(mut self, mode: MatchMode) -> Self {
        self.classifier = TaskClassifier::new(Arc::clone(self.invoker.registry()), mode);
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.invoker = self.invoker.with_timeout(timeout);
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Sessions in flight during a batch; values below 1 are treated as 1
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn classifier(&self) -> &TaskClassifier {
        &self.classifier
    }

    pub fn invoker(&self) -> &SessionInvoker {
        &self.invoker
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    /// Classify and run one task
    pub async fn execute_task(&self, task: &str) -> AgentResult<TaskReport> {
        let (analysis, result) = self.route_and_invoke(task).await;
        Ok(TaskReport {
            task: task.to_string(),
            analysis,
            result: result?,
        })
    }

    async fn route_and_invoke(&self, task: &str) -> (TaskAnalysis, Result<SessionResult, SessionError>) {
        let span = crate::task_span!(task_id = %Uuid::new_v4());

        async {
            let analysis = self.classifier.analyze(task);
            self.metrics.task_routed(analysis.profile);
            let result = self.invoker.invoke(analysis.profile, task).await;
            (analysis, result)
        }
        .instrument(span)
        .await
    }

    /// Run every task under the configured failure policy
    ///
    /// With [`FailurePolicy::Abort`] the first failure (in input order) is
    /// returned and no further tasks are started; sessions still in flight
    /// are dropped. With [`FailurePolicy::Continue`] each failure is recorded
    /// in place and the batch runs to the end.
    pub async fn run_all<S: AsRef<str>>(&self, tasks: &[S]) -> AgentResult<BatchReport> {
        info!(
            tasks = tasks.len(),
            policy = ?self.failure_policy,
            max_concurrency = self.max_concurrency,
            "Running batch"
        );

        let mut results = stream::iter(tasks.iter().map(|task| async move {
            let task = task.as_ref();
            let (analysis, result) = self.route_and_invoke(task).await;
            (task, analysis, result)
        }))
        .buffered(self.max_concurrency);

        let mut report = BatchReport::default();
        while let Some((task, analysis, result)) = results.next().await {
            match result {
                Ok(result) => report.outcomes.push(TaskOutcome::Completed(TaskReport {
                    task: task.to_string(),
                    analysis,
                    result,
                })),
                Err(error) => {
                    let error = AgentError::from(error);
                    match self.failure_policy {
                        FailurePolicy::Abort => {
                            error!(
                                index = report.len(),
                                error = %error.sanitized_message(),
                                "Batch aborted"
                            );
                            return Err(error);
                        }
                        FailurePolicy::Continue => {
                            warn!(
                                index = report.len(),
                                error = %error.sanitized_message(),
                                "Task failed, continuing batch"
                            );
                            report
                                .outcomes
                                .push(TaskOutcome::Failed(TaskFailure::new(task, analysis.profile, &error)));
                        }
                    }
                }
            }
        }

        info!(
            completed = report.completed().count(),
            failed = report.failures().count(),
            "Batch finished"
        );
        Ok(report)
    }

    /// Run a task in the background; the handle can cancel it
    pub fn spawn(self: &Arc<Self>, task: impl Into<String>) -> InvocationHandle {
        let orchestrator = Arc::clone(self);
        let task = task.into();
        InvocationHandle {
            handle: tokio::spawn(async move { orchestrator.execute_task(&task).await }),
        }
    }
}

/// Handle to a spawned task
///
/// Cancelling drops the in-flight invocation, which drops (and so releases)
/// its session.
#[derive(Debug)]
pub struct InvocationHandle {
    handle: JoinHandle<AgentResult<TaskReport>>,
}

impl InvocationHandle {
    pub fn cancel(&self) {
        self.handle.abort();
    }

    /// Detached handle that cancels the task from elsewhere (e.g. a signal handler)
    pub fn canceller(&self) -> AbortHandle {
        self.handle.abort_handle()
    }

    /// Wait for the task; a cancelled task yields [`SessionError::Cancelled`]
    pub async fn join(self) -> AgentResult<TaskReport> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(SessionError::Cancelled.into()),
            Err(e) => Err(AgentError::internal_error(sanitize_error_message(&format!(
                "task panicked: {e}"
            )))),
        }
    }
}

//! Task orchestration
//!
//! Ties the classifier and the session invoker together for single tasks,
//! batches and cancellable background invocations.

pub mod orchestrator;

pub use orchestrator::{
    BatchReport, InvocationHandle, Orchestrator, TaskFailure, TaskOutcome, TaskReport,
};

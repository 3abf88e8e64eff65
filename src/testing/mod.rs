//! Testing utilities and mock implementations
//!
//! A scripted agent runtime for exercising routing and session handling
//! without spawning the agent CLI.

pub mod mocks;

pub use mocks::*;

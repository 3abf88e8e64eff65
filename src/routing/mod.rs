//! Task routing
//!
//! ## Profiles (profile.rs)
//!
//! The closed set of capability profiles and the immutable registry that
//! maps each one to its tool-servers, system prompt and allow-list.
//!
//! ## Classification (classifier.rs)
//!
//! Keyword rules evaluated in priority order (browser, filesystem,
//! database) with general as the total fallback.

pub mod classifier;
pub mod profile;

pub use classifier::{keyword_matches, TaskAnalysis, TaskClassifier};
pub use profile::{CapabilityProfile, Complexity, ProfileDefinition, ProfileRegistry};

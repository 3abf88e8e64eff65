//! Keyword task classifier
//!
//! Lower-cases the task text and checks it against an ordered list of
//! (keywords, profile) rules. The first rule with any matching keyword wins;
//! when nothing matches the task goes to [`CapabilityProfile::General`].
//! Classification is total: every input, including the empty string, maps
//! to exactly one profile.

use super::profile::{CapabilityProfile, Complexity, ProfileRegistry};
use crate::config::MatchMode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// One classification rule
#[derive(Debug, Clone)]
struct KeywordRule {
    profile: CapabilityProfile,
    keywords: Vec<String>,
}

/// Outcome of analyzing a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskAnalysis {
    pub profile: CapabilityProfile,
    pub complexity: Complexity,
    /// Tool-server names the selected profile exposes
    pub tools: Vec<String>,
    /// Keyword that selected the profile, `None` for the fallback
    pub matched_keyword: Option<String>,
}

/// Deterministic keyword classifier over a [`ProfileRegistry`]
#[derive(Debug, Clone)]
pub struct TaskClassifier {
    rules: Vec<KeywordRule>,
    mode: MatchMode,
    registry: Arc<ProfileRegistry>,
}

impl TaskClassifier {
    /// Build rules from the registry in profile priority order
    pub fn new(registry: Arc<ProfileRegistry>, mode: MatchMode) -> Self {
        let rules = CapabilityProfile::ALL
            .iter()
            .filter(|p| **p != CapabilityProfile::General)
            .map(|p| KeywordRule {
                profile: *p,
                keywords: registry.get(*p).keywords.clone(),
            })
            .collect();

        Self {
            rules,
            mode,
            registry,
        }
    }

    pub fn match_mode(&self) -> MatchMode {
        self.mode
    }

    /// Select the profile for a task
    pub fn classify(&self, task: &str) -> CapabilityProfile {
        self.find_match(task)
            .map(|(profile, _)| profile)
            .unwrap_or(CapabilityProfile::General)
    }

    /// Select the profile and describe what it brings
    pub fn analyze(&self, task: &str) -> TaskAnalysis {
        let (profile, matched_keyword) = match self.find_match(task) {
            Some((profile, keyword)) => (profile, Some(keyword.to_string())),
            None => (CapabilityProfile::General, None),
        };

        let definition = self.registry.get(profile);
        let analysis = TaskAnalysis {
            profile,
            complexity: definition.complexity,
            tools: definition.server_names(),
            matched_keyword,
        };

        info!(
            profile = %analysis.profile,
            complexity = %analysis.complexity,
            keyword = analysis.matched_keyword.as_deref().unwrap_or("-"),
            "Task classified"
        );

        analysis
    }

    fn find_match(&self, task: &str) -> Option<(CapabilityProfile, &str)> {
        let lowered = task.to_lowercase();

        for rule in &self.rules {
            if let Some(keyword) = rule
                .keywords
                .iter()
                .find(|k| keyword_matches(&lowered, k, self.mode))
            {
                debug!(profile = %rule.profile, keyword = %keyword, "Keyword matched");
                return Some((rule.profile, keyword.as_str()));
            }
        }

        None
    }
}

/// Check one lower-cased keyword against lower-cased text
pub fn keyword_matches(text: &str, keyword: &str, mode: MatchMode) -> bool {
    if keyword.is_empty() {
        return false;
    }

    match mode {
        MatchMode::Substring => text.contains(keyword),
        MatchMode::Word => text.match_indices(keyword).any(|(start, _)| {
            let end = start + keyword.len();
            let before_ok = text[..start]
                .chars()
                .next_back()
                .map_or(true, |c| !c.is_alphanumeric());
            let after_ok = text[end..]
                .chars()
                .next()
                .map_or(true, |c| !c.is_alphanumeric());
            before_ok && after_ok
        }),
    }
}

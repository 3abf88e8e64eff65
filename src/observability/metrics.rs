//! Thread-safe metrics collection
//!
//! Atomic counters for routing and session outcomes, plus mutex-protected
//! per-profile statistics. Each orchestrator owns its own collector so
//! independent instances (and tests) never share counts.

use crate::routing::CapabilityProfile;
use crate::session::SessionError;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const MAX_DURATION_SAMPLES: usize = 1000;

/// Thread-safe metrics collector using atomics and mutexes
pub struct MetricsCollector {
    tasks_routed: AtomicU64,
    sessions_opened: AtomicU64,
    sessions_active: AtomicU64,
    sessions_completed: AtomicU64,
    sessions_failed: AtomicU64,
    sessions_timed_out: AtomicU64,
    sessions_cancelled: AtomicU64,
    messages_received: AtomicU64,

    profile_stats: Mutex<HashMap<CapabilityProfile, ProfileStats>>,
    started_at: u64,
}

#[derive(Debug, Default)]
struct ProfileStats {
    routed: u64,
    completed: u64,
    failed: u64,
    durations: Vec<u64>, // milliseconds
}

impl ProfileStats {
    fn record_duration(&mut self, duration: Duration) {
        self.durations.push(duration.as_millis() as u64);
        if self.durations.len() > MAX_DURATION_SAMPLES {
            self.durations.remove(0);
        }
    }

    fn snapshot(&self) -> ProfileMetrics {
        let mut sorted = self.durations.clone();
        sorted.sort_unstable();

        let avg_duration_ms = if sorted.is_empty() {
            0.0
        } else {
            sorted.iter().sum::<u64>() as f64 / sorted.len() as f64
        };

        ProfileMetrics {
            routed: self.routed,
            completed: self.completed,
            failed: self.failed,
            avg_duration_ms,
            duration_p95_ms: percentile(&sorted, 95.0),
        }
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            tasks_routed: AtomicU64::new(0),
            sessions_opened: AtomicU64::new(0),
            sessions_active: AtomicU64::new(0),
            sessions_completed: AtomicU64::new(0),
            sessions_failed: AtomicU64::new(0),
            sessions_timed_out: AtomicU64::new(0),
            sessions_cancelled: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            profile_stats: Mutex::new(HashMap::new()),
            started_at: current_timestamp(),
        }
    }

    fn with_profile<F: FnOnce(&mut ProfileStats)>(&self, profile: CapabilityProfile, update: F) {
        if let Ok(mut stats) = self.profile_stats.lock() {
            update(stats.entry(profile).or_default());
        }
    }

    pub fn task_routed(&self, profile: CapabilityProfile) {
        self.tasks_routed.fetch_add(1, Ordering::Relaxed);
        self.with_profile(profile, |stats| stats.routed += 1);
    }

    pub fn session_opened(&self) {
        self.sessions_opened.fetch_add(1, Ordering::Relaxed);
        self.sessions_active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_completed(&self, profile: CapabilityProfile, duration: Duration, messages: u64) {
        self.sessions_completed.fetch_add(1, Ordering::Relaxed);
        self.sessions_active.fetch_sub(1, Ordering::Relaxed);
        self.messages_received.fetch_add(messages, Ordering::Relaxed);
        self.with_profile(profile, |stats| {
            stats.completed += 1;
            stats.record_duration(duration);
        });
    }

    pub fn session_failed(&self, profile: CapabilityProfile, error: &SessionError, duration: Duration) {
        self.sessions_failed.fetch_add(1, Ordering::Relaxed);
        self.sessions_active.fetch_sub(1, Ordering::Relaxed);
        match error {
            SessionError::Timeout { .. } => {
                self.sessions_timed_out.fetch_add(1, Ordering::Relaxed);
            }
            SessionError::Cancelled => {
                self.sessions_cancelled.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
        self.with_profile(profile, |stats| {
            stats.failed += 1;
            stats.record_duration(duration);
        });
    }

    /// A session abandoned without reaching either outcome (aborted task)
    pub fn session_abandoned(&self, profile: CapabilityProfile) {
        self.session_failed(profile, &SessionError::Cancelled, Duration::ZERO);
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        let now = current_timestamp();
        let profiles = self
            .profile_stats
            .lock()
            .map(|stats| {
                stats
                    .iter()
                    .map(|(profile, stats)| (profile.to_string(), stats.snapshot()))
                    .collect()
            })
            .unwrap_or_default();

        MetricsSnapshot {
            tasks_routed: self.tasks_routed.load(Ordering::Relaxed),
            sessions: SessionMetrics {
                opened: self.sessions_opened.load(Ordering::Relaxed),
                active: self.sessions_active.load(Ordering::Relaxed),
                completed: self.sessions_completed.load(Ordering::Relaxed),
                failed: self.sessions_failed.load(Ordering::Relaxed),
                timed_out: self.sessions_timed_out.load(Ordering::Relaxed),
                cancelled: self.sessions_cancelled.load(Ordering::Relaxed),
                messages_received: self.messages_received.load(Ordering::Relaxed),
            },
            profiles,
            uptime_seconds: now.saturating_sub(self.started_at),
            timestamp: now,
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub tasks_routed: u64,
    pub sessions: SessionMetrics,
    pub profiles: BTreeMap<String, ProfileMetrics>,
    pub uptime_seconds: u64,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionMetrics {
    pub opened: u64,
    pub active: u64,
    pub completed: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub cancelled: u64,
    pub messages_received: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileMetrics {
    pub routed: u64,
    pub completed: u64,
    pub failed: u64,
    pub avg_duration_ms: f64,
    pub duration_p95_ms: f64,
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn percentile(sorted_data: &[u64], percentile: f64) -> f64 {
    if sorted_data.is_empty() {
        return 0.0;
    }

    let index = (percentile / 100.0) * (sorted_data.len() - 1) as f64;
    let lower = sorted_data[index.floor() as usize] as f64;
    let upper = sorted_data[index.ceil() as usize] as f64;
    lower + (upper - lower) * index.fract()
}

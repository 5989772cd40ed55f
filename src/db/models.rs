//! Database model types.

use serde::{Deserialize, Serialize};

/// A monitoring target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Target {
    pub target_id: i64,
    pub address: String,
    pub description: String,
    pub tests: Vec<String>,
}

/// The rolling window a statistic is computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Window {
    OneMin,
    FiveMin,
    FifteenMin,
}

impl Window {
    pub fn as_str(self) -> &'static str {
        match self {
            Window::OneMin => "1m",
            Window::FiveMin => "5m",
            Window::FifteenMin => "15m",
        }
    }

    fn view_name(self) -> &'static str {
        match self {
            Window::OneMin => "v_stats_01min",
            Window::FiveMin => "v_stats_05min",
            Window::FifteenMin => "v_stats_15min",
        }
    }

    pub(crate) fn query(self) -> String {
        format!(
            "SELECT avg_latency, min_latency, max_latency, success_rate, total, successes, failures, variance \
             FROM {} WHERE target_id = ?1",
            self.view_name()
        )
    }
}

/// Derived per-`(target_id, window)` statistics. All numeric fields are
/// rounded to two decimal places by the view that produced them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowStats {
    pub avg_latency: Option<f64>,
    pub min_latency: Option<f64>,
    pub max_latency: Option<f64>,
    pub success_rate: Option<f64>,
    pub total: i64,
    pub successes: i64,
    pub failures: i64,
    /// Population variance of successful latencies; only ever populated
    /// for the 1-minute window.
    pub variance: Option<f64>,
}

/// The window selected for a target by the adaptive selection rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChosenWindow {
    OneMin,
    FiveMin,
    FifteenMin,
    Collecting,
}

impl ChosenWindow {
    pub fn as_str(self) -> &'static str {
        match self {
            ChosenWindow::OneMin => "1m",
            ChosenWindow::FiveMin => "5m",
            ChosenWindow::FifteenMin => "15m",
            ChosenWindow::Collecting => "collecting",
        }
    }
}

/// Derived, one per target: the adaptively-chosen window's headline
/// numbers, consumed by the view layer.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetSnapshot {
    pub chosen_window: ChosenWindow,
    pub avg_latency: Option<f64>,
    pub success_rate: Option<f64>,
    pub total: i64,
    pub std_dev: Option<f64>,
}

impl TargetSnapshot {
    pub fn collecting() -> Self {
        Self {
            chosen_window: ChosenWindow::Collecting,
            avg_latency: None,
            success_rate: None,
            total: 0,
            std_dev: None,
        }
    }
}

/// In-memory state of a target's most recent probe outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum OutcomeState {
    Waiting,
    Ok,
    Error,
    DnsError,
}

/// The most recent completed probe for a target.
#[derive(Debug, Clone, PartialEq)]
pub struct LastOutcome {
    pub state: OutcomeState,
    pub latency_ms: Option<f64>,
    pub ttl: Option<i64>,
    pub bytes: Option<i64>,
    pub timestamp_text: String,
    pub resolved_ip: Option<String>,
}

impl LastOutcome {
    pub fn waiting() -> Self {
        Self {
            state: OutcomeState::Waiting,
            latency_ms: None,
            ttl: None,
            bytes: None,
            timestamp_text: String::new(),
            resolved_ip: None,
        }
    }
}

/// A single append-only probe outcome as persisted to the store.
#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub target_id: i64,
    pub success: bool,
    pub latency_ms: Option<f64>,
    pub ttl: Option<i64>,
    pub bytes: Option<i64>,
}

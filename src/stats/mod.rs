//! Stats Engine.
//!
//! A single periodic worker that, every 15 seconds, prunes results older
//! than the retention horizon and recomputes each target's windowed
//! statistics under one acquisition of the Store's write lock, then
//! atomically swaps a freshly built snapshot map into the Shared
//! Snapshot. Window selection and anomaly classification are both pure
//! functions so they can be exercised directly by tests and by the
//! (out-of-scope) view layer.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::db::{ChosenWindow, Store, TargetSnapshot, WindowStats};
use crate::snapshot::SharedSnapshot;

/// Minimum sample counts for the selection rule, checked finest-first.
const FIFTEEN_MIN_THRESHOLD: i64 = 10;
const FIVE_MIN_THRESHOLD: i64 = 5;
const ONE_MIN_THRESHOLD: i64 = 2;

/// Run the stats engine's periodic worker until shutdown. Intended to be
/// spawned as its own task.
pub async fn run(
    store: Arc<Store>,
    snapshot: Arc<SharedSnapshot>,
    interval: Duration,
    retention: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.recv() => return,
            _ = ticker.tick() => {
                run_pass(&store, &snapshot, retention);
            }
        }
    }
}

/// Run a single pass: retention sweep, per-target window selection, and
/// an atomic snapshot swap. Split out from `run` so it's directly
/// testable without the interval/shutdown plumbing.
fn run_pass(store: &Store, snapshot: &SharedSnapshot, retention: Duration) {
    let result = store.stats_pass(retention, |_target_id, w15, w5, w1| {
        select_window(&w15, &w5, &w1)
    });

    match result {
        Ok(rows) => {
            let map: HashMap<i64, TargetSnapshot> = rows.into_iter().collect();
            snapshot.swap_stats(map);
        }
        Err(e) => {
            tracing::error!("stats engine pass failed: {}", e);
        }
    }
}

/// Apply the adaptive window selection rule and build the resulting
/// target snapshot. Strict order, first match wins:
///
/// - `total(15m) >= 10` -> 15m
/// - `total(5m) >= 5` -> 5m
/// - `total(1m) >= 2` -> 1m (only branch with a non-zero `std_dev`)
/// - otherwise -> collecting
pub fn select_window(w15: &WindowStats, w5: &WindowStats, w1: &WindowStats) -> TargetSnapshot {
    if w15.total >= FIFTEEN_MIN_THRESHOLD {
        return TargetSnapshot {
            chosen_window: ChosenWindow::FifteenMin,
            avg_latency: w15.avg_latency,
            success_rate: w15.success_rate,
            total: w15.total,
            std_dev: None,
        };
    }

    if w5.total >= FIVE_MIN_THRESHOLD {
        return TargetSnapshot {
            chosen_window: ChosenWindow::FiveMin,
            avg_latency: w5.avg_latency,
            success_rate: w5.success_rate,
            total: w5.total,
            std_dev: None,
        };
    }

    if w1.total >= ONE_MIN_THRESHOLD {
        let std_dev = w1.variance.map(|v| v.max(0.0).sqrt());
        return TargetSnapshot {
            chosen_window: ChosenWindow::OneMin,
            avg_latency: w1.avg_latency,
            success_rate: w1.success_rate,
            total: w1.total,
            std_dev,
        };
    }

    TargetSnapshot::collecting()
}

/// Anomaly classification label for a single successful probe sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnomalyLabel {
    Normal,
    Variable,
    Anomalous,
    Critical,
    Collecting,
    /// `std_dev` is zero/absent, or the chosen window isn't 1m: no
    /// z-score can be computed.
    Neutral,
}

/// Classify the latest probe sample of latency `x` against the target's
/// current snapshot. A pure function of snapshot fields, computed on
/// read by the view layer — the engine itself never colors anything.
pub fn classify(probe_succeeded: bool, x: Option<f64>, snapshot: &TargetSnapshot) -> AnomalyLabel {
    if !probe_succeeded {
        return AnomalyLabel::Critical;
    }

    if snapshot.chosen_window == ChosenWindow::Collecting {
        return AnomalyLabel::Collecting;
    }

    if snapshot.chosen_window != ChosenWindow::OneMin {
        return AnomalyLabel::Neutral;
    }

    let (Some(x), Some(mu), Some(sigma)) = (x, snapshot.avg_latency, snapshot.std_dev) else {
        return AnomalyLabel::Neutral;
    };

    if sigma == 0.0 {
        return AnomalyLabel::Neutral;
    }

    let z = ((x - mu) / sigma).abs();
    match z {
        z if z <= 1.0 => AnomalyLabel::Normal,
        z if z <= 1.5 => AnomalyLabel::Variable,
        z if z <= 2.0 => AnomalyLabel::Anomalous,
        _ => AnomalyLabel::Critical,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ProbeResult;
    use tempfile::NamedTempFile;

    fn window(total: i64, avg: Option<f64>, variance: Option<f64>) -> WindowStats {
        WindowStats {
            avg_latency: avg,
            min_latency: avg,
            max_latency: avg,
            success_rate: Some(100.0),
            total,
            successes: total,
            failures: 0,
            variance,
        }
    }

    #[test]
    fn test_selection_prefers_coarsest_satisfied_window() {
        let w15 = window(10, Some(20.0), None);
        let w5 = window(5, Some(21.0), None);
        let w1 = window(2, Some(22.0), Some(1.0));

        let snapshot = select_window(&w15, &w5, &w1);
        assert_eq!(snapshot.chosen_window, ChosenWindow::FifteenMin);
        assert!(snapshot.std_dev.is_none());
    }

    #[test]
    fn test_selection_falls_back_to_five_minute() {
        let w15 = window(4, Some(20.0), None);
        let w5 = window(5, Some(21.0), None);
        let w1 = window(2, Some(22.0), Some(1.0));

        let snapshot = select_window(&w15, &w5, &w1);
        assert_eq!(snapshot.chosen_window, ChosenWindow::FiveMin);
    }

    #[test]
    fn test_selection_falls_back_to_one_minute_with_std_dev() {
        let w15 = window(0, None, None);
        let w5 = window(0, None, None);
        let w1 = window(2, Some(20.0), Some(4.0));

        let snapshot = select_window(&w15, &w5, &w1);
        assert_eq!(snapshot.chosen_window, ChosenWindow::OneMin);
        assert_eq!(snapshot.std_dev, Some(2.0));
    }

    #[test]
    fn test_selection_collecting_when_all_windows_empty() {
        let empty = WindowStats::default();
        let snapshot = select_window(&empty, &empty, &empty);
        assert_eq!(snapshot.chosen_window, ChosenWindow::Collecting);
        assert!(snapshot.avg_latency.is_none());
        assert_eq!(snapshot.total, 0);
    }

    #[test]
    fn test_selection_is_deterministic_given_totals() {
        // Same totals must always yield the same chosen window, regardless
        // of the numeric payload.
        let a = select_window(&window(10, Some(1.0), None), &window(0, None, None), &window(0, None, None));
        let b = select_window(&window(10, Some(999.0), None), &window(0, None, None), &window(0, None, None));
        assert_eq!(a.chosen_window, b.chosen_window);
    }

    #[test]
    fn test_classify_failed_probe_is_always_critical() {
        let snapshot = TargetSnapshot {
            chosen_window: ChosenWindow::OneMin,
            avg_latency: Some(20.0),
            success_rate: Some(100.0),
            total: 10,
            std_dev: Some(2.0),
        };
        assert_eq!(classify(false, None, &snapshot), AnomalyLabel::Critical);
    }

    #[test]
    fn test_classify_collecting_window() {
        let snapshot = TargetSnapshot::collecting();
        assert_eq!(classify(true, Some(20.0), &snapshot), AnomalyLabel::Collecting);
    }

    #[test]
    fn test_classify_non_one_minute_window_is_neutral() {
        let snapshot = TargetSnapshot {
            chosen_window: ChosenWindow::FiveMin,
            avg_latency: Some(20.0),
            success_rate: Some(100.0),
            total: 5,
            std_dev: None,
        };
        assert_eq!(classify(true, Some(20.0), &snapshot), AnomalyLabel::Neutral);
    }

    #[test]
    fn test_classify_zero_std_dev_is_neutral() {
        let snapshot = TargetSnapshot {
            chosen_window: ChosenWindow::OneMin,
            avg_latency: Some(20.0),
            success_rate: Some(100.0),
            total: 2,
            std_dev: Some(0.0),
        };
        assert_eq!(classify(true, Some(20.0), &snapshot), AnomalyLabel::Neutral);
    }

    #[test]
    fn test_classify_anomaly_thresholds() {
        let snapshot = TargetSnapshot {
            chosen_window: ChosenWindow::OneMin,
            avg_latency: Some(20.0),
            success_rate: Some(100.0),
            total: 60,
            std_dev: Some(2.0),
        };
        // z = 0 -> normal
        assert_eq!(classify(true, Some(20.0), &snapshot), AnomalyLabel::Normal);
        // z = 1.2 -> variable
        assert_eq!(classify(true, Some(22.4), &snapshot), AnomalyLabel::Variable);
        // z = 1.8 -> anomalous
        assert_eq!(classify(true, Some(23.6), &snapshot), AnomalyLabel::Anomalous);
        // z = 90 (a 200ms sample against mu=20, sigma=2) -> critical
        assert_eq!(classify(true, Some(200.0), &snapshot), AnomalyLabel::Critical);
    }

    #[test]
    fn test_run_pass_swaps_snapshot_for_each_target() {
        let tmp = NamedTempFile::new().unwrap();
        let store = Store::new(tmp.path()).unwrap();
        store
            .upsert_target(&crate::db::Target {
                target_id: 1,
                address: "1.1.1.1".to_string(),
                description: "t".to_string(),
                tests: vec!["icmp".to_string()],
            })
            .unwrap();

        for _ in 0..2 {
            store
                .append_result(&ProbeResult {
                    target_id: 1,
                    success: true,
                    latency_ms: Some(15.0),
                    ttl: Some(56),
                    bytes: Some(64),
                })
                .unwrap();
        }

        let snapshot = SharedSnapshot::new();
        run_pass(&store, &snapshot, Duration::from_secs(7 * 24 * 3600));

        let published = snapshot.stats(1).unwrap();
        assert_eq!(published.chosen_window, ChosenWindow::OneMin);
        assert_eq!(published.total, 2);
    }
}

//! Prober Pool.
//!
//! One logical prober per target, running an endless loop that resolves
//! the target's address (once, with re-resolution while in a degraded
//! state), invokes the host echo utility, and publishes the outcome to
//! both the Store and the Shared Snapshot. Probers never die on a
//! transient store-write failure or a single failed probe — only a
//! missing echo utility on the host terminates the owning prober.

mod echo;

pub use echo::{EchoError, EchoOutcome, EchoReply};

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::sync::broadcast;

use crate::db::{LastOutcome, OutcomeState, ProbeResult, Store, Target};
use crate::resolver::{self, ResolveError};
use crate::snapshot::SharedSnapshot;

const TIMESTAMP_FORMAT: &str = "%H:%M:%S%.3f";

/// Run the endless probe loop for one target. Intended to be spawned as
/// its own task; returns when the echo utility is missing or shutdown is
/// signalled.
pub async fn run(
    target: Target,
    store: Arc<Store>,
    snapshot: Arc<SharedSnapshot>,
    probe_interval: Duration,
    probe_timeout: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    snapshot.init_waiting(target.target_id);

    let literal = resolver::is_ipv4_literal(&target.address);
    let mut cached_ip: Option<Ipv4Addr> = None;

    loop {
        if shutdown.try_recv().is_ok() {
            return;
        }

        let address_for_probe: String = if literal {
            target.address.clone()
        } else {
            match cached_ip {
                Some(ip) => ip.to_string(),
                None => match resolver::resolve(&target.address).await {
                    Ok(ip) => {
                        cached_ip = Some(ip);
                        ip.to_string()
                    }
                    Err(e) => {
                        publish_dns_failure(&snapshot, target.target_id, &e);
                        if sleep_or_shutdown(jittered(probe_interval), &mut shutdown).await {
                            return;
                        }
                        continue;
                    }
                },
            }
        };

        match echo::send_one(&address_for_probe, probe_timeout).await {
            Ok(EchoOutcome::Reachable(reply)) => {
                publish_success(&store, &snapshot, &target, &reply, cached_ip);
            }
            Ok(EchoOutcome::Unreachable) => {
                publish_failure(&store, &snapshot, &target);
            }
            Err(EchoError::NotInstalled(detail)) => {
                tracing::error!(
                    "prober for target {}: echo utility not installed, stopping this prober: {}",
                    target.target_id,
                    detail
                );
                return;
            }
            Err(EchoError::Spawn(detail)) => {
                tracing::warn!(
                    "prober for target {}: failed to invoke echo utility: {}",
                    target.target_id,
                    detail
                );
                publish_failure(&store, &snapshot, &target);
            }
        }

        if sleep_or_shutdown(jittered(probe_interval), &mut shutdown).await {
            return;
        }
    }
}

/// Spread concurrently-spawned probers out so they don't all wake on the
/// same tick, adding up to 100ms of jitter on top of the configured
/// interval.
fn jittered(duration: Duration) -> Duration {
    duration + Duration::from_millis(rand::random::<u64>() % 100)
}

/// Sleep for `duration`, returning early (with `true`) if shutdown fires
/// first.
async fn sleep_or_shutdown(duration: Duration, shutdown: &mut broadcast::Receiver<()>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        _ = shutdown.recv() => true,
    }
}

fn publish_success(
    store: &Store,
    snapshot: &SharedSnapshot,
    target: &Target,
    reply: &EchoReply,
    resolved_ip: Option<Ipv4Addr>,
) {
    if let Err(e) = store.append_result(&ProbeResult {
        target_id: target.target_id,
        success: true,
        latency_ms: reply.latency_ms,
        ttl: reply.ttl,
        bytes: reply.bytes,
    }) {
        tracing::error!("target {}: store write failed: {}", target.target_id, e);
    }

    snapshot.set_outcome(
        target.target_id,
        LastOutcome {
            state: OutcomeState::Ok,
            latency_ms: reply.latency_ms,
            ttl: reply.ttl,
            bytes: reply.bytes,
            timestamp_text: Local::now().format(TIMESTAMP_FORMAT).to_string(),
            resolved_ip: resolved_ip.map(|ip| ip.to_string()),
        },
    );
}

fn publish_failure(store: &Store, snapshot: &SharedSnapshot, target: &Target) {
    if let Err(e) = store.append_result(&ProbeResult {
        target_id: target.target_id,
        success: false,
        latency_ms: None,
        ttl: None,
        bytes: None,
    }) {
        tracing::error!("target {}: store write failed: {}", target.target_id, e);
    }

    snapshot.set_outcome(
        target.target_id,
        LastOutcome {
            state: OutcomeState::Error,
            latency_ms: None,
            ttl: None,
            bytes: None,
            timestamp_text: format!("fail:{}", Local::now().format(TIMESTAMP_FORMAT)),
            resolved_ip: None,
        },
    );
}

fn publish_dns_failure(snapshot: &SharedSnapshot, target_id: i64, error: &ResolveError) {
    tracing::warn!("target {}: dns resolution failed: {}", target_id, error);
    snapshot.set_outcome(
        target_id,
        LastOutcome {
            state: OutcomeState::DnsError,
            latency_ms: None,
            ttl: None,
            bytes: None,
            timestamp_text: format!("dns_fail:{}", Local::now().format(TIMESTAMP_FORMAT)),
            resolved_ip: None,
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_publish_success_writes_store_and_snapshot() {
        let tmp = NamedTempFile::new().unwrap();
        let store = Store::new(tmp.path()).unwrap();
        store
            .upsert_target(&Target {
                target_id: 1,
                address: "1.1.1.1".to_string(),
                description: "t".to_string(),
                tests: vec!["icmp".to_string()],
            })
            .unwrap();
        let snapshot = SharedSnapshot::new();
        let target = Target {
            target_id: 1,
            address: "1.1.1.1".to_string(),
            description: "t".to_string(),
            tests: vec!["icmp".to_string()],
        };

        publish_success(
            &store,
            &snapshot,
            &target,
            &EchoReply { latency_ms: Some(10.0), ttl: Some(56), bytes: Some(64) },
            None,
        );

        let outcome = snapshot.outcome(1).unwrap();
        assert_eq!(outcome.state, OutcomeState::Ok);
        assert_eq!(outcome.latency_ms, Some(10.0));

        let window = store.query_window(1, crate::db::Window::OneMin).unwrap();
        assert_eq!(window.total, 1);
        assert_eq!(window.successes, 1);
    }

    #[tokio::test]
    async fn test_publish_failure_has_no_numerics() {
        let tmp = NamedTempFile::new().unwrap();
        let store = Store::new(tmp.path()).unwrap();
        let target = Target {
            target_id: 2,
            address: "192.0.2.1".to_string(),
            description: "unroutable".to_string(),
            tests: vec!["icmp".to_string()],
        };
        store.upsert_target(&target).unwrap();
        let snapshot = SharedSnapshot::new();

        publish_failure(&store, &snapshot, &target);

        let outcome = snapshot.outcome(2).unwrap();
        assert_eq!(outcome.state, OutcomeState::Error);
        assert!(outcome.timestamp_text.starts_with("fail:"));

        let window = store.query_window(2, crate::db::Window::OneMin).unwrap();
        assert_eq!(window.total, 1);
        assert_eq!(window.failures, 1);
        assert!(window.avg_latency.is_none());
    }

    #[test]
    fn test_dns_failure_timestamp_has_prefix() {
        let snapshot = SharedSnapshot::new();
        publish_dns_failure(&snapshot, 3, &ResolveError::NoAddress("example.invalid".to_string()));
        let outcome = snapshot.outcome(3).unwrap();
        assert_eq!(outcome.state, OutcomeState::DnsError);
        assert!(outcome.timestamp_text.starts_with("dns_fail:"));
    }
}

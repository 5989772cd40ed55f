//! Public-address poller (peripheral; see SPEC_FULL.md §4.8).
//!
//! A plain-text HTTPS GET that returns a bare IPv4 string. Any transport
//! failure or non-2xx response degrades to the literal token `"Unknown"`
//! — this collector never surfaces an error to its caller.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::snapshot::SharedSnapshot;

const ENDPOINT: &str = "https://api.ipify.org";
const UNKNOWN: &str = "Unknown";

/// Poll `endpoint` on an interval, publishing the result (or `"Unknown"`
/// on failure) to the snapshot's `public_ipv4` slot.
pub async fn run(
    snapshot: Arc<SharedSnapshot>,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new());

    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = shutdown.recv() => return,
            _ = ticker.tick() => {
                let value = fetch_once(&client, ENDPOINT).await;
                snapshot.set_public_ipv4(value);
            }
        }
    }
}

async fn fetch_once(client: &reqwest::Client, endpoint: &str) -> String {
    match client.get(endpoint).send().await {
        Ok(resp) if resp.status().is_success() => match resp.text().await {
            Ok(body) => {
                let candidate = body.trim();
                if is_plausible_ipv4(candidate) {
                    candidate.to_string()
                } else {
                    UNKNOWN.to_string()
                }
            }
            Err(_) => UNKNOWN.to_string(),
        },
        _ => UNKNOWN.to_string(),
    }
}

fn is_plausible_ipv4(s: &str) -> bool {
    s.parse::<std::net::Ipv4Addr>().is_ok()
}

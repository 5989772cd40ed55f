//! Host echo utility invocation and output parsing.
//!
//! Shells out to the system `ping` binary with "send one request"
//! semantics: a cached `Regex` per pattern, parsed leniently so a missing
//! field is reported as absent rather than as a probe failure.

use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use thiserror::Error;
use tokio::process::Command;

#[derive(Error, Debug)]
pub enum EchoError {
    /// The host has no `ping` binary on PATH. Fatal for the owning prober;
    /// other probers are unaffected.
    #[error("echo utility not installed: {0}")]
    NotInstalled(String),
    #[error("failed to run echo utility: {0}")]
    Spawn(String),
}

/// One successfully parsed echo reply. Any field may be absent even on a
/// zero exit code — parsing is resilient to missing fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EchoReply {
    pub latency_ms: Option<f64>,
    pub ttl: Option<i64>,
    pub bytes: Option<i64>,
}

/// Outcome of one echo invocation.
pub enum EchoOutcome {
    /// Zero exit: host is reachable.
    Reachable(EchoReply),
    /// Non-zero exit: host is unreachable. Carries no reply fields.
    Unreachable,
}

fn latency_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"time[=<](?P<val>[0-9.]+)\s*ms").unwrap())
}

fn ttl_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"ttl=(?P<val>[0-9]+)").unwrap())
}

fn bytes_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?P<val>[0-9]+)\s+bytes from").unwrap())
}

/// Invoke `ping -c 1 -W <timeout_secs> <address>` and classify the result.
pub async fn send_one(address: &str, timeout: Duration) -> Result<EchoOutcome, EchoError> {
    let timeout_secs = timeout.as_secs().max(1).to_string();

    let output = Command::new("ping")
        .args(["-c", "1", "-W", &timeout_secs, address])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EchoError::NotInstalled(e.to_string())
            } else {
                EchoError::Spawn(e.to_string())
            }
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout);

    if !output.status.success() {
        return Ok(EchoOutcome::Unreachable);
    }

    Ok(EchoOutcome::Reachable(parse_reply(&stdout)))
}

/// Parse an echo reply's stdout for latency, TTL, and payload size.
/// Missing fields are `None`, never an error — only the exit code decides
/// reachability.
fn parse_reply(stdout: &str) -> EchoReply {
    let latency_ms = latency_re()
        .captures(stdout)
        .and_then(|c| c.name("val"))
        .and_then(|m| m.as_str().parse::<f64>().ok());

    let ttl = ttl_re()
        .captures(stdout)
        .and_then(|c| c.name("val"))
        .and_then(|m| m.as_str().parse::<i64>().ok());

    let bytes = bytes_re()
        .captures(stdout)
        .and_then(|c| c.name("val"))
        .and_then(|m| m.as_str().parse::<i64>().ok());

    EchoReply { latency_ms, ttl, bytes }
}

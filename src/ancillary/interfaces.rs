//! Interface enumerator (peripheral; see SPEC_FULL.md §4.8).
//!
//! Delegates to the host `ip` utility rather than a netlink binding,
//! following the same "shell out to a host command" idiom the prober
//! uses for `ping`. Any failure — missing binary, non-zero exit, no
//! parseable lines — degrades to a single synthetic `("Erro", "Erro")`
//! row rather than propagating.

use std::process::Stdio;
use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use tokio::process::Command;
use tokio::sync::broadcast;

use crate::snapshot::{InterfaceInfo, SharedSnapshot};

fn interface_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+:\s+(?P<name>\S+)\s+inet\s+(?P<addr>[0-9.]+)/").unwrap())
}

/// Poll the host interface list on an interval, publishing the parsed
/// rows (or the `Erro` sentinel on failure) to the snapshot.
pub async fn run(
    snapshot: Arc<SharedSnapshot>,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = shutdown.recv() => return,
            _ = ticker.tick() => {
                let interfaces = enumerate_once().await;
                snapshot.set_interfaces(interfaces);
            }
        }
    }
}

async fn enumerate_once() -> Vec<InterfaceInfo> {
    let output = Command::new("ip")
        .args(["-o", "-4", "addr", "show"])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await;

    match output {
        Ok(out) if out.status.success() => {
            let stdout = String::from_utf8_lossy(&out.stdout);
            let parsed = parse_interfaces(&stdout);
            if parsed.is_empty() {
                vec![error_row()]
            } else {
                parsed
            }
        }
        _ => vec![error_row()],
    }
}

fn parse_interfaces(stdout: &str) -> Vec<InterfaceInfo> {
    stdout
        .lines()
        .filter_map(|line| {
            let caps = interface_re().captures(line)?;
            Some(InterfaceInfo {
                name: caps.name("name")?.as_str().to_string(),
                address: caps.name("addr")?.as_str().to_string(),
            })
        })
        .collect()
}

fn error_row() -> InterfaceInfo {
    InterfaceInfo { name: "Erro".to_string(), address: "Erro".to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_loopback_and_eth() {
        let stdout = "\
1: lo    inet 127.0.0.1/8 scope host lo\\       valid_lft forever preferred_lft forever
2: eth0    inet 192.168.1.5/24 brd 192.168.1.255 scope global eth0\\       valid_lft forever preferred_lft forever";

        let interfaces = parse_interfaces(stdout);
        assert_eq!(interfaces.len(), 2);
        assert_eq!(interfaces[0].name, "lo");
        assert_eq!(interfaces[0].address, "127.0.0.1");
        assert_eq!(interfaces[1].name, "eth0");
        assert_eq!(interfaces[1].address, "192.168.1.5");
    }

    #[test]
    fn test_parse_unrecognized_output_is_empty() {
        let interfaces = parse_interfaces("garbage output\nno interfaces here");
        assert!(interfaces.is_empty());
    }

    #[test]
    fn test_error_row_sentinel() {
        let row = error_row();
        assert_eq!(row.name, "Erro");
        assert_eq!(row.address, "Erro");
    }
}

//! Configuration constants for the monitor.
//!
//! Paths are resolved relative to the running executable so the config
//! file and store always live next to the binary, regardless of the
//! current working directory the process was launched from.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration for the monitor engine.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Path to `icmp_monitor.json`.
    pub registry_path: PathBuf,
    /// Path to `icmp_monitor.sqlite3`.
    pub store_path: PathBuf,
    /// Delay between probe iterations for a single target.
    pub probe_interval: Duration,
    /// Timeout passed to the host echo utility for a single request.
    pub probe_timeout: Duration,
    /// Period of the stats engine's recompute pass.
    pub stats_interval: Duration,
    /// Raw-result retention horizon.
    pub retention: Duration,
    /// Period of the public-address poller.
    pub public_ip_interval: Duration,
    /// Period of the interface enumerator.
    pub interface_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        let exe_dir = env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."));

        Self {
            registry_path: exe_dir.join("icmp_monitor.json"),
            store_path: exe_dir.join("icmp_monitor.sqlite3"),
            probe_interval: Duration::from_millis(1500),
            probe_timeout: Duration::from_secs(4),
            stats_interval: Duration::from_secs(15),
            retention: Duration::from_secs(7 * 24 * 3600),
            public_ip_interval: Duration::from_secs(15),
            interface_interval: Duration::from_secs(15),
        }
    }
}

impl MonitorConfig {
    /// Load configuration, honoring a couple of environment overrides used
    /// in development (the paths are otherwise fixed relative to the
    /// executable per the external-interfaces contract).
    pub fn load() -> Self {
        let mut cfg = Self::default();

        if let Ok(path) = env::var("ICMP_MONITOR_CONFIG") {
            cfg.registry_path = PathBuf::from(path);
        }
        if let Ok(path) = env::var("ICMP_MONITOR_DB") {
            cfg.store_path = PathBuf::from(path);
        }

        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_intervals() {
        let cfg = MonitorConfig::default();
        assert_eq!(cfg.probe_interval, Duration::from_millis(1500));
        assert_eq!(cfg.stats_interval, Duration::from_secs(15));
        assert_eq!(cfg.retention, Duration::from_secs(604_800));
    }
}

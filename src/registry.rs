//! Target Registry.
//!
//! Loads `icmp_monitor.json` from a fixed location, seeding a default file
//! with four DNS targets on first run. A pure function from file to an
//! ordered list of targets: the file is read once at startup.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::Target;

/// Registry load/parse failures. Both variants are fatal at startup.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed config at {path}: {source}")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// On-disk entry shape for `icmp_monitor.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TargetEntry {
    id: i64,
    addr: String,
    desc: String,
}

/// The four Cloudflare/Google DNS targets written on first run.
fn default_entries() -> Vec<TargetEntry> {
    vec![
        TargetEntry { id: 1, addr: "1.1.1.1".to_string(), desc: "Cloudflare DNS Primary".to_string() },
        TargetEntry { id: 2, addr: "1.0.0.1".to_string(), desc: "Cloudflare DNS Secondary".to_string() },
        TargetEntry { id: 3, addr: "8.8.8.8".to_string(), desc: "Google DNS Primary".to_string() },
        TargetEntry { id: 4, addr: "8.8.4.4".to_string(), desc: "Google DNS Secondary".to_string() },
    ]
}

/// Load the registry file, seeding it with defaults if absent.
///
/// Malformed JSON is a fatal error; a missing file is not.
pub fn load_or_init<P: AsRef<Path>>(path: P) -> Result<Vec<Target>, RegistryError> {
    let path = path.as_ref();
    let path_str = path.display().to_string();

    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!("registry file {} not found, writing defaults", path_str);
            let entries = default_entries();
            let serialized = serde_json::to_string_pretty(&entries)
                .map_err(|source| RegistryError::Malformed { path: path_str.clone(), source })?;
            fs::write(path, serialized)
                .map_err(|source| RegistryError::Io { path: path_str.clone(), source })?;
            return Ok(entries_to_targets(entries));
        }
        Err(source) => return Err(RegistryError::Io { path: path_str, source }),
    };

    let entries: Vec<TargetEntry> = serde_json::from_str(&raw)
        .map_err(|source| RegistryError::Malformed { path: path_str, source })?;

    Ok(entries_to_targets(entries))
}

fn entries_to_targets(entries: Vec<TargetEntry>) -> Vec<Target> {
    entries
        .into_iter()
        .map(|e| Target {
            target_id: e.id,
            address: e.addr,
            description: e.desc,
            tests: vec!["icmp".to_string()],
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_seeds_default_on_missing_file() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_path_buf();
        fs::remove_file(&path).unwrap();

        let targets = load_or_init(&path).unwrap();
        assert_eq!(targets.len(), 4);
        assert_eq!(targets[0].address, "1.1.1.1");

        // File should now exist and reload identically.
        let reloaded = load_or_init(&path).unwrap();
        assert_eq!(reloaded.len(), 4);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_malformed_json_is_fatal() {
        let tmp = NamedTempFile::new().unwrap();
        fs::write(tmp.path(), "not json").unwrap();
        let result = load_or_init(tmp.path());
        assert!(matches!(result, Err(RegistryError::Malformed { .. })));
    }

    #[test]
    fn test_loads_custom_entries() {
        let tmp = NamedTempFile::new().unwrap();
        fs::write(
            tmp.path(),
            r#"[{"id": 42, "addr": "192.0.2.1", "desc": "test-net"}]"#,
        )
        .unwrap();

        let targets = load_or_init(tmp.path()).unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].target_id, 42);
        assert_eq!(targets[0].address, "192.0.2.1");
    }
}

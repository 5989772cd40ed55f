//! Shared Snapshot.
//!
//! A concurrent in-memory view of the most recent per-target outcome and
//! statistics, plus the two ancillary scalar/list slots. Every writer
//! (a prober, the stats engine, an ancillary collector) owns only its own
//! key or slot and writes last-writer-wins; there is no cross-slot
//! transaction. Readers take a consistent per-target read of outcome and
//! stats together, but the snapshot as a whole is not a single atomic
//! transaction, matching the contract in the component design.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::db::{LastOutcome, TargetSnapshot};

/// A single local network interface, as surfaced to the view layer.
#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceInfo {
    pub name: String,
    pub address: String,
}

/// The shared, concurrency-safe state consumed by the view layer.
pub struct SharedSnapshot {
    outcomes: RwLock<HashMap<i64, LastOutcome>>,
    stats: RwLock<HashMap<i64, TargetSnapshot>>,
    public_ipv4: RwLock<String>,
    interfaces: RwLock<Vec<InterfaceInfo>>,
}

impl Default for SharedSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedSnapshot {
    pub fn new() -> Self {
        Self {
            outcomes: RwLock::new(HashMap::new()),
            stats: RwLock::new(HashMap::new()),
            public_ipv4: RwLock::new("Unknown".to_string()),
            interfaces: RwLock::new(Vec::new()),
        }
    }

    /// Called once per target at startup so the view has something to
    /// render before the first probe completes.
    pub fn init_waiting(&self, target_id: i64) {
        self.outcomes.write().unwrap().insert(target_id, LastOutcome::waiting());
    }

    /// Overwrite a target's last outcome. Called by the owning prober.
    pub fn set_outcome(&self, target_id: i64, outcome: LastOutcome) {
        self.outcomes.write().unwrap().insert(target_id, outcome);
    }

    /// Read a target's last outcome, if any has been published.
    pub fn outcome(&self, target_id: i64) -> Option<LastOutcome> {
        self.outcomes.read().unwrap().get(&target_id).cloned()
    }

    /// Atomically swap in a freshly computed stats map. Called once per
    /// stats-engine pass; never mutated key-by-key so readers never see a
    /// half-updated map.
    pub fn swap_stats(&self, stats: HashMap<i64, TargetSnapshot>) {
        *self.stats.write().unwrap() = stats;
    }

    /// Read a target's current statistics snapshot, if published yet.
    pub fn stats(&self, target_id: i64) -> Option<TargetSnapshot> {
        self.stats.read().unwrap().get(&target_id).cloned()
    }

    /// Read outcome and stats together for one target.
    pub fn target_view(&self, target_id: i64) -> (Option<LastOutcome>, Option<TargetSnapshot>) {
        (self.outcome(target_id), self.stats(target_id))
    }

    /// All target IDs with either an outcome or a stats row published.
    pub fn known_targets(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.outcomes.read().unwrap().keys().copied().collect();
        for id in self.stats.read().unwrap().keys() {
            if !ids.contains(id) {
                ids.push(*id);
            }
        }
        ids.sort_unstable();
        ids
    }

    pub fn set_public_ipv4(&self, value: String) {
        *self.public_ipv4.write().unwrap() = value;
    }

    pub fn public_ipv4(&self) -> String {
        self.public_ipv4.read().unwrap().clone()
    }

    pub fn set_interfaces(&self, interfaces: Vec<InterfaceInfo>) {
        *self.interfaces.write().unwrap() = interfaces;
    }

    pub fn interfaces(&self) -> Vec<InterfaceInfo> {
        self.interfaces.read().unwrap().clone()
    }
}

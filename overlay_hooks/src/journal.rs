use std::collections::BTreeMap;

use serde::Serialize;

/// Append-only trace of what the overlay observed and decided, plus monotonic
/// counters keyed by decision kind. Labels are dotted lowercase, e.g.
/// `session.activate object:3` or `hook.veto Player::EnterTransform`.
#[derive(Debug, Default, Clone, Serialize)]
pub struct Journal {
    events: Vec<String>,
    coverage: BTreeMap<String, u64>,
}

impl Journal {
    pub fn log(&mut self, event: impl Into<String>) {
        self.events.push(event.into());
    }

    pub fn bump(&mut self, key: &str) {
        *self.coverage.entry(key.to_string()).or_insert(0) += 1;
    }

    pub fn events(&self) -> &[String] {
        &self.events
    }

    pub fn coverage(&self) -> &BTreeMap<String, u64> {
        &self.coverage
    }

    pub fn count(&self, key: &str) -> u64 {
        self.coverage.get(key).copied().unwrap_or(0)
    }
}

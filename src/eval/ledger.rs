use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

/// Picks one option not yet present in `used` and records it.
///
/// When every option has been used the record is cleared first, so the
/// cycle starts over with the full option set.
pub fn draw_exclusive<R: Rng + ?Sized>(
    used: &mut Vec<String>,
    options: &[String],
    rng: &mut R,
) -> Option<String> {
    let mut pool: Vec<&String> = options.iter().filter(|o| !used.contains(o)).collect();
    if pool.is_empty() {
        used.clear();
        pool = options.iter().collect();
    }
    let choice = pool.choose(rng).map(|s| s.to_string())?;
    used.push(choice.clone());
    Some(choice)
}

/// Per-pass usage record for scoped exclusive selection.
#[derive(Debug, Default, Clone)]
pub struct UsageLedger {
    entries: HashMap<String, Vec<String>>,
}

impl UsageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draw<R: Rng + ?Sized>(
        &mut self,
        slot: &str,
        options: &[String],
        rng: &mut R,
    ) -> Option<String> {
        let used = self.entries.entry(slot.to_string()).or_default();
        draw_exclusive(used, options, rng)
    }

    pub fn used(&self, slot: &str) -> &[String] {
        self.entries.get(slot).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Usage record shared by every generation that holds a clone.
///
/// The entry guard for a slot is held only while filtering, picking and
/// recording. Resolution of the chosen value happens after it is released.
#[derive(Debug, Default, Clone)]
pub struct GlobalLedger {
    entries: Arc<DashMap<String, Vec<String>>>,
}

impl GlobalLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draw<R: Rng + ?Sized>(
        &self,
        slot: &str,
        options: &[String],
        rng: &mut R,
    ) -> Option<String> {
        let mut entry = self.entries.entry(slot.to_string()).or_default();
        draw_exclusive(entry.value_mut(), options, rng)
    }

    pub fn used(&self, slot: &str) -> Vec<String> {
        self.entries
            .get(slot)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    pub fn reset(&self) {
        debug!("Resetting global ledger ({} slots)", self.entries.len());
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

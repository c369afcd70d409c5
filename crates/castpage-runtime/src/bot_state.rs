//! Persisted bot record: processed cast ids, generation grants and operating flags.

use std::collections::{HashSet, VecDeque};

use castpage_core::is_outside_window;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PROCESSED_CAP: usize = 1_000;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
/// Single mutable record owned by the pipeline for the lifetime of the process.
pub struct BotState {
    last_checked_time: Option<u64>,
    processed_casts: Vec<String>,
    generation_request_queue: VecDeque<u64>,
    last_generation_call: Option<u64>,
    maintenance_mode: bool,
    #[serde(skip)]
    processed_index: HashSet<String>,
}

impl BotState {
    pub fn last_checked_time(&self) -> Option<u64> {
        self.last_checked_time
    }

    pub fn set_last_checked_time(&mut self, now_ms: u64) {
        self.last_checked_time = Some(now_ms);
    }

    pub fn processed_casts(&self) -> &[String] {
        &self.processed_casts
    }

    pub fn is_processed(&self, identifier: &str) -> bool {
        self.processed_index.contains(identifier)
    }

    /// Appends `identifier` unless already present. Returns whether it was new.
    pub fn mark_processed(&mut self, identifier: &str) -> bool {
        if !self.processed_index.insert(identifier.to_string()) {
            return false;
        }
        self.processed_casts.push(identifier.to_string());
        true
    }

    pub fn generation_request_queue(&self) -> &VecDeque<u64> {
        &self.generation_request_queue
    }

    pub(crate) fn generation_request_queue_mut(&mut self) -> &mut VecDeque<u64> {
        &mut self.generation_request_queue
    }

    pub fn last_generation_call(&self) -> Option<u64> {
        self.last_generation_call
    }

    pub(crate) fn set_last_generation_call(&mut self, granted_at_ms: u64) {
        self.last_generation_call = Some(granted_at_ms);
    }

    pub fn maintenance_mode(&self) -> bool {
        self.maintenance_mode
    }

    pub fn set_maintenance_mode(&mut self, enabled: bool) {
        self.maintenance_mode = enabled;
    }

    /// Drops duplicate ids (first occurrence wins), keeps the newest `processed_cap` ids and
    /// purges queue entries that have left the window ending at `now_ms`. The queue comes back
    /// sorted with future-dated grants clamped to `now_ms`. Idempotent.
    pub fn normalize(&mut self, now_ms: u64, generation_window_ms: u64, processed_cap: usize) {
        let mut seen = HashSet::with_capacity(self.processed_casts.len());
        self.processed_casts
            .retain(|identifier| seen.insert(identifier.clone()));

        let cap = processed_cap.max(1);
        if self.processed_casts.len() > cap {
            let keep_from = self.processed_casts.len() - cap;
            self.processed_casts.drain(..keep_from);
        }
        self.processed_index = self.processed_casts.iter().cloned().collect();

        self.generation_request_queue.make_contiguous().sort_unstable();
        for granted in self.generation_request_queue.iter_mut() {
            *granted = (*granted).min(now_ms);
        }
        self.generation_request_queue
            .retain(|granted| !is_outside_window(*granted, now_ms, generation_window_ms));
    }
}

use serde::Serialize;
use serde_json::Value;
use std::{
    collections::{BTreeMap, VecDeque},
    time::Duration,
};

use crate::{NodeId, Status};

pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Outcome of one tick, taken right after the root was evaluated.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub node_id: NodeId,
    pub node_name: String,
    pub result: Status,
    pub timestamp: Duration,
    pub blackboard_snapshot: BTreeMap<String, Value>,
}

/// Bounded log of tick outcomes. The oldest entry is dropped first.
#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }
}

impl History {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(DEFAULT_HISTORY_CAPACITY)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        self.evict();
    }

    pub fn push(&mut self, entry: HistoryEntry) {
        self.entries.push_back(entry);
        self.evict();
    }

    fn evict(&mut self) {
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Running aggregates over all recorded ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total_executions: u64,
    pub success_count: u64,
    pub failure_count: u64,
    /// Mean tick duration in milliseconds
    pub average_execution_time: f64,
    /// Duration of the latest tick in milliseconds
    pub last_execution_time: f64,
}

impl Stats {
    /// Folds one tick into the aggregates without revisiting earlier ticks.
    pub fn record(&mut self, result: Status, duration_ms: f64) {
        self.total_executions += 1;
        let n = self.total_executions as f64;
        self.average_execution_time = (self.average_execution_time * (n - 1.) + duration_ms) / n;
        self.last_execution_time = duration_ms;
        match result {
            Status::Success => self.success_count += 1,
            Status::Failure => self.failure_count += 1,
            _ => (),
        }
    }
}

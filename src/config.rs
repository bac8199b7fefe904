use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{error::ConfigError, history::DEFAULT_HISTORY_CAPACITY, NodeId};

pub const MIN_TICK_PERIOD_MS: u64 = 100;
pub const MAX_TICK_PERIOD_MS: u64 = 5000;

/// Settings of a [`crate::Scheduler`].
///
/// Every field is optional in the serialized form:
///
/// ```yaml
/// tickPeriodMs: 250
/// historyCapacity: 50
/// debugMode: true
/// breakpoints: [attack]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimulatorConfig {
    pub tick_period_ms: u64,
    pub history_capacity: usize,
    pub debug_mode: bool,
    pub breakpoints: Vec<NodeId>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            tick_period_ms: 1000,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            debug_mode: false,
            breakpoints: vec![],
        }
    }
}

impl SimulatorConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn tick_period(&self) -> Duration {
        clamp_tick_period(self.tick_period_ms)
    }
}

pub(crate) fn clamp_tick_period(ms: u64) -> Duration {
    Duration::from_millis(ms.clamp(MIN_TICK_PERIOD_MS, MAX_TICK_PERIOD_MS))
}

use serde::Serialize;
use serde_json::Value;
use std::{collections::BTreeMap, time::Duration};

use crate::{
    config::clamp_tick_period, Blackboard, Clock, Engine, Event, EventBus, EventKind, History,
    HistoryEntry, NodeId, SimulatorConfig, Stats, Status, SystemClock, TickContext, Tree,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SchedulerState {
    Stopped,
    Running,
    Paused,
}

/// Drives a tree tick by tick.
///
/// Ticking is cooperative: [`Scheduler::poll`] fires a tick when one is due, and a
/// tick always returns before the next one can be fired. Time comes from the
/// [`Clock`], so a [`crate::ManualClock`] makes runs fully reproducible.
pub struct Scheduler<C: Clock = SystemClock> {
    clock: C,
    state: SchedulerState,
    tree: Option<Tree>,
    blackboard: Blackboard,
    engine: Engine,
    history: History,
    stats: Stats,
    events: EventBus,
    period: Duration,
    next_tick: Option<Duration>,
    last_result: Option<Status>,
}

impl<C: Clock> Scheduler<C> {
    pub fn new(clock: C) -> Self {
        Self::with_config(clock, &SimulatorConfig::default())
    }

    pub fn with_config(clock: C, config: &SimulatorConfig) -> Self {
        let mut engine = Engine::default();
        engine.debugger.set_enabled(config.debug_mode);
        for id in &config.breakpoints {
            engine.debugger.set_breakpoint(id.clone());
        }
        Self {
            clock,
            state: SchedulerState::Stopped,
            tree: None,
            blackboard: Blackboard::new(),
            engine,
            history: History::with_capacity(config.history_capacity),
            stats: Stats::default(),
            events: EventBus::default(),
            period: config.tick_period(),
            next_tick: None,
            last_result: None,
        }
    }

    pub fn subscribe(&mut self, subscriber: impl FnMut(&Event) + 'static) {
        self.events.subscribe(subscriber);
    }

    /// Takes a tree for a later [`Scheduler::step`] without starting to tick.
    ///
    /// Returns `false` and keeps the current tree if `tree` is not runnable.
    pub fn load(&mut self, tree: Tree) -> bool {
        if let Err(e) = tree.validate() {
            tracing::warn!("Cannot load behavior tree: {}", e);
            self.events.emit(
                self.clock.now(),
                EventKind::Error,
                format!("Cannot start simulation: {}", e),
                None,
            );
            return false;
        }
        self.halt();
        self.tree = Some(tree);
        self.reset_run();
        self.last_result = None;
        true
    }

    /// Starts ticking `tree` from a clean state. The first tick is due immediately.
    pub fn start(&mut self, tree: Tree) -> bool {
        if !self.load(tree) {
            return false;
        }
        self.history.clear();
        self.stats = Stats::default();
        self.state = SchedulerState::Running;
        self.next_tick = Some(self.clock.now());
        self.events.info(self.clock.now(), "Simulation started");
        true
    }

    /// Halts ticking and resets the tree and the blackboard. Safe to call in any state.
    pub fn stop(&mut self) {
        self.halt();
        self.reset_run();
        self.last_result = None;
        self.events.info(self.clock.now(), "Simulation stopped");
    }

    pub fn pause(&mut self) {
        if self.state == SchedulerState::Running {
            self.state = SchedulerState::Paused;
            self.next_tick = None;
            self.events.info(self.clock.now(), "Simulation paused");
        }
    }

    pub fn resume(&mut self) {
        if self.state == SchedulerState::Paused {
            self.engine.debugger.release();
            self.state = SchedulerState::Running;
            self.next_tick = Some(self.clock.now() + self.period);
            self.events.info(self.clock.now(), "Simulation resumed");
        }
    }

    /// Runs exactly one tick and leaves the scheduler paused.
    ///
    /// A stopped scheduler restarts the loaded tree first. Unlike a timed tick, a
    /// terminal result does not stop the scheduler, so the final state can be
    /// inspected. Returns `None` if no tree was ever loaded.
    pub fn step(&mut self) -> Option<Status> {
        match self.state {
            SchedulerState::Stopped => {
                let tree = self.tree.take()?;
                if !self.start(tree) {
                    return None;
                }
                self.pause();
            }
            SchedulerState::Running => self.pause(),
            SchedulerState::Paused => (),
        }
        self.engine.debugger.release();
        Some(self.tick(true))
    }

    /// Fires a tick if one is due. Returns its result.
    pub fn poll(&mut self) -> Option<Status> {
        if self.state != SchedulerState::Running {
            return None;
        }
        let due = self.next_tick?;
        if self.clock.now() < due {
            return None;
        }
        let result = self.tick(false);
        if self.state == SchedulerState::Running {
            self.next_tick = Some(self.clock.now() + self.period);
        }
        Some(result)
    }

    /// Keeps ticking on schedule until the run stops or pauses.
    pub fn run_until_idle(&mut self) {
        while self.state == SchedulerState::Running {
            let Some(due) = self.next_tick else {
                break;
            };
            self.clock.sleep_until(due);
            self.poll();
        }
    }

    /// Sets the tick period, clamped to 100..=5000 ms. A running timer is re-armed.
    pub fn set_execution_speed(&mut self, ms: u64) {
        self.period = clamp_tick_period(ms);
        if self.state == SchedulerState::Running {
            self.next_tick = Some(self.clock.now() + self.period);
        }
    }

    pub fn execution_speed(&self) -> Duration {
        self.period
    }

    fn tick(&mut self, stepping: bool) -> Status {
        let Some(tree) = self.tree.as_mut() else {
            return Status::Error;
        };
        let started = self.clock.now();
        let mut ctx = TickContext {
            now: started,
            blackboard: &mut self.blackboard,
            events: &mut self.events,
        };
        let result = self.engine.tick(tree, &mut ctx);
        let duration_ms = self.clock.now().saturating_sub(started).as_secs_f64() * 1000.;

        let (node_id, node_name) = tree
            .root()
            .and_then(|root| tree.get(root))
            .map(|node| (node.id.clone(), node.name.clone()))
            .unwrap_or_else(|| (NodeId::from(""), String::new()));
        self.history.push(HistoryEntry {
            node_id,
            node_name,
            result,
            timestamp: started,
            blackboard_snapshot: self.blackboard.snapshot(),
        });
        self.stats.record(result, duration_ms);
        self.last_result = Some(result);

        if !self.engine.debugger.held().is_empty() {
            self.pause();
        } else if result != Status::Running && !stepping {
            self.halt();
            self.events.info(
                self.clock.now(),
                format!("Simulation finished with {}", result),
            );
        }
        result
    }

    /// Stops ticking but leaves the tree as the last tick left it.
    fn halt(&mut self) {
        self.state = SchedulerState::Stopped;
        self.next_tick = None;
    }

    fn reset_run(&mut self) {
        if let Some(tree) = self.tree.as_mut() {
            tree.reset();
        }
        self.blackboard.clear();
        self.engine.debugger.reset();
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn tree(&self) -> Option<&Tree> {
        self.tree.as_ref()
    }

    /// Root result of the latest tick since the last reset.
    pub fn last_result(&self) -> Option<Status> {
        self.last_result
    }

    /// When the next timed tick is due, if the scheduler is running.
    pub fn next_tick(&self) -> Option<Duration> {
        self.next_tick
    }

    pub fn set_blackboard_value(&mut self, key: impl ToString, value: impl Into<Value>) {
        self.blackboard.set(key, value);
    }

    pub fn blackboard(&self) -> &Blackboard {
        &self.blackboard
    }

    pub fn blackboard_snapshot(&self) -> BTreeMap<String, Value> {
        self.blackboard.snapshot()
    }

    pub fn clear_blackboard(&mut self) {
        self.blackboard.clear();
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.history.to_vec()
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn set_breakpoint(&mut self, id: impl Into<NodeId>) {
        self.engine.debugger.set_breakpoint(id);
    }

    pub fn remove_breakpoint(&mut self, id: &str) {
        self.engine.debugger.remove_breakpoint(id);
    }

    /// Returns whether the node has a breakpoint afterwards.
    pub fn toggle_breakpoint(&mut self, id: impl Into<NodeId>) -> bool {
        self.engine.debugger.toggle_breakpoint(id)
    }

    pub fn breakpoints(&self) -> impl Iterator<Item = &NodeId> {
        self.engine.debugger.breakpoints()
    }

    pub fn set_debug_mode(&mut self, enabled: bool) {
        self.engine.debugger.set_enabled(enabled);
        self.events.emit(
            self.clock.now(),
            EventKind::Debug,
            format!("Debug mode {}", if enabled { "on" } else { "off" }),
            None,
        );
    }

    pub fn is_debug_mode(&self) -> bool {
        self.engine.debugger.is_enabled()
    }
}

//! # behavior-tree-sim (Rust crate)
//!
//! A deterministic, steppable behavior tree simulator.
//!
//!
//! ## Overview
//!
//! A behavior tree editor builds a tree of typed nodes and hands it to this crate.
//! The simulator ticks the tree, evaluating every node's status according to its type,
//! reading and writing a shared [`Blackboard`] as leaves execute, and records a bounded
//! history of outcomes along with running statistics.
//!
//! The tree is an id-indexed arena. Nodes refer to their children and parent by [`NodeId`],
//! so the engine can reset and serialize the tree without chasing references.
//!
//!
//! ## How it looks like
//!
//! First, you describe a tree. Usually it comes from an editor as YAML or JSON,
//! in the shape `{ root, nodes }`.
//!
//! ```rust
//! # use behavior_tree_sim::*;
//! let tree = Tree::from_yaml(r#"
//! root: root
//! nodes:
//!   root: { id: root, type: root, name: Root, children: [seq] }
//!   seq: { id: seq, type: sequence, name: Patrol, children: [check, act] }
//!   check:
//!     id: check
//!     type: condition
//!     name: Is it safe?
//!     properties: { conditionType: always_true }
//!   act:
//!     id: act
//!     type: action
//!     name: Walk
//!     properties: { actionType: instant }
//! "#).unwrap();
//! ```
//!
//! You can also build it in code.
//!
//! ```rust
//! # use behavior_tree_sim::*;
//! let mut tree = Tree::default();
//! tree.add_node(Node::new("root", NodeKind::Root, "Root"));
//! tree.add_node(Node::new("act", NodeKind::Action, "Walk"));
//! tree.add_child("root", "act").unwrap();
//! tree.set_root("root");
//! ```
//!
//! Then hand it to a [`Scheduler`] and drive it with a clock.
//! [`ManualClock`] advances only when told to, which makes multi-tick behaviors
//! (duration actions, waits, repeaters) reproducible.
//!
//! ```rust
//! # use behavior_tree_sim::*;
//! # let mut tree = Tree::default();
//! # tree.add_node(Node::new("root", NodeKind::Root, "Root"));
//! # tree.set_root("root");
//! let clock = ManualClock::default();
//! let mut scheduler = Scheduler::new(clock.clone());
//! assert!(scheduler.start(tree));
//! scheduler.poll();
//! assert_eq!(scheduler.last_result(), Some(Status::Success));
//! assert_eq!(scheduler.state(), SchedulerState::Stopped);
//! ```
//!
//!
//! ## Node types
//!
//! | Type | Children | Result |
//! |------|----------|--------|
//! | `root` | 1 | The child's result, `Success` if childless |
//! | `selector` | any | First `Success` or `Running` child, otherwise `Failure` |
//! | `sequence` | any | First `Failure`, `Error` or `Running` child, otherwise `Success` |
//! | `parallel` | any | `Error` if any child errs, `Running` if any runs, otherwise successes vs `requiredSuccess` |
//! | `inverter` | 1 | Swaps `Success` and `Failure` |
//! | `repeater` | 1 | Repeats the child `maxRepeats` times |
//! | `condition` | 0 | Tests the blackboard, a rule, or a timer |
//! | `action` | 0 | Instant, duration or blackboard-write action |
//! | `wait` | 0 | `Running` until `duration` elapses |
//!
//! Leaf configuration lives in each node's `properties` map, e.g. `conditionType`,
//! `actionType`, `duration`, `maxRepeats`, `requiredSuccess`, `blackboardKey` and `value`.
//!
//!
//! ## Condition rules
//!
//! A condition with `conditionType: expression` evaluates a small boolean language
//! over blackboard variables.
//!
//! ```raw
//! health > 20 && !(enemy_visible || ammo == 0)
//! ```
//!
//! Identifiers refer to blackboard keys, and missing keys read as `null`.
//! See [`Rule`] for the grammar.
//!
//!
//! ## Debugging
//!
//! With debug mode on, reaching a node with a breakpoint holds that node at `Running`
//! and pauses the scheduler after the tick. Resuming or stepping lets the next tick
//! pass over the held node, so the run advances. A later visit stops again.
//!
//!
//! ## Multi-tick behaviors
//!
//! The engine walks the whole tree from the root on every tick. There is no resumption
//! pointer; a node that needs several ticks keeps its progress (a start timestamp or a
//! repeat count) in its own [`NodeRuntime`]. Stopping the scheduler clears every
//! runtime, so a restarted run never sees a timer left over from the previous one.

mod blackboard;
mod clock;
mod config;
mod engine;
pub mod error;
mod event;
mod history;
mod node;
mod nodes;
mod rule;
mod scheduler;
mod tree;

pub use crate::{
    blackboard::Blackboard,
    clock::{Clock, ManualClock, SystemClock},
    config::{SimulatorConfig, MAX_TICK_PERIOD_MS, MIN_TICK_PERIOD_MS},
    engine::{Debugger, Engine, TickContext},
    event::{Event, EventBus, EventKind},
    history::{History, HistoryEntry, Stats, DEFAULT_HISTORY_CAPACITY},
    node::{Node, NodeId, NodeKind, NodeRuntime, NumChildren},
    rule::Rule,
    scheduler::{Scheduler, SchedulerState},
    tree::Tree,
};

use serde::{Deserialize, Serialize};

#[derive(PartialEq, Eq, Debug, Clone, Copy, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// Not evaluated since the last reset
    #[default]
    Ready,
    /// The node should keep running in the next tick
    Running,
    Success,
    Failure,
    /// The node's own logic faulted
    Error,
}

impl Status {
    /// `Success`, `Failure` and `Error` end a run; `Running` and `Ready` do not.
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Success | Status::Failure | Status::Error)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Status::Ready => "READY",
            Status::Running => "RUNNING",
            Status::Success => "SUCCESS",
            Status::Failure => "FAILURE",
            Status::Error => "ERROR",
        };
        f.write_str(s)
    }
}

//! Per-type node semantics.
//!
//! Composite and decorator rules are plain functions of their children's results,
//! so the engine only decides which children to visit. Leaves read their
//! configuration from the node's properties and keep multi-tick progress in its
//! [`NodeRuntime`].

use serde_json::Value;
use std::time::Duration;

use crate::{
    error::NodeFault,
    rule::{truthy, CompareOp},
    EventKind, Node, NodeRuntime, Rule, Status, TickContext,
};

pub(crate) const DEFAULT_DURATION: Duration = Duration::from_millis(1000);

const CONDITION_TYPE: &str = "conditionType";
const ACTION_TYPE: &str = "actionType";
const DURATION: &str = "duration";
const BLACKBOARD_KEY: &str = "blackboardKey";
const VALUE: &str = "value";
const OPERATOR: &str = "operator";
const EXPRESSION: &str = "expression";
const REQUIRED_SUCCESS: &str = "requiredSuccess";
const MAX_REPEATS: &str = "maxRepeats";

fn from_bool(b: bool) -> Status {
    if b {
        Status::Success
    } else {
        Status::Failure
    }
}

pub(crate) fn invert(status: Status) -> Status {
    match status {
        Status::Success => Status::Failure,
        Status::Failure => Status::Success,
        other => other,
    }
}

/// Combines the results of every child of a parallel node.
pub(crate) fn parallel_result(statuses: &[Status], required_success: usize) -> Status {
    if statuses.contains(&Status::Error) {
        return Status::Error;
    }
    if statuses.contains(&Status::Running) {
        return Status::Running;
    }
    let successes = statuses.iter().filter(|s| **s == Status::Success).count();
    from_bool(successes >= required_success)
}

/// Number of succeeding children a parallel node needs, all of them by default.
pub(crate) fn required_success(node: &Node, num_children: usize) -> Result<usize, NodeFault> {
    match node.int_property(REQUIRED_SUCCESS)? {
        None => Ok(num_children),
        Some(n) => usize::try_from(n).map_err(|_| NodeFault::InvalidProperty {
            key: REQUIRED_SUCCESS,
            value: Value::from(n),
        }),
    }
}

/// `None` repeats forever.
pub(crate) fn max_repeats(node: &Node) -> Result<Option<u64>, NodeFault> {
    Ok(node
        .int_property(MAX_REPEATS)?
        .and_then(|n| u64::try_from(n).ok()))
}

/// Counts a finished child run and decides whether the repeater is done.
pub(crate) fn repeat_step(runtime: &mut NodeRuntime, child: Status, max: Option<u64>) -> Status {
    match child {
        Status::Success | Status::Failure => {
            runtime.repeat_count += 1;
            if max.map_or(false, |max| runtime.repeat_count >= max) {
                runtime.repeat_count = 0;
                Status::Success
            } else {
                Status::Running
            }
        }
        Status::Error => Status::Error,
        Status::Running | Status::Ready => Status::Running,
    }
}

/// `Running` until the node's `duration` has passed since its first visit.
fn elapsed(node: &mut Node, now: Duration) -> Result<Status, NodeFault> {
    let duration = node.duration_property(DURATION)?.unwrap_or(DEFAULT_DURATION);
    let started_at = *node.runtime.started_at.get_or_insert(now);
    if now.saturating_sub(started_at) >= duration {
        node.runtime.started_at = None;
        Ok(Status::Success)
    } else {
        Ok(Status::Running)
    }
}

pub(crate) fn condition(node: &mut Node, ctx: &mut TickContext) -> Result<Status, NodeFault> {
    let condition_type = node
        .str_property(CONDITION_TYPE)?
        .unwrap_or("always_true")
        .to_owned();
    match condition_type.as_str() {
        "always_true" | "true" => Ok(Status::Success),
        "always_false" | "false" => Ok(Status::Failure),
        "blackboard" => blackboard_condition(node, ctx),
        EXPRESSION => {
            let source = node
                .str_property(EXPRESSION)?
                .ok_or(NodeFault::MissingProperty(EXPRESSION))?;
            Ok(from_bool(Rule::parse(source)?.test(&*ctx.blackboard)))
        }
        "timer" => elapsed(node, ctx.now),
        _ => Err(NodeFault::UnknownConditionType(condition_type)),
    }
}

fn blackboard_condition(node: &Node, ctx: &TickContext) -> Result<Status, NodeFault> {
    let key = node
        .str_property(BLACKBOARD_KEY)?
        .ok_or(NodeFault::MissingProperty(BLACKBOARD_KEY))?;
    let actual = ctx.blackboard.get(key).cloned().unwrap_or(Value::Null);
    let Some(expected) = node.properties.get(VALUE) else {
        return Ok(from_bool(truthy(&actual)));
    };
    let token = node.str_property(OPERATOR)?.unwrap_or("==");
    let op = CompareOp::from_token(token).ok_or_else(|| NodeFault::InvalidProperty {
        key: OPERATOR,
        value: Value::from(token),
    })?;
    Ok(from_bool(op.apply(&actual, expected)))
}

pub(crate) fn action(node: &mut Node, ctx: &mut TickContext) -> Result<Status, NodeFault> {
    let action_type = node
        .str_property(ACTION_TYPE)?
        .unwrap_or("instant")
        .to_owned();
    match action_type.as_str() {
        "instant" => {
            ctx.events.emit(
                ctx.now,
                EventKind::Action,
                format!("Executing action: {}", node.label()),
                Some(&node.id),
            );
            Ok(Status::Success)
        }
        "duration" => {
            let starting = node.runtime.started_at.is_none();
            let status = elapsed(node, ctx.now)?;
            let message = match status {
                Status::Running if starting => format!("Started action: {}", node.label()),
                Status::Running => format!("Running action: {}", node.label()),
                Status::Success => format!("Completed action: {}", node.label()),
                _ => return Ok(status),
            };
            ctx.events
                .emit(ctx.now, EventKind::Action, message, Some(&node.id));
            Ok(status)
        }
        "blackboard" => {
            let key = node
                .str_property(BLACKBOARD_KEY)?
                .ok_or(NodeFault::MissingProperty(BLACKBOARD_KEY))?;
            let value = node.properties.get(VALUE).cloned().unwrap_or(Value::Null);
            ctx.events.emit(
                ctx.now,
                EventKind::Action,
                format!("{}: set {} = {}", node.label(), key, value),
                Some(&node.id),
            );
            ctx.blackboard.set(key, value);
            Ok(Status::Success)
        }
        _ => Err(NodeFault::UnknownActionType(action_type)),
    }
}

pub(crate) fn wait(node: &mut Node, ctx: &mut TickContext) -> Result<Status, NodeFault> {
    elapsed(node, ctx.now)
}

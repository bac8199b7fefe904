use std::{collections::BTreeSet, time::Duration};

use crate::{
    error::NodeFault, nodes, Blackboard, EventBus, EventKind, NodeId, NodeKind, Status, Tree,
};

/// Everything a tick may touch besides the tree itself.
pub struct TickContext<'a> {
    /// Clock reading for the whole tick
    pub now: Duration,
    pub blackboard: &'a mut Blackboard,
    pub events: &'a mut EventBus,
}

/// Breakpoint bookkeeping.
///
/// A node that is held during a tick is passed over if the next tick visits it,
/// so resuming after a breakpoint makes progress instead of stopping at the same
/// node forever. The pass expires with that tick either way.
#[derive(Debug, Default, Clone)]
pub struct Debugger {
    enabled: bool,
    breakpoints: BTreeSet<NodeId>,
    held: Vec<NodeId>,
    pass_once: BTreeSet<NodeId>,
}

impl Debugger {
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.reset();
        }
    }

    pub fn set_breakpoint(&mut self, id: impl Into<NodeId>) {
        self.breakpoints.insert(id.into());
    }

    pub fn remove_breakpoint(&mut self, id: &str) {
        self.breakpoints.remove(id);
        self.pass_once.remove(id);
    }

    /// Returns whether the node has a breakpoint afterwards.
    pub fn toggle_breakpoint(&mut self, id: impl Into<NodeId>) -> bool {
        let id = id.into();
        if self.breakpoints.contains(&id) {
            self.remove_breakpoint(id.as_str());
            false
        } else {
            self.breakpoints.insert(id);
            true
        }
    }

    pub fn has_breakpoint(&self, id: &str) -> bool {
        self.breakpoints.contains(id)
    }

    pub fn breakpoints(&self) -> impl Iterator<Item = &NodeId> {
        self.breakpoints.iter()
    }

    /// Nodes held at a breakpoint during the latest tick.
    pub fn held(&self) -> &[NodeId] {
        &self.held
    }

    /// Let the currently held nodes run if the next tick visits them.
    pub(crate) fn release(&mut self) {
        self.pass_once.extend(self.held.drain(..));
    }

    pub(crate) fn reset(&mut self) {
        self.held.clear();
        self.pass_once.clear();
    }

    fn should_hold(&mut self, id: &NodeId) -> bool {
        if !self.enabled || !self.breakpoints.contains(id) {
            return false;
        }
        if self.pass_once.remove(id) {
            return false;
        }
        self.held.push(id.clone());
        true
    }
}

/// Evaluates a tree one tick at a time.
///
/// The engine keeps no position between ticks: every tick walks the tree from the
/// root, and nodes that span several ticks find their progress in their own runtime.
#[derive(Debug, Default, Clone)]
pub struct Engine {
    pub debugger: Debugger,
}

impl Engine {
    pub fn tick(&mut self, tree: &mut Tree, ctx: &mut TickContext) -> Status {
        self.debugger.held.clear();
        let Some(root) = tree.root().cloned() else {
            ctx.events.emit(
                ctx.now,
                EventKind::Error,
                "The tree has no root node",
                None,
            );
            self.debugger.pass_once.clear();
            return Status::Error;
        };
        let result = self.evaluate(tree, &root, ctx);
        self.debugger.pass_once.clear();
        result
    }

    /// Evaluates one node and the subtree below it.
    ///
    /// A fault in the node's own logic becomes [`Status::Error`] at this node and is
    /// reported as an error event; it is up to the parent how an error child counts.
    pub fn evaluate(&mut self, tree: &mut Tree, id: &NodeId, ctx: &mut TickContext) -> Status {
        let Some(node) = tree.get_mut(id) else {
            ctx.events.emit(
                ctx.now,
                EventKind::Error,
                format!("Node {} does not exist in the tree", id),
                Some(id),
            );
            return Status::Error;
        };

        if self.debugger.should_hold(id) {
            node.status = Status::Running;
            ctx.events.emit(
                ctx.now,
                EventKind::Debug,
                format!("Breakpoint hit: {}", node.label()),
                Some(id),
            );
            return Status::Running;
        }

        node.execution_count += 1;
        node.last_execution_time = Some(ctx.now);

        let result = match self.run(tree, id, ctx) {
            Ok(status) => status,
            Err(fault) => {
                let label = tree.get(id).map_or(id.as_str(), |node| node.label());
                ctx.events.emit(
                    ctx.now,
                    EventKind::Error,
                    format!("Error executing {}: {}", label, fault),
                    Some(id),
                );
                Status::Error
            }
        };

        if let Some(node) = tree.get_mut(id) {
            node.status = result;
        }
        result
    }

    fn child(
        &mut self,
        tree: &mut Tree,
        id: &NodeId,
        ctx: &mut TickContext,
    ) -> Result<Status, NodeFault> {
        if !tree.contains(id) {
            return Err(NodeFault::DanglingChild(id.clone()));
        }
        Ok(self.evaluate(tree, id, ctx))
    }

    fn run(
        &mut self,
        tree: &mut Tree,
        id: &NodeId,
        ctx: &mut TickContext,
    ) -> Result<Status, NodeFault> {
        let node = tree
            .get_mut(id)
            .ok_or_else(|| NodeFault::DanglingChild(id.clone()))?;
        let kind = node.kind;
        let children = node.children.clone();

        match kind {
            NodeKind::Root => match children.first() {
                Some(child) => self.child(tree, child, ctx),
                None => Ok(Status::Success),
            },
            NodeKind::Selector => {
                for child in &children {
                    match self.child(tree, child, ctx)? {
                        status @ (Status::Success | Status::Running) => return Ok(status),
                        _ => (),
                    }
                }
                Ok(Status::Failure)
            }
            NodeKind::Sequence => {
                for child in &children {
                    match self.child(tree, child, ctx)? {
                        Status::Success => (),
                        status => return Ok(status),
                    }
                }
                Ok(Status::Success)
            }
            NodeKind::Parallel => {
                let required = nodes::required_success(node, children.len())?;
                let mut statuses = Vec::with_capacity(children.len());
                for child in &children {
                    statuses.push(self.child(tree, child, ctx)?);
                }
                Ok(nodes::parallel_result(&statuses, required))
            }
            NodeKind::Inverter => match children.first() {
                Some(child) => Ok(nodes::invert(self.child(tree, child, ctx)?)),
                None => Ok(Status::Failure),
            },
            NodeKind::Repeater => {
                let max = nodes::max_repeats(node)?;
                if max == Some(0) {
                    node.runtime.repeat_count = 0;
                    return Ok(Status::Success);
                }
                let Some(child) = children.first() else {
                    return Ok(Status::Failure);
                };
                let status = self.child(tree, child, ctx)?;
                let node = tree
                    .get_mut(id)
                    .ok_or_else(|| NodeFault::DanglingChild(id.clone()))?;
                Ok(nodes::repeat_step(&mut node.runtime, status, max))
            }
            NodeKind::Condition => nodes::condition(node, ctx),
            NodeKind::Action => nodes::action(node, ctx),
            NodeKind::Wait => nodes::wait(node, ctx),
        }
    }
}

#[cfg(test)]
mod test;

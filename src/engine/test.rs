use super::*;
use crate::{Event, Node};
use proptest::prelude::*;
use std::{cell::RefCell, rc::Rc};

/// A leaf that reports `status` whenever it is ticked at t=0.
fn leaf(id: &str, status: Status) -> Node {
    match status {
        Status::Success => Node::new(id, NodeKind::Condition, id),
        Status::Failure => {
            Node::new(id, NodeKind::Condition, id).with_property("conditionType", "always_false")
        }
        Status::Running => Node::new(id, NodeKind::Wait, id).with_property("duration", 10_000),
        Status::Error | Status::Ready => {
            Node::new(id, NodeKind::Action, id).with_property("actionType", "explode")
        }
    }
}

fn composite(kind: NodeKind, leaves: &[Status]) -> Tree {
    let mut tree = Tree::default();
    tree.add_node(Node::new("root", kind, "Composite"));
    for (i, status) in leaves.iter().enumerate() {
        let id = format!("leaf{i}");
        tree.add_node(leaf(&id, *status));
        tree.add_child("root", id).unwrap();
    }
    tree.set_root("root");
    tree
}

#[derive(Default)]
struct Harness {
    engine: Engine,
    blackboard: Blackboard,
    events: EventBus,
}

impl Harness {
    fn tick(&mut self, tree: &mut Tree, ms: u64) -> Status {
        let mut ctx = TickContext {
            now: Duration::from_millis(ms),
            blackboard: &mut self.blackboard,
            events: &mut self.events,
        };
        self.engine.tick(tree, &mut ctx)
    }

    fn record(&mut self) -> Rc<RefCell<Vec<Event>>> {
        let log = Rc::new(RefCell::new(vec![]));
        let sink = log.clone();
        self.events
            .subscribe(move |event: &Event| sink.borrow_mut().push(event.clone()));
        log
    }
}

fn visited(tree: &Tree, n: usize) -> Vec<bool> {
    (0..n)
        .map(|i| tree.get(format!("leaf{i}").as_str()).unwrap().execution_count > 0)
        .collect()
}

#[test]
fn test_selector_short_circuits() {
    use Status::*;
    let mut tree = composite(NodeKind::Selector, &[Failure, Error, Running, Success]);
    assert_eq!(Harness::default().tick(&mut tree, 0), Running);
    assert_eq!(visited(&tree, 4), vec![true, true, true, false]);
    assert_eq!(tree.status("leaf1"), Some(Error));
    assert_eq!(tree.status("root"), Some(Running));

    let mut tree = composite(NodeKind::Selector, &[Failure, Error]);
    assert_eq!(Harness::default().tick(&mut tree, 0), Failure);
}

#[test]
fn test_sequence_stops_at_first_non_success() {
    use Status::*;
    let mut tree = composite(NodeKind::Sequence, &[Success, Error, Failure]);
    assert_eq!(Harness::default().tick(&mut tree, 0), Error);
    assert_eq!(visited(&tree, 3), vec![true, true, false]);

    let mut tree = composite(NodeKind::Sequence, &[Success, Success]);
    assert_eq!(Harness::default().tick(&mut tree, 0), Success);
}

#[test]
fn test_parallel_visits_every_child() {
    use Status::*;
    let mut tree = composite(NodeKind::Parallel, &[Error, Running, Success]);
    assert_eq!(Harness::default().tick(&mut tree, 0), Error);
    assert_eq!(visited(&tree, 3), vec![true, true, true]);

    let mut tree = composite(NodeKind::Parallel, &[Success, Failure]);
    assert_eq!(Harness::default().tick(&mut tree, 0), Failure);
    tree.get_mut("root")
        .unwrap()
        .properties
        .insert("requiredSuccess".into(), 1.into());
    assert_eq!(Harness::default().tick(&mut tree, 0), Success);
}

#[test]
fn test_root_and_decorators() {
    let mut tree = composite(NodeKind::Root, &[]);
    assert_eq!(Harness::default().tick(&mut tree, 0), Status::Success);

    let mut tree = composite(NodeKind::Root, &[Status::Failure]);
    assert_eq!(Harness::default().tick(&mut tree, 0), Status::Failure);

    let mut tree = composite(NodeKind::Inverter, &[Status::Failure]);
    assert_eq!(Harness::default().tick(&mut tree, 0), Status::Success);

    let mut tree = composite(NodeKind::Inverter, &[]);
    assert_eq!(Harness::default().tick(&mut tree, 0), Status::Failure);

    let mut tree = composite(NodeKind::Repeater, &[Status::Success]);
    tree.get_mut("root")
        .unwrap()
        .properties
        .insert("maxRepeats".into(), 0.into());
    assert_eq!(Harness::default().tick(&mut tree, 0), Status::Success);
    assert_eq!(visited(&tree, 1), vec![false]);
}

#[test]
fn test_repeater_counts_across_ticks() {
    let mut tree = composite(NodeKind::Repeater, &[Status::Success]);
    tree.get_mut("root")
        .unwrap()
        .properties
        .insert("maxRepeats".into(), 3.into());
    let mut h = Harness::default();
    assert_eq!(h.tick(&mut tree, 0), Status::Running);
    assert_eq!(tree.get("root").unwrap().runtime.repeat_count, 1);
    assert_eq!(h.tick(&mut tree, 1), Status::Running);
    assert_eq!(h.tick(&mut tree, 2), Status::Success);
    assert_eq!(tree.get("root").unwrap().runtime.repeat_count, 0);
    assert_eq!(tree.get("leaf0").unwrap().execution_count, 3);
}

#[test]
fn test_repeater_waits_for_running_child() {
    let mut tree = Tree::default();
    tree.add_node(Node::new("rep", NodeKind::Repeater, "Rep").with_property("maxRepeats", 2));
    tree.add_node(Node::new("w", NodeKind::Wait, "W").with_property("duration", 100));
    tree.add_child("rep", "w").unwrap();
    tree.set_root("rep");

    let mut h = Harness::default();
    let results: Vec<_> = [0, 50, 100, 150, 250]
        .into_iter()
        .map(|ms| h.tick(&mut tree, ms))
        .collect();
    use Status::*;
    // The wait restarts on its next visit at 150 and finishes again at 250
    assert_eq!(results, vec![Running, Running, Running, Running, Success]);
}

#[test]
fn test_fault_becomes_error_event() {
    let mut h = Harness::default();
    let log = h.record();
    let mut tree = composite(NodeKind::Sequence, &[Status::Error]);
    assert_eq!(h.tick(&mut tree, 7), Status::Error);

    let log = log.borrow();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].kind, EventKind::Error);
    assert_eq!(log[0].node, Some(NodeId::from("leaf0")));
    assert_eq!(log[0].timestamp, Duration::from_millis(7));
    assert!(log[0].message.contains("explode"), "{}", log[0].message);
}

#[test]
fn test_dangling_child_faults_the_parent() {
    let mut tree = composite(NodeKind::Selector, &[Status::Failure]);
    tree.get_mut("root")
        .unwrap()
        .children
        .push(NodeId::from("ghost"));
    assert_eq!(Harness::default().tick(&mut tree, 0), Status::Error);
    assert_eq!(tree.status("root"), Some(Status::Error));
}

#[test]
fn test_breakpoint_holds_then_passes() {
    use Status::*;
    let mut tree = composite(NodeKind::Sequence, &[Success, Success]);
    let mut h = Harness::default();
    let log = h.record();
    h.engine.debugger.set_enabled(true);
    h.engine.debugger.set_breakpoint("leaf1");

    assert_eq!(h.tick(&mut tree, 0), Running);
    assert_eq!(h.engine.debugger.held(), &[NodeId::from("leaf1")]);
    assert_eq!(tree.get("leaf1").unwrap().execution_count, 0);
    assert_eq!(tree.status("leaf1"), Some(Running));
    assert_eq!(log.borrow().last().unwrap().kind, EventKind::Debug);

    // Without a release the breakpoint holds again
    assert_eq!(h.tick(&mut tree, 1), Running);

    h.engine.debugger.release();
    assert_eq!(h.tick(&mut tree, 2), Success);
    assert!(h.engine.debugger.held().is_empty());

    // The pass is used up, so the next visit stops again
    assert_eq!(h.tick(&mut tree, 3), Running);
}

#[test]
fn test_unused_pass_expires() {
    use Status::*;
    let mut tree = composite(NodeKind::Sequence, &[Success, Success]);
    let mut h = Harness::default();
    h.engine.debugger.set_enabled(true);
    h.engine.debugger.set_breakpoint("leaf1");
    assert_eq!(h.tick(&mut tree, 0), Running);
    h.engine.debugger.release();

    // The released tick ends before reaching leaf1
    tree.get_mut("leaf0")
        .unwrap()
        .properties
        .insert("conditionType".to_string(), "always_false".into());
    assert_eq!(h.tick(&mut tree, 1), Failure);

    tree.get_mut("leaf0")
        .unwrap()
        .properties
        .insert("conditionType".to_string(), "always_true".into());
    assert_eq!(h.tick(&mut tree, 2), Running);
    assert_eq!(h.engine.debugger.held(), &[NodeId::from("leaf1")]);
    assert_eq!(tree.get("leaf1").unwrap().execution_count, 0);
}

#[test]
fn test_disabling_debug_mode_clears_holds() {
    let mut tree = composite(NodeKind::Sequence, &[Status::Success]);
    let mut h = Harness::default();
    h.engine.debugger.set_enabled(true);
    h.engine.debugger.set_breakpoint("leaf0");
    assert_eq!(h.tick(&mut tree, 0), Status::Running);

    h.engine.debugger.set_enabled(false);
    assert!(h.engine.debugger.held().is_empty());
    assert!(h.engine.debugger.has_breakpoint("leaf0"));
    assert_eq!(h.tick(&mut tree, 1), Status::Success);
}

#[test]
fn test_breakpoints_ignored_outside_debug_mode() {
    let mut tree = composite(NodeKind::Sequence, &[Status::Success]);
    let mut h = Harness::default();
    assert!(h.engine.debugger.toggle_breakpoint("leaf0"));
    assert_eq!(h.tick(&mut tree, 0), Status::Success);
    assert!(!h.engine.debugger.toggle_breakpoint("leaf0"));
    assert!(!h.engine.debugger.has_breakpoint("leaf0"));
}

#[test]
fn test_blackboard_flows_between_leaves() {
    let mut tree = Tree::default();
    tree.add_node(Node::new("seq", NodeKind::Sequence, "Seq"));
    tree.add_node(
        Node::new("set", NodeKind::Action, "Set")
            .with_property("actionType", "blackboard")
            .with_property("blackboardKey", "door")
            .with_property("value", "open"),
    );
    tree.add_node(
        Node::new("check", NodeKind::Condition, "Check")
            .with_property("conditionType", "expression")
            .with_property("expression", "door == \"open\""),
    );
    tree.add_child("seq", "set").unwrap();
    tree.add_child("seq", "check").unwrap();
    tree.set_root("seq");

    let mut h = Harness::default();
    assert_eq!(h.tick(&mut tree, 0), Status::Success);
    assert_eq!(h.blackboard.get_parse::<String>("door"), Some("open".to_owned()));
}

proptest! {
    #[test]
    fn selector_rule(leaves in prop::collection::vec(
        prop_oneof![Just(Status::Success), Just(Status::Failure), Just(Status::Running)], 0..6)
    ) {
        let mut tree = composite(NodeKind::Selector, &leaves);
        let result = Harness::default().tick(&mut tree, 0);
        let first = leaves.iter().position(|s| *s != Status::Failure);
        let expected = first.map_or(Status::Failure, |i| leaves[i]);
        prop_assert_eq!(result, expected);
        let stop = first.map_or(leaves.len(), |i| i + 1);
        let expected_visits: Vec<bool> = (0..leaves.len()).map(|i| i < stop).collect();
        prop_assert_eq!(visited(&tree, leaves.len()), expected_visits);
    }

    #[test]
    fn sequence_rule(leaves in prop::collection::vec(
        prop_oneof![
            Just(Status::Success),
            Just(Status::Failure),
            Just(Status::Running),
            Just(Status::Error),
        ],
        0..6,
    )) {
        let mut tree = composite(NodeKind::Sequence, &leaves);
        let result = Harness::default().tick(&mut tree, 0);
        let first = leaves.iter().position(|s| *s != Status::Success);
        let expected = first.map_or(Status::Success, |i| leaves[i]);
        prop_assert_eq!(result, expected);
    }
}

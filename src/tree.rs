use serde::{Deserialize, Serialize};
use std::{borrow::Borrow, collections::BTreeMap};

use crate::{
    error::{AddChildError, AddChildResult, LoadError, TreeError},
    Node, NodeId, NumChildren, Status,
};

/// An id-indexed arena of nodes, as handed over by the editor.
///
/// Nodes own nothing but ids: `children` is an ordered list of ids and `parent` is
/// only a lookup. The engine mutates nodes' status, runtime and counters in place
/// and leaves the structure alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Tree {
    #[serde(default)]
    root: Option<NodeId>,
    #[serde(default)]
    nodes: BTreeMap<NodeId, Node>,
}

impl Tree {
    /// Loads and validates a tree in the `{ root, nodes }` shape.
    pub fn from_yaml(yaml: &str) -> Result<Self, LoadError> {
        let tree: Tree = serde_yaml::from_str(yaml)?;
        tree.finish_load()
    }

    pub fn from_json(json: &str) -> Result<Self, LoadError> {
        let tree: Tree = serde_json::from_str(json)?;
        tree.finish_load()
    }

    fn finish_load(mut self) -> Result<Self, LoadError> {
        self.validate()?;
        self.link_parents();
        Ok(self)
    }

    /// Recomputes every `parent` from the children lists.
    fn link_parents(&mut self) {
        let links: Vec<(NodeId, NodeId)> = self
            .nodes
            .values()
            .flat_map(|node| {
                node.children
                    .iter()
                    .map(move |child| (child.clone(), node.id.clone()))
            })
            .collect();
        for node in self.nodes.values_mut() {
            node.parent = None;
        }
        for (child, parent) in links {
            if let Some(node) = self.nodes.get_mut(&child) {
                node.parent = Some(parent);
            }
        }
    }

    pub fn root(&self) -> Option<&NodeId> {
        self.root.as_ref()
    }

    pub fn set_root(&mut self, id: impl Into<NodeId>) {
        self.root = Some(id.into());
    }

    /// Inserts a node, returning the one it replaced.
    pub fn add_node(&mut self, node: Node) -> Option<Node> {
        self.nodes.insert(node.id.clone(), node)
    }

    pub fn add_child(
        &mut self,
        parent: impl Into<NodeId>,
        child: impl Into<NodeId>,
    ) -> AddChildResult {
        let (parent, child) = (parent.into(), child.into());
        if !self.nodes.contains_key(&child) {
            return Err(AddChildError::UnknownNode(child));
        }
        let parent_node = self
            .nodes
            .get_mut(&parent)
            .ok_or_else(|| AddChildError::UnknownNode(parent.clone()))?;
        if NumChildren::Finite(parent_node.children.len()) < parent_node.kind.max_children() {
            parent_node.children.push(child.clone());
        } else {
            return Err(AddChildError::TooManyNodes);
        }
        if let Some(child_node) = self.nodes.get_mut(&child) {
            child_node.parent = Some(parent);
        }
        Ok(())
    }

    pub fn get<Q>(&self, id: &Q) -> Option<&Node>
    where
        NodeId: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.nodes.get(id)
    }

    pub fn get_mut<Q>(&mut self, id: &Q) -> Option<&mut Node>
    where
        NodeId: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.nodes.get_mut(id)
    }

    pub fn contains<Q>(&self, id: &Q) -> bool
    where
        NodeId: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.nodes.contains_key(id)
    }

    /// Status of a node as of the latest tick.
    pub fn status<Q>(&self, id: &Q) -> Option<Status>
    where
        NodeId: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get(id).map(|node| node.status)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Clears statuses, runtimes and counters of every node.
    pub fn reset(&mut self) {
        for node in self.nodes.values_mut() {
            node.reset();
        }
    }

    /// Checks that the nodes reachable from the root form a proper tree.
    ///
    /// Nodes that are not reachable from the root are allowed; an editor may keep
    /// detached nodes around.
    pub fn validate(&self) -> Result<(), TreeError> {
        let root = self.root.as_ref().ok_or(TreeError::MissingRoot)?;
        if !self.nodes.contains_key(root) {
            return Err(TreeError::DanglingRoot(root.clone()));
        }

        let mut parents: BTreeMap<&NodeId, &NodeId> = BTreeMap::new();
        for node in self.nodes.values() {
            if NumChildren::Finite(node.children.len()) > node.kind.max_children() {
                return Err(TreeError::TooManyChildren(node.id.clone()));
            }
            for child in &node.children {
                if !self.nodes.contains_key(child) {
                    return Err(TreeError::DanglingChild {
                        parent: node.id.clone(),
                        child: child.clone(),
                    });
                }
                if parents.insert(child, &node.id).is_some() {
                    return Err(TreeError::MultipleParents(child.clone()));
                }
            }
        }

        self.check_cycles(
            root,
            &TreeStack {
                id: root,
                parent: None,
            },
        )
    }

    fn check_cycles(&self, id: &NodeId, stack: &TreeStack) -> Result<(), TreeError> {
        let Some(node) = self.nodes.get(id) else {
            return Ok(());
        };
        for child in &node.children {
            if stack.find(child) {
                return Err(TreeError::Cycle(child.clone()));
            }
            self.check_cycles(
                child,
                &TreeStack {
                    id: child,
                    parent: Some(stack),
                },
            )?;
        }
        Ok(())
    }
}

/// The path from the root to the node being checked, kept as a linked list on the
/// call stack. Walking it back tells whether a child is one of its own ancestors.
struct TreeStack<'a> {
    id: &'a NodeId,
    parent: Option<&'a TreeStack<'a>>,
}

impl<'a> TreeStack<'a> {
    fn find(&self, id: &NodeId) -> bool {
        if self.id == id {
            true
        } else if let Some(parent) = self.parent {
            parent.find(id)
        } else {
            false
        }
    }
}

use thiserror::Error;

use crate::NodeId;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AddChildError {
    #[error("Attempted to add too many nodes")]
    TooManyNodes,
    #[error("Node {0} does not exist in the tree")]
    UnknownNode(NodeId),
}

pub type AddChildResult = Result<(), AddChildError>;

/// Structural problems that make a tree unrunnable.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum TreeError {
    #[error("The tree has no root node")]
    MissingRoot,
    #[error("The root {0} is not a node of the tree")]
    DanglingRoot(NodeId),
    #[error("Node {parent} refers to a missing child {child}")]
    DanglingChild { parent: NodeId, child: NodeId },
    #[error("Node {0} has more than one parent")]
    MultipleParents(NodeId),
    #[error("Node {0} is part of a cycle")]
    Cycle(NodeId),
    #[error("Node {0} has more children than its type allows")]
    TooManyChildren(NodeId),
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoadError {
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("Invalid tree: {0}")]
    Tree(#[from] TreeError),
}

/// A fault raised while running a single node's own logic.
///
/// The engine catches it at the faulting node and reports [`crate::Status::Error`].
#[derive(Debug, Error, PartialEq)]
#[non_exhaustive]
pub enum NodeFault {
    #[error("Missing property {0:?}")]
    MissingProperty(&'static str),
    #[error("Property {key:?} has an invalid value {value}")]
    InvalidProperty {
        key: &'static str,
        value: serde_json::Value,
    },
    #[error("Unknown condition type {0:?}")]
    UnknownConditionType(String),
    #[error("Unknown action type {0:?}")]
    UnknownActionType(String),
    #[error(transparent)]
    Rule(#[from] RuleError),
    #[error("Child {0} does not exist in the tree")]
    DanglingChild(NodeId),
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Could not parse rule {source_text:?}, stopped at {rest:?}")]
pub struct RuleError {
    pub(crate) source_text: String,
    pub(crate) rest: String,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    collections::BTreeMap,
    fmt::{self, Display, Formatter},
    time::Duration,
};

use crate::{error::NodeFault, Status};

/// Identity of a node, as assigned by the editor that built the tree.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for NodeId {
    fn fmt(&self, fmt: &mut Formatter) -> fmt::Result {
        fmt.write_str(&self.0)
    }
}

impl<S: AsRef<str>> From<S> for NodeId {
    fn from(s: S) -> Self {
        Self(s.as_ref().to_owned())
    }
}

impl std::borrow::Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Root,
    #[serde(alias = "fallback")]
    Selector,
    Sequence,
    Parallel,
    Inverter,
    #[serde(alias = "repeat")]
    Repeater,
    Condition,
    Action,
    Wait,
}

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum NumChildren {
    Finite(usize),
    Infinite,
}

impl PartialOrd for NumChildren {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(match (self, other) {
            (NumChildren::Finite(_), NumChildren::Infinite) => std::cmp::Ordering::Less,
            (NumChildren::Infinite, NumChildren::Finite(_)) => std::cmp::Ordering::Greater,
            (NumChildren::Finite(lhs), NumChildren::Finite(rhs)) => lhs.cmp(rhs),
            (NumChildren::Infinite, NumChildren::Infinite) => return None,
        })
    }
}

impl NodeKind {
    pub fn max_children(self) -> NumChildren {
        match self {
            Self::Root | Self::Inverter | Self::Repeater => NumChildren::Finite(1),
            Self::Selector | Self::Sequence | Self::Parallel => NumChildren::Infinite,
            Self::Condition | Self::Action | Self::Wait => NumChildren::Finite(0),
        }
    }

    pub fn is_leaf(self) -> bool {
        self.max_children() == NumChildren::Finite(0)
    }
}

/// Progress a multi-tick node keeps between ticks.
///
/// Cleared whenever the owning tree is reset.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NodeRuntime {
    /// Clock reading at the first visit of a duration action, wait or timer condition
    pub started_at: Option<Duration>,
    /// Completed child runs of a repeater
    pub repeat_count: u64,
}

impl NodeRuntime {
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

pub type Properties = BTreeMap<String, Value>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub children: Vec<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<NodeId>,
    #[serde(default)]
    pub properties: Properties,
    #[serde(skip)]
    pub runtime: NodeRuntime,
    #[serde(skip)]
    pub execution_count: u64,
    #[serde(skip)]
    pub last_execution_time: Option<Duration>,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, kind: NodeKind, name: impl ToString) -> Self {
        Self {
            id: id.into(),
            kind,
            name: name.to_string(),
            status: Status::Ready,
            children: vec![],
            parent: None,
            properties: Properties::new(),
            runtime: NodeRuntime::default(),
            execution_count: 0,
            last_execution_time: None,
        }
    }

    pub fn with_property(mut self, key: impl ToString, value: impl Into<Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    /// Back to the state of a freshly loaded node.
    pub fn reset(&mut self) {
        self.status = Status::Ready;
        self.runtime.clear();
        self.execution_count = 0;
        self.last_execution_time = None;
    }

    /// Name used in log messages, falling back to the id.
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            self.id.as_str()
        } else {
            &self.name
        }
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key).filter(|value| !value.is_null())
    }

    pub(crate) fn str_property(&self, key: &'static str) -> Result<Option<&str>, NodeFault> {
        match self.property(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(value) => Err(invalid(key, value)),
        }
    }

    /// Reads an integer property, which may also be written as a numeric string.
    pub(crate) fn int_property(&self, key: &'static str) -> Result<Option<i64>, NodeFault> {
        let Some(value) = self.property(key) else {
            return Ok(None);
        };
        match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.).map(|f| f as i64))
                .map(Some)
                .ok_or_else(|| invalid(key, value)),
            Value::String(s) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| invalid(key, value)),
            _ => Err(invalid(key, value)),
        }
    }

    /// Reads a non-negative millisecond duration.
    pub(crate) fn duration_property(
        &self,
        key: &'static str,
    ) -> Result<Option<Duration>, NodeFault> {
        let Some(value) = self.property(key) else {
            return Ok(None);
        };
        let ms = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        match ms {
            Some(ms) if ms.is_finite() && ms >= 0. => {
                Ok(Some(Duration::from_micros((ms * 1000.).round() as u64)))
            }
            _ => Err(invalid(key, value)),
        }
    }
}

fn invalid(key: &'static str, value: &Value) -> NodeFault {
    NodeFault::InvalidProperty {
        key,
        value: value.clone(),
    }
}

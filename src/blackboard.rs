use serde_json::Value;
use std::{collections::BTreeMap, str::FromStr};

/// Blackboard is a mapping of variable names to their values, shared by every node
/// of one simulation run.
///
/// Values are JSON values so that the whole board can be snapshotted into the
/// history and exported. The last write wins and is visible to every node evaluated
/// after it.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct Blackboard {
    values: BTreeMap<String, Value>,
}

impl Blackboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Reads a value converted to `T`, parsing it from a string if it was stored as one.
    pub fn get_parse<T>(&self, key: &str) -> Option<T>
    where
        T: FromStr + serde::de::DeserializeOwned,
    {
        let value = self.values.get(key)?;
        if let Value::String(s) = value {
            if let Ok(parsed) = s.parse() {
                return Some(parsed);
            }
        }
        serde_json::from_value(value.clone()).ok()
    }

    pub fn set(&mut self, key: impl ToString, value: impl Into<Value>) {
        self.values.insert(key.to_string(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// A deep copy of the current contents.
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.values.clone()
    }
}

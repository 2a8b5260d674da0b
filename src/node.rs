use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result of flattening a markup tree.
///
/// Lists only appear where an element repeated among its siblings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
    #[default]
    Null,
    Scalar(String),
    Map(BTreeMap<String, Node>),
    List(Vec<Node>),
}

impl Node {
    pub fn scalar(value: impl Into<String>) -> Self {
        Node::Scalar(value.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::Scalar(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Node>> {
        match self {
            Node::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Node]> {
        match self {
            Node::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.as_map().and_then(|map| map.get(key))
    }

    /// Walks nested maps, e.g. `node.path(&["RunParameters", "Setup"])`.
    pub fn path(&self, keys: &[&str]) -> Option<&Node> {
        keys.iter().try_fold(self, |node, key| node.get(key))
    }

    /// Views a value as a list, promoting a single non-null value to a
    /// one-element slice.
    pub fn as_items(&self) -> &[Node] {
        match self {
            Node::Null => &[],
            Node::List(items) => items,
            other => std::slice::from_ref(other),
        }
    }

    pub fn into_value(self) -> Value {
        Value::from(self)
    }
}

impl From<Node> for Value {
    fn from(node: Node) -> Self {
        match node {
            Node::Null => Value::Null,
            Node::Scalar(value) => Value::String(value),
            Node::Map(map) => Value::Object(
                map.into_iter()
                    .map(|(key, value)| (key, Value::from(value)))
                    .collect(),
            ),
            Node::List(items) => Value::Array(items.into_iter().map(Value::from).collect()),
        }
    }
}

impl From<&str> for Node {
    fn from(value: &str) -> Self {
        Node::Scalar(value.to_string())
    }
}

impl From<String> for Node {
    fn from(value: String) -> Self {
        Node::Scalar(value)
    }
}

impl FromIterator<(String, Node)> for Node {
    fn from_iter<T: IntoIterator<Item = (String, Node)>>(iter: T) -> Self {
        Node::Map(iter.into_iter().collect())
    }
}

//! Conversion between graph values and `serde_json::Value`.
//!
//! JSON has no `undefined` and no shared references, so encoding is lossy
//! in two places: `Undefined` becomes `null`, and an edge that closes a
//! cycle becomes `null`. Shared acyclic members are written out once per
//! occurrence.

use std::collections::HashSet;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as Json;

use crate::node::{Composite, Map, Node, NodeId};
use crate::Value;

impl From<Json> for Value {
    fn from(json: Json) -> Self {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => Value::Number(n),
            Json::String(s) => Value::String(s),
            Json::Array(items) => Value::Node(Node::sequence(items.into_iter().map(Value::from).collect())),
            Json::Object(obj) => {
                let map: Map = obj.into_iter().map(|(k, v)| (k, Value::from(v))).collect();
                Value::Node(Node::keyed(map))
            }
        }
    }
}

impl From<&Json> for Value {
    fn from(json: &Json) -> Self {
        Value::from(json.clone())
    }
}

impl Value {
    /// Encodes the value as plain JSON.
    pub fn to_json(&self) -> Json {
        let mut path = HashSet::new();
        encode(self, &mut path)
    }
}

impl Node {
    pub fn to_json(&self) -> Json {
        Value::Node(self.clone()).to_json()
    }
}

fn encode(value: &Value, path: &mut HashSet<NodeId>) -> Json {
    match value {
        Value::Undefined | Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Number(n) => Json::Number(n.clone()),
        Value::String(s) => Json::String(s.clone()),
        Value::Node(node) => {
            if !path.insert(node.id()) {
                return Json::Null;
            }
            let out = match &*node.borrow() {
                Composite::Sequence(items) => Json::Array(items.iter().map(|v| encode(v, path)).collect()),
                Composite::Keyed(map) => Json::Object(
                    map.iter()
                        .map(|(k, v)| (k.clone(), encode(v, path)))
                        .collect(),
                ),
            };
            path.remove(&node.id());
            out
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Json::deserialize(deserializer).map(Value::from)
    }
}

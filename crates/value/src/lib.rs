//! json-observer-value — the observable object graph.
//!
//! A graph is built from [`Value`]s. Scalars are stored inline; keyed maps
//! and ordered sequences are shared, identity-addressed [`Node`]s, so the
//! same node may be reachable from several places (and even from itself).
//!
//! # Example
//!
//! ```
//! use json_observer_value::{Kind, Value};
//! use serde_json::json;
//!
//! let doc = Value::from(json!({"list": [1, 2, 3], "name": "demo"}));
//! let root = doc.as_node().unwrap();
//! assert_eq!(root.kind(), Kind::Keyed);
//!
//! let list = root.get("list").unwrap();
//! list.as_node().unwrap().sequence_mut().unwrap().push(Value::from(4));
//! assert_eq!(doc.to_json(), json!({"list": [1, 2, 3, 4], "name": "demo"}));
//! ```

pub mod clone;
pub mod cmp;
pub mod equal;
pub mod json;
pub mod node;
mod value;

pub use clone::deep_clone;
pub use cmp::compare;
pub use equal::deep_equal;
pub use node::{parse_index, Composite, Kind, Map, Node, NodeId, WeakNode};
pub use value::Value;

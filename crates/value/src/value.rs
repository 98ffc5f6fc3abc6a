use std::fmt;

use serde_json::Number;

use crate::node::{Kind, Map, Node};

/// A member of an observable graph.
///
/// Scalars are stored inline; composites are shared [`Node`] handles.
/// `Undefined` marks a missing key or an unfilled sequence slot and is
/// distinct from `Null`.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Node(Node),
}

impl Value {
    /// Builds a new sequence node holding `items`.
    pub fn sequence(items: Vec<Value>) -> Value {
        Value::Node(Node::sequence(items))
    }

    /// Builds a new keyed node from `(key, value)` pairs.
    pub fn keyed<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Value {
        let map: Map = entries.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Value::Node(Node::keyed(map))
    }

    /// Converts a float, mapping non-finite values to `Null` the way JSON
    /// encoding does.
    pub fn from_f64(f: f64) -> Value {
        Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
    }

    pub fn kind(&self) -> Kind {
        match self {
            Value::Node(node) => node.kind(),
            _ => Kind::Scalar,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, Value::Node(_))
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Value::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn into_node(self) -> Option<Node> {
        match self {
            Value::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    /// Loose numeric coercion for call arguments.
    ///
    /// `Null` is 0, booleans are 0/1, numeric strings parse (blank strings
    /// are 0). `None` stands for "not a number": `Undefined`, composites
    /// and unparsable strings.
    pub fn to_number(&self) -> Option<f64> {
        match self {
            Value::Undefined | Value::Node(_) => None,
            Value::Null => Some(0.0),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Number(n) => n.as_f64(),
            Value::String(s) => {
                let s = s.trim();
                if s.is_empty() {
                    Some(0.0)
                } else {
                    s.parse::<f64>().ok().filter(|f| !f.is_nan())
                }
            }
        }
    }

    /// [`to_number`](Self::to_number) truncated toward zero. Infinities
    /// saturate.
    pub fn to_integer(&self) -> Option<i64> {
        self.to_number().map(|f| f.trunc() as i64)
    }

    /// Identity for composites, value equality for scalars.
    ///
    /// This is the default "is this write a no-op" test of an observer.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Node(a), Value::Node(b)) => a.ptr_eq(b),
            (Value::Node(_), _) | (_, Value::Node(_)) => false,
            _ => crate::equal::deep_equal(self, other),
        }
    }

    /// Deep copy; see [`deep_clone`](crate::deep_clone).
    pub fn deep_clone(&self) -> Value {
        crate::clone::deep_clone(self)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        crate::equal::deep_equal(self, other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Node(node) => write!(f, "{node:?}"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! from_integer {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(n: $t) -> Self {
                Value::Number(Number::from(n))
            }
        })*
    };
}

from_integer!(i8, i16, i32, i64, u8, u16, u32, u64, usize, isize);

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::from_f64(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Node> for Value {
    fn from(node: Node) -> Self {
        Value::Node(node)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::sequence(items)
    }
}

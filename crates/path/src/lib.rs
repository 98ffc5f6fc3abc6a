//! Slash-delimited paths into an observable object graph.
//!
//! A path names a member by the chain of local names leading to it from
//! the root: `"array/4/id"` is key `id` of element `4` of key `array`.
//! The root itself is the empty path. Steps are not escaped, so keys that
//! contain `/` cannot be addressed.
//!
//! # Example
//!
//! ```
//! use json_observer_path::{format_path, parse_path, retrieve};
//! use json_observer_value::Value;
//! use serde_json::json;
//!
//! let steps = parse_path("array/4/id");
//! assert_eq!(steps, vec!["array", "4", "id"]);
//! assert_eq!(format_path(&steps), "array/4/id");
//!
//! let doc = Value::from(json!({"array": [0, 1, 2, 3, {"id": "baz"}]}));
//! assert_eq!(retrieve(&doc, "array/4/id"), Some(Value::from("baz")));
//! assert_eq!(retrieve(&doc, "array/9"), None);
//! ```

use json_observer_value::{Node, Value};
use thiserror::Error;

pub mod types;
pub use types::{Path, PathStep};

/// Separator between path steps.
pub const SEPARATOR: char = '/';

/// Parse a path string into its steps.
///
/// A single leading `/` is ignored, so `"/a/b"` and `"a/b"` are the same
/// path. The empty string and `"/"` both name the root.
///
/// # Example
///
/// ```
/// use json_observer_path::parse_path;
///
/// assert_eq!(parse_path(""), Vec::<String>::new());
/// assert_eq!(parse_path("/"), Vec::<String>::new());
/// assert_eq!(parse_path("/foo/bar"), vec!["foo", "bar"]);
/// assert_eq!(parse_path("foo//bar"), vec!["foo", "", "bar"]);
/// ```
pub fn parse_path(path: &str) -> Path {
    let path = path.strip_prefix(SEPARATOR).unwrap_or(path);
    if path.is_empty() {
        return Vec::new();
    }
    path.split(SEPARATOR).map(str::to_string).collect()
}

/// Join path steps with `/`.
///
/// # Example
///
/// ```
/// use json_observer_path::format_path;
///
/// assert_eq!(format_path(&[]), "");
/// assert_eq!(format_path(&["array".to_string(), "4".to_string()]), "array/4");
/// ```
pub fn format_path(steps: &[String]) -> String {
    steps.join("/")
}

/// Plain string-prefix test used by history filters.
///
/// This is intentionally textual: prefix `"arr"` accepts `"array/1"`.
pub fn has_prefix(path: &str, prefix: &str) -> bool {
    path.starts_with(prefix)
}

/// Get a member by path steps.
///
/// Missing keys, out-of-range indices and steps through scalars all yield
/// `None`.
pub fn get(root: &Value, steps: &[String]) -> Option<Value> {
    let mut current = root.clone();
    for step in steps {
        let next = current.as_node()?.get(step)?;
        current = next;
    }
    Some(current)
}

/// Resolve a path string against `root`.
///
/// # Example
///
/// ```
/// use json_observer_path::retrieve;
/// use json_observer_value::Value;
/// use serde_json::json;
///
/// let doc = Value::from(json!({"a": {"b": 1}}));
/// assert_eq!(retrieve(&doc, "a/b"), Some(Value::from(1)));
/// assert_eq!(retrieve(&doc, "/a/b"), Some(Value::from(1)));
/// assert_eq!(retrieve(&doc, "a/x"), None);
/// ```
pub fn retrieve(root: &Value, path: &str) -> Option<Value> {
    get(root, &parse_path(path))
}

/// Resolve a path string to a composite node.
///
/// # Errors
///
/// - `PathError::NotFound` - if a step does not exist
/// - `PathError::NotComposite` - if a step or the target is a scalar
pub fn find_node(root: &Node, path: &str) -> Result<Node, PathError> {
    let steps = parse_path(path);
    let mut current = root.clone();
    for step in &steps {
        let next = match current.get(step) {
            Some(Value::Node(node)) => node,
            Some(_) => return Err(PathError::NotComposite(path.to_string())),
            None => return Err(PathError::NotFound(path.to_string())),
        };
        current = next;
    }
    Ok(current)
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("NOT_FOUND: {0}")]
    NotFound(String),
    #[error("NOT_COMPOSITE: {0}")]
    NotComposite(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> Value {
        Value::from(json!({
            "string": "data",
            "object": {"number": 1},
            "array": [1, 2, {"id": "baz"}]
        }))
    }

    #[test]
    fn test_parse_path() {
        assert_eq!(parse_path("array/2/id"), vec!["array", "2", "id"]);
        assert_eq!(parse_path("/array"), vec!["array"]);
        assert_eq!(parse_path("a/"), vec!["a", ""]);
    }

    #[test]
    fn test_has_prefix_is_textual() {
        assert!(has_prefix("array/1", "array"));
        assert!(has_prefix("array/1", "arr"));
        assert!(!has_prefix("object/a", "array"));
        assert!(has_prefix("anything", ""));
    }

    #[test]
    fn test_get() {
        let doc = doc();
        assert_eq!(get(&doc, &[]), Some(doc.clone()));
        assert_eq!(get(&doc, &["string".to_string()]), Some(Value::from("data")));
        assert_eq!(get(&doc, &["string".to_string(), "x".to_string()]), None);
        assert_eq!(retrieve(&doc, "array/2/id"), Some(Value::from("baz")));
        assert_eq!(retrieve(&doc, "array/02"), None);
    }

    #[test]
    fn test_find_node() {
        let doc = doc();
        let root = doc.as_node().unwrap();
        assert!(find_node(root, "").unwrap().ptr_eq(root));
        assert_eq!(find_node(root, "array/2").unwrap().to_json(), json!({"id": "baz"}));
        assert_eq!(
            find_node(root, "string").err(),
            Some(PathError::NotComposite("string".into()))
        );
        assert_eq!(find_node(root, "nope").err(), Some(PathError::NotFound("nope".into())));
    }
}

//! Tuple codec for change records.
//!
//! Records are stored as flat JSON arrays, path first, then the operation
//! name, then the operands:
//!
//! ```text
//! [path, "set",        key, value, prev]
//! [path, "delete",     key, value, prev]
//! [path, "splice",     start, deleted[], inserted[]]
//! [path, "sort",       [[new, old], ...]]
//! [path, "reverse"]
//! [path, "copyWithin", target, start, overwritten[]]
//! [path, "fill",       value, start, overwritten[]]
//! [path, "length",     len, removedTail[] | oldLen]
//! ```
//!
//! `Undefined` payloads are written as `null`.

use json_observer_value::Value;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value as Json};
use thiserror::Error;

use super::{Change, ChangeRecord, LengthPrev};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("INVALID_RECORD: {0}")]
    InvalidRecord(String),
    #[error("UNKNOWN_OP: {0}")]
    UnknownOp(String),
}

// ── Encoding ──────────────────────────────────────────────────────────────

fn encode_all(items: &[Value]) -> Json {
    Json::Array(items.iter().map(Value::to_json).collect())
}

/// Serialize a record to its tuple form.
pub fn to_json(record: &ChangeRecord) -> Json {
    let path = &record.path;
    match &record.change {
        Change::Set { key, value, prev } => {
            json!([path, "set", key, value.to_json(), prev.to_json()])
        }
        Change::Delete { key, value, prev } => {
            json!([path, "delete", key, value.to_json(), prev.to_json()])
        }
        Change::Splice {
            start,
            deleted,
            inserted,
        } => json!([path, "splice", start, encode_all(deleted), encode_all(inserted)]),
        Change::Sort { map } => {
            let pairs: Vec<Json> = map.iter().map(|(new, old)| json!([new, old])).collect();
            json!([path, "sort", pairs])
        }
        Change::Reverse => json!([path, "reverse"]),
        Change::CopyWithin {
            target,
            start,
            overwritten,
        } => json!([path, "copyWithin", target, start, encode_all(overwritten)]),
        Change::Fill {
            value,
            start,
            overwritten,
        } => json!([path, "fill", value.to_json(), start, encode_all(overwritten)]),
        Change::Length { len, prev } => {
            let prev = match prev {
                LengthPrev::Tail(tail) => encode_all(tail),
                LengthPrev::Len(n) => json!(n),
            };
            json!([path, "length", len, prev])
        }
    }
}

// ── Decoding ──────────────────────────────────────────────────────────────

fn invalid(msg: impl Into<String>) -> CodecError {
    CodecError::InvalidRecord(msg.into())
}

fn operand<'a>(items: &'a [Json], i: usize, op: &str) -> Result<&'a Json, CodecError> {
    items
        .get(i)
        .ok_or_else(|| invalid(format!("{op}: missing operand {i}")))
}

fn decode_usize(v: &Json, what: &str) -> Result<usize, CodecError> {
    v.as_u64()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| invalid(format!("{what} must be a non-negative integer")))
}

fn decode_str(v: &Json, what: &str) -> Result<String, CodecError> {
    v.as_str()
        .map(str::to_string)
        .ok_or_else(|| invalid(format!("{what} must be a string")))
}

fn decode_all(v: &Json, what: &str) -> Result<Vec<Value>, CodecError> {
    let items = v
        .as_array()
        .ok_or_else(|| invalid(format!("{what} must be an array")))?;
    Ok(items.iter().map(Value::from).collect())
}

/// Deserialize a record from its tuple form.
///
/// # Errors
///
/// - `CodecError::InvalidRecord` - if the record is not an array, or an
///   operand is missing or has the wrong type
/// - `CodecError::UnknownOp` - if the operation name is not recognised
pub fn from_json(v: &Json) -> Result<ChangeRecord, CodecError> {
    let items = v
        .as_array()
        .ok_or_else(|| invalid("record must be an array"))?;
    let path = decode_str(items.first().ok_or_else(|| invalid("empty record"))?, "path")?;
    let op = decode_str(operand(items, 1, "record")?, "op")?;
    let change = match op.as_str() {
        "set" | "delete" => {
            let key = decode_str(operand(items, 2, &op)?, "key")?;
            let value = Value::from(operand(items, 3, &op)?);
            let prev = items.get(4).map(Value::from).unwrap_or(Value::Undefined);
            if op == "set" {
                Change::Set { key, value, prev }
            } else {
                Change::Delete { key, value, prev }
            }
        }
        "splice" => Change::Splice {
            start: decode_usize(operand(items, 2, &op)?, "start")?,
            deleted: decode_all(operand(items, 3, &op)?, "deleted")?,
            inserted: decode_all(operand(items, 4, &op)?, "inserted")?,
        },
        "sort" => {
            let pairs = operand(items, 2, &op)?
                .as_array()
                .ok_or_else(|| invalid("sort map must be an array"))?;
            let map = pairs
                .iter()
                .map(|pair| match pair.as_array().map(Vec::as_slice) {
                    Some([new, old]) => Ok((decode_usize(new, "index")?, decode_usize(old, "index")?)),
                    _ => Err(invalid("sort map entries must be [new, old] pairs")),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Change::Sort { map }
        }
        "reverse" => Change::Reverse,
        "copyWithin" => Change::CopyWithin {
            target: decode_usize(operand(items, 2, &op)?, "target")?,
            start: decode_usize(operand(items, 3, &op)?, "start")?,
            overwritten: decode_all(operand(items, 4, &op)?, "overwritten")?,
        },
        "fill" => Change::Fill {
            value: Value::from(operand(items, 2, &op)?),
            start: decode_usize(operand(items, 3, &op)?, "start")?,
            overwritten: decode_all(operand(items, 4, &op)?, "overwritten")?,
        },
        "length" => {
            let len = decode_usize(operand(items, 2, &op)?, "len")?;
            let prev = match operand(items, 3, &op)? {
                Json::Array(_) => LengthPrev::Tail(decode_all(&items[3], "tail")?),
                other => LengthPrev::Len(decode_usize(other, "prev")?),
            };
            Change::Length { len, prev }
        }
        other => return Err(CodecError::UnknownOp(other.to_string())),
    };
    Ok(ChangeRecord { path, change })
}

impl Serialize for ChangeRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        to_json(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ChangeRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v = Json::deserialize(deserializer)?;
        from_json(&v).map_err(serde::de::Error::custom)
    }
}

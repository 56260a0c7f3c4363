//! Structural diff between two JSON documents.
//!
//! An edit script is an ordered list of path-addressed operations. Applying
//! the script produced by [`diff`] to the old document, in order, yields the
//! new one. On the wire every operation is a JSON-delta stanza:
//!
//! - `[path, value]` sets `value` at `path`
//! - `[path, value, "i"]` inserts `value` into a sequence at `path`
//! - `[path]` deletes whatever lives at `path`
//!
//! where `path` is an array of object keys (strings) and sequence indices
//! (numbers).

pub mod diff;
pub mod patch;

use std::fmt;

use serde::de::Error as _;
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

pub use diff::diff;
pub use patch::{patch, patched};

/// Marker carried by insert stanzas.
const INSERT_MARKER: &str = "i";

/// One step of a path into a nested document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(k) => write!(f, "{k}"),
            PathSegment::Index(i) => write!(f, "{i}"),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_string())
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

impl Serialize for PathSegment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PathSegment::Key(k) => serializer.serialize_str(k),
            PathSegment::Index(i) => serializer.serialize_u64(*i as u64),
        }
    }
}

impl<'de> Deserialize<'de> for PathSegment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(k) => Ok(PathSegment::Key(k)),
            Value::Number(n) => n
                .as_u64()
                .map(|i| PathSegment::Index(i as usize))
                .ok_or_else(|| D::Error::custom("path index must be a non-negative integer")),
            other => Err(D::Error::custom(format!(
                "path segment must be a string or an index, got {other}"
            ))),
        }
    }
}

pub type DeltaPath = Vec<PathSegment>;

pub fn format_path(path: &[PathSegment]) -> String {
    let parts: Vec<String> = path.iter().map(ToString::to_string).collect();
    format!("/{}", parts.join("/"))
}

/// A single edit of an edit script.
#[derive(Debug, Clone, PartialEq)]
pub enum DeltaOp {
    Set { path: DeltaPath, value: Value },
    Insert { path: DeltaPath, value: Value },
    Delete { path: DeltaPath },
}

impl DeltaOp {
    pub fn path(&self) -> &[PathSegment] {
        match self {
            DeltaOp::Set { path, .. } | DeltaOp::Insert { path, .. } | DeltaOp::Delete { path } => {
                path
            }
        }
    }

    pub fn operation(&self) -> &'static str {
        match self {
            DeltaOp::Set { .. } => "set",
            DeltaOp::Insert { .. } => "insert",
            DeltaOp::Delete { .. } => "delete",
        }
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            DeltaOp::Set { value, .. } | DeltaOp::Insert { value, .. } => Some(value),
            DeltaOp::Delete { .. } => None,
        }
    }
}

impl Serialize for DeltaOp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DeltaOp::Set { path, value } => {
                let mut seq = serializer.serialize_seq(Some(2))?;
                seq.serialize_element(path)?;
                seq.serialize_element(value)?;
                seq.end()
            }
            DeltaOp::Insert { path, value } => {
                let mut seq = serializer.serialize_seq(Some(3))?;
                seq.serialize_element(path)?;
                seq.serialize_element(value)?;
                seq.serialize_element(INSERT_MARKER)?;
                seq.end()
            }
            DeltaOp::Delete { path } => {
                let mut seq = serializer.serialize_seq(Some(1))?;
                seq.serialize_element(path)?;
                seq.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for DeltaOp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut stanza: Vec<Value> = Vec::deserialize(deserializer)?;
        if stanza.is_empty() || stanza.len() > 3 {
            return Err(D::Error::custom(format!(
                "delta stanza must have 1 to 3 elements, got {}",
                stanza.len()
            )));
        }

        let path: DeltaPath =
            serde_json::from_value(stanza.remove(0)).map_err(D::Error::custom)?;

        Ok(match stanza.len() {
            0 => DeltaOp::Delete { path },
            1 => DeltaOp::Set {
                path,
                value: stanza.remove(0),
            },
            _ => DeltaOp::Insert {
                path,
                value: stanza.remove(0),
            },
        })
    }
}

/// Ordered list of edits turning one document into another.
pub type EditScript = Vec<DeltaOp>;

#[derive(Debug, Error, PartialEq)]
pub enum DeltaError {
    #[error("path {0} does not exist")]
    PathNotFound(String),

    #[error("cannot address {path} inside a {found}")]
    TypeMismatch { path: String, found: &'static str },

    #[error("index {index} out of bounds at {path} (len {len})")]
    IndexOutOfBounds {
        path: String,
        index: usize,
        len: usize,
    },
}

use serde_json::{Map, Value};

use super::{format_path, DeltaError, DeltaOp, PathSegment};

/// Applies `script` to `doc` in order.
///
/// Missing intermediate containers are created on the way down (an object
/// when the next segment is a key, a sequence when it is an index), the same
/// way JSON-delta clients patch.
pub fn patch(doc: &mut Value, script: &[DeltaOp]) -> Result<(), DeltaError> {
    for op in script {
        apply(doc, op)?;
    }
    Ok(())
}

/// Non-mutating variant of [`patch`].
pub fn patched(doc: &Value, script: &[DeltaOp]) -> Result<Value, DeltaError> {
    let mut result = doc.clone();
    patch(&mut result, script)?;
    Ok(result)
}

fn apply(doc: &mut Value, op: &DeltaOp) -> Result<(), DeltaError> {
    let path = op.path();
    let Some((last, parents)) = path.split_last() else {
        *doc = op.value().cloned().unwrap_or(Value::Null);
        return Ok(());
    };

    let parent = descend(doc, parents, last)?;
    let full_path = || format_path(path);

    match (op, parent, last) {
        (DeltaOp::Set { value, .. } | DeltaOp::Insert { value, .. }, Value::Object(map), PathSegment::Key(k)) => {
            map.insert(k.clone(), value.clone());
        }
        (DeltaOp::Set { value, .. }, Value::Array(items), PathSegment::Index(i)) => {
            let len = items.len();
            match (*i).cmp(&len) {
                std::cmp::Ordering::Less => items[*i] = value.clone(),
                std::cmp::Ordering::Equal => items.push(value.clone()),
                std::cmp::Ordering::Greater => {
                    return Err(DeltaError::IndexOutOfBounds {
                        path: full_path(),
                        index: *i,
                        len,
                    })
                }
            }
        }
        (DeltaOp::Insert { value, .. }, Value::Array(items), PathSegment::Index(i)) => {
            if *i > items.len() {
                return Err(DeltaError::IndexOutOfBounds {
                    path: full_path(),
                    index: *i,
                    len: items.len(),
                });
            }
            items.insert(*i, value.clone());
        }
        (DeltaOp::Delete { .. }, Value::Object(map), PathSegment::Key(k)) => {
            if map.remove(k).is_none() {
                return Err(DeltaError::PathNotFound(full_path()));
            }
        }
        (DeltaOp::Delete { .. }, Value::Array(items), PathSegment::Index(i)) => {
            if *i >= items.len() {
                return Err(DeltaError::IndexOutOfBounds {
                    path: full_path(),
                    index: *i,
                    len: items.len(),
                });
            }
            items.remove(*i);
        }
        (_, other, _) => {
            return Err(DeltaError::TypeMismatch {
                path: full_path(),
                found: kind(other),
            })
        }
    }

    Ok(())
}

fn descend<'a>(
    doc: &'a mut Value,
    parents: &[PathSegment],
    last: &PathSegment,
) -> Result<&'a mut Value, DeltaError> {
    let mut current = doc;
    for (depth, segment) in parents.iter().enumerate() {
        let next = parents.get(depth + 1).unwrap_or(last);
        let here = &parents[..=depth];

        current = match (current, segment) {
            (Value::Object(map), PathSegment::Key(k)) => {
                map.entry(k.clone()).or_insert_with(|| empty_container(next))
            }
            (Value::Array(items), PathSegment::Index(i)) => {
                let len = items.len();
                items.get_mut(*i).ok_or_else(|| DeltaError::IndexOutOfBounds {
                    path: format_path(here),
                    index: *i,
                    len,
                })?
            }
            (other, _) => {
                return Err(DeltaError::TypeMismatch {
                    path: format_path(here),
                    found: kind(other),
                })
            }
        };
    }
    Ok(current)
}

fn empty_container(next: &PathSegment) -> Value {
    match next {
        PathSegment::Key(_) => Value::Object(Map::new()),
        PathSegment::Index(_) => Value::Array(Vec::new()),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

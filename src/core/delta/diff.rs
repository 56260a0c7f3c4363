use serde_json::{Map, Value};

use super::{DeltaOp, DeltaPath, EditScript, PathSegment};

/// Computes the edit script turning `old` into `new`.
///
/// Objects are compared key by key. Sequences are compared slot by slot
/// without any alignment search: the common prefix is diffed recursively,
/// then the tail is appended or truncated. This keeps the cost linear in the
/// size of the documents even when large sequences get reordered, at the
/// price of a longer script for such reorders.
pub fn diff(old: &Value, new: &Value) -> EditScript {
    let mut script = EditScript::new();
    let mut path = DeltaPath::new();
    diff_value(old, new, &mut path, &mut script);
    script
}

fn diff_value(old: &Value, new: &Value, path: &mut DeltaPath, out: &mut EditScript) {
    if old == new {
        return;
    }

    match (old, new) {
        (Value::Object(a), Value::Object(b)) => diff_object(a, b, path, out),
        (Value::Array(a), Value::Array(b)) => diff_array(a, b, path, out),
        _ => out.push(DeltaOp::Set {
            path: path.clone(),
            value: new.clone(),
        }),
    }
}

fn diff_object(
    old: &Map<String, Value>,
    new: &Map<String, Value>,
    path: &mut DeltaPath,
    out: &mut EditScript,
) {
    for (key, new_value) in new {
        path.push(PathSegment::Key(key.clone()));
        match old.get(key) {
            Some(old_value) => diff_value(old_value, new_value, path, out),
            None => out.push(DeltaOp::Set {
                path: path.clone(),
                value: new_value.clone(),
            }),
        }
        path.pop();
    }

    for key in old.keys().filter(|k| !new.contains_key(*k)) {
        path.push(PathSegment::Key(key.clone()));
        out.push(DeltaOp::Delete { path: path.clone() });
        path.pop();
    }
}

fn diff_array(old: &[Value], new: &[Value], path: &mut DeltaPath, out: &mut EditScript) {
    let common = old.len().min(new.len());

    for i in 0..common {
        path.push(PathSegment::Index(i));
        diff_value(&old[i], &new[i], path, out);
        path.pop();
    }

    if new.len() > old.len() {
        for (i, value) in new.iter().enumerate().skip(common) {
            path.push(PathSegment::Index(i));
            out.push(DeltaOp::Insert {
                path: path.clone(),
                value: value.clone(),
            });
            path.pop();
        }
    } else {
        // highest index first so the remaining indices stay valid
        for i in (common..old.len()).rev() {
            path.push(PathSegment::Index(i));
            out.push(DeltaOp::Delete { path: path.clone() });
            path.pop();
        }
    }
}

//! Slash-path parsing and nested patch application over JSON objects.
//!
//! Remote field updates address their target with a hierarchical key name
//! such as `/.users/one/profile/status`. These helpers split such a name
//! into segments and write (or delete) a value at the addressed position,
//! creating intermediate objects as needed. Last write wins: an intermediate
//! segment that currently holds a non-object value is replaced by an empty
//! object so the update can land.

use serde_json::{Map, Value};

use crate::error::{Result, UserCacheError};

/// Split a slash-delimited key name into its path segments.
///
/// Empty segments (the leading slash, doubled slashes) are dropped:
/// `"/.users/one/a"` → `[".users", "one", "a"]`.
pub fn parse_key_path(key: &str) -> Vec<String> {
    key.split('/')
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}

/// Set `value` at the position addressed by `segments`, creating an empty
/// object at every missing intermediate segment.
///
/// Idempotent: re-applying the same call yields the same final state.
/// Existing intermediate objects are descended into, not replaced; an
/// intermediate holding a non-object value is overwritten with an empty
/// object (last write wins).
///
/// Callers guarantee at least one segment; an empty slice is a contract
/// violation reported as [`UserCacheError::EmptyKeyPath`].
pub fn apply_at_path(root: &mut Map<String, Value>, segments: &[String], value: Value) -> Result<()> {
    let (last, intermediate) = segments.split_last().ok_or(UserCacheError::EmptyKeyPath)?;

    let mut current = root;
    for segment in intermediate {
        let slot = current
            .entry(segment.clone())
            .or_insert_with(empty_object);
        if !slot.is_object() {
            *slot = empty_object();
        }
        let Value::Object(next) = slot else {
            unreachable!("intermediate slot was coerced to an object above")
        };
        current = next;
    }

    current.insert(last.clone(), value);
    Ok(())
}

/// Delete the terminal key addressed by `segments`, returning the removed
/// value if it was present.
///
/// Missing intermediates (or a non-object on the way down) mean there is
/// nothing to remove; the call is a no-op returning `Ok(None)`.
pub fn remove_at_path(root: &mut Map<String, Value>, segments: &[String]) -> Result<Option<Value>> {
    let (last, intermediate) = segments.split_last().ok_or(UserCacheError::EmptyKeyPath)?;

    let mut current = root;
    for segment in intermediate {
        match current.get_mut(segment.as_str()) {
            Some(Value::Object(next)) => current = next,
            _ => return Ok(None),
        }
    }

    Ok(current.remove(last.as_str()))
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Task ID allocation and coercion.
//!
//! The relational backend delegates ID generation to `SQLite`'s
//! `AUTOINCREMENT`. The key-value backend has no such facility, so it derives
//! the next ID from the records it finds at load time:
//! 1. Scan every stored record and take the largest numeric ID
//! 2. Start the counter at that value plus one (never below 1)
//! 3. Hand out IDs from the in-memory counter for the rest of the process
//!
//! The counter itself is never persisted.

use serde_json::Value;
use std::sync::atomic::{AtomicI64, Ordering};

/// Hands out monotonically increasing task IDs.
#[derive(Debug)]
pub struct IdAllocator {
    next: AtomicI64,
}

impl IdAllocator {
    /// Create an allocator whose first ID is `max(existing) + 1`, minimum 1.
    pub fn from_existing(existing: impl IntoIterator<Item = i64>) -> Self {
        let max = existing.into_iter().max().unwrap_or(0);
        Self { next: AtomicI64::new(max.saturating_add(1).max(1)) }
    }

    /// Take the next ID.
    pub fn allocate(&self) -> i64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }

    /// The ID the next call to [`allocate`](Self::allocate) will return.
    #[must_use]
    pub fn peek(&self) -> i64 {
        self.next.load(Ordering::SeqCst)
    }
}

/// Coerce a boundary ID value to an integer.
///
/// Integers pass through, as do floats and numeric strings with no fractional
/// part. Everything else (null, booleans, empty or non-numeric strings,
/// fractional or non-finite numbers) yields `None`.
///
/// Fractional IDs are rejected rather than truncated, so `5.5` can never
/// alias task 5 in lookups, updates or deletes.
#[must_use]
pub fn coerce_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral_f64)),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            trimmed.parse::<i64>().ok().or_else(|| trimmed.parse::<f64>().ok().and_then(integral_f64))
        }
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn integral_f64(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_allocator_empty_starts_at_one() {
        let ids = IdAllocator::from_existing(Vec::new());
        assert_eq!(ids.allocate(), 1);
        assert_eq!(ids.allocate(), 2);
    }

    #[test]
    fn test_allocator_continues_after_max() {
        let ids = IdAllocator::from_existing([3, 9, 4]);
        assert_eq!(ids.peek(), 10);
        assert_eq!(ids.allocate(), 10);
        assert_eq!(ids.allocate(), 11);
    }

    #[test]
    fn test_allocator_never_below_one() {
        let ids = IdAllocator::from_existing([-5, -1]);
        assert_eq!(ids.allocate(), 1);
    }

    #[test]
    fn test_coerce_id_numbers() {
        assert_eq!(coerce_id(&json!(5)), Some(5));
        assert_eq!(coerce_id(&json!(5.0)), Some(5));
        assert_eq!(coerce_id(&json!(5.5)), None);
        assert_eq!(coerce_id(&json!("5.5")), None);
        assert_eq!(coerce_id(&json!(-0.0)), Some(0));
    }

    #[test]
    fn test_coerce_id_strings() {
        assert_eq!(coerce_id(&json!("12")), Some(12));
        assert_eq!(coerce_id(&json!(" 12 ")), Some(12));
        assert_eq!(coerce_id(&json!("12.0")), Some(12));
        assert_eq!(coerce_id(&json!("abc")), None);
        assert_eq!(coerce_id(&json!("")), None);
        assert_eq!(coerce_id(&json!("NaN")), None);
        assert_eq!(coerce_id(&json!("inf")), None);
    }

    #[test]
    fn test_coerce_id_other_types() {
        assert_eq!(coerce_id(&Value::Null), None);
        assert_eq!(coerce_id(&json!(true)), None);
        assert_eq!(coerce_id(&json!([1])), None);
        assert_eq!(coerce_id(&json!({"id": 1})), None);
    }
}

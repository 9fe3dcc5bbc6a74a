//! Records, filters and pagination shared by every storage backend.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

/// One stored document: an opaque mapping from field name to JSON value.
pub type Record = Map<String, Value>;

/// Field holding the storage-assigned identifier.
pub const ID_FIELD: &str = "id";

/// Field holding the insertion timestamp (RFC 3339, UTC).
pub const CREATED_AT_FIELD: &str = "created_at";

/// Attach the generated id and creation timestamp, overwriting caller values.
pub(crate) fn stamp(mut record: Record, id: &str, created_at: DateTime<Utc>) -> Record {
    record.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
    record.insert(
        CREATED_AT_FIELD.to_string(),
        Value::String(created_at.to_rfc3339_opts(SecondsFormat::Micros, true)),
    );
    record
}

/// Conjunction of top-level field-equality predicates.
///
/// Values are expected to be scalars. A `null` value matches records where the
/// field is null or missing. Numbers compare by value, so `3` matches `3.0`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<(String, Value)>,
}

impl Filter {
    /// A filter that matches every record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality predicate.
    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push((field.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn clauses(&self) -> &[(String, Value)] {
        &self.clauses
    }

    /// Whether `record` satisfies every predicate.
    pub fn matches(&self, record: &Record) -> bool {
        self.clauses
            .iter()
            .all(|(field, expected)| match record.get(field) {
                None => expected.is_null(),
                Some(actual) => values_equal(actual, expected),
            })
    }
}

fn values_equal(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => actual == expected,
    }
}

/// Offset pagination window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
    pub skip: usize,
    /// `None` means unbounded.
    pub limit: Option<usize>,
}

impl Page {
    pub fn new(skip: usize, limit: Option<usize>) -> Self {
        Self { skip, limit }
    }

    /// Every record, from the start.
    pub fn all() -> Self {
        Self::default()
    }

    /// Build from untrusted signed values: a negative skip is clamped to zero,
    /// a zero or negative limit is treated as unset.
    pub fn from_signed(skip: i64, limit: Option<i64>) -> Self {
        Self {
            skip: usize::try_from(skip).unwrap_or(0),
            limit: limit
                .and_then(|l| usize::try_from(l).ok())
                .filter(|l| *l > 0),
        }
    }

    /// Apply the window to an iterator.
    pub fn apply<I: Iterator>(self, iter: I) -> impl Iterator<Item = I::Item> {
        iter.skip(self.skip).take(self.limit.unwrap_or(usize::MAX))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn stamp_overwrites_caller_id() {
        let stamped = stamp(record(json!({"id": "mine", "mood": "good"})), "7", Utc::now());
        assert_eq!(stamped["id"], "7");
        assert_eq!(stamped["mood"], "good");
        assert!(stamped.contains_key(CREATED_AT_FIELD));
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(Filter::new().matches(&record(json!({"a": 1}))));
        assert!(Filter::new().matches(&Record::new()));
    }

    #[test]
    fn filter_equality_and_conjunction() {
        let r = record(json!({"mood": "bad", "user_id": "u1", "score": 3}));
        assert!(Filter::new().where_eq("mood", "bad").matches(&r));
        assert!(!Filter::new().where_eq("mood", "good").matches(&r));
        assert!(Filter::new().where_eq("mood", "bad").where_eq("user_id", "u1").matches(&r));
        assert!(!Filter::new().where_eq("mood", "bad").where_eq("user_id", "u2").matches(&r));
        assert!(Filter::new().where_eq("score", 3.0).matches(&r));
    }

    #[test]
    fn null_filter_matches_missing_field() {
        let r = record(json!({"mood": "bad", "user_id": null}));
        assert!(Filter::new().where_eq("user_id", Value::Null).matches(&r));
        assert!(Filter::new().where_eq("location", Value::Null).matches(&r));
        assert!(!Filter::new().where_eq("mood", Value::Null).matches(&r));
    }

    #[test]
    fn page_from_signed_clamps() {
        assert_eq!(Page::from_signed(-5, Some(10)), Page::new(0, Some(10)));
        assert_eq!(Page::from_signed(3, Some(-1)), Page::new(3, None));
        assert_eq!(Page::from_signed(2, None), Page::new(2, None));
        assert_eq!(Page::from_signed(0, Some(0)), Page::new(0, None));
    }

    #[test]
    fn page_apply_windows_iterator() {
        let items: Vec<_> = Page::new(1, Some(2)).apply(0..10).collect();
        assert_eq!(items, vec![1, 2]);
        let past_end: Vec<_> = Page::new(20, None).apply(0..10).collect();
        assert!(past_end.is_empty());
    }
}

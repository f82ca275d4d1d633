//! Identity resolution for raw source records
//!
//! Every record gets an [`IdentityKey`], whatever candidate keys it carries.
//! Resolution is total: when no candidate is usable a positional fallback is
//! produced.
//!
//! # Known limitation
//!
//! Positional fallbacks (`1000 + index` for events, `startup_<index>` for
//! snapshot rows) depend on record order. If a source reorders records between
//! passes, a founder without an explicit id can get a different key, and an
//! override saved under the old key no longer lines up. No stability is
//! promised for these keys.

use serde_json::Value;

use crate::model::{EventRecord, IdentityKey, RawSourceRecord, SnapshotRow};

/// Base added to the position of an event that has no usable platform id
pub const EVENT_FALLBACK_BASE: u64 = 1000;

/// Prefix of positional identities for snapshot rows
pub const SNAPSHOT_FALLBACK_PREFIX: &str = "startup_";

/// Which candidate produced an identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentitySource {
    /// Messaging-platform numeric id (events) or explicit numeric column (rows)
    Explicit,
    /// Generic `id` column (rows only)
    Generic,
    /// Derived from the record's position in its batch
    Positional,
}

/// Resolved identity plus the rule that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub key: IdentityKey,
    pub source: IdentitySource,
}

impl ResolvedIdentity {
    pub fn is_positional(&self) -> bool {
        self.source == IdentitySource::Positional
    }
}

/// Resolve the identity of any raw record
pub fn resolve(record: &RawSourceRecord, positional_index: usize) -> ResolvedIdentity {
    match record {
        RawSourceRecord::Event(event) => resolve_event(event, positional_index),
        RawSourceRecord::Snapshot(row) => resolve_snapshot(row, positional_index),
    }
}

/// Events: `contact.telegram_id` (number or numeric string), else
/// `1000 + positional_index`
pub fn resolve_event(event: &EventRecord, positional_index: usize) -> ResolvedIdentity {
    match event.contact_field("telegram_id").and_then(numeric_id) {
        Some(id) => ResolvedIdentity {
            key: IdentityKey::from(id.to_string()),
            source: IdentitySource::Explicit,
        },
        None => ResolvedIdentity {
            key: IdentityKey::from(EVENT_FALLBACK_BASE + positional_index as u64),
            source: IdentitySource::Positional,
        },
    }
}

/// Snapshot rows: numeric `telegram_id` column, else the `id` column, else
/// `startup_<positional_index>`
pub fn resolve_snapshot(row: &SnapshotRow, positional_index: usize) -> ResolvedIdentity {
    if let Some(id) = row.get("telegram_id").and_then(parse_numeric) {
        return ResolvedIdentity {
            key: IdentityKey::from(id.to_string()),
            source: IdentitySource::Explicit,
        };
    }

    if let Some(id) = row.get("id") {
        return ResolvedIdentity {
            key: IdentityKey::new(id),
            source: IdentitySource::Generic,
        };
    }

    ResolvedIdentity {
        key: IdentityKey::new(format!("{}{}", SNAPSHOT_FALLBACK_PREFIX, positional_index)),
        source: IdentitySource::Positional,
    }
}

fn numeric_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .map(|f| f as i64)
        }),
        Value::String(text) => parse_numeric(text),
        _ => None,
    }
}

fn parse_numeric(text: &str) -> Option<i64> {
    text.trim().parse::<i64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(value: Value) -> EventRecord {
        EventRecord::from_value(0, &value).unwrap()
    }

    #[test]
    fn test_event_numeric_id() {
        let resolved = resolve_event(&event(json!({"contact": {"telegram_id": 1750}})), 3);
        assert_eq!(resolved.key, IdentityKey::new("1750"));
        assert_eq!(resolved.source, IdentitySource::Explicit);
    }

    #[test]
    fn test_event_numeric_string_id() {
        let resolved = resolve_event(&event(json!({"contact": {"telegram_id": " 1750 "}})), 3);
        assert_eq!(resolved.key, IdentityKey::new("1750"));
    }

    #[test]
    fn test_event_non_numeric_id_falls_back() {
        let resolved = resolve_event(&event(json!({"contact": {"telegram_id": "@ada"}})), 3);
        assert_eq!(resolved.key, IdentityKey::new("1003"));
        assert!(resolved.is_positional());
    }

    #[test]
    fn test_event_missing_id_falls_back() {
        let resolved = resolve_event(&event(json!({})), 0);
        assert_eq!(resolved.key, IdentityKey::new("1000"));
    }

    #[test]
    fn test_snapshot_precedence() {
        let row: SnapshotRow = [("telegram_id", "555"), ("id", "abc")].into_iter().collect();
        assert_eq!(resolve_snapshot(&row, 9).key, IdentityKey::new("555"));

        let row: SnapshotRow = [("telegram_id", "n/a"), ("id", "abc")].into_iter().collect();
        let resolved = resolve_snapshot(&row, 9);
        assert_eq!(resolved.key, IdentityKey::new("abc"));
        assert_eq!(resolved.source, IdentitySource::Generic);

        let row: SnapshotRow = [("name", "Ada")].into_iter().collect();
        let resolved = resolve_snapshot(&row, 9);
        assert_eq!(resolved.key, IdentityKey::new("startup_9"));
        assert!(resolved.is_positional());
    }

    #[test]
    fn test_resolve_dispatches_on_record_kind() {
        let row: SnapshotRow = [("id", "row-1")].into_iter().collect();
        let resolved = resolve(&RawSourceRecord::Snapshot(row), 0);
        assert_eq!(resolved.key, IdentityKey::new("row-1"));

        let ev = event(json!({"contact": {"telegram_id": 8}}));
        let resolved = resolve(&RawSourceRecord::Event(ev), 0);
        assert_eq!(resolved.key, IdentityKey::new("8"));
    }

    #[test]
    fn test_positional_fallback_depends_on_order() {
        // Same record, different position, different key
        let ev = event(json!({"contact": {"name": "Ada"}}));
        assert_ne!(resolve_event(&ev, 0).key, resolve_event(&ev, 1).key);
    }
}

//! Roster data model
//!
//! - [`CanonicalEntity`]: the merged, display-ready view of one founder/startup
//! - [`EntityFields`]: a partial entity, as carried by an override
//! - [`RawSourceRecord`]: one record from the live feed or the snapshot
//! - [`OverrideRecord`]: a locally saved snapshot of entity fields

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

use crate::{Error, Result};

// ========================================
// Identity
// ========================================

/// Stable key recognizing "the same founder" across sources and sessions
///
/// Opaque: numeric platform identifiers, snapshot ids and positional
/// fallbacks (`"startup_3"`) all end up here as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityKey(String);

impl IdentityKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for IdentityKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for IdentityKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<u64> for IdentityKey {
    fn from(key: u64) -> Self {
        Self(key.to_string())
    }
}

// ========================================
// House taxonomy
// ========================================

/// Program track of a startup
///
/// Exactly four values exist. "Unassigned" is `Option::<House>::None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum House {
    Venture,
    Karma,
    Builder,
    Side,
}

impl House {
    pub const ALL: [House; 4] = [House::Venture, House::Karma, House::Builder, House::Side];

    /// Canonical lowercase literal
    pub fn as_str(&self) -> &'static str {
        match self {
            House::Venture => "venture",
            House::Karma => "karma",
            House::Builder => "builder",
            House::Side => "side",
        }
    }

    /// Human-facing label, e.g. "Venture House"
    pub fn display_name(&self) -> &'static str {
        match self {
            House::Venture => "Venture House",
            House::Karma => "Karma House",
            House::Builder => "Builder House",
            House::Side => "Side House",
        }
    }
}

impl fmt::Display for House {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ========================================
// Canonical entity
// ========================================

/// Ways to reach a founder, each optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactChannel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telegram: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin: Option<String>,
}

/// Normalized, merged, display-ready record for one founder/startup
///
/// Rebuilt on every reconciliation pass; never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalEntity {
    pub identity: IdentityKey,
    pub display_name: String,
    pub organization_name: String,
    pub website_url: Option<String>,
    pub contact: ContactChannel,
    pub house: Option<House>,
    /// Always within [0, 100]
    pub progress_percent: u8,
    pub stealth: bool,
    pub contact_consent: bool,
    pub group_id: Option<String>,
    pub bio: Option<String>,
    pub motivation: Option<String>,
    pub traction: Option<String>,
    /// Source fields with no canonical slot, passed through untouched
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
    /// Credential; never serialized into listings
    #[serde(skip_serializing, default)]
    pub login_code: String,
}

impl CanonicalEntity {
    /// Entity with every field at its default and the login code derived from
    /// the identity
    pub fn empty(identity: IdentityKey) -> Self {
        let login_code = crate::credential::derive(&identity);
        Self {
            identity,
            display_name: String::new(),
            organization_name: String::new(),
            website_url: None,
            contact: ContactChannel::default(),
            house: None,
            progress_percent: 0,
            stealth: false,
            contact_consent: true,
            group_id: None,
            bio: None,
            motivation: None,
            traction: None,
            extra: BTreeMap::new(),
            login_code,
        }
    }
}

// ========================================
// Partial entity (override payload)
// ========================================

/// A partial [`CanonicalEntity`]
///
/// `None` means "not specified". `house` is doubly optional so an override can
/// explicitly set a founder back to unassigned (`"house": null`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telegram: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin: Option<String>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub house: Option<Option<House>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_percent: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stealth: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_consent: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motivation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_code: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

/// Distinguishes a missing key (`None`) from an explicit `null` (`Some(None)`)
fn double_option<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl EntityFields {
    /// Shallow merge: every field `newer` specifies replaces ours
    ///
    /// `extra` merges key by key.
    pub fn merge_from(&mut self, newer: EntityFields) {
        macro_rules! take {
            ($($field:ident),* $(,)?) => {
                $(if newer.$field.is_some() {
                    self.$field = newer.$field;
                })*
            };
        }
        take!(
            display_name,
            organization_name,
            website_url,
            email,
            telegram,
            linkedin,
            house,
            progress_percent,
            stealth,
            contact_consent,
            group_id,
            bio,
            motivation,
            traction,
            login_code,
        );
        self.extra.extend(newer.extra);
    }

    /// True when no field is specified
    pub fn is_empty(&self) -> bool {
        *self == EntityFields::default()
    }

    /// Check caller-supplied values before they are stored
    pub fn validate(&self) -> Result<()> {
        if let Some(progress) = self.progress_percent {
            if progress > 100 {
                return Err(Error::InvalidInput(format!(
                    "progress_percent must be within 0..=100 (got {})",
                    progress
                )));
            }
        }
        Ok(())
    }
}

// ========================================
// Raw source records
// ========================================

/// One raw record before identity resolution and normalization
#[derive(Debug, Clone, PartialEq)]
pub enum RawSourceRecord {
    Event(EventRecord),
    Snapshot(SnapshotRow),
}

/// A live-feed event: contact info plus an event payload with a nested
/// `details` blob
///
/// Values are kept as JSON because the feed sends strings, numbers and
/// booleans interchangeably; the normalizer deals with that.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventRecord {
    pub contact: Map<String, Value>,
    pub payload: Map<String, Value>,
}

impl EventRecord {
    /// Parse an event from the feed's JSON
    ///
    /// Only a non-object record is malformed; missing `contact`/`payload`
    /// sections are treated as empty.
    pub fn from_value(index: usize, value: &Value) -> Result<Self> {
        let object = value.as_object().ok_or_else(|| Error::MalformedRecord {
            index,
            reason: format!("expected a JSON object, got {}", json_kind(value)),
        })?;

        let section = |name: &str| -> Result<Map<String, Value>> {
            match object.get(name) {
                None | Some(Value::Null) => Ok(Map::new()),
                Some(Value::Object(map)) => Ok(map.clone()),
                Some(other) => Err(Error::MalformedRecord {
                    index,
                    reason: format!("'{}' must be an object, got {}", name, json_kind(other)),
                }),
            }
        };

        Ok(Self {
            contact: section("contact")?,
            payload: section("payload")?,
        })
    }

    /// The payload's nested detail blob (empty when absent)
    pub fn details(&self) -> Option<&Map<String, Value>> {
        self.payload.get("details").and_then(Value::as_object)
    }

    /// Look up an event field, preferring the detail blob over the payload
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.details()
            .and_then(|details| details.get(key))
            .filter(|value| !value.is_null())
            .or_else(|| self.payload.get(key).filter(|value| !value.is_null()))
    }

    /// Look up a contact field
    pub fn contact_field(&self, key: &str) -> Option<&Value> {
        self.contact.get(key).filter(|value| !value.is_null())
    }
}

/// A flat row from the tabular snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotRow {
    fields: BTreeMap<String, String>,
}

impl SnapshotRow {
    pub fn new(fields: BTreeMap<String, String>) -> Self {
        Self { fields }
    }

    /// Trimmed, non-empty value of a column
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SnapshotRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

// ========================================
// Overrides
// ========================================

/// Locally saved fields for one identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideRecord {
    pub identity: IdentityKey,
    pub fields: EntityFields,
    /// Unix epoch milliseconds of the last write
    pub last_modified: i64,
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

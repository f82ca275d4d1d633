//! Reconciliation merger
//!
//! Turns one pass of raw source records plus the override store into the
//! canonical entity list.
//!
//! **Algorithm:**
//! 1. Pick the base source: live events when available and non-empty (and not
//!    in demo mode), otherwise snapshot rows. The two are never mixed.
//! 2. For each raw record: resolve identity, normalize fields, build a
//!    provisional entity. Malformed records are skipped and logged.
//! 3. Duplicate identities: the last occurrence wins and keeps the first
//!    occurrence's position (logged as a collision).
//! 4. Lay each identity's override on top (see [`apply_override_fields`]).
//! 5. Append identities known only to the override store.
//!
//! **Override precedence:**
//! - `stealth` and `contact_consent` come from the override whenever it
//!   specifies them; a refreshed feed never reverts a privacy choice
//! - every other field takes the override value only when it is set and not
//!   blank; otherwise the freshly normalized source value stays

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

use crate::context::RosterContext;
use crate::credential;
use crate::identity::{self, ResolvedIdentity};
use crate::model::{CanonicalEntity, EntityFields, EventRecord, RawSourceRecord, SnapshotRow};
use crate::normalize::{
    normalize_house_value, normalize_optional_boolean, normalize_progress, normalize_text,
};
use crate::overrides::OverrideStore;
use crate::store::KeyValueStore;
use crate::{Error, Result};

/// Which source the entities of a pass were built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Live,
    Snapshot,
    /// Both sources were empty or unusable; entities come from overrides
    OverridesOnly,
}

/// Result of one reconciliation pass
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub entities: Vec<CanonicalEntity>,
    pub source: SourceKind,
    /// Raw records that could not be used
    pub skipped: usize,
    /// Records that resolved to an identity already seen in the batch
    pub collisions: usize,
}

impl Reconciliation {
    pub fn find(&self, identity: &crate::model::IdentityKey) -> Option<&CanonicalEntity> {
        self.entities.iter().find(|entity| &entity.identity == identity)
    }
}

/// Event keys with a canonical slot (everything else goes to `extra`)
const EVENT_KNOWN_KEYS: &[&str] = &[
    "details",
    "name",
    "founder_name",
    "startup_name",
    "organization",
    "company",
    "website",
    "website_url",
    "url",
    "email",
    "linkedin",
    "telegram",
    "house",
    "progress",
    "stealth",
    "contact_consent",
    "group_id",
    "group",
    "circle",
    "login_code",
    "bio",
    "motivation",
    "traction",
];

/// Snapshot columns with a canonical slot (everything else goes to `extra`)
const SNAPSHOT_KNOWN_KEYS: &[&str] = &[
    "telegram_id",
    "id",
    "name",
    "founder",
    "startup",
    "startup_name",
    "company",
    "website",
    "email",
    "telegram",
    "linkedin",
    "house",
    "progress",
    "stealth",
    "contact_consent",
    "group",
    "group_id",
    "circle",
    "login_code",
    "bio",
    "motivation",
    "traction",
];

// ========================================
// Entry points
// ========================================

/// Reconcile one pass
///
/// Live events are the base when non-empty (and the context is not in demo
/// mode); otherwise snapshot rows are.
pub fn reconcile<S: KeyValueStore>(
    ctx: &RosterContext,
    live_records: &[Value],
    snapshot_rows: &[SnapshotRow],
    overrides: &OverrideStore<S>,
) -> Reconciliation {
    if !ctx.is_demo() && !live_records.is_empty() {
        reconcile_live(live_records, overrides)
    } else {
        reconcile_snapshot(snapshot_rows, overrides)
    }
}

/// Reconcile from fetch results, applying source fallback
///
/// # Errors
///
/// `ReconciliationUnavailable` when neither source could be obtained. An
/// empty live feed plus a failed snapshot is not an error: the pass falls
/// back to overrides only.
pub fn reconcile_sources<S: KeyValueStore>(
    ctx: &RosterContext,
    live: Result<Vec<Value>>,
    snapshot: Result<Vec<SnapshotRow>>,
    overrides: &OverrideStore<S>,
) -> Result<Reconciliation> {
    let live = if ctx.is_demo() {
        Err(Error::source_unavailable("live", "demo mode"))
    } else {
        live
    };

    match (live, snapshot) {
        (Ok(events), _) if !events.is_empty() => Ok(reconcile_live(&events, overrides)),
        (_, Ok(rows)) => Ok(reconcile_snapshot(&rows, overrides)),
        (Ok(_), Err(snapshot_err)) => {
            warn!(error = %snapshot_err, "Live feed empty and snapshot unavailable; using overrides only");
            Ok(finish(Vec::new(), overrides, SourceKind::OverridesOnly, 0, 0))
        }
        (Err(live_err), Err(snapshot_err)) => Err(Error::ReconciliationUnavailable {
            live: live_err.to_string(),
            snapshot: snapshot_err.to_string(),
        }),
    }
}

/// Reconcile with live events as the base
pub fn reconcile_live<S: KeyValueStore>(
    live_records: &[Value],
    overrides: &OverrideStore<S>,
) -> Reconciliation {
    let mut batch = Batch::default();

    for (index, raw) in live_records.iter().enumerate() {
        match EventRecord::from_value(index, raw) {
            Ok(event) => batch.push_record(index, &RawSourceRecord::Event(event)),
            Err(e) => {
                warn!(error = %e, "Skipping live record");
                batch.skipped += 1;
            }
        }
    }

    batch.finish(overrides, SourceKind::Live)
}

/// Reconcile with snapshot rows as the base
pub fn reconcile_snapshot<S: KeyValueStore>(
    snapshot_rows: &[SnapshotRow],
    overrides: &OverrideStore<S>,
) -> Reconciliation {
    let mut batch = Batch::default();

    for (index, row) in snapshot_rows.iter().enumerate() {
        if row.fields().is_empty() {
            let e = Error::MalformedRecord {
                index,
                reason: "row has no columns".to_string(),
            };
            warn!(error = %e, "Skipping snapshot row");
            batch.skipped += 1;
            continue;
        }
        batch.push_record(index, &RawSourceRecord::Snapshot(row.clone()));
    }

    let source = if snapshot_rows.is_empty() {
        SourceKind::OverridesOnly
    } else {
        SourceKind::Snapshot
    };
    batch.finish(overrides, source)
}

// ========================================
// Batch accumulation
// ========================================

#[derive(Default)]
struct Batch {
    entities: Vec<CanonicalEntity>,
    positions: HashMap<crate::model::IdentityKey, usize>,
    skipped: usize,
    collisions: usize,
}

impl Batch {
    fn push_record(&mut self, index: usize, record: &RawSourceRecord) {
        let resolved = identity::resolve(record, index);
        let fields = match record {
            RawSourceRecord::Event(event) => entity_from_event(event),
            RawSourceRecord::Snapshot(row) => entity_from_row(row),
        };
        self.push(resolved, fields);
    }

    /// Add a provisional entity; `partial` carries everything except identity
    /// and the derived login code
    fn push(&mut self, resolved: ResolvedIdentity, partial: EntityFields) {
        if resolved.is_positional() {
            debug!(identity = %resolved.key, "Positional identity fallback");
        }

        let mut entity = CanonicalEntity::empty(resolved.key);
        apply_source_fields(&mut entity, partial);

        match self.positions.get(&entity.identity) {
            Some(&position) => {
                let collision = Error::IdentityCollision {
                    identity: entity.identity.to_string(),
                };
                warn!(identity = %entity.identity, "{}", collision);
                self.collisions += 1;
                self.entities[position] = entity;
            }
            None => {
                self.positions
                    .insert(entity.identity.clone(), self.entities.len());
                self.entities.push(entity);
            }
        }
    }

    fn finish<S: KeyValueStore>(
        self,
        overrides: &OverrideStore<S>,
        source: SourceKind,
    ) -> Reconciliation {
        finish(self.entities, overrides, source, self.skipped, self.collisions)
    }
}

fn finish<S: KeyValueStore>(
    mut entities: Vec<CanonicalEntity>,
    overrides: &OverrideStore<S>,
    source: SourceKind,
    skipped: usize,
    collisions: usize,
) -> Reconciliation {
    let mut overridden = 0usize;
    for entity in entities.iter_mut() {
        if let Some(record) = overrides.get(&entity.identity) {
            apply_override_fields(entity, &record.fields);
            overridden += 1;
        }
    }

    // Known founders missing from this batch are rebuilt from their override
    let known: std::collections::HashSet<_> =
        entities.iter().map(|entity| entity.identity.clone()).collect();
    let mut preserved = 0usize;
    for record in overrides.records() {
        if !known.contains(&record.identity) {
            let mut entity = CanonicalEntity::empty(record.identity.clone());
            apply_override_fields(&mut entity, &record.fields);
            entities.push(entity);
            preserved += 1;
        }
    }

    info!(
        source = ?source,
        entities = entities.len(),
        overridden,
        preserved,
        skipped,
        collisions,
        "Reconciliation pass complete"
    );

    Reconciliation {
        entities,
        source,
        skipped,
        collisions,
    }
}

// ========================================
// Field precedence
// ========================================

/// Source values are already normalized; take everything they carry
fn apply_source_fields(entity: &mut CanonicalEntity, fields: EntityFields) {
    if let Some(name) = fields.display_name {
        entity.display_name = name;
    }
    if let Some(organization) = fields.organization_name {
        entity.organization_name = organization;
    }
    entity.website_url = fields.website_url;
    entity.contact.email = fields.email;
    entity.contact.telegram = fields.telegram;
    entity.contact.linkedin = fields.linkedin;
    entity.house = fields.house.flatten();
    entity.progress_percent = fields.progress_percent.unwrap_or(0).min(100);
    entity.stealth = fields.stealth.unwrap_or(false);
    entity.contact_consent = fields.contact_consent.unwrap_or(true);
    entity.group_id = fields.group_id;
    entity.bio = fields.bio;
    entity.motivation = fields.motivation;
    entity.traction = fields.traction;
    entity.extra = fields.extra;
    entity.login_code = fields
        .login_code
        .unwrap_or_else(|| credential::derive(&entity.identity));
}

/// Lay override fields over an entity
///
/// Privacy flags win whenever the override specifies them. Other fields win
/// only when set to a non-blank value; `house` counts an explicit `null` as
/// set (deliberate "unassigned").
pub fn apply_override_fields(entity: &mut CanonicalEntity, fields: &EntityFields) {
    if let Some(stealth) = fields.stealth {
        entity.stealth = stealth;
    }
    if let Some(consent) = fields.contact_consent {
        entity.contact_consent = consent;
    }

    if let Some(name) = non_blank(&fields.display_name) {
        entity.display_name = name;
    }
    if let Some(organization) = non_blank(&fields.organization_name) {
        entity.organization_name = organization;
    }
    if let Some(website) = non_blank(&fields.website_url) {
        entity.website_url = Some(website);
    }
    if let Some(email) = non_blank(&fields.email) {
        entity.contact.email = Some(email);
    }
    if let Some(telegram) = non_blank(&fields.telegram) {
        entity.contact.telegram = Some(telegram);
    }
    if let Some(linkedin) = non_blank(&fields.linkedin) {
        entity.contact.linkedin = Some(linkedin);
    }
    if let Some(house) = fields.house {
        entity.house = house;
    }
    if let Some(progress) = fields.progress_percent {
        entity.progress_percent = progress.min(100);
    }
    if let Some(group) = non_blank(&fields.group_id) {
        entity.group_id = Some(group);
    }
    if let Some(bio) = non_blank(&fields.bio) {
        entity.bio = Some(bio);
    }
    if let Some(motivation) = non_blank(&fields.motivation) {
        entity.motivation = Some(motivation);
    }
    if let Some(traction) = non_blank(&fields.traction) {
        entity.traction = Some(traction);
    }
    if let Some(code) = non_blank(&fields.login_code) {
        entity.login_code = code;
    }
    for (key, value) in &fields.extra {
        if !value.trim().is_empty() {
            entity.extra.insert(key.clone(), value.clone());
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

// ========================================
// Per-source normalization
// ========================================

fn first_text<'a>(candidates: impl IntoIterator<Item = Option<&'a Value>>) -> Option<String> {
    candidates.into_iter().find_map(normalize_text)
}

fn entity_from_event(event: &EventRecord) -> EntityFields {
    let field = |key: &str| event.field(key);
    let contact = |key: &str| event.contact_field(key);

    let mut extra = BTreeMap::new();
    collect_extra(&event.payload, &mut extra);
    if let Some(details) = event.details() {
        collect_extra(details, &mut extra);
    }

    EntityFields {
        display_name: first_text([contact("name"), field("name"), field("founder_name")]),
        organization_name: first_text([
            field("startup_name"),
            field("organization"),
            field("company"),
        ]),
        website_url: first_text([field("website"), field("website_url"), field("url")]),
        email: first_text([contact("email"), field("email")]),
        telegram: first_text([contact("telegram"), contact("username"), field("telegram")]),
        linkedin: first_text([contact("linkedin"), field("linkedin")]),
        house: Some(normalize_house_value(field("house"))),
        progress_percent: Some(normalize_progress(field("progress"))),
        stealth: normalize_optional_boolean(field("stealth")),
        contact_consent: normalize_optional_boolean(field("contact_consent")),
        group_id: first_text([field("group_id"), field("group"), field("circle")]),
        bio: first_text([field("bio")]),
        motivation: first_text([field("motivation")]),
        traction: first_text([field("traction")]),
        login_code: first_text([field("login_code")]),
        extra,
    }
}

fn collect_extra(section: &Map<String, Value>, extra: &mut BTreeMap<String, String>) {
    for (key, value) in section {
        if EVENT_KNOWN_KEYS.contains(&key.as_str()) {
            continue;
        }
        let text = match value {
            Value::Null => continue,
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        extra.insert(key.clone(), text);
    }
}

fn entity_from_row(row: &SnapshotRow) -> EntityFields {
    let value = |key: &str| row.get(key).map(|text| Value::String(text.to_string()));

    let extra = row
        .fields()
        .iter()
        .filter(|(key, value)| {
            !SNAPSHOT_KNOWN_KEYS.contains(&key.as_str()) && !value.trim().is_empty()
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    EntityFields {
        display_name: row_text(row, &["name", "founder"]),
        organization_name: row_text(row, &["startup", "startup_name", "company"]),
        website_url: row_text(row, &["website"]),
        email: row_text(row, &["email"]),
        telegram: row_text(row, &["telegram"]),
        linkedin: row_text(row, &["linkedin"]),
        house: Some(normalize_house_value(value("house").as_ref())),
        progress_percent: Some(normalize_progress(value("progress").as_ref())),
        stealth: normalize_optional_boolean(value("stealth").as_ref()),
        contact_consent: normalize_optional_boolean(value("contact_consent").as_ref()),
        group_id: row_text(row, &["group", "group_id", "circle"]),
        bio: row_text(row, &["bio"]),
        motivation: row_text(row, &["motivation"]),
        traction: row_text(row, &["traction"]),
        login_code: row_text(row, &["login_code"]),
        extra,
    }
}

fn row_text(row: &SnapshotRow, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| row.get(key)).map(str::to_string)
}

//! Roster operations over reconciled entities
//!
//! Everything here works on the entity list of a finished reconciliation pass.
//! Only [`apply_override`] and [`clear_override`] touch state, and they do it
//! through the override store's own primitives.

use serde::Serialize;
use std::cmp::Ordering;
use std::str::FromStr;
use tracing::info;

use crate::credential;
use crate::model::{CanonicalEntity, EntityFields, House, IdentityKey};
use crate::normalize::normalize_house;
use crate::overrides::OverrideStore;
use crate::reconcile::apply_override_fields;
use crate::store::KeyValueStore;
use crate::{Error, Result};

/// Group id used for founders without one
pub const DEFAULT_GROUP_ID: &str = "1";

// ========================================
// Authentication
// ========================================

/// Outcome of a login attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthOutcome {
    pub matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<CanonicalEntity>,
}

/// Match a login code against the roster
///
/// # Errors
///
/// `InvalidCredentialInput` for codes shorter than
/// [`credential::MIN_CODE_LENGTH`]. No match is `matched: false`.
pub fn authenticate(code: &str, entities: &[CanonicalEntity]) -> Result<AuthOutcome> {
    let matched = credential::verify(code, entities)?;
    let entity = matched.and_then(|identity| {
        entities
            .iter()
            .find(|entity| entity.identity == identity)
            .cloned()
    });

    Ok(AuthOutcome {
        matched: entity.is_some(),
        entity,
    })
}

// ========================================
// Listing
// ========================================

/// House filter for listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HouseFilter {
    #[default]
    All,
    Only(House),
}

impl FromStr for HouseFilter {
    type Err = Error;

    /// `"all"` or blank is no filtering; anything else must name a house
    fn from_str(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case("all") {
            return Ok(HouseFilter::All);
        }
        normalize_house(raw)
            .map(HouseFilter::Only)
            .ok_or_else(|| Error::InvalidInput(format!("Unknown house filter: {}", raw)))
    }
}

/// Listing sort order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    /// Highest progress first
    Progress,
    /// Display name, case-insensitive, A to Z
    Name,
}

impl FromStr for SortKey {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "progress" => Ok(SortKey::Progress),
            "name" => Ok(SortKey::Name),
            other => Err(Error::InvalidInput(format!("Unknown sort key: {}", other))),
        }
    }
}

/// Optional filter and sort for [`list_entities`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub house: HouseFilter,
    pub sort: Option<SortKey>,
}

impl ListFilter {
    /// Parse raw query values
    pub fn parse(house: Option<&str>, sort: Option<&str>) -> Result<Self> {
        Ok(Self {
            house: house.map(str::parse).transpose()?.unwrap_or_default(),
            sort: sort
                .filter(|raw| !raw.trim().is_empty())
                .map(str::parse)
                .transpose()?,
        })
    }
}

/// Filter and sort entities; sorting is stable
pub fn list_entities(entities: &[CanonicalEntity], filter: &ListFilter) -> Vec<CanonicalEntity> {
    let mut listed: Vec<CanonicalEntity> = entities
        .iter()
        .filter(|entity| match filter.house {
            HouseFilter::All => true,
            HouseFilter::Only(house) => entity.house == Some(house),
        })
        .cloned()
        .collect();

    match filter.sort {
        Some(SortKey::Progress) => {
            listed.sort_by(|a, b| b.progress_percent.cmp(&a.progress_percent));
        }
        Some(SortKey::Name) => {
            listed.sort_by_cached_key(|entity| entity.display_name.to_lowercase());
        }
        None => {}
    }

    listed
}

// ========================================
// Circles
// ========================================

/// Founders sharing a group id
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Circle {
    pub group_id: String,
    pub members: Vec<CanonicalEntity>,
}

/// Group entities by `group_id` (default `"1"`)
///
/// Circles are ordered numerically when ids are numbers, numeric ids first,
/// then the rest alphabetically. Members keep their input order.
pub fn group_by_circle(entities: &[CanonicalEntity]) -> Vec<Circle> {
    let mut circles: Vec<Circle> = Vec::new();

    for entity in entities {
        let group_id = entity
            .group_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(DEFAULT_GROUP_ID);

        match circles.iter_mut().find(|circle| circle.group_id == group_id) {
            Some(circle) => circle.members.push(entity.clone()),
            None => circles.push(Circle {
                group_id: group_id.to_string(),
                members: vec![entity.clone()],
            }),
        }
    }

    circles.sort_by(|a, b| compare_group_ids(&a.group_id, &b.group_id));
    circles
}

fn compare_group_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<i64>(), b.parse::<i64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

// ========================================
// Overrides
// ========================================

/// Save override fields for `identity` and return the updated entity
///
/// `base` is the entity from the latest reconciliation pass, if the identity
/// was part of it; otherwise the entity is built from the override alone.
pub fn apply_override<S: KeyValueStore>(
    store: &mut OverrideStore<S>,
    base: Option<&CanonicalEntity>,
    identity: IdentityKey,
    partial: EntityFields,
) -> Result<CanonicalEntity> {
    if identity.as_str().trim().is_empty() {
        return Err(Error::InvalidInput("identity must not be empty".to_string()));
    }
    partial.validate()?;

    let record = store.merge(identity.clone(), partial);
    let mut entity = base
        .cloned()
        .unwrap_or_else(|| CanonicalEntity::empty(identity.clone()));
    apply_override_fields(&mut entity, &record.fields);

    info!(identity = %identity, "Override applied");
    Ok(entity)
}

/// Remove the override for `identity`; returns whether one existed
pub fn clear_override<S: KeyValueStore>(store: &mut OverrideStore<S>, identity: &IdentityKey) -> bool {
    let cleared = store.clear(identity);
    if cleared {
        info!(identity = %identity, "Override cleared");
    }
    cleared
}

//! Override editing
//!
//! PUT    /api/entities/:identity/override  body: partial entity fields
//! DELETE /api/entities/:identity/override

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use roster_common::roster;
use roster_common::{CanonicalEntity, EntityFields, IdentityKey};
use serde::Serialize;
use tracing::warn;

use crate::error::ApiResult;
use crate::{session, AppState};

/// Save override fields and return the updated entity
///
/// The base entity comes from a fresh reconciliation pass. If the sources are
/// unavailable the override is still saved and the entity is built from the
/// override alone.
pub async fn save_override(
    State(state): State<AppState>,
    Path(identity): Path<String>,
    payload: Result<Json<EntityFields>, JsonRejection>,
) -> ApiResult<Json<CanonicalEntity>> {
    let Json(fields) = payload?;
    let identity = IdentityKey::new(identity.trim());
    fields.validate()?;

    let base = match session::load(&state).await {
        Ok(session) => session.reconciliation.find(&identity).cloned(),
        Err(e) => {
            warn!(identity = %identity, error = %e, "Saving override without a base entity");
            None
        }
    };

    let mut overrides = state.overrides.lock().await;
    let entity = roster::apply_override(&mut *overrides, base.as_ref(), identity, fields)?;

    Ok(Json(entity))
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub cleared: bool,
}

pub async fn clear_override(
    State(state): State<AppState>,
    Path(identity): Path<String>,
) -> ApiResult<Json<ClearResponse>> {
    let identity = IdentityKey::new(identity.trim());
    let mut overrides = state.overrides.lock().await;

    Ok(Json(ClearResponse {
        cleared: roster::clear_override(&mut *overrides, &identity),
    }))
}

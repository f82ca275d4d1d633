//! Roster listing
//!
//! GET /api/entities?house=&sort=

use axum::{
    extract::{Query, State},
    Json,
};
use roster_common::reconcile::SourceKind;
use roster_common::roster::{self, ListFilter};
use roster_common::{CanonicalEntity, IdentityKey};
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::{session, AppState};

/// Query parameters for listing
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// House literal, or `all`
    pub house: Option<String>,
    /// `progress` or `name`
    pub sort: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EntitiesResponse {
    pub source: SourceKind,
    pub me: Option<IdentityKey>,
    pub total: usize,
    pub entities: Vec<CanonicalEntity>,
}

pub async fn list_entities(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<EntitiesResponse>> {
    // Reject bad filters before touching the sources
    let filter = ListFilter::parse(query.house.as_deref(), query.sort.as_deref())?;

    let session = session::load(&state).await?;
    let entities = roster::list_entities(&session.reconciliation.entities, &filter);

    Ok(Json(EntitiesResponse {
        source: session.reconciliation.source,
        me: session.me,
        total: entities.len(),
        entities,
    }))
}

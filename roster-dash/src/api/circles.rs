//! GET /api/circles

use axum::{extract::State, Json};
use roster_common::reconcile::SourceKind;
use roster_common::roster::{self, Circle};
use serde::Serialize;

use crate::error::ApiResult;
use crate::{session, AppState};

#[derive(Debug, Serialize)]
pub struct CirclesResponse {
    pub source: SourceKind,
    pub circles: Vec<Circle>,
}

pub async fn list_circles(State(state): State<AppState>) -> ApiResult<Json<CirclesResponse>> {
    let session = session::load(&state).await?;

    Ok(Json(CirclesResponse {
        source: session.reconciliation.source,
        circles: roster::group_by_circle(&session.reconciliation.entities),
    }))
}

//! Login-code authentication
//!
//! POST /api/auth `{"code": "..."}`. A well-formed code that matches nobody
//! is `{"matched": false}` with 200; only malformed codes are errors.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use roster_common::credential;
use roster_common::roster::{self, AuthOutcome};
use serde::Deserialize;
use tracing::info;

use crate::error::ApiResult;
use crate::{session, AppState};

#[derive(Debug, Deserialize)]
pub struct AuthRequest {
    pub code: String,
}

pub async fn authenticate(
    State(state): State<AppState>,
    payload: Result<Json<AuthRequest>, JsonRejection>,
) -> ApiResult<Json<AuthOutcome>> {
    let Json(request) = payload?;
    credential::validate_code(&request.code)?;

    let session = session::load(&state).await?;
    let outcome = roster::authenticate(&request.code, &session.reconciliation.entities)?;

    match &outcome.entity {
        Some(entity) => info!(identity = %entity.identity, "Login code accepted"),
        None => info!("Login code matched no entity"),
    }

    Ok(Json(outcome))
}

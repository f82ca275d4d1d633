//! Per-request reconciliation
//!
//! Fetches the live feed and the current user's profile concurrently, reads
//! the snapshot only when it is needed, and reconciles against the shared
//! override store.

use roster_common::reconcile::{reconcile_sources, Reconciliation};
use roster_common::{Error, IdentityKey};
use tracing::warn;

use crate::error::ApiResult;
use crate::AppState;

/// One reconciliation pass plus "which entity is mine"
#[derive(Debug, Clone)]
pub struct Session {
    pub reconciliation: Reconciliation,
    pub me: Option<IdentityKey>,
}

/// Reconcile the roster for one request
///
/// A failed profile fetch only leaves `me` unknown. Fails with
/// `Unavailable` when neither source can be obtained.
pub async fn load(state: &AppState) -> ApiResult<Session> {
    let (events, profile) = if state.ctx.is_demo() {
        (
            Err(Error::source_unavailable("live", "demo mode")),
            Ok(None),
        )
    } else {
        tokio::join!(state.feed.fetch_events(), state.feed.fetch_profile())
    };

    let me = profile.unwrap_or_else(|e| {
        warn!(error = %e, "Profile fetch failed; current user unknown");
        None
    });

    let live_usable = matches!(&events, Ok(records) if !records.is_empty());
    let snapshot = if live_usable {
        Ok(Vec::new())
    } else {
        if let Err(e) = &events {
            warn!(error = %e, "Live feed unavailable; trying snapshot");
        }
        state.snapshot.load().await
    };

    let overrides = state.overrides.lock().await;
    let reconciliation = reconcile_sources(&state.ctx, events, snapshot, &*overrides)?;

    Ok(Session { reconciliation, me })
}

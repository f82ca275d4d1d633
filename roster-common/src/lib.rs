//! # Roster Common Library
//!
//! Entity reconciliation for the founder roster:
//! - Canonical entity model and raw source records
//! - Identity resolution and field normalization
//! - Login code derivation and verification
//! - Override store over a pluggable key-value backend
//! - Reconciliation of live feed / snapshot / overrides
//! - Roster operations (listing, circles, authentication, overrides)
//! - Configuration loading

pub mod config;
pub mod context;
pub mod credential;
pub mod error;
pub mod identity;
pub mod model;
pub mod normalize;
pub mod overrides;
pub mod reconcile;
pub mod roster;
pub mod store;
pub mod time;

pub use context::{RosterContext, SourceMode};
pub use error::{Error, Result};
pub use model::{CanonicalEntity, EntityFields, House, IdentityKey};

//! HTTP API handlers for roster-dash

pub mod auth;
pub mod circles;
pub mod entities;
pub mod health;
pub mod overrides;

pub use auth::authenticate;
pub use circles::list_circles;
pub use entities::list_entities;
pub use health::health_routes;
pub use overrides::{clear_override, save_override};

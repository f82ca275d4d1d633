//! Login codes derived from identity
//!
//! There is no credential store. A founder's login code is the standard
//! base64 encoding of `"login:" + identity`, unless a source supplied an
//! explicit code. Verification accepts either.
//!
//! # Rules
//!
//! - Codes are trimmed; anything shorter than [`MIN_CODE_LENGTH`] is rejected
//!   as invalid before any comparison happens
//! - Candidates are tried in order; the first whose stored code or derived
//!   code equals the input wins
//! - A handful of legacy codes predate derived codes; they select a founder
//!   by a known name/website fragment (see [`LEGACY_CODES`])

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::model::{CanonicalEntity, IdentityKey};
use crate::{Error, Result};

/// Shortest code accepted for comparison
pub const MIN_CODE_LENGTH: usize = 7;

const LOGIN_PREFIX: &str = "login:";

/// Legacy login codes handed out before codes were derived from identity
///
/// Each maps a literal code to a fragment that must appear in the founder's
/// display name, organization name or website (case-insensitive).
pub const LEGACY_CODES: &[(&str, &str)] = &[
    ("demo2024", "demo"),
    ("founders-lab", "founderslab"),
];

/// Derive the login code for an identity
///
/// # Examples
///
/// ```
/// use roster_common::credential::derive;
/// use roster_common::model::IdentityKey;
///
/// // base64("login:1750")
/// assert_eq!(derive(&IdentityKey::new("1750")), "bG9naW46MTc1MA==");
/// ```
pub fn derive(identity: &IdentityKey) -> String {
    STANDARD.encode(format!("{}{}", LOGIN_PREFIX, identity))
}

/// Recover the identity from a derived code
///
/// Returns `None` for anything [`derive`] could not have produced.
pub fn decode(code: &str) -> Option<IdentityKey> {
    let bytes = STANDARD.decode(code.trim()).ok()?;
    let text = String::from_utf8(bytes).ok()?;
    text.strip_prefix(LOGIN_PREFIX)
        .filter(|identity| !identity.is_empty())
        .map(IdentityKey::new)
}

/// Reject codes that are too short to compare
pub fn validate_code(code: &str) -> Result<&str> {
    let code = code.trim();
    let length = code.chars().count();
    if length < MIN_CODE_LENGTH {
        return Err(Error::InvalidCredentialInput(format!(
            "login code must be at least {} characters (got {})",
            MIN_CODE_LENGTH, length
        )));
    }
    Ok(code)
}

/// Find the founder a login code belongs to
///
/// # Errors
///
/// `InvalidCredentialInput` when the code is shorter than
/// [`MIN_CODE_LENGTH`]. No match is `Ok(None)`, not an error.
pub fn verify(code: &str, candidates: &[CanonicalEntity]) -> Result<Option<IdentityKey>> {
    let code = validate_code(code)?;

    let matched = candidates
        .iter()
        .find(|entity| entity.login_code == code || derive(&entity.identity) == code)
        .or_else(|| legacy_match(code, candidates));

    Ok(matched.map(|entity| entity.identity.clone()))
}

fn legacy_match<'a>(code: &str, candidates: &'a [CanonicalEntity]) -> Option<&'a CanonicalEntity> {
    let (_, fragment) = LEGACY_CODES.iter().find(|(legacy, _)| *legacy == code)?;
    tracing::debug!(fragment = %fragment, "Legacy login code used");

    candidates.iter().find(|entity| {
        [
            Some(entity.display_name.as_str()),
            Some(entity.organization_name.as_str()),
            entity.website_url.as_deref(),
        ]
        .into_iter()
        .flatten()
        .any(|text| text.to_lowercase().contains(fragment))
    })
}

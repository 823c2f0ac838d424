//! Session record persisted in the sealed cookie

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::oauth::TokenSet;
use crate::session::cookie::CookiePolicy;

/// Claims that describe the token rather than the user and never enter `Session.user`
pub const RESERVED_CLAIMS: [&str; 5] = ["aud", "exp", "iat", "iss", "nonce"];

/// Claim name to claim value, as found in the ID token
pub type UserClaims = Map<String, Value>;

/// The authenticated-user record stored in the session cookie
///
/// Sessions are replaced wholesale on every login; nothing mutates one in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// ID token claims without the reserved ones
    pub user: UserClaims,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Milliseconds since epoch
    pub created_at: i64,
}

impl Session {
    /// Build a session from an exchanged token set, keeping only the tokens the policy retains
    #[must_use]
    pub fn from_token_set(tokens: &TokenSet, policy: &CookiePolicy) -> Self {
        Self {
            user: strip_reserved_claims(tokens.claims()),
            id_token: tokens.id_token.clone().filter(|_| policy.store_id_token),
            access_token: tokens
                .access_token
                .clone()
                .filter(|_| policy.store_access_token),
            refresh_token: tokens
                .refresh_token
                .clone()
                .filter(|_| policy.store_refresh_token),
            created_at: Utc::now().timestamp_millis(),
        }
    }

    /// Check the shape of the session before it is sealed
    ///
    /// # Errors
    ///
    /// Returns a description of the first rule the session breaks
    pub fn validate(&self) -> Result<(), String> {
        if self.created_at < 0 {
            return Err("createdAt must be a non-negative timestamp".to_string());
        }

        let tokens = [
            ("idToken", &self.id_token),
            ("accessToken", &self.access_token),
            ("refreshToken", &self.refresh_token),
        ];
        for (name, token) in tokens {
            if token.as_deref().is_some_and(str::is_empty) {
                return Err(format!("{name} must not be empty when present"));
            }
        }

        Ok(())
    }
}

/// Copy every claim except the [`RESERVED_CLAIMS`] into a new map
#[must_use]
pub fn strip_reserved_claims(claims: &UserClaims) -> UserClaims {
    claims
        .iter()
        .filter(|(name, _)| !RESERVED_CLAIMS.contains(&name.as_str()))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

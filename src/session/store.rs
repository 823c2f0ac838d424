//! Session Store - reading and writing the sealed session cookie
//!
//! Session state lives entirely in the browser cookie. The store owns the
//! serialization contract and cookie policy and delegates confidentiality and
//! integrity to the sealing primitive in [`crate::utils::crypto`].
//!
//! Verification failures (absent, empty, tampered or expired cookies) are never
//! surfaced as errors: [`SessionStore::read`] simply reports that there is no
//! session.

use actix_web::HttpRequest;
use chrono::Duration;
use thiserror::Error;

use crate::session::cookie::{non_empty_cookie, CookiePolicy, ResponseCookies};
use crate::session::model::Session;
use crate::settings::DEFAULT_COOKIE_LIFETIME_SECS;
use crate::utils::crypto::{seal_data, unseal_data, SealError};
use crate::utils::logging::LoggingHelper;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid session: {0}")]
    Validation(String),
    #[error("failed to seal session: {0}")]
    Seal(#[from] SealError),
    #[error("cookie lifetime out of range: {0}s")]
    Lifetime(i64),
}

#[derive(Debug, Clone)]
pub struct SessionStore {
    policy: CookiePolicy,
    secret: String,
}

impl SessionStore {
    #[must_use]
    pub fn new(policy: CookiePolicy, secret: impl Into<String>) -> Self {
        Self {
            policy,
            secret: secret.into(),
        }
    }

    #[must_use]
    pub const fn policy(&self) -> &CookiePolicy {
        &self.policy
    }

    /// Read the current session from the request cookies
    ///
    /// Returns `None` when the cookie is absent or empty, and when it fails to
    /// unseal for any reason.
    #[must_use]
    pub fn read(&self, req: &HttpRequest) -> Option<Session> {
        let token = non_empty_cookie(req, &self.policy.name)?;
        Self::unseal(&token, &self.secret)
    }

    /// Seal the session and set it on the response under the configured policy
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The session fails shape validation
    /// - The policy lifetime is not a representable duration
    /// - Sealing fails
    pub fn write(&self, res: &mut ResponseCookies, session: &Session) -> Result<(), SessionError> {
        session.validate().map_err(SessionError::Validation)?;

        let lifetime = self.policy.lifetime_secs;
        let ttl = Duration::try_seconds(lifetime).ok_or(SessionError::Lifetime(lifetime))?;
        let token = seal_data(session, &self.secret, Some(ttl))?;
        res.set(self.policy.session_cookie(token));

        Ok(())
    }

    /// Set an expired session cookie on the response
    pub fn clear(&self, res: &mut ResponseCookies) {
        res.set(self.policy.expired_cookie(&self.policy.name));
    }

    /// Seal a session without a store, using the default cookie lifetime
    ///
    /// # Errors
    ///
    /// Returns an error if the secret is empty or the session cannot be sealed
    pub fn seal(session: &Session, secret: &str) -> Result<String, SealError> {
        seal_data(
            session,
            secret,
            Some(Duration::seconds(DEFAULT_COOKIE_LIFETIME_SECS)),
        )
    }

    /// Verify and open a sealed session without a store
    #[must_use]
    pub fn unseal(token: &str, secret: &str) -> Option<Session> {
        match unseal_data::<Session>(token, secret) {
            Ok(session) => Some(session),
            Err(e) => {
                LoggingHelper::log_unseal_failure(&e);
                None
            }
        }
    }
}

//! Authenticated-read hook for callers that only hold the raw request

use actix_web::HttpRequest;
use serde::Serialize;

use crate::session::cookie::parse_cookies;
use crate::session::model::Session;
use crate::session::store::SessionStore;
use crate::settings::{ConfigError, DEFAULT_COOKIE_NAME};

/// Where to find the session cookie and how to open it
#[derive(Debug, Clone)]
pub struct SessionHookOptions {
    pub secret: String,
    pub cookie_name: String,
}

impl SessionHookOptions {
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
        }
    }

    #[must_use]
    pub fn with_cookie_name(mut self, cookie_name: impl Into<String>) -> Self {
        self.cookie_name = cookie_name.into();
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.cookie_name.trim().is_empty() {
            return Err(ConfigError::single("cookie_name", "must not be empty"));
        }
        if self.secret.is_empty() {
            return Err(ConfigError::single("secret", "must not be empty"));
        }
        Ok(())
    }
}

/// Outcome of verifying the request's session cookie
#[derive(Debug, Clone, PartialEq)]
pub enum SessionStatus {
    Authenticated(Session),
    Unauthenticated,
}

impl SessionStatus {
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    #[must_use]
    pub const fn session(&self) -> Option<&Session> {
        match self {
            Self::Authenticated(session) => Some(session),
            Self::Unauthenticated => None,
        }
    }

    #[must_use]
    pub fn into_session(self) -> Option<Session> {
        match self {
            Self::Authenticated(session) => Some(session),
            Self::Unauthenticated => None,
        }
    }
}

impl From<Option<Session>> for SessionStatus {
    fn from(session: Option<Session>) -> Self {
        session.map_or(Self::Unauthenticated, Self::Authenticated)
    }
}

/// Serialized as `{"authenticated": bool, "session": Session | null}`
impl Serialize for SessionStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Wire<'a> {
            authenticated: bool,
            session: Option<&'a Session>,
        }

        Wire {
            authenticated: self.is_authenticated(),
            session: self.session(),
        }
        .serialize(serializer)
    }
}

/// Verify the session cookie on a raw request without a [`SessionStore`] instance
///
/// Absent, empty, tampered and expired cookies all yield
/// [`SessionStatus::Unauthenticated`].
///
/// # Errors
///
/// Returns a [`ConfigError`] only when the options themselves are unusable
/// (empty cookie name or secret).
pub fn use_session(
    req: &HttpRequest,
    options: &SessionHookOptions,
) -> Result<SessionStatus, ConfigError> {
    options.validate()?;

    let status = parse_cookies(req)
        .remove(&options.cookie_name)
        .filter(|value| !value.is_empty())
        .and_then(|token| SessionStore::unseal(&token, &options.secret))
        .into();

    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::constants::TEST_COOKIE_SECRET;
    use crate::testing::{RequestBuilder, TestFixtures};
    use serde_json::json;

    #[test]
    fn test_authenticated_with_valid_cookie() {
        let session = TestFixtures::session();
        let token = SessionStore::seal(&session, TEST_COOKIE_SECRET).unwrap();
        let req = RequestBuilder::with_cookies(&format!("a0:session={token}"));

        let status = use_session(&req, &SessionHookOptions::new(TEST_COOKIE_SECRET)).unwrap();
        assert!(status.is_authenticated());
        assert_eq!(status.into_session(), Some(session));
    }

    #[test]
    fn test_custom_cookie_name() {
        let token = SessionStore::seal(&TestFixtures::session(), TEST_COOKIE_SECRET).unwrap();
        let req = RequestBuilder::with_cookies(&format!("app_session={token}"));

        let default_name = SessionHookOptions::new(TEST_COOKIE_SECRET);
        assert!(!use_session(&req, &default_name).unwrap().is_authenticated());

        let custom = default_name.with_cookie_name("app_session");
        assert!(use_session(&req, &custom).unwrap().is_authenticated());
    }

    #[test]
    fn test_tampered_cookie_is_unauthenticated() {
        let req = RequestBuilder::with_cookies("a0:session=sc1.tampered.0.value");
        let status = use_session(&req, &SessionHookOptions::new(TEST_COOKIE_SECRET)).unwrap();

        assert_eq!(status, SessionStatus::Unauthenticated);
        assert_eq!(
            serde_json::to_value(&status).unwrap(),
            json!({"authenticated": false, "session": null})
        );
    }

    #[test]
    fn test_missing_cookie_is_unauthenticated() {
        let status = use_session(
            &RequestBuilder::empty_request(),
            &SessionHookOptions::new(TEST_COOKIE_SECRET),
        )
        .unwrap();
        assert!(status.session().is_none());
    }

    #[test]
    fn test_invalid_options_are_errors() {
        let req = RequestBuilder::empty_request();

        let err = use_session(&req, &SessionHookOptions::new("")).unwrap_err();
        assert!(err.has_violation("secret"));

        let options = SessionHookOptions::new(TEST_COOKIE_SECRET).with_cookie_name(" ");
        let err = use_session(&req, &options).unwrap_err();
        assert!(err.has_violation("cookie_name"));
    }

    #[test]
    fn test_authenticated_status_serialization() {
        let session = TestFixtures::session();
        let value = serde_json::to_value(SessionStatus::Authenticated(session.clone())).unwrap();

        assert_eq!(value["authenticated"], json!(true));
        assert_eq!(value["session"]["user"]["sub"], session.user["sub"]);
    }
}

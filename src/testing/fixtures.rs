//! Pre-built test data

use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;

use super::constants::{
    TEST_CLIENT_ID, TEST_CLIENT_SECRET, TEST_COOKIE_SECRET, TEST_DOMAIN, TEST_EMAIL, TEST_ISSUER,
    TEST_USER_ID, TEST_USER_NAME,
};
use super::mock::MockClientFactory;
use crate::handshake::Handshake;
use crate::oauth::TokenSet;
use crate::session::{strip_reserved_claims, CookiePolicy, Session, SessionStore, UserClaims};
use crate::settings::AuthSettings;

pub struct TestFixtures;

impl TestFixtures {
    /// Valid settings for the test tenant
    #[must_use]
    pub fn settings() -> AuthSettings {
        let mut settings = AuthSettings {
            domain: TEST_DOMAIN.to_string(),
            client_id: TEST_CLIENT_ID.to_string(),
            client_secret: TEST_CLIENT_SECRET.to_string(),
            post_login_redirect: "https://app.example.com/".to_string(),
            post_logout_redirect: "https://app.example.com/goodbye".to_string(),
            scope: "openid profile email".to_string(),
            ..AuthSettings::default()
        };
        settings.cookie.secret = TEST_COOKIE_SECRET.to_string();
        settings
    }

    #[must_use]
    pub fn cookie_policy() -> CookiePolicy {
        CookiePolicy::from_settings(&Self::settings().cookie)
    }

    #[must_use]
    pub fn session_store() -> SessionStore {
        SessionStore::new(Self::cookie_policy(), TEST_COOKIE_SECRET)
    }

    /// ID token claims as issued for `nonce`, reserved claims included
    ///
    /// # Panics
    ///
    /// Panics if the claims literal stops being a JSON object.
    #[must_use]
    pub fn claims(nonce: &str) -> UserClaims {
        let now = Utc::now().timestamp();
        json!({
            "sub": TEST_USER_ID,
            "email": TEST_EMAIL,
            "email_verified": true,
            "name": TEST_USER_NAME,
            "iss": TEST_ISSUER,
            "aud": TEST_CLIENT_ID,
            "iat": now,
            "exp": now + 3600,
            "nonce": nonce
        })
        .as_object()
        .cloned()
        .expect("claims literal is an object")
    }

    /// An unsigned compact JWT carrying `claims` as its payload
    #[must_use]
    pub fn id_token(claims: &Value) -> String {
        let header = general_purpose::URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","typ":"JWT"}"#);
        let payload = general_purpose::URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("{header}.{payload}.signature")
    }

    /// A token endpoint response for `nonce` with every token present
    #[must_use]
    pub fn token_set(nonce: &str) -> TokenSet {
        let claims = Self::claims(nonce);
        TokenSet {
            access_token: Some("access-token".to_string()),
            id_token: Some(Self::id_token(&Value::Object(claims.clone()))),
            refresh_token: Some("refresh-token".to_string()),
            token_type: Some("Bearer".to_string()),
            expires_in: Some(86_400),
            scope: Some("openid profile email".to_string()),
            claims,
        }
    }

    /// A freshly created session without retained tokens
    #[must_use]
    pub fn session() -> Session {
        Session {
            user: strip_reserved_claims(&Self::claims("n1")),
            id_token: None,
            access_token: None,
            refresh_token: None,
            created_at: Utc::now().timestamp_millis(),
        }
    }

    /// `session` sealed with the test secret
    ///
    /// # Panics
    ///
    /// Panics if sealing fails.
    #[must_use]
    pub fn sealed_session(session: &Session) -> String {
        SessionStore::seal(session, TEST_COOKIE_SECRET).expect("sealing test session")
    }

    /// An orchestrator over [`Self::settings`] with a mock provider
    #[must_use]
    pub fn handshake() -> (Handshake, Arc<MockClientFactory>) {
        Self::handshake_with(|_| {})
    }

    /// Like [`Self::handshake`], with settings adjusted by `configure`
    ///
    /// # Panics
    ///
    /// Panics if the adjusted settings are invalid.
    #[must_use]
    pub fn handshake_with(
        configure: impl FnOnce(&mut AuthSettings),
    ) -> (Handshake, Arc<MockClientFactory>) {
        let mut settings = Self::settings();
        configure(&mut settings);

        let factory = Arc::new(MockClientFactory::new());
        let handshake = Handshake::with_client_factory(settings, factory.clone())
            .expect("test settings are valid");
        (handshake, factory)
    }
}

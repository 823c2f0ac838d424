//! Handshake Orchestrator - OIDC login, callback and logout
//!
//! The [`Handshake`] owns the validated settings, the session store and a
//! lazily created identity provider client. Each step works on a
//! [`ServerOption`], the request and response halves of one HTTP exchange;
//! cookies set by a step are collected in [`ResponseCookies`] and applied by the
//! HTTP layer.
//!
//! ## Organization
//!
//! - [`login`] - nonce issuance and authorization URL
//! - [`callback`] - nonce consumption, code exchange, session write
//! - [`logout`] - cookie removal and provider logout URL
//! - [`profile`] - session and user reads

pub mod callback;
pub mod login;
pub mod logout;
pub mod profile;

pub use callback::CallbackOutcome;
pub use login::{LoginOptions, LoginOutcome};
pub use logout::{LogoutOptions, LogoutOutcome};

use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, ResponseError};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::OnceCell;

use crate::oauth::{ClientFactory, IdpClient, OidcClientFactory, OidcError};
use crate::session::{CookiePolicy, ResponseCookies, SessionError, SessionStore};
use crate::settings::{AuthSettings, ConfigError};
use crate::utils::logging::LoggingHelper;

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum HandshakeError {
    /// A required request or response part was not supplied
    #[error("precondition failed: {0}")]
    Precondition(&'static str),
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("identity provider error: {0}")]
    Upstream(OidcError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Configuration(#[from] ConfigError),
}

impl HandshakeError {
    const fn kind(&self) -> &'static str {
        match self {
            Self::Precondition(_) => "precondition_failed",
            Self::Authentication(_) => "authentication_failed",
            Self::Upstream(_) => "upstream_error",
            Self::Session(_) => "session_error",
            Self::Configuration(_) => "configuration_error",
        }
    }
}

impl From<OidcError> for HandshakeError {
    fn from(err: OidcError) -> Self {
        if err.is_authentication_failure() {
            Self::Authentication(err.to_string())
        } else {
            Self::Upstream(err)
        }
    }
}

impl ResponseError for HandshakeError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Authentication(_) => StatusCode::UNAUTHORIZED,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "error": self.kind(),
            "message": self.to_string(),
        }))
    }
}

// =============================================================================
// Request/response parts
// =============================================================================

/// The request and response of one HTTP exchange; either may be absent
#[derive(Debug, Default)]
pub struct ServerOption<'a> {
    pub req: Option<&'a HttpRequest>,
    pub res: Option<&'a mut ResponseCookies>,
}

impl<'a> ServerOption<'a> {
    #[must_use]
    pub fn new(req: &'a HttpRequest, res: &'a mut ResponseCookies) -> Self {
        Self {
            req: Some(req),
            res: Some(res),
        }
    }

    #[must_use]
    pub fn request_only(req: &'a HttpRequest) -> Self {
        Self {
            req: Some(req),
            res: None,
        }
    }

    #[must_use]
    pub fn response_only(res: &'a mut ResponseCookies) -> Self {
        Self {
            req: None,
            res: Some(res),
        }
    }

    fn request(&self) -> Result<&'a HttpRequest, HandshakeError> {
        self.req
            .ok_or(HandshakeError::Precondition("a request object is required"))
    }

    fn response(&mut self) -> Result<&mut ResponseCookies, HandshakeError> {
        self.res
            .as_deref_mut()
            .ok_or(HandshakeError::Precondition("a response object is required"))
    }
}

// =============================================================================
// Orchestrator
// =============================================================================

pub struct Handshake {
    settings: Arc<AuthSettings>,
    store: SessionStore,
    factory: Arc<dyn ClientFactory>,
    client: OnceCell<Arc<dyn IdpClient>>,
}

impl Handshake {
    /// Create an orchestrator backed by OIDC discovery of `settings.domain`
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] listing every invalid setting
    pub fn new(settings: AuthSettings) -> Result<Self, ConfigError> {
        let factory = Arc::new(OidcClientFactory::from_settings(&settings));
        Self::with_client_factory(settings, factory)
    }

    /// Create an orchestrator that obtains its client from `factory`
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] listing every invalid setting
    pub fn with_client_factory(
        settings: AuthSettings,
        factory: Arc<dyn ClientFactory>,
    ) -> Result<Self, ConfigError> {
        settings.validate()?;

        let store = SessionStore::new(
            CookiePolicy::from_settings(&settings.cookie),
            settings.cookie.secret.clone(),
        );

        Ok(Self {
            settings: Arc::new(settings),
            store,
            factory,
            client: OnceCell::new(),
        })
    }

    #[must_use]
    pub fn settings(&self) -> &AuthSettings {
        &self.settings
    }

    #[must_use]
    pub const fn store(&self) -> &SessionStore {
        &self.store
    }

    /// An empty cookie collector, `Secure` in production
    #[must_use]
    pub fn response_cookies(&self) -> ResponseCookies {
        ResponseCookies::new(self.settings.environment.is_production())
    }

    /// The identity provider client, created on first use
    ///
    /// Concurrent first callers share a single creation; a failed creation is
    /// not cached and is retried by the next caller.
    ///
    /// # Errors
    ///
    /// Returns [`HandshakeError::Upstream`] if the client cannot be created
    pub async fn client(&self) -> Result<Arc<dyn IdpClient>, HandshakeError> {
        let client = self
            .client
            .get_or_try_init(|| async {
                self.factory.create_client().await.inspect_err(|e| {
                    LoggingHelper::log_client_init_failed(e);
                })
            })
            .await?;

        Ok(Arc::clone(client))
    }
}

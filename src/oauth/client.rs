use actix_web::{web, HttpRequest};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use url::Url;

use crate::session::model::UserClaims;

/// Query parameters of an authorization request, kept in stable key order
pub type AuthorizationParams = BTreeMap<String, String>;

#[derive(Debug, Error)]
pub enum OidcError {
    #[error("identity provider discovery failed: {0}")]
    Discovery(String),
    #[error("request to identity provider failed: {0}")]
    Network(String),
    #[error("token endpoint returned {status}: {message}")]
    TokenEndpoint { status: u16, message: String },
    #[error("identity provider returned error '{error}'{}", describe(.description))]
    Provider {
        error: String,
        description: Option<String>,
    },
    #[error("missing callback parameter: {0}")]
    MissingParameter(&'static str),
    #[error("invalid ID token: {0}")]
    InvalidIdToken(String),
    #[error("ID token claim check failed: {0}")]
    ClaimMismatch(String),
    #[error("invalid authorization request: {0}")]
    InvalidRequest(String),
}

fn describe(description: &Option<String>) -> String {
    description
        .as_deref()
        .map(|d| format!(": {d}"))
        .unwrap_or_default()
}

impl OidcError {
    /// Whether the failure says the user is not authenticated rather than the provider being unreachable
    #[must_use]
    pub const fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            Self::Provider { .. }
                | Self::MissingParameter(_)
                | Self::InvalidIdToken(_)
                | Self::ClaimMismatch(_)
        )
    }
}

impl From<reqwest::Error> for OidcError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

/// Tokens returned by the token endpoint plus the decoded ID token claims
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenSet {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(skip)]
    pub claims: UserClaims,
}

impl TokenSet {
    /// ID token claim set
    #[must_use]
    pub const fn claims(&self) -> &UserClaims {
        &self.claims
    }
}

/// Parameters the identity provider appends to the redirect URI
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Values the code exchange must verify against the returned ID token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackChecks {
    pub nonce: String,
}

/// An OIDC client bound to one discovered identity provider
#[async_trait]
pub trait IdpClient: Send + Sync {
    /// Build the authorization endpoint URL for `params`
    ///
    /// # Errors
    ///
    /// Returns an error if the authorization endpoint is not a valid URL
    fn authorization_url(&self, params: &AuthorizationParams) -> Result<String, OidcError>;

    /// Extract callback parameters from the request's query string
    fn callback_params(&self, req: &HttpRequest) -> CallbackParams {
        parse_callback_params(req)
    }

    /// Exchange the authorization code for tokens and verify the ID token
    ///
    /// # Errors
    ///
    /// Returns an error if the provider reported an error, the exchange fails,
    /// or the ID token does not pass the claim checks
    async fn callback(
        &self,
        redirect_uri: &str,
        params: CallbackParams,
        checks: CallbackChecks,
    ) -> Result<TokenSet, OidcError>;
}

/// Produces [`IdpClient`] handles, typically after provider discovery
#[async_trait]
pub trait ClientFactory: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the client cannot be created (e.g. discovery fails)
    async fn create_client(&self) -> Result<Arc<dyn IdpClient>, OidcError>;
}

/// Parse `code`, `state`, `error` and `error_description` from the query string
#[must_use]
pub fn parse_callback_params(req: &HttpRequest) -> CallbackParams {
    web::Query::<CallbackParams>::from_query(req.query_string())
        .map(web::Query::into_inner)
        .unwrap_or_else(|e| {
            log::warn!("Failed to parse callback query parameters: {e}");
            CallbackParams::default()
        })
}

/// Append `client_id` and `params` to the authorization endpoint
///
/// Keys and values are percent-encoded (spaces become `%20`).
///
/// # Errors
///
/// Returns an error if `endpoint` is not an absolute URL
pub fn build_authorization_url(
    endpoint: &str,
    client_id: &str,
    params: &AuthorizationParams,
) -> Result<String, OidcError> {
    let base = Url::parse(endpoint)
        .map_err(|e| OidcError::InvalidRequest(format!("invalid authorization endpoint: {e}")))?;

    let mut query: BTreeMap<&str, &str> = params
        .iter()
        .map(|(key, value)| (key.as_str(), value.as_str()))
        .collect();
    query.insert("client_id", client_id);

    let encoded = query
        .iter()
        .map(|(key, value)| {
            format!(
                "{}={}",
                urlencoding::encode(key),
                urlencoding::encode(value)
            )
        })
        .collect::<Vec<_>>()
        .join("&");

    let separator = if base.query().is_some() { '&' } else { '?' };
    Ok(format!("{base}{separator}{encoded}"))
}

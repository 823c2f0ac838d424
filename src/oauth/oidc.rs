// reqwest-backed OIDC client: authorization URL, code exchange and ID token claim checks
//
// Only the claim set of the ID token is inspected. Signature and JWKS validation are
// left to the identity provider's TLS-protected token endpoint.

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::oauth::client::{
    build_authorization_url, AuthorizationParams, CallbackChecks, CallbackParams, ClientFactory,
    IdpClient, OidcError, TokenSet,
};
use crate::oauth::discovery::{fetch_discovery_document, OidcDiscoveryDocument};
use crate::session::model::UserClaims;
use crate::settings::AuthSettings;
use crate::utils::logging::LoggingHelper;

/// Error body returned by OAuth endpoints on failure
#[derive(Debug, Deserialize)]
struct OAuthErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Expected values for the ID token claim checks
#[derive(Debug, Clone)]
pub struct ClaimExpectations<'a> {
    pub issuer: &'a str,
    pub client_id: &'a str,
    pub nonce: &'a str,
    /// Leeway for `exp`/`iat`, in seconds
    pub tolerance_secs: i64,
    /// Current time, in seconds since epoch
    pub now_secs: i64,
}

pub struct OidcClient {
    http: reqwest::Client,
    metadata: OidcDiscoveryDocument,
    client_id: String,
    client_secret: String,
    tolerance_secs: i64,
}

impl OidcClient {
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        metadata: OidcDiscoveryDocument,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        clock_tolerance_ms: Option<u64>,
    ) -> Self {
        let tolerance_secs = clock_tolerance_ms
            .map_or(0, |ms| i64::try_from(ms / 1000).unwrap_or(i64::MAX));
        Self {
            http,
            metadata,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            tolerance_secs,
        }
    }

    async fn exchange_code(&self, redirect_uri: &str, code: &str) -> Result<TokenSet, OidcError> {
        LoggingHelper::log_token_exchange_start(&self.metadata.issuer);

        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];

        let response = self
            .http
            .post(&self.metadata.token_endpoint)
            .header("Accept", "application/json")
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<OAuthErrorResponse>(&body).map_or_else(
                |_| format!("unexpected response ({} bytes)", body.len()),
                |err| match err.error_description {
                    Some(description) => format!("{}: {description}", err.error),
                    None => err.error,
                },
            );
            return Err(OidcError::TokenEndpoint {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body)
            .map_err(|e| OidcError::Network(format!("failed to parse token response: {e}")))
    }
}

#[async_trait]
impl IdpClient for OidcClient {
    fn authorization_url(&self, params: &AuthorizationParams) -> Result<String, OidcError> {
        build_authorization_url(&self.metadata.authorization_endpoint, &self.client_id, params)
    }

    async fn callback(
        &self,
        redirect_uri: &str,
        params: CallbackParams,
        checks: CallbackChecks,
    ) -> Result<TokenSet, OidcError> {
        if let Some(error) = params.error {
            return Err(OidcError::Provider {
                error,
                description: params.error_description,
            });
        }
        let code = params.code.ok_or(OidcError::MissingParameter("code"))?;

        let mut tokens = self.exchange_code(redirect_uri, &code).await?;
        let id_token = tokens.id_token.as_deref().ok_or_else(|| {
            OidcError::InvalidIdToken("token response did not include an id_token".to_string())
        })?;

        let claims = decode_id_token_claims(id_token)?;
        verify_id_token_claims(
            &claims,
            &ClaimExpectations {
                issuer: &self.metadata.issuer,
                client_id: &self.client_id,
                nonce: &checks.nonce,
                tolerance_secs: self.tolerance_secs,
                now_secs: Utc::now().timestamp(),
            },
        )?;

        LoggingHelper::log_token_exchange_summary(&tokens);
        tokens.claims = claims;
        Ok(tokens)
    }
}

/// Creates [`OidcClient`]s by discovering the configured provider
pub struct OidcClientFactory {
    domain: String,
    client_id: String,
    client_secret: String,
    http_timeout_ms: Option<u64>,
    clock_tolerance_ms: Option<u64>,
}

impl OidcClientFactory {
    #[must_use]
    pub fn from_settings(settings: &AuthSettings) -> Self {
        Self {
            domain: settings.domain.clone(),
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
            http_timeout_ms: settings.client.http_timeout_ms,
            clock_tolerance_ms: settings.client.clock_tolerance_ms,
        }
    }

    fn http_client(&self) -> Result<reqwest::Client, OidcError> {
        let mut builder = reqwest::Client::builder();
        if let Some(ms) = self.http_timeout_ms {
            builder = builder.timeout(Duration::from_millis(ms));
        }
        Ok(builder.build()?)
    }
}

#[async_trait]
impl ClientFactory for OidcClientFactory {
    async fn create_client(&self) -> Result<Arc<dyn IdpClient>, OidcError> {
        let http = self.http_client()?;
        let metadata = fetch_discovery_document(&http, &self.domain).await?;
        LoggingHelper::log_client_discovered(&metadata.issuer);

        let client: Arc<dyn IdpClient> = Arc::new(OidcClient::new(
            http,
            metadata,
            self.client_id.clone(),
            self.client_secret.clone(),
            self.clock_tolerance_ms,
        ));
        Ok(client)
    }
}

/// Decode the payload segment of a compact JWT into its claim set
///
/// # Errors
///
/// Returns an error if the token is not three dot-separated segments or the
/// payload is not a base64url-encoded JSON object
pub fn decode_id_token_claims(id_token: &str) -> Result<UserClaims, OidcError> {
    let parts: Vec<&str> = id_token.split('.').collect();
    let [_, payload, _] = parts.as_slice() else {
        return Err(OidcError::InvalidIdToken(
            "expected three dot-separated segments".to_string(),
        ));
    };

    let bytes = general_purpose::URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| OidcError::InvalidIdToken(format!("payload is not base64url: {e}")))?;

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(claims)) => Ok(claims),
        Ok(_) => Err(OidcError::InvalidIdToken(
            "payload is not a JSON object".to_string(),
        )),
        Err(e) => Err(OidcError::InvalidIdToken(format!(
            "payload is not valid JSON: {e}"
        ))),
    }
}

/// Check `nonce`, `iss`, `aud`, `exp` and `iat` against the expected values
///
/// # Errors
///
/// Returns [`OidcError::ClaimMismatch`] naming the first claim that fails
pub fn verify_id_token_claims(
    claims: &UserClaims,
    expected: &ClaimExpectations<'_>,
) -> Result<(), OidcError> {
    if claims.get("nonce").and_then(Value::as_str) != Some(expected.nonce) {
        return Err(OidcError::ClaimMismatch("nonce mismatch".to_string()));
    }

    if claims.get("iss").and_then(Value::as_str) != Some(expected.issuer) {
        return Err(OidcError::ClaimMismatch(format!(
            "unexpected issuer, expected {}",
            expected.issuer
        )));
    }

    let audience_matches = match claims.get("aud") {
        Some(Value::String(aud)) => aud == expected.client_id,
        Some(Value::Array(auds)) => auds
            .iter()
            .any(|aud| aud.as_str() == Some(expected.client_id)),
        _ => false,
    };
    if !audience_matches {
        return Err(OidcError::ClaimMismatch(
            "audience does not include client id".to_string(),
        ));
    }

    let exp = claims
        .get("exp")
        .and_then(Value::as_i64)
        .ok_or_else(|| OidcError::ClaimMismatch("missing exp claim".to_string()))?;
    if exp.saturating_add(expected.tolerance_secs) <= expected.now_secs {
        return Err(OidcError::ClaimMismatch("ID token has expired".to_string()));
    }

    if let Some(iat) = claims.get("iat").and_then(Value::as_i64) {
        if iat.saturating_sub(expected.tolerance_secs) > expected.now_secs {
            return Err(OidcError::ClaimMismatch(
                "ID token issued in the future".to_string(),
            ));
        }
    }

    Ok(())
}

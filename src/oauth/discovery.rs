// OIDC provider metadata discovery
use log::debug;
use serde::{Deserialize, Serialize};

use crate::oauth::client::OidcError;

/// Subset of the provider metadata document used by the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OidcDiscoveryDocument {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    #[serde(default)]
    pub jwks_uri: Option<String>,
    #[serde(default)]
    pub userinfo_endpoint: Option<String>,
    #[serde(default)]
    pub end_session_endpoint: Option<String>,
}

/// Base URL of the identity provider; bare domains are served over https
#[must_use]
pub fn issuer_base_url(domain: &str) -> String {
    let domain = domain.trim_end_matches('/');
    if domain.starts_with("https://") || domain.starts_with("http://") {
        domain.to_string()
    } else {
        format!("https://{domain}")
    }
}

#[must_use]
pub fn discovery_url(domain: &str) -> String {
    format!(
        "{}/.well-known/openid-configuration",
        issuer_base_url(domain)
    )
}

/// Fetch and parse the discovery document for `domain`
///
/// # Errors
///
/// Returns an error if:
/// - The request fails or times out
/// - The response status is not successful
/// - The body is not a valid discovery document
pub async fn fetch_discovery_document(
    http: &reqwest::Client,
    domain: &str,
) -> Result<OidcDiscoveryDocument, OidcError> {
    let url = discovery_url(domain);
    debug!("Fetching discovery document from: {url}");

    let response = http
        .get(&url)
        .send()
        .await
        .map_err(|e| OidcError::Discovery(format!("failed to fetch {url}: {e}")))?;

    if !response.status().is_success() {
        return Err(OidcError::Discovery(format!(
            "discovery request failed with status: {}",
            response.status()
        )));
    }

    let document: OidcDiscoveryDocument = response
        .json()
        .await
        .map_err(|e| OidcError::Discovery(format!("failed to parse discovery document: {e}")))?;

    debug!(
        "Discovered issuer {} (token endpoint: {})",
        document.issuer, document.token_endpoint
    );
    Ok(document)
}

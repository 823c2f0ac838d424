// Centralized logging for handshake and session events.
// Tokens, nonces and secrets are never logged, only whether they are present.
use log::{debug, info, warn};

use crate::oauth::{OidcError, TokenSet};
use crate::session::Session;
use crate::utils::crypto::SealError;

pub struct LoggingHelper;

fn presence<T>(value: Option<&T>) -> &'static str {
    if value.is_some() {
        "present"
    } else {
        "missing"
    }
}

impl LoggingHelper {
    /// Log provider discovery at first client initialization
    pub fn log_client_discovered(issuer: &str) {
        info!("✅ OIDC client initialized for issuer {issuer}");
    }

    /// Log a failed client initialization (retried on next request)
    pub fn log_client_init_failed(error: &OidcError) {
        warn!("❌ Failed to initialize OIDC client: {error}");
    }

    /// Log the start of a login with the parameters sent to the provider
    pub fn log_login_started(scope: &str, audience: Option<&str>, override_keys: &[&str]) {
        info!(
            "🔍 Starting login with scope '{scope}', audience {:?}, overrides {override_keys:?}",
            audience
        );
    }

    /// Log a caller attempt to override a parameter the handshake owns
    pub fn log_protected_override_ignored(key: &str) {
        warn!("Ignoring caller-supplied '{key}' login parameter");
    }

    /// Log a callback that arrived without a nonce cookie
    pub fn log_nonce_cookie_missing() {
        warn!("Callback rejected: no nonce cookie present (login not started or cookie expired)");
    }

    /// Log token exchange start
    pub fn log_token_exchange_start(issuer: &str) {
        info!("🔄 Exchanging authorization code for tokens with {issuer}");
    }

    /// Log token exchange summary
    pub fn log_token_exchange_summary(tokens: &TokenSet) {
        info!(
            "🔍 Token exchange summary: id_token={}, access_token={}, refresh_token={}, token_type={:?}, scope={:?}",
            presence(tokens.id_token.as_ref()),
            presence(tokens.access_token.as_ref()),
            presence(tokens.refresh_token.as_ref()),
            tokens.token_type,
            tokens.scope
        );
    }

    /// Log session creation success
    pub fn log_session_written(session: &Session) {
        let subject = session
            .user
            .get("sub")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("<unknown>");
        info!(
            "Successfully wrote session for subject: {subject} ({} claims)",
            session.user.len()
        );
    }

    /// Log logout and its return target
    pub fn log_logout(return_to: &str) {
        info!("🚪 Logging out, returning to {return_to}");
    }

    /// Log why a sealed cookie was treated as no session
    pub fn log_unseal_failure(error: &SealError) {
        debug!("Session cookie rejected: {error}");
    }
}

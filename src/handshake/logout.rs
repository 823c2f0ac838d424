use serde::{Deserialize, Serialize};

use super::{Handshake, HandshakeError, ServerOption};
use crate::oauth::issuer_base_url;
use crate::session::STATE_COOKIE;
use crate::utils::logging::LoggingHelper;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LogoutOptions {
    /// Overrides the configured post-logout redirect
    #[serde(default, rename = "returnTo")]
    pub redirect_to: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogoutOutcome {
    /// Identity provider logout URL the caller should redirect to
    pub url: String,
}

impl Handshake {
    /// Clear the state and session cookies and build the provider logout URL
    ///
    /// The provider is not contacted; the caller performs the redirect.
    ///
    /// # Errors
    ///
    /// Returns [`HandshakeError::Precondition`] if no response object is supplied
    pub fn logout(
        &self,
        mut opt: ServerOption<'_>,
        options: LogoutOptions,
    ) -> Result<LogoutOutcome, HandshakeError> {
        let res = opt.response()?;
        let policy = self.store.policy();
        res.set_all([
            policy.expired_cookie(STATE_COOKIE),
            policy.expired_cookie(&policy.name),
        ]);

        let return_to = options
            .redirect_to
            .as_deref()
            .unwrap_or(&self.settings.post_logout_redirect);
        LoggingHelper::log_logout(return_to);

        let url = format!(
            "{}/v2/logout?client_id={}&returnTo={}",
            issuer_base_url(&self.settings.domain),
            urlencoding::encode(&self.settings.client_id),
            urlencoding::encode(return_to)
        );

        Ok(LogoutOutcome { url })
    }
}

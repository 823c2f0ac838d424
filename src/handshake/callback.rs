use serde::Serialize;

use super::{Handshake, HandshakeError, ServerOption};
use crate::oauth::CallbackChecks;
use crate::session::cookie::non_empty_cookie;
use crate::session::{Session, NONCE_COOKIE};
use crate::utils::logging::LoggingHelper;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackOutcome {
    /// Where the caller should send the user next
    pub redirect_to: String,
}

impl Handshake {
    /// Complete a login: consume the nonce, exchange the code and write the session
    ///
    /// The nonce cookie is deleted before the exchange is attempted, so it is
    /// single-use whatever the exchange outcome.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The request or response object is missing
    /// - No nonce cookie is present (the exchange is not attempted)
    /// - The identity provider reports an error or the exchange fails
    /// - The session cannot be sealed
    pub async fn callback(
        &self,
        mut opt: ServerOption<'_>,
    ) -> Result<CallbackOutcome, HandshakeError> {
        let req = opt.request()?;
        let res = opt.response()?;

        let Some(nonce) = non_empty_cookie(req, NONCE_COOKIE) else {
            LoggingHelper::log_nonce_cookie_missing();
            return Err(HandshakeError::Authentication(
                "missing nonce cookie".to_string(),
            ));
        };
        res.set(self.store.policy().expired_cookie(NONCE_COOKIE));

        let client = self.client().await?;
        let params = client.callback_params(req);
        let tokens = client
            .callback(self.settings.redirect_uri(), params, CallbackChecks { nonce })
            .await?;

        let session = Session::from_token_set(&tokens, self.store.policy());
        self.store.write(res, &session)?;
        LoggingHelper::log_session_written(&session);

        Ok(CallbackOutcome {
            redirect_to: self.settings.post_login_redirect.clone(),
        })
    }
}

use serde::Serialize;
use std::collections::BTreeMap;

use super::{Handshake, HandshakeError, ServerOption};
use crate::oauth::AuthorizationParams;
use crate::utils::crypto::generate_login_nonce;
use crate::utils::logging::LoggingHelper;

/// Authorization parameters owned by the handshake; the callback depends on them
const PROTECTED_PARAMS: [&str; 4] = ["client_id", "nonce", "redirect_uri", "response_type"];

/// Caller overrides merged over the default authorization parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginOptions {
    pub acr_values: Option<String>,
    pub audience: Option<String>,
    pub display: Option<String>,
    pub login_hint: Option<String>,
    pub max_age: Option<u64>,
    pub prompt: Option<String>,
    pub scope: Option<String>,
    pub state: Option<String>,
    pub ui_locales: Option<String>,
    /// Any other authorization parameter; `client_id`, `nonce`, `redirect_uri`
    /// and `response_type` are dropped
    pub extra: BTreeMap<String, String>,
}

impl LoginOptions {
    /// Split request parameters into the typed overrides and `extra`
    #[must_use]
    pub fn from_params(params: BTreeMap<String, String>) -> Self {
        let mut options = Self::default();
        for (key, value) in params {
            match key.as_str() {
                "acr_values" => options.acr_values = Some(value),
                "audience" => options.audience = Some(value),
                "display" => options.display = Some(value),
                "login_hint" => options.login_hint = Some(value),
                "max_age" => match value.parse() {
                    Ok(max_age) => options.max_age = Some(max_age),
                    Err(_) => log::warn!("Ignoring non-numeric max_age login parameter"),
                },
                "prompt" => options.prompt = Some(value),
                "scope" => options.scope = Some(value),
                "state" => options.state = Some(value),
                "ui_locales" => options.ui_locales = Some(value),
                _ => {
                    options.extra.insert(key, value);
                }
            }
        }
        options
    }

    /// Flatten into authorization parameters; typed fields win over `extra`
    fn into_params(self) -> AuthorizationParams {
        let mut params = self.extra;
        for key in PROTECTED_PARAMS {
            if params.remove(key).is_some() {
                LoggingHelper::log_protected_override_ignored(key);
            }
        }

        let typed = [
            ("acr_values", self.acr_values),
            ("audience", self.audience),
            ("display", self.display),
            ("login_hint", self.login_hint),
            ("max_age", self.max_age.map(|age| age.to_string())),
            ("prompt", self.prompt),
            ("scope", self.scope),
            ("state", self.state),
            ("ui_locales", self.ui_locales),
        ];
        for (key, value) in typed {
            if let Some(value) = value {
                params.insert(key.to_string(), value);
            }
        }
        params
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginOutcome {
    /// Authorization URL the caller should redirect to
    pub url: String,
}

impl Handshake {
    /// Start a login: issue a nonce cookie and build the authorization URL
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No response object is supplied
    /// - The identity provider client cannot be created
    /// - The authorization URL cannot be built
    pub async fn login(
        &self,
        mut opt: ServerOption<'_>,
        options: LoginOptions,
    ) -> Result<LoginOutcome, HandshakeError> {
        let res = opt.response()?;
        let client = self.client().await?;
        let nonce = generate_login_nonce();

        let mut params = AuthorizationParams::new();
        params.insert(
            "redirect_uri".to_string(),
            self.settings.redirect_uri().to_string(),
        );
        params.insert("scope".to_string(), self.settings.scope.clone());
        params.insert("response_type".to_string(), "code".to_string());
        if let Some(audience) = &self.settings.audience {
            params.insert("audience".to_string(), audience.clone());
        }

        let overrides = options.into_params();
        let override_keys: Vec<&str> = overrides.keys().map(String::as_str).collect();
        LoggingHelper::log_login_started(
            overrides.get("scope").unwrap_or(&self.settings.scope),
            overrides
                .get("audience")
                .or(self.settings.audience.as_ref())
                .map(String::as_str),
            &override_keys,
        );
        params.extend(overrides);
        params.insert("nonce".to_string(), nonce.clone());

        let url = client.authorization_url(&params)?;
        res.set(self.store.policy().nonce_cookie(nonce));

        Ok(LoginOutcome { url })
    }
}

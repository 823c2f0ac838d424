use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Default name of the sealed session cookie
pub const DEFAULT_COOKIE_NAME: &str = "a0:session";

/// Default session cookie lifetime (8 hours)
pub const DEFAULT_COOKIE_LIFETIME_SECS: i64 = 60 * 60 * 8;

/// Upper bound for the session cookie lifetime (400 days, the browser Max-Age cap)
pub const MAX_COOKIE_LIFETIME_SECS: i64 = 60 * 60 * 24 * 400;

/// Default timeout for requests to the identity provider
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 2500;

/// Minimum length of the cookie sealing secret
pub const MIN_COOKIE_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AuthSettings {
    pub application: ApplicationSettings,
    pub environment: Environment,
    /// Identity provider domain, e.g. `tenant.eu.auth0.com`
    pub domain: String,
    pub client_id: String,
    pub client_secret: String,
    /// Where the user lands after a successful callback
    pub post_login_redirect: String,
    /// Where the identity provider sends the user after logout
    pub post_logout_redirect: String,
    /// Redirect URI registered at the identity provider (defaults to `post_login_redirect`)
    pub callback_url: Option<String>,
    pub scope: String,
    pub audience: Option<String>,
    pub cookie: CookieSettings,
    pub client: ClientSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    /// Cookies are marked `Secure` only in production
    #[must_use]
    pub fn is_production(self) -> bool {
        self == Self::Production
    }
}

/// `SameSite` attribute for the session cookie
///
/// Accepts `"lax"`, `"strict"`, `"none"` or a boolean (`true` = strict,
/// `false` = attribute omitted).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum SameSiteSetting {
    Flag(bool),
    Mode(SameSiteMode),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SameSiteMode {
    Lax,
    Strict,
    None,
}

impl Default for SameSiteSetting {
    fn default() -> Self {
        Self::Mode(SameSiteMode::Lax)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieSettings {
    /// Secret used to seal the session cookie
    pub secret: String,
    pub name: String,
    pub lifetime_secs: i64,
    pub path: String,
    pub domain: Option<String>,
    pub same_site: SameSiteSetting,
    pub store_id_token: bool,
    pub store_access_token: bool,
    pub store_refresh_token: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Timeout (in milliseconds) for HTTP requests to the identity provider
    pub http_timeout_ms: Option<u64>,
    /// Allowed leeway for ID token time claims (in milliseconds)
    pub clock_tolerance_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for ApplicationSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            secret: String::new(),
            name: DEFAULT_COOKIE_NAME.to_string(),
            lifetime_secs: DEFAULT_COOKIE_LIFETIME_SECS,
            path: "/".to_string(),
            domain: None,
            same_site: SameSiteSetting::default(),
            store_id_token: false,
            store_access_token: false,
            store_refresh_token: false,
        }
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            http_timeout_ms: Some(DEFAULT_HTTP_TIMEOUT_MS),
            clock_tolerance_ms: None,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// =============================================================================
// Validation
// =============================================================================

/// A single configuration rule that was not satisfied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Invalid configuration, with every violated rule listed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid configuration: {}", format_violations(.violations))]
pub struct ConfigError {
    pub violations: Vec<Violation>,
}

impl ConfigError {
    #[must_use]
    pub fn single(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            violations: vec![Violation {
                field,
                message: message.into(),
            }],
        }
    }

    /// Whether a rule for `field` was violated
    #[must_use]
    pub fn has_violation(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }
}

fn format_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Default)]
struct Validator {
    violations: Vec<Violation>,
}

impl Validator {
    fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.violations.push(Violation {
            field,
            message: message.into(),
        });
    }

    fn non_empty(&mut self, field: &'static str, value: &str) {
        if value.trim().is_empty() {
            self.push(field, "must not be empty");
        }
    }

    fn url(&mut self, field: &'static str, value: &str) {
        match url::Url::parse(value) {
            Ok(parsed) if parsed.has_host() => {}
            Ok(_) => self.push(field, "must be an absolute URL with a host"),
            Err(e) => self.push(field, format!("must be a valid URL ({e})")),
        }
    }

    fn finish(self) -> Result<(), ConfigError> {
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(ConfigError {
                violations: self.violations,
            })
        }
    }
}

impl AuthSettings {
    /// Check the whole settings object and report every violated rule
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] listing all violations if any rule fails
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut v = Validator::default();

        v.non_empty("domain", &self.domain);
        v.non_empty("client_id", &self.client_id);
        v.non_empty("client_secret", &self.client_secret);
        v.non_empty("scope", &self.scope);
        v.url("post_login_redirect", &self.post_login_redirect);
        v.url("post_logout_redirect", &self.post_logout_redirect);

        if let Some(callback_url) = &self.callback_url {
            v.url("callback_url", callback_url);
        }
        if let Some(audience) = &self.audience {
            v.url("audience", audience);
        }

        self.cookie.validate_into(&mut v);

        v.finish()
    }

    /// Redirect URI sent to the identity provider
    #[must_use]
    pub fn redirect_uri(&self) -> &str {
        self.callback_url
            .as_deref()
            .unwrap_or(&self.post_login_redirect)
    }

    /// Get the bind address for the server
    #[must_use]
    pub fn get_bind_address(&self) -> String {
        format!("{}:{}", self.application.host, self.application.port)
    }
}

impl CookieSettings {
    fn validate_into(&self, v: &mut Validator) {
        if self.secret.chars().count() < MIN_COOKIE_SECRET_LEN {
            v.push(
                "cookie.secret",
                format!("must be at least {MIN_COOKIE_SECRET_LEN} characters"),
            );
        }
        v.non_empty("cookie.name", &self.name);
        v.non_empty("cookie.path", &self.path);
        if let Some(domain) = &self.domain {
            v.non_empty("cookie.domain", domain);
        }
        if self.lifetime_secs <= 0 {
            v.push("cookie.lifetime_secs", "must be positive");
        } else if self.lifetime_secs > MAX_COOKIE_LIFETIME_SECS {
            v.push(
                "cookie.lifetime_secs",
                format!("must not exceed {MAX_COOKIE_LIFETIME_SECS} seconds"),
            );
        }
    }
}

// =============================================================================
// Loading
// =============================================================================

impl AuthSettings {
    /// Load settings from configuration files and environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Logger initialization fails
    /// - Settings file cannot be read or parsed
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        Self::load_env_file();

        let mut settings = Self::load_base_settings()?;
        Self::apply_env_overrides(&mut settings);

        env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or(settings.logging.level.as_str()),
        )
        .try_init()?;

        Ok(settings)
    }

    /// Load base settings from TOML file(s) or use defaults
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (applied separately after loading base settings)
    /// 2. Settings.toml in `SEALGATE_SETTINGS_DIR` (if specified and exists)
    /// 3. Settings.toml in current directory (if exists)
    /// 4. Default settings
    ///
    /// # Errors
    ///
    /// Returns an error if a settings file cannot be read or parsed
    fn load_base_settings() -> Result<Self, Box<dyn std::error::Error>> {
        let mut settings = Self::default();

        let default_config_path = Path::new("Settings.toml");
        if default_config_path.exists() {
            settings = Self::load_from_path(default_config_path)?;
            println!(
                "✓ Loaded base settings from {}",
                default_config_path.display()
            );
        }

        if let Ok(settings_dir) = std::env::var("SEALGATE_SETTINGS_DIR") {
            let settings_path = Path::new(&settings_dir).join("Settings.toml");
            if settings_path.exists() {
                settings = Self::load_from_path(&settings_path)?;
                println!("✓ Overriding settings from {}", settings_path.display());
            } else {
                println!(
                    "ℹ SEALGATE_SETTINGS_DIR set but no Settings.toml found at: {}",
                    settings_path.display()
                );
            }
        }

        Ok(settings)
    }

    /// Parse a single TOML settings file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML
    pub fn load_from_path(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let toml_content = fs::read_to_string(path)?;
        Ok(basic_toml::from_str(&toml_content)?)
    }

    /// Apply environment variable overrides to settings
    pub fn apply_env_overrides(settings: &mut Self) {
        Self::apply_string_env_override("AUTH_DOMAIN", &mut settings.domain);
        Self::apply_string_env_override("AUTH_CLIENT_ID", &mut settings.client_id);
        Self::apply_string_env_override("AUTH_CLIENT_SECRET", &mut settings.client_secret);
        Self::apply_string_env_override("AUTH_SCOPE", &mut settings.scope);
        Self::apply_string_env_override("POST_LOGIN_REDIRECT", &mut settings.post_login_redirect);
        Self::apply_string_env_override(
            "POST_LOGOUT_REDIRECT",
            &mut settings.post_logout_redirect,
        );

        if let Ok(audience) = std::env::var("AUTH_AUDIENCE") {
            settings.audience = Some(audience).filter(|a| !a.is_empty());
        }
        if let Ok(callback_url) = std::env::var("AUTH_CALLBACK_URL") {
            settings.callback_url = Some(callback_url).filter(|c| !c.is_empty());
        }
        if let Ok(env) = std::env::var("APP_ENV") {
            settings.environment = if env.eq_ignore_ascii_case("production") {
                Environment::Production
            } else {
                Environment::Development
            };
        }

        Self::apply_application_env_overrides(&mut settings.application);
        Self::apply_cookie_env_overrides(&mut settings.cookie);

        if let Ok(log_level) = std::env::var("RUST_LOG") {
            settings.logging.level = log_level;
        }
    }

    fn apply_application_env_overrides(app_settings: &mut ApplicationSettings) {
        if let Ok(host) = std::env::var("HOST") {
            app_settings.host = host;
        }
        if let Ok(port_str) = std::env::var("PORT") {
            if let Ok(port) = port_str.parse::<u16>() {
                app_settings.port = port;
            }
        }
    }

    fn apply_cookie_env_overrides(cookie_settings: &mut CookieSettings) {
        Self::apply_string_env_override("COOKIE_SECRET", &mut cookie_settings.secret);
        Self::apply_string_env_override("COOKIE_NAME", &mut cookie_settings.name);
        if let Ok(lifetime_str) = std::env::var("COOKIE_LIFETIME_SECS") {
            if let Ok(lifetime) = lifetime_str.parse::<i64>() {
                cookie_settings.lifetime_secs = lifetime;
            }
        }
    }

    /// Replace `target` with a non-empty environment variable value
    fn apply_string_env_override(env_var: &str, target: &mut String) {
        if let Ok(value) = std::env::var(env_var) {
            if !value.is_empty() {
                *target = value;
            }
        }
    }

    /// Load environment variables from .env file
    fn load_env_file() {
        if let Ok(contents) = std::fs::read_to_string(".env") {
            for line in contents.lines() {
                let line = line.trim();
                if line.starts_with('#') {
                    continue;
                }
                if let Some((key, value)) = line.split_once('=') {
                    std::env::set_var(key.trim(), value.trim());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestFixtures;
    use serial_test::serial;
    use std::io::Write;

    fn clean_env_vars() {
        for var in [
            "AUTH_DOMAIN",
            "AUTH_CLIENT_ID",
            "AUTH_AUDIENCE",
            "AUTH_CALLBACK_URL",
            "APP_ENV",
            "COOKIE_SECRET",
            "COOKIE_LIFETIME_SECS",
            "PORT",
        ] {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_cookie_defaults() {
        let cookie = CookieSettings::default();
        assert_eq!(cookie.name, "a0:session");
        assert_eq!(cookie.lifetime_secs, 28_800);
        assert_eq!(cookie.path, "/");
        assert_eq!(cookie.same_site, SameSiteSetting::Mode(SameSiteMode::Lax));
        assert!(!cookie.store_id_token);
        assert!(!cookie.store_access_token);
        assert!(!cookie.store_refresh_token);
        assert_eq!(
            ClientSettings::default().http_timeout_ms,
            Some(DEFAULT_HTTP_TIMEOUT_MS)
        );
    }

    #[test]
    fn test_fixture_settings_are_valid() {
        assert_eq!(TestFixtures::settings().validate(), Ok(()));
    }

    #[test]
    fn test_validation_collects_all_violations() {
        let settings = AuthSettings::default();
        let err = settings.validate().unwrap_err();

        for field in [
            "domain",
            "client_id",
            "client_secret",
            "scope",
            "post_login_redirect",
            "post_logout_redirect",
            "cookie.secret",
        ] {
            assert!(err.has_violation(field), "missing violation for {field}");
        }
        assert!(err.to_string().starts_with("invalid configuration: "));
    }

    #[test]
    fn test_validation_of_optional_fields() {
        let mut settings = TestFixtures::settings();
        settings.audience = Some("not a url".to_string());
        settings.cookie.domain = Some(String::new());
        settings.cookie.lifetime_secs = 0;
        settings.cookie.secret = "short".to_string();

        let err = settings.validate().unwrap_err();
        assert_eq!(err.violations.len(), 4);
        assert!(err.has_violation("audience"));
        assert!(err.has_violation("cookie.domain"));
        assert!(err.has_violation("cookie.lifetime_secs"));
        assert!(err.has_violation("cookie.secret"));
    }

    #[test]
    fn test_cookie_lifetime_upper_bound() {
        let mut settings = TestFixtures::settings();
        settings.cookie.lifetime_secs = MAX_COOKIE_LIFETIME_SECS;
        assert_eq!(settings.validate(), Ok(()));

        for lifetime in [MAX_COOKIE_LIFETIME_SECS + 1, 10_000_000_000_000_000, i64::MAX] {
            settings.cookie.lifetime_secs = lifetime;
            let err = settings.validate().unwrap_err();
            assert!(err.has_violation("cookie.lifetime_secs"), "{lifetime} accepted");
        }
    }

    #[test]
    fn test_redirect_uri_falls_back_to_post_login_redirect() {
        let mut settings = TestFixtures::settings();
        assert_eq!(settings.redirect_uri(), settings.post_login_redirect);

        settings.callback_url = Some("https://app.example.com/api/callback".to_string());
        assert_eq!(settings.redirect_uri(), "https://app.example.com/api/callback");
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
domain = "tenant.example.com"
client_id = "client"
client_secret = "secret"
post_login_redirect = "https://app.example.com/"
post_logout_redirect = "https://app.example.com/bye"
scope = "openid profile"
environment = "production"

[cookie]
secret = "0123456789abcdef0123456789abcdef"
same_site = false
store_access_token = true

[client]
clock_tolerance_ms = 5000
"#
        )
        .unwrap();

        let settings = AuthSettings::load_from_path(file.path()).unwrap();
        assert_eq!(settings.domain, "tenant.example.com");
        assert!(settings.environment.is_production());
        assert_eq!(settings.cookie.same_site, SameSiteSetting::Flag(false));
        assert!(settings.cookie.store_access_token);
        assert_eq!(settings.cookie.name, DEFAULT_COOKIE_NAME);
        assert_eq!(settings.client.clock_tolerance_ms, Some(5000));
        assert_eq!(settings.client.http_timeout_ms, Some(DEFAULT_HTTP_TIMEOUT_MS));
        assert_eq!(settings.validate(), Ok(()));
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clean_env_vars();

        std::env::set_var("AUTH_DOMAIN", "env.example.com");
        std::env::set_var("AUTH_AUDIENCE", "https://api.example.com");
        std::env::set_var("APP_ENV", "Production");
        std::env::set_var("COOKIE_LIFETIME_SECS", "60");
        std::env::set_var("PORT", "not-a-port");

        let mut settings = TestFixtures::settings();
        AuthSettings::apply_env_overrides(&mut settings);

        assert_eq!(settings.domain, "env.example.com");
        assert_eq!(settings.audience.as_deref(), Some("https://api.example.com"));
        assert_eq!(settings.environment, Environment::Production);
        assert_eq!(settings.cookie.lifetime_secs, 60);
        assert_eq!(settings.application.port, 3000);

        clean_env_vars();
    }

    #[test]
    #[serial]
    fn test_empty_env_value_keeps_configured_value() {
        clean_env_vars();

        std::env::set_var("COOKIE_SECRET", "");
        let mut settings = TestFixtures::settings();
        let before = settings.cookie.secret.clone();
        AuthSettings::apply_env_overrides(&mut settings);
        assert_eq!(settings.cookie.secret, before);

        clean_env_vars();
    }
}

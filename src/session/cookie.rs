use actix_web::cookie::time::{Duration, OffsetDateTime};
use actix_web::cookie::{Cookie, SameSite};
use actix_web::{HttpRequest, HttpResponseBuilder};
use std::collections::HashMap;

use crate::settings::{
    CookieSettings, SameSiteMode, SameSiteSetting, DEFAULT_COOKIE_LIFETIME_SECS,
    DEFAULT_COOKIE_NAME,
};

/// Cookie holding the nonce between login and callback
pub const NONCE_COOKIE: &str = "a0:nonce";

/// Legacy state cookie cleared on logout
pub const STATE_COOKIE: &str = "a0:state";

/// Lifetime of the nonce cookie (1 hour)
pub const NONCE_COOKIE_LIFETIME_SECS: i64 = 60 * 60;

/// How the session is written to and read from the cookie transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookiePolicy {
    pub name: String,
    pub lifetime_secs: i64,
    pub path: String,
    pub domain: Option<String>,
    pub same_site: Option<SameSite>,
    pub store_id_token: bool,
    pub store_access_token: bool,
    pub store_refresh_token: bool,
}

impl Default for CookiePolicy {
    fn default() -> Self {
        Self {
            name: DEFAULT_COOKIE_NAME.to_string(),
            lifetime_secs: DEFAULT_COOKIE_LIFETIME_SECS,
            path: "/".to_string(),
            domain: None,
            same_site: Some(SameSite::Lax),
            store_id_token: false,
            store_access_token: false,
            store_refresh_token: false,
        }
    }
}

impl CookiePolicy {
    #[must_use]
    pub fn from_settings(settings: &CookieSettings) -> Self {
        Self {
            name: settings.name.clone(),
            lifetime_secs: settings.lifetime_secs,
            path: settings.path.clone(),
            domain: settings.domain.clone(),
            same_site: same_site_attribute(settings.same_site),
            store_id_token: settings.store_id_token,
            store_access_token: settings.store_access_token,
            store_refresh_token: settings.store_refresh_token,
        }
    }

    /// Cookie carrying `value` under this policy's name and attributes
    #[must_use]
    pub fn session_cookie(&self, value: String) -> CookieSpec {
        CookieSpec {
            name: self.name.clone(),
            value,
            max_age: self.lifetime_secs,
            domain: self.domain.clone(),
            path: Some(self.path.clone()),
            same_site: self.same_site,
        }
    }

    /// Deletion of a cookie scoped like this policy's cookies
    #[must_use]
    pub fn expired_cookie(&self, name: &str) -> CookieSpec {
        CookieSpec {
            name: name.to_string(),
            value: String::new(),
            max_age: -1,
            domain: self.domain.clone(),
            path: Some(self.path.clone()),
            same_site: self.same_site,
        }
    }

    /// Short-lived cookie holding the login nonce
    ///
    /// Always `SameSite=Lax`: the callback arrives as a cross-site top-level
    /// navigation from the identity provider.
    #[must_use]
    pub fn nonce_cookie(&self, nonce: String) -> CookieSpec {
        CookieSpec {
            name: NONCE_COOKIE.to_string(),
            value: nonce,
            max_age: NONCE_COOKIE_LIFETIME_SECS,
            domain: self.domain.clone(),
            path: Some(self.path.clone()),
            same_site: Some(SameSite::Lax),
        }
    }
}

fn same_site_attribute(setting: SameSiteSetting) -> Option<SameSite> {
    match setting {
        SameSiteSetting::Flag(true) | SameSiteSetting::Mode(SameSiteMode::Strict) => {
            Some(SameSite::Strict)
        }
        SameSiteSetting::Flag(false) => None,
        SameSiteSetting::Mode(SameSiteMode::Lax) => Some(SameSite::Lax),
        SameSiteSetting::Mode(SameSiteMode::None) => Some(SameSite::None),
    }
}

/// A cookie to set on the response; a negative `max_age` deletes it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieSpec {
    pub name: String,
    pub value: String,
    /// Seconds
    pub max_age: i64,
    pub domain: Option<String>,
    pub path: Option<String>,
    pub same_site: Option<SameSite>,
}

impl CookieSpec {
    /// Serialize into an HTTP-only cookie, `Secure` when requested
    #[must_use]
    pub fn into_cookie(self, secure: bool) -> Cookie<'static> {
        let max_age = Duration::seconds(self.max_age);
        let mut builder = Cookie::build(self.name, self.value)
            .http_only(true)
            .secure(secure)
            .max_age(max_age);
        if let Some(expires) = OffsetDateTime::now_utc().checked_add(max_age) {
            builder = builder.expires(expires);
        }

        if let Some(path) = self.path {
            builder = builder.path(path);
        }
        if let Some(domain) = self.domain {
            builder = builder.domain(domain);
        }
        if let Some(same_site) = self.same_site {
            builder = builder.same_site(same_site);
        }

        builder.finish()
    }
}

/// The response side of the cookie transport
///
/// Collects `Set-Cookie` values during a handshake step; the HTTP layer then
/// applies them to its response with [`ResponseCookies::apply`].
#[derive(Debug, Default)]
pub struct ResponseCookies {
    secure: bool,
    cookies: Vec<Cookie<'static>>,
}

impl ResponseCookies {
    #[must_use]
    pub fn new(secure: bool) -> Self {
        Self {
            secure,
            cookies: Vec::new(),
        }
    }

    pub fn set(&mut self, spec: CookieSpec) {
        log::debug!(
            "Setting cookie '{}': max_age={}, secure={}",
            spec.name,
            spec.max_age,
            self.secure
        );
        self.cookies.push(spec.into_cookie(self.secure));
    }

    pub fn set_all(&mut self, specs: impl IntoIterator<Item = CookieSpec>) {
        for spec in specs {
            self.set(spec);
        }
    }

    /// The most recently set cookie with this name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Cookie<'static>> {
        self.cookies.iter().rev().find(|c| c.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cookie<'static>> {
        self.cookies.iter()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    #[must_use]
    pub fn into_cookies(self) -> Vec<Cookie<'static>> {
        self.cookies
    }

    /// Add every collected cookie to an actix response
    pub fn apply(self, builder: &mut HttpResponseBuilder) {
        for cookie in self.cookies {
            builder.cookie(cookie);
        }
    }
}

/// Parse the request's cookies into name/value pairs (first occurrence wins)
#[must_use]
pub fn parse_cookies(req: &HttpRequest) -> HashMap<String, String> {
    let mut parsed = HashMap::new();
    match req.cookies() {
        Ok(cookies) => {
            for cookie in cookies.iter() {
                parsed
                    .entry(cookie.name().to_string())
                    .or_insert_with(|| cookie.value().to_string());
            }
        }
        Err(e) => log::warn!("Failed to parse request cookies: {e}"),
    }
    parsed
}

/// Value of a named cookie, treating an empty value as absent
#[must_use]
pub fn non_empty_cookie(req: &HttpRequest, name: &str) -> Option<String> {
    parse_cookies(req).remove(name).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RequestBuilder;

    #[test]
    fn test_session_cookie_attributes() {
        let policy = CookiePolicy {
            domain: Some("example.com".to_string()),
            ..CookiePolicy::default()
        };
        let cookie = policy.session_cookie("sealed".to_string()).into_cookie(true);

        assert_eq!(cookie.name(), "a0:session");
        assert_eq!(cookie.value(), "sealed");
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.domain(), Some("example.com"));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.max_age(), Some(Duration::hours(8)));
    }

    #[test]
    fn test_expired_cookie_has_negative_max_age() {
        let cookie = CookiePolicy::default()
            .expired_cookie(STATE_COOKIE)
            .into_cookie(false);

        assert_eq!(cookie.name(), STATE_COOKIE);
        assert_eq!(cookie.value(), "");
        assert!(cookie.max_age().unwrap().whole_seconds() < 0);
        assert_eq!(cookie.secure(), Some(false));
    }

    #[test]
    fn test_unrepresentable_expiry_is_omitted() {
        let policy = CookiePolicy {
            lifetime_secs: i64::MAX,
            ..CookiePolicy::default()
        };
        let cookie = policy.session_cookie("sealed".to_string()).into_cookie(false);

        assert_eq!(cookie.max_age(), Some(Duration::seconds(i64::MAX)));
        assert!(cookie.expires().is_none());

        let cookie = CookiePolicy::default()
            .session_cookie("sealed".to_string())
            .into_cookie(false);
        assert!(cookie.expires_datetime().is_some());
    }

    #[test]
    fn test_nonce_cookie_is_lax_and_short_lived() {
        let policy = CookiePolicy {
            same_site: Some(SameSite::Strict),
            ..CookiePolicy::default()
        };
        let spec = policy.nonce_cookie("n1".to_string());

        assert_eq!(spec.name, NONCE_COOKIE);
        assert_eq!(spec.max_age, 3600);
        assert_eq!(spec.same_site, Some(SameSite::Lax));
    }

    #[test]
    fn test_same_site_settings() {
        assert_eq!(
            same_site_attribute(SameSiteSetting::Flag(true)),
            Some(SameSite::Strict)
        );
        assert_eq!(same_site_attribute(SameSiteSetting::Flag(false)), None);
        assert_eq!(
            same_site_attribute(SameSiteSetting::Mode(SameSiteMode::None)),
            Some(SameSite::None)
        );

        let cookie = CookiePolicy {
            same_site: None,
            ..CookiePolicy::default()
        }
        .session_cookie("v".to_string())
        .into_cookie(false);
        assert_eq!(cookie.same_site(), None);
    }

    #[test]
    fn test_response_cookies_keeps_latest() {
        let policy = CookiePolicy::default();
        let mut jar = ResponseCookies::new(false);
        assert!(jar.is_empty());

        jar.set(policy.nonce_cookie("first".to_string()));
        jar.set_all([
            policy.expired_cookie(NONCE_COOKIE),
            policy.session_cookie("sealed".to_string()),
        ]);

        assert_eq!(jar.iter().count(), 3);
        assert_eq!(jar.get(NONCE_COOKIE).unwrap().value(), "");
        assert_eq!(jar.get("a0:session").unwrap().value(), "sealed");
        assert!(jar.get("missing").is_none());
    }

    #[test]
    fn test_parse_cookies() {
        let req = RequestBuilder::new()
            .with_cookie_header("a0:nonce=abc; other=1; a0:session=")
            .build();

        let cookies = parse_cookies(&req);
        assert_eq!(cookies.get("a0:nonce").map(String::as_str), Some("abc"));
        assert_eq!(cookies.get("other").map(String::as_str), Some("1"));

        assert_eq!(non_empty_cookie(&req, "a0:nonce").as_deref(), Some("abc"));
        assert_eq!(non_empty_cookie(&req, "a0:session"), None);
        assert_eq!(non_empty_cookie(&req, "absent"), None);
    }
}

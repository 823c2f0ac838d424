//! HTTP request builders for testing the handshake and session reads

use actix_web::cookie::Cookie;
use actix_web::{test, HttpRequest};

use crate::session::NONCE_COOKIE;
use crate::settings::DEFAULT_COOKIE_NAME;

/// Builder for creating HTTP requests for testing
pub struct RequestBuilder {
    uri: String,
    headers: Vec<(String, String)>,
    cookies: Vec<Cookie<'static>>,
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            uri: "/".to_string(),
            headers: Vec::new(),
            cookies: Vec::new(),
        }
    }

    #[must_use]
    pub fn uri(mut self, uri: &str) -> Self {
        self.uri = uri.to_string();
        self
    }

    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    #[must_use]
    pub fn with_cookie(mut self, cookie: Cookie<'static>) -> Self {
        self.cookies.push(cookie);
        self
    }

    /// Add the default-named session cookie
    #[must_use]
    pub fn with_session_cookie(self, sealed: String) -> Self {
        self.with_cookie(Cookie::new(DEFAULT_COOKIE_NAME, sealed))
    }

    /// Add the login nonce cookie
    #[must_use]
    pub fn with_nonce_cookie(self, nonce: &str) -> Self {
        self.with_cookie(Cookie::new(NONCE_COOKIE, nonce.to_string()))
    }

    /// Add cookies from a raw `Cookie` header string
    #[must_use]
    pub fn with_cookie_header(self, cookies: &str) -> Self {
        self.header("Cookie", cookies)
    }

    /// Build the final `HttpRequest`
    #[must_use]
    pub fn build(self) -> HttpRequest {
        let mut req = test::TestRequest::get().uri(&self.uri);

        for (name, value) in self.headers {
            req = req.insert_header((name, value));
        }
        for cookie in self.cookies {
            req = req.cookie(cookie);
        }

        req.to_http_request()
    }
}

/// Quick builder functions for common request types
impl RequestBuilder {
    /// A provider redirect back to the callback route carrying `code` and the nonce cookie
    #[must_use]
    pub fn callback(code: &str, nonce: &str) -> HttpRequest {
        Self::new()
            .uri(&format!(
                "/api/callback?code={}&state=opaque",
                urlencoding::encode(code)
            ))
            .with_nonce_cookie(nonce)
            .build()
    }

    /// Create a request with cookies from a cookie header string
    #[must_use]
    pub fn with_cookies(cookies: &str) -> HttpRequest {
        Self::new().with_cookie_header(cookies).build()
    }

    /// Create an empty request with no headers
    #[must_use]
    pub fn empty_request() -> HttpRequest {
        Self::new().build()
    }
}

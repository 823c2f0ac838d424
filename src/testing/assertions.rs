//! Cookie assertions for collected responses

use actix_web::cookie::Cookie;

use crate::session::ResponseCookies;

/// Assert the latest cookie named `name` sets a live value, and return it
///
/// # Panics
///
/// Panics if the cookie is missing, empty, or expired.
#[must_use]
pub fn assert_cookie_set<'a>(res: &'a ResponseCookies, name: &str) -> &'a Cookie<'static> {
    let cookie = res
        .get(name)
        .unwrap_or_else(|| panic!("expected cookie '{name}' to be set"));
    assert!(!cookie.value().is_empty(), "cookie '{name}' is empty");
    assert!(
        cookie.max_age().is_some_and(|age| age.is_positive()),
        "cookie '{name}' is not live"
    );
    cookie
}

/// Assert the latest cookie named `name` deletes it (empty value, negative max-age)
///
/// # Panics
///
/// Panics if the cookie is missing or not a deletion.
pub fn assert_cookie_cleared<'a>(res: &'a ResponseCookies, name: &str) -> &'a Cookie<'static> {
    let cookie = res
        .get(name)
        .unwrap_or_else(|| panic!("expected cookie '{name}' to be cleared"));
    assert_eq!(cookie.value(), "", "cleared cookie '{name}' still has a value");
    assert!(
        cookie.max_age().is_some_and(|age| age.is_negative()),
        "cookie '{name}' does not have a negative max-age"
    );
    cookie
}

//! Sealed cookie sessions
//!
//! - [`model`] - the `Session` record and claim mapping
//! - [`cookie`] - cookie policy and the request/response cookie transport
//! - [`store`] - sealing sessions into and out of the session cookie
//! - [`hook`] - verification entry point for raw-request consumers

pub mod cookie;
pub mod hook;
pub mod model;
pub mod store;

pub use cookie::{
    parse_cookies, CookiePolicy, CookieSpec, ResponseCookies, NONCE_COOKIE, STATE_COOKIE,
};
pub use hook::{use_session, SessionHookOptions, SessionStatus};
pub use model::{strip_reserved_claims, Session, UserClaims, RESERVED_CLAIMS};
pub use store::{SessionError, SessionStore};

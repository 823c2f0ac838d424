#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

/// Version of the sealgate library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod handlers;
pub mod handshake;
pub mod oauth;
pub mod session;
pub mod settings;
pub mod utils;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// Re-export commonly used items
pub use handshake::{
    Handshake, HandshakeError, LoginOptions, LoginOutcome, LogoutOptions, LogoutOutcome,
    ServerOption,
};
pub use session::{
    use_session, ResponseCookies, Session, SessionHookOptions, SessionStatus, SessionStore,
};
pub use settings::{AuthSettings, ConfigError};

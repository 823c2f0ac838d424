//! Testing utilities for sealgate
//!
//! Available to unit tests and, with the `testing` feature, to integration tests.
//!
//! - [`fixtures`] - settings, claims, tokens and sessions
//! - [`requests`] - HTTP request builder for handshake and session tests
//! - [`assertions`] - cookie assertions on collected responses
//! - [`mock`] - in-memory identity provider client and factory
//!
//! ```rust,ignore
//! use sealgate::testing::{RequestBuilder, TestFixtures};
//!
//! let (handshake, factory) = TestFixtures::handshake();
//! let req = RequestBuilder::callback("code", "nonce");
//! ```

pub mod assertions;
pub mod fixtures;
pub mod mock;
pub mod requests;

pub use assertions::*;
pub use fixtures::TestFixtures;
pub use requests::RequestBuilder;

/// Common test constants
pub mod constants {
    /// Cookie sealing secret (at least 32 characters)
    pub const TEST_COOKIE_SECRET: &str = "test-cookie-secret-0123456789-abcdef";

    pub const TEST_DOMAIN: &str = "tenant.example.com";

    /// Issuer reported by the test provider
    pub const TEST_ISSUER: &str = "https://tenant.example.com/";

    pub const TEST_CLIENT_ID: &str = "test-client-id";

    pub const TEST_CLIENT_SECRET: &str = "test-client-secret";

    /// Authorization endpoint used by the mock client
    pub const MOCK_AUTHORIZATION_ENDPOINT: &str = "https://tenant.example.com/authorize";

    /// Default test subject
    pub const TEST_USER_ID: &str = "auth0|123";

    /// Default test email address
    pub const TEST_EMAIL: &str = "test@example.com";

    /// Default test user name
    pub const TEST_USER_NAME: &str = "Test User";
}

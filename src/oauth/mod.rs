//! Identity provider client
//!
//! [`IdpClient`] and [`ClientFactory`] are the seams the handshake depends on;
//! [`OidcClientFactory`] is the discovery-based implementation.

pub mod client;
pub mod discovery;
pub mod oidc;

pub use client::{
    build_authorization_url, parse_callback_params, AuthorizationParams, CallbackChecks,
    CallbackParams, ClientFactory, IdpClient, OidcError, TokenSet,
};
pub use discovery::{discovery_url, issuer_base_url, OidcDiscoveryDocument};
pub use oidc::{decode_id_token_claims, verify_id_token_claims, OidcClient, OidcClientFactory};

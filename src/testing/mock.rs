//! Mock identity provider for isolated handshake tests

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::constants::{MOCK_AUTHORIZATION_ENDPOINT, TEST_CLIENT_ID};
use super::fixtures::TestFixtures;
use crate::oauth::{
    build_authorization_url, AuthorizationParams, CallbackChecks, CallbackParams, ClientFactory,
    IdpClient, OidcError, TokenSet,
};

/// In-memory [`IdpClient`] that issues tokens for any authorization code
///
/// Records how many exchanges were attempted and the nonce presented last.
#[derive(Debug, Default)]
pub struct MockIdpClient {
    fail_exchange: bool,
    exchanges: AtomicUsize,
    last_nonce: Mutex<Option<String>>,
}

impl MockIdpClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A client whose token exchange always fails with a network error
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail_exchange: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn exchange_count(&self) -> usize {
        self.exchanges.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn last_nonce(&self) -> Option<String> {
        self.last_nonce.lock().ok().and_then(|nonce| nonce.clone())
    }
}

#[async_trait]
impl IdpClient for MockIdpClient {
    fn authorization_url(&self, params: &AuthorizationParams) -> Result<String, OidcError> {
        build_authorization_url(MOCK_AUTHORIZATION_ENDPOINT, TEST_CLIENT_ID, params)
    }

    async fn callback(
        &self,
        _redirect_uri: &str,
        params: CallbackParams,
        checks: CallbackChecks,
    ) -> Result<TokenSet, OidcError> {
        self.exchanges.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_nonce.lock() {
            *last = Some(checks.nonce.clone());
        }

        if let Some(error) = params.error {
            return Err(OidcError::Provider {
                error,
                description: params.error_description,
            });
        }
        if self.fail_exchange {
            return Err(OidcError::Network("connection refused".to_string()));
        }
        let code = params.code.ok_or(OidcError::MissingParameter("code"))?;

        Ok(TokenSet {
            id_token: Some(format!("id-token-for-{code}")),
            ..TestFixtures::token_set(&checks.nonce)
        })
    }
}

/// [`ClientFactory`] handing out one shared [`MockIdpClient`]
#[derive(Debug, Default)]
pub struct MockClientFactory {
    client: Arc<MockIdpClient>,
    creations: AtomicUsize,
    failures_remaining: AtomicUsize,
    creation_yields: usize,
}

impl MockClientFactory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_client(client: MockIdpClient) -> Self {
        Self {
            client: Arc::new(client),
            ..Self::default()
        }
    }

    /// A factory whose first `failures` creations fail like an unreachable provider
    #[must_use]
    pub fn failing_times(failures: usize) -> Self {
        Self {
            failures_remaining: AtomicUsize::new(failures),
            ..Self::default()
        }
    }

    /// A factory whose `create_client` suspends `yields` times before finishing
    #[must_use]
    pub fn yielding(yields: usize) -> Self {
        Self {
            creation_yields: yields,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn client(&self) -> &Arc<MockIdpClient> {
        &self.client
    }

    /// Number of `create_client` calls, failed ones included
    #[must_use]
    pub fn creations(&self) -> usize {
        self.creations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClientFactory for MockClientFactory {
    async fn create_client(&self) -> Result<Arc<dyn IdpClient>, OidcError> {
        self.creations.fetch_add(1, Ordering::SeqCst);
        for _ in 0..self.creation_yields {
            tokio::task::yield_now().await;
        }

        let failed = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failed {
            return Err(OidcError::Discovery("mock provider unreachable".to_string()));
        }

        let client: Arc<dyn IdpClient> = self.client.clone();
        Ok(client)
    }
}

use super::{Handshake, HandshakeError, ServerOption};
use crate::session::{Session, UserClaims};

impl Handshake {
    /// The current session, or `None` when not logged in
    ///
    /// # Errors
    ///
    /// Returns [`HandshakeError::Precondition`] if no request object is supplied
    pub fn session(&self, opt: ServerOption<'_>) -> Result<Option<Session>, HandshakeError> {
        let req = opt.request()?;
        Ok(self.store.read(req))
    }

    /// The current user's claims
    ///
    /// # Errors
    ///
    /// Returns [`HandshakeError::Authentication`] when there is no valid session
    pub fn profile(&self, opt: ServerOption<'_>) -> Result<UserClaims, HandshakeError> {
        self.session(opt)?
            .map(|session| session.user)
            .ok_or_else(|| HandshakeError::Authentication("not authenticated".to_string()))
    }
}

//! The two primitives the cache needs from an upstream client library.

use std::sync::Arc;

use serde_json::Value as JsonValue;

use super::credentials::CredentialPair;
use super::error::SessionError;
use crate::core::Params;

/// Establishes an authenticated session for a credential pair.
///
/// Implementations should return [`SessionError::AuthenticationFailed`] when
/// upstream rejects the credentials and [`SessionError::Upstream`] when the
/// attempt failed for any other reason, so callers can tell the two apart.
#[async_trait::async_trait]
pub trait Authenticator: Send + Sync + 'static {
    async fn authenticate(
        &self,
        credentials: &CredentialPair,
    ) -> Result<Arc<dyn UpstreamSession>, SessionError>;
}

/// A live, authenticated upstream client.
///
/// Dropping it releases whatever connection resources it holds.
#[async_trait::async_trait]
pub trait UpstreamSession: Send + Sync + 'static {
    async fn invoke(&self, operation: &str, params: &Params) -> Result<JsonValue, SessionError>;
}

#[async_trait::async_trait]
impl<T: Authenticator + ?Sized> Authenticator for Arc<T> {
    async fn authenticate(
        &self,
        credentials: &CredentialPair,
    ) -> Result<Arc<dyn UpstreamSession>, SessionError> {
        (**self).authenticate(credentials).await
    }
}

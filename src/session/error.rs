use serde_json::{json, Value};
use thiserror::Error;

/// Failure taxonomy for everything that goes through the session cache.
///
/// `Clone` because one authentication outcome is handed to every caller
/// that was waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Credential values rejected locally; nothing was sent upstream.
    #[error("invalid credential format: {0}")]
    InvalidCredentialFormat(String),
    /// Upstream rejected the credential pair.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),
    /// Upstream reports the session is no longer valid.
    #[error("session expired: {0}")]
    SessionExpired(String),
    /// Network, timeout, rate limit or unexpected status. The session may
    /// still be valid.
    #[error("upstream error: {0}")]
    Upstream(String),
    /// Unknown operation or malformed parameters for a known one.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl SessionError {
    pub fn kind(&self) -> &'static str {
        match self {
            SessionError::InvalidCredentialFormat(_) => "invalid_credential_format",
            SessionError::AuthenticationFailed(_) => "authentication_failed",
            SessionError::SessionExpired(_) => "session_expired",
            SessionError::Upstream(_) => "upstream_error",
            SessionError::InvalidOperation(_) => "invalid_operation",
            SessionError::Internal(_) => "internal",
        }
    }

    /// `{"error": {"kind": ..., "message": ...}}`, the shape returned to tool
    /// callers.
    pub fn to_structured(&self) -> Value {
        json!({ "error": { "kind": self.kind(), "message": self.to_string() } })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_carries_kind_and_message() {
        let v = SessionError::SessionExpired("token revoked".into()).to_structured();
        assert_eq!(v["error"]["kind"], "session_expired");
        assert_eq!(v["error"]["message"], "session expired: token revoked");
    }

    #[test]
    fn kinds_are_distinct() {
        let all = [
            SessionError::InvalidCredentialFormat(String::new()),
            SessionError::AuthenticationFailed(String::new()),
            SessionError::SessionExpired(String::new()),
            SessionError::Upstream(String::new()),
            SessionError::InvalidOperation(String::new()),
            SessionError::Internal(String::new()),
        ];
        let mut kinds: Vec<_> = all.iter().map(SessionError::kind).collect();
        kinds.sort_unstable();
        kinds.dedup();
        assert_eq!(kinds.len(), all.len());
    }
}

use std::fmt;

use sha2::{Digest as _, Sha256};

use super::error::SessionError;

/// The two cookies that identify an authenticated upstream user: the `ct0`
/// CSRF token and the `auth_token` session cookie.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialPair {
    ct0: String,
    auth_token: String,
}

impl CredentialPair {
    pub fn new(ct0: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            ct0: ct0.into(),
            auth_token: auth_token.into(),
        }
    }

    pub fn ct0(&self) -> &str {
        &self.ct0
    }

    pub fn auth_token(&self) -> &str {
        &self.auth_token
    }

    /// Local format check. Both values end up inside a `cookie` header, so
    /// they must be non-empty and free of separators, whitespace and control
    /// characters. Validity itself is decided upstream.
    pub fn validate(&self) -> Result<(), SessionError> {
        check_value("ct0", &self.ct0)?;
        check_value("auth_token", &self.auth_token)
    }

    pub fn fingerprint(&self) -> CredentialFingerprint {
        CredentialFingerprint::of(self)
    }

    /// Value for the upstream `cookie` header.
    pub fn cookie_header(&self) -> String {
        format!("ct0={}; auth_token={}", self.ct0, self.auth_token)
    }
}

impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("ct0", &"<redacted>")
            .field("auth_token", &"<redacted>")
            .finish()
    }
}

fn check_value(name: &str, value: &str) -> Result<(), SessionError> {
    if value.is_empty() {
        return Err(SessionError::InvalidCredentialFormat(format!(
            "{name} must not be empty"
        )));
    }
    if value
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || c == ';' || c == '=')
    {
        return Err(SessionError::InvalidCredentialFormat(format!(
            "{name} contains characters not allowed in a cookie value"
        )));
    }
    Ok(())
}

/// Cache key for a [`CredentialPair`]: hex SHA-256 over both values, each
/// length-prefixed so no two distinct pairs share an encoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CredentialFingerprint(String);

impl CredentialFingerprint {
    fn of(pair: &CredentialPair) -> Self {
        let mut h = Sha256::new();
        for part in [pair.ct0.as_bytes(), pair.auth_token.as_bytes()] {
            h.update((part.len() as u64).to_be_bytes());
            h.update(part);
        }
        Self(hex::encode(h.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Leading characters, enough to correlate log lines.
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl fmt::Display for CredentialFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

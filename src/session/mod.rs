//! Credential-keyed session cache and the upstream contracts it relies on.

pub mod cache;
pub mod credentials;
pub mod error;
pub mod upstream;

pub use cache::{CacheEntry, SessionCache, SessionHandle};
pub use credentials::{CredentialFingerprint, CredentialPair};
pub use error::SessionError;
pub use upstream::{Authenticator, UpstreamSession};

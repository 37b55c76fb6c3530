//! Credential-keyed session cache.
//!
//! One live [`SessionHandle`] per [`CredentialFingerprint`]. A miss starts a
//! single authentication on a detached task; every caller asking for the
//! same fingerprint while it runs waits on that one attempt and sees the same
//! outcome. Callers going away does not cancel the attempt, so a paid-for
//! handshake still lands in the cache.
//!
//! There is no size bound and no LRU/LFU: one entry exists per distinct
//! credential pair seen, which stays small. An optional idle timeout
//! reclaims entries nobody has used for a while.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::credentials::{CredentialFingerprint, CredentialPair};
use super::error::SessionError;
use super::upstream::{Authenticator, UpstreamSession};
use crate::core::Params;

type AuthOutcome = Option<Result<Arc<SessionHandle>, SessionError>>;

/// Authenticated upstream client bound to exactly one credential pair.
///
/// Once the cache invalidates a handle it is revoked: any further
/// [`invoke`](Self::invoke) fails with [`SessionError::SessionExpired`], so a
/// caller still holding it has to go back through the cache.
pub struct SessionHandle {
    fingerprint: CredentialFingerprint,
    credentials: CredentialPair,
    created_at: DateTime<Utc>,
    upstream: Arc<dyn UpstreamSession>,
    revoked: AtomicBool,
}

impl SessionHandle {
    fn new(
        fingerprint: CredentialFingerprint,
        credentials: CredentialPair,
        upstream: Arc<dyn UpstreamSession>,
    ) -> Self {
        Self {
            fingerprint,
            credentials,
            created_at: Utc::now(),
            upstream,
            revoked: AtomicBool::new(false),
        }
    }

    pub fn fingerprint(&self) -> &CredentialFingerprint {
        &self.fingerprint
    }

    pub fn credentials(&self) -> &CredentialPair {
        &self.credentials
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked.load(Ordering::Acquire)
    }

    pub async fn invoke(&self, operation: &str, params: &Params) -> Result<JsonValue, SessionError> {
        if self.is_revoked() {
            return Err(SessionError::SessionExpired(
                "session was invalidated; request a new one".into(),
            ));
        }
        self.upstream.invoke(operation, params).await
    }

    fn revoke(&self) {
        self.revoked.store(true, Ordering::Release);
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("fingerprint", &self.fingerprint.short())
            .field("created_at", &self.created_at)
            .field("revoked", &self.is_revoked())
            .finish()
    }
}

/// A ready cache slot: the handle plus when it was last handed out.
#[derive(Debug)]
pub struct CacheEntry {
    handle: Arc<SessionHandle>,
    last_used: Instant,
}

impl CacheEntry {
    fn new(handle: Arc<SessionHandle>) -> Self {
        Self {
            handle,
            last_used: Instant::now(),
        }
    }

    pub fn handle(&self) -> &Arc<SessionHandle> {
        &self.handle
    }

    pub fn last_used(&self) -> Instant {
        self.last_used
    }
}

enum Slot {
    Pending {
        generation: u64,
        outcome: watch::Receiver<AuthOutcome>,
    },
    Ready(CacheEntry),
}

struct Shared<A> {
    authenticator: A,
    idle_timeout: Option<Duration>,
    slots: Mutex<HashMap<CredentialFingerprint, Slot>>,
    generation: AtomicU64,
}

impl<A> Shared<A> {
    fn lock(&self) -> MutexGuard<'_, HashMap<CredentialFingerprint, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_idle(&self, entry: &CacheEntry, now: Instant) -> bool {
        self.idle_timeout
            .is_some_and(|t| now.saturating_duration_since(entry.last_used) >= t)
    }

    /// Install the outcome of authentication `generation`, unless the slot
    /// was invalidated or replaced while it ran.
    fn settle(
        &self,
        fingerprint: &CredentialFingerprint,
        generation: u64,
        result: &Result<Arc<SessionHandle>, SessionError>,
    ) {
        let mut slots = self.lock();
        let owned = matches!(
            slots.get(fingerprint),
            Some(Slot::Pending { generation: g, .. }) if *g == generation
        );
        if !owned {
            tracing::debug!(
                fingerprint = %fingerprint.short(),
                "authentication finished for an invalidated slot; not caching"
            );
            return;
        }
        match result {
            Ok(handle) => {
                slots.insert(
                    fingerprint.clone(),
                    Slot::Ready(CacheEntry::new(Arc::clone(handle))),
                );
            }
            Err(_) => {
                slots.remove(fingerprint);
            }
        }
    }

    fn purge_idle(&self) -> usize {
        if self.idle_timeout.is_none() {
            return 0;
        }
        let now = Instant::now();
        let mut slots = self.lock();
        let before = slots.len();
        slots.retain(|_, slot| match slot {
            Slot::Ready(entry) if self.is_idle(entry, now) => {
                entry.handle.revoke();
                false
            }
            _ => true,
        });
        before - slots.len()
    }
}

/// Process-wide session cache. Cloning is cheap and every clone shares the
/// same entries.
pub struct SessionCache<A> {
    shared: Arc<Shared<A>>,
}

impl<A> Clone for SessionCache<A> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<A: Authenticator> SessionCache<A> {
    pub fn new(authenticator: A) -> Self {
        Self::with_idle_timeout(authenticator, None)
    }

    pub fn with_idle_timeout(authenticator: A, idle_timeout: Option<Duration>) -> Self {
        Self {
            shared: Arc::new(Shared {
                authenticator,
                idle_timeout,
                slots: Mutex::new(HashMap::new()),
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.shared.idle_timeout
    }

    /// Return the live handle for `credentials`, authenticating on a miss.
    pub async fn get_or_create(
        &self,
        credentials: &CredentialPair,
    ) -> Result<Arc<SessionHandle>, SessionError> {
        credentials.validate()?;
        let fingerprint = credentials.fingerprint();

        let (generation, mut outcome) = {
            let mut slots = self.shared.lock();
            let now = Instant::now();
            let joined = match slots.get_mut(&fingerprint) {
                Some(Slot::Ready(entry)) if !self.shared.is_idle(entry, now) => {
                    entry.last_used = now;
                    metrics::counter!("session_cache_hits_total").increment(1);
                    tracing::debug!(fingerprint = %fingerprint.short(), "session cache hit");
                    return Ok(Arc::clone(&entry.handle));
                }
                Some(Slot::Ready(entry)) => {
                    tracing::debug!(fingerprint = %fingerprint.short(), "cached session idle too long");
                    entry.handle.revoke();
                    None
                }
                // A closed sender that never settled the slot means the task
                // died (panicked or was aborted); start over.
                Some(Slot::Pending { outcome, .. }) if outcome.has_changed().is_err() => {
                    tracing::warn!(fingerprint = %fingerprint.short(), "abandoned authentication found; restarting");
                    None
                }
                Some(Slot::Pending {
                    generation,
                    outcome,
                }) => {
                    tracing::debug!(fingerprint = %fingerprint.short(), "joining in-flight authentication");
                    Some((*generation, outcome.clone()))
                }
                None => None,
            };
            match joined {
                Some(pending) => pending,
                None => {
                    metrics::counter!("session_cache_misses_total").increment(1);
                    self.start_authentication(&mut slots, fingerprint.clone(), credentials.clone())
                }
            }
        };

        let settled = outcome
            .wait_for(Option::is_some)
            .await
            .map(|o| o.clone());
        match settled {
            Ok(Some(result)) => result,
            _ => {
                // The task went away without reporting; clear its slot so the
                // next caller starts over instead of joining a dead attempt.
                let mut slots = self.shared.lock();
                if matches!(
                    slots.get(&fingerprint),
                    Some(Slot::Pending { generation: g, .. }) if *g == generation
                ) {
                    slots.remove(&fingerprint);
                }
                Err(SessionError::Internal(
                    "authentication task ended without a result".into(),
                ))
            }
        }
    }

    fn start_authentication(
        &self,
        slots: &mut HashMap<CredentialFingerprint, Slot>,
        fingerprint: CredentialFingerprint,
        credentials: CredentialPair,
    ) -> (u64, watch::Receiver<AuthOutcome>) {
        let generation = self.shared.generation.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = watch::channel(None);
        slots.insert(
            fingerprint.clone(),
            Slot::Pending {
                generation,
                outcome: rx.clone(),
            },
        );

        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            metrics::counter!("session_authentications_total").increment(1);
            tracing::info!(fingerprint = %fingerprint.short(), "authenticating new session");
            let result = shared
                .authenticator
                .authenticate(&credentials)
                .await
                .map(|upstream| Arc::new(SessionHandle::new(fingerprint.clone(), credentials, upstream)));
            match &result {
                Ok(_) => tracing::info!(fingerprint = %fingerprint.short(), "session established"),
                Err(e) => tracing::warn!(fingerprint = %fingerprint.short(), error = %e, "authentication failed"),
            }
            shared.settle(&fingerprint, generation, &result);
            let _ = tx.send(Some(result));
        });

        (generation, rx)
    }

    /// Drop the entry for `credentials`, if any, and revoke its handle.
    /// Returns whether anything was removed.
    pub fn invalidate(&self, credentials: &CredentialPair) -> bool {
        let fingerprint = credentials.fingerprint();
        let removed = self.shared.lock().remove(&fingerprint);
        if let Some(Slot::Ready(entry)) = &removed {
            entry.handle.revoke();
        }
        if removed.is_some() {
            metrics::counter!("session_invalidations_total").increment(1);
            tracing::info!(fingerprint = %fingerprint.short(), "session invalidated");
        }
        removed.is_some()
    }

    /// Evict `handle` only if it is still the cached one for its fingerprint.
    fn evict(&self, handle: &Arc<SessionHandle>) {
        handle.revoke();
        let mut slots = self.shared.lock();
        let current = matches!(
            slots.get(handle.fingerprint()),
            Some(Slot::Ready(entry)) if Arc::ptr_eq(&entry.handle, handle)
        );
        if current {
            slots.remove(handle.fingerprint());
            metrics::counter!("session_invalidations_total").increment(1);
        }
    }

    /// Resolve a handle and run `operation` on it. A session-expired signal
    /// evicts the entry and is returned as is; there is no silent
    /// re-authentication.
    pub async fn invoke(
        &self,
        credentials: &CredentialPair,
        operation: &str,
        params: &Params,
    ) -> Result<JsonValue, SessionError> {
        let handle = self.get_or_create(credentials).await?;
        let result = handle.invoke(operation, params).await;
        if let Err(SessionError::SessionExpired(reason)) = &result {
            tracing::warn!(
                fingerprint = %handle.fingerprint().short(),
                operation,
                reason = %reason,
                "upstream reported expired session; evicting"
            );
            self.evict(&handle);
        }
        result
    }

    /// Remove every ready entry idle past the timeout. No-op without one.
    pub fn purge_idle(&self) -> usize {
        self.shared.purge_idle()
    }

    /// Periodically purge idle entries. `None` when no idle timeout is set.
    /// The task stops once every clone of the cache is dropped.
    pub fn spawn_idle_sweeper(&self, period: Duration) -> Option<JoinHandle<()>> {
        self.shared.idle_timeout?;
        let weak = Arc::downgrade(&self.shared);
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let Some(shared) = weak.upgrade() else { break };
                let purged = shared.purge_idle();
                if purged > 0 {
                    tracing::debug!(purged, "idle sessions purged");
                }
            }
        }))
    }

    /// Number of ready entries.
    pub fn len(&self) -> usize {
        self.shared
            .lock()
            .values()
            .filter(|s| matches!(s, Slot::Ready(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a ready entry exists for `credentials`.
    pub fn contains(&self, credentials: &CredentialPair) -> bool {
        matches!(
            self.shared.lock().get(&credentials.fingerprint()),
            Some(Slot::Ready(_))
        )
    }
}

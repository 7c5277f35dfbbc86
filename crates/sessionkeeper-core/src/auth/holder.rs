//! Session holder with lazy login and time-based refresh.
//!
//! A `SessionHolder` owns one credential set and at most one authoritative
//! session. Callers ask for a session with [`SessionHolder::get_session`] and
//! always get their own clone; the holder decides whether the stored session
//! can be reused or a new login is required.

use std::future::Future;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::Credentials;
use crate::clock::{Clock, SystemClock};

/// Default validity window in hours.
const DEFAULT_VALIDITY_HOURS: i64 = 2;

/// The external login entry point.
///
/// Implementations perform the actual network call. The holder never retries
/// and never wraps `Error`: whatever `login` returns is what the caller sees.
pub trait Authenticator: Send + Sync {
    type Session: Clone + Send;
    type Error: std::error::Error + Send;

    fn login(
        &self,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<Self::Session, Self::Error>> + Send;
}

/// What the validity window is measured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpiryPolicy {
    /// From the last successful login, no matter how often the session is used.
    #[default]
    Absolute,
    /// From the last time the session was handed out (idle timeout).
    Sliding,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    pub validity_window: Duration,
    /// Refresh this long before the window actually closes.
    pub refresh_margin: Duration,
    pub expiry: ExpiryPolicy,
}

impl SessionPolicy {
    pub fn new(validity_window: Duration) -> Self {
        Self {
            validity_window,
            refresh_margin: Duration::zero(),
            expiry: ExpiryPolicy::default(),
        }
    }

    pub fn with_refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = margin;
        self
    }

    pub fn with_expiry(mut self, expiry: ExpiryPolicy) -> Self {
        self.expiry = expiry;
        self
    }

    /// Window minus margin, never negative.
    pub fn effective_window(&self) -> Duration {
        (self.validity_window - self.refresh_margin).max(Duration::zero())
    }
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self::new(Duration::hours(DEFAULT_VALIDITY_HOURS))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HolderState {
    Uninitialized,
    Active,
}

/// Serializable copy of a holder's session and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord<S> {
    pub session: S,
    pub established_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

struct ActiveSession<S> {
    session: S,
    established_at: DateTime<Utc>,
    last_active: DateTime<Utc>,
    invalidated: bool,
}

impl<S> ActiveSession<S> {
    fn anchor(&self, expiry: ExpiryPolicy) -> DateTime<Utc> {
        match expiry {
            ExpiryPolicy::Absolute => self.established_at,
            ExpiryPolicy::Sliding => self.last_active,
        }
    }

    fn is_fresh(&self, policy: &SessionPolicy, now: DateTime<Utc>) -> bool {
        !self.invalidated && now - self.anchor(policy.expiry) < policy.effective_window()
    }
}

pub struct SessionHolder<A, C = SystemClock>
where
    A: Authenticator,
{
    credentials: Credentials,
    authenticator: A,
    clock: C,
    policy: SessionPolicy,
    current: Option<ActiveSession<A::Session>>,
}

impl<A: Authenticator> SessionHolder<A, SystemClock> {
    pub fn new(credentials: Credentials, authenticator: A, policy: SessionPolicy) -> Self {
        Self::with_clock(credentials, authenticator, policy, SystemClock)
    }
}

impl<A: Authenticator, C: Clock> SessionHolder<A, C> {
    pub fn with_clock(
        credentials: Credentials,
        authenticator: A,
        policy: SessionPolicy,
        clock: C,
    ) -> Self {
        Self {
            credentials,
            authenticator,
            clock,
            policy,
            current: None,
        }
    }

    /// Log in now, replacing any stored session.
    ///
    /// On failure the previous session (if any) is left exactly as it was.
    pub async fn login(&mut self) -> Result<(), A::Error> {
        let fresh = self.authenticate().await?;
        self.current = Some(fresh);
        Ok(())
    }

    /// Return a usable session, logging in first when there is none or the
    /// stored one has gone stale.
    pub async fn get_session(&mut self) -> Result<A::Session, A::Error> {
        let now = self.clock.now();
        let active = match self.current.as_mut() {
            Some(active) if active.is_fresh(&self.policy, now) => {
                debug!(identifier = self.credentials.identifier(), "Reusing cached session");
                active
            }
            _ => {
                if self.current.is_some() {
                    debug!(identifier = self.credentials.identifier(), "Session stale, logging in again");
                }
                let fresh = self.authenticate().await?;
                self.current.insert(fresh)
            }
        };

        active.last_active = self.clock.now();
        Ok(active.session.clone())
    }

    async fn authenticate(&self) -> Result<ActiveSession<A::Session>, A::Error> {
        let identifier = self.credentials.identifier();
        debug!(identifier, "Logging in");

        let session = match self.authenticator.login(&self.credentials).await {
            Ok(session) => session,
            Err(e) => {
                warn!(identifier, error = %e, "Login failed");
                return Err(e);
            }
        };

        let now = self.clock.now();
        info!(identifier, "Session established");
        Ok(ActiveSession {
            session,
            established_at: now,
            last_active: now,
            invalidated: false,
        })
    }

    /// Mark the stored session stale so the next `get_session` logs in again.
    /// Useful when the remote side rejected the token before the window closed.
    pub fn invalidate(&mut self) {
        if let Some(ref mut active) = self.current {
            debug!(identifier = self.credentials.identifier(), "Session invalidated");
            active.invalidated = true;
        }
    }

    pub fn state(&self) -> HolderState {
        match self.current {
            Some(_) => HolderState::Active,
            None => HolderState::Uninitialized,
        }
    }

    /// Check if a stored session exists and is inside the window
    pub fn is_fresh(&self) -> bool {
        let now = self.clock.now();
        self.current
            .as_ref()
            .map(|active| active.is_fresh(&self.policy, now))
            .unwrap_or(false)
    }

    pub fn last_active(&self) -> Option<DateTime<Utc>> {
        self.current.as_ref().map(|active| active.last_active)
    }

    pub fn established_at(&self) -> Option<DateTime<Utc>> {
        self.current.as_ref().map(|active| active.established_at)
    }

    /// Time left before a refresh is due. Zero or negative when already stale.
    pub fn time_until_expiry(&self) -> Option<Duration> {
        let now = self.clock.now();
        self.current.as_ref().map(|active| {
            if active.invalidated {
                Duration::zero()
            } else {
                active
                    .anchor(self.policy.expiry)
                    .checked_add_signed(self.policy.effective_window())
                    .map(|expires| expires - now)
                    .unwrap_or(Duration::MAX)
            }
        })
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self) -> Option<i64> {
        self.time_until_expiry().map(|d| d.num_minutes().max(0))
    }

    /// Copy out the stored session and its timestamps for persistence.
    pub fn snapshot(&self) -> Option<SessionRecord<A::Session>> {
        self.current.as_ref().map(|active| SessionRecord {
            session: active.session.clone(),
            established_at: active.established_at,
            last_active: active.last_active,
        })
    }

    /// Replace the stored session with a previously saved one.
    /// Freshness is judged from the record's timestamps as usual.
    pub fn restore(&mut self, record: SessionRecord<A::Session>) {
        debug!(
            identifier = self.credentials.identifier(),
            established_at = %record.established_at,
            "Restoring saved session"
        );
        self.current = Some(ActiveSession {
            session: record.session,
            established_at: record.established_at,
            last_active: record.last_active,
            invalidated: false,
        });
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn policy(&self) -> &SessionPolicy {
        &self.policy
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }
}

// ============================================================================
// Tests
// ============================================================================

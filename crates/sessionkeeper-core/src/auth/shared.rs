use std::sync::Arc;

use tokio::sync::Mutex;

use super::holder::{Authenticator, HolderState, SessionHolder, SessionRecord};
use crate::clock::{Clock, SystemClock};

/// Cloneable handle to one `SessionHolder`, for callers on several tasks.
///
/// Access is serialized through an async mutex, so when many tasks find the
/// session stale at once only the first one logs in. Every caller still gets
/// its own clone of the session.
pub struct SharedSessionHolder<A, C = SystemClock>
where
    A: Authenticator,
{
    inner: Arc<Mutex<SessionHolder<A, C>>>,
}

impl<A: Authenticator, C> Clone for SharedSessionHolder<A, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: Authenticator, C: Clock> SharedSessionHolder<A, C> {
    pub fn new(holder: SessionHolder<A, C>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(holder)),
        }
    }

    pub async fn get_session(&self) -> Result<A::Session, A::Error> {
        self.inner.lock().await.get_session().await
    }

    pub async fn login(&self) -> Result<(), A::Error> {
        self.inner.lock().await.login().await
    }

    pub async fn invalidate(&self) {
        self.inner.lock().await.invalidate();
    }

    pub async fn state(&self) -> HolderState {
        self.inner.lock().await.state()
    }

    pub async fn snapshot(&self) -> Option<SessionRecord<A::Session>> {
        self.inner.lock().await.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::holder::tests::{t0, FakeAuthenticator};
    use crate::auth::{Credentials, SessionPolicy};
    use crate::clock::ManualClock;
    use chrono::Duration;

    fn shared() -> (SharedSessionHolder<FakeAuthenticator, ManualClock>, FakeAuthenticator, ManualClock) {
        let auth = FakeAuthenticator::default();
        let clock = ManualClock::new(t0());
        let holder = SessionHolder::with_clock(
            Credentials::new("alice", "pw"),
            auth.clone(),
            SessionPolicy::default(),
            clock.clone(),
        );
        (SharedSessionHolder::new(holder), auth, clock)
    }

    #[tokio::test]
    async fn test_concurrent_callers_trigger_single_login() {
        let (shared, auth, _clock) = shared();

        let calls = (0..16).map(|_| {
            let shared = shared.clone();
            async move { shared.get_session().await }
        });
        let results = futures::future::join_all(calls).await;

        assert_eq!(auth.login_count(), 1);
        assert!(results.iter().all(|r| r.as_ref().unwrap().token == "token-1"));
    }

    #[tokio::test]
    async fn test_concurrent_refresh_after_expiry_logs_in_once() {
        let (shared, auth, clock) = shared();
        shared.get_session().await.unwrap();

        clock.advance(Duration::hours(3));
        let calls = (0..8).map(|_| shared.get_session());
        let results = futures::future::join_all(calls).await;

        assert_eq!(auth.login_count(), 2);
        assert!(results.into_iter().all(|r| r.unwrap().token == "token-2"));
    }

    #[tokio::test]
    async fn test_invalidate_and_state_through_handle() {
        let (shared, auth, _clock) = shared();
        assert_eq!(shared.state().await, HolderState::Uninitialized);

        shared.login().await.unwrap();
        assert_eq!(shared.state().await, HolderState::Active);

        shared.invalidate().await;
        shared.get_session().await.unwrap();
        assert_eq!(auth.login_count(), 2);
        assert_eq!(shared.snapshot().await.unwrap().session.token, "token-2");
    }
}

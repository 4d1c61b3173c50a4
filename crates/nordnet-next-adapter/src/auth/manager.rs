/*
[INPUT]:  Credentials, login encryptor, REST client and feed hub
[OUTPUT]: Stored session, scheduled renewal, authenticated feeds
[POS]:    Auth layer - orchestrates login, renewal and feed authentication
[UPDATE]: When login flow, renewal policy or feed hand-off changes
*/

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError, Weak};
use std::time::Duration;

use reqwest::Method;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::auth::{LoginEncryptor, Session, SessionStore, renewal_delay};
use crate::feed::FeedHub;
use crate::http::{NordnetError, RestClient, Result};
use crate::types::{Credentials, FeedKind, LoginRequest, LoginResponse};

const LOGIN_ENDPOINT: &str = "login";

#[derive(Debug)]
struct RenewalTimer {
    /// Session epoch the timer was scheduled for
    epoch: u64,
    due: Instant,
    handle: JoinHandle<()>,
}

#[derive(Debug)]
struct SessionInner {
    rest: RestClient,
    encryptor: LoginEncryptor,
    store: SessionStore,
    feeds: FeedHub,
    shorten_expires: Duration,
    /// Held from the login request until both feeds are set up
    auth_lock: Arc<Mutex<()>>,
    renewal: StdMutex<Option<RenewalTimer>>,
    /// Advanced by every cancellation; a renewal only schedules its successor
    /// while the generation it started under is still current
    renewal_generation: AtomicU64,
}

/// Owns the session lifecycle.
///
/// Only one authentication runs at a time; overlapping calls queue. A successful
/// login schedules exactly one renewal, which re-runs the login with the same
/// credentials shortly before the session expires.
#[derive(Debug, Clone)]
pub struct SessionManager {
    inner: Arc<SessionInner>,
}

impl SessionManager {
    pub fn new(
        rest: RestClient,
        encryptor: LoginEncryptor,
        feeds: FeedHub,
        shorten_expires: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                rest,
                encryptor,
                store: SessionStore::new(),
                feeds,
                shorten_expires,
                auth_lock: Arc::new(Mutex::new(())),
                renewal: StdMutex::new(None),
                renewal_generation: AtomicU64::new(0),
            }),
        }
    }

    /// Shared view of the session, read by the call gateway
    pub fn store(&self) -> &SessionStore {
        &self.inner.store
    }

    pub fn feeds(&self) -> &FeedHub {
        &self.inner.feeds
    }

    pub fn session(&self) -> Option<Session> {
        self.inner.store.get()
    }

    pub fn session_key(&self) -> Option<String> {
        self.inner.store.session_key()
    }

    /// Install a session key obtained elsewhere; no renewal or feeds are started for it
    pub fn seed(&self, session_key: impl Into<String>) {
        self.inner.store.replace(Session::from_session_key(session_key));
    }

    /// Log in and store the session.
    ///
    /// Returns once the session is stored; both feeds are authenticated in the
    /// background (see [`SessionManager::feeds_settled`]). On failure the session
    /// is cleared and no renewal is scheduled.
    pub async fn authenticate(&self, credentials: &Credentials) -> Result<Session> {
        let guard = self.inner.auth_lock.clone().lock_owned().await;
        let generation = self.inner.renewal_generation.load(Ordering::Acquire);
        authenticate_locked(&self.inner, credentials.clone(), guard, generation).await
    }

    /// Wait for any in-flight authentication, feed setup included, to finish
    pub async fn feeds_settled(&self) {
        let _guard = self.inner.auth_lock.lock().await;
    }

    /// Stop renewal, including one whose login is already in flight.
    ///
    /// A later [`SessionManager::authenticate`] starts renewing again.
    pub fn cancel_renewal(&self) {
        self.inner.cancel_renewal();
    }

    /// When the pending renewal will log in again
    pub fn renewal_due(&self) -> Option<Instant> {
        self.inner
            .renewal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|timer| !timer.handle.is_finished())
            .map(|timer| timer.due)
    }

    pub fn renewal_pending(&self) -> bool {
        self.inner
            .renewal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|timer| !timer.handle.is_finished())
    }

    /// Stop renewal and close both feeds; the stored session is kept
    pub async fn shutdown(&self) {
        let _guard = self.inner.auth_lock.lock().await;
        self.inner.cancel_renewal();
        self.inner.feeds.close_all().await;
        info!("session manager shut down");
    }
}

impl SessionInner {
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse> {
        let auth = self
            .encryptor
            .encrypt(&credentials.username, &credentials.password)?;
        let builder = self
            .rest
            .request(Method::POST, LOGIN_ENDPOINT)?
            .json(&LoginRequest::new(auth));
        self.rest.send_json(builder).await
    }

    fn cancel_renewal(&self) {
        self.renewal_generation.fetch_add(1, Ordering::AcqRel);
        let timer = self
            .renewal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(timer) = timer {
            timer.handle.abort();
            debug!(epoch = timer.epoch, "session renewal cancelled");
        }
    }

    /// Take the firing timer out of its slot if it still belongs to `epoch`, so the
    /// renewal it runs can schedule its successor without aborting itself
    fn claim_renewal(&self, epoch: u64) -> bool {
        let mut slot = self.renewal.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|timer| timer.epoch == epoch) {
            slot.take();
            true
        } else {
            false
        }
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        let slot = self.renewal.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(timer) = slot.take() {
            timer.handle.abort();
        }
    }
}

async fn authenticate_locked(
    inner: &Arc<SessionInner>,
    credentials: Credentials,
    guard: OwnedMutexGuard<()>,
    generation: u64,
) -> Result<Session> {
    let response = match inner.login(&credentials).await {
        Ok(response) => response,
        Err(e) => {
            inner.store.clear();
            inner.cancel_renewal();
            warn!(error = %e, "login failed, session cleared");
            return Err(NordnetError::authentication(e));
        }
    };

    let session = Session::from_login(&response, inner.shorten_expires);
    let epoch = inner.store.replace(session.clone());

    let delay = renewal_delay(response.expires_in, inner.shorten_expires);
    match Instant::now().checked_add(delay) {
        Some(due) => {
            if !schedule_renewal(inner, credentials, epoch, due, generation) {
                debug!(epoch, "renewal cancelled during login, not rescheduling");
            }
        }
        None => warn!(
            epoch,
            expires_in = response.expires_in,
            "session lifetime out of range, renewal not scheduled"
        ),
    }
    info!(
        epoch,
        expires_in = response.expires_in,
        renew_in_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
        "session established"
    );

    let feed_inner = inner.clone();
    let session_key = session.session_key.clone();
    let public = session.feed_endpoint(FeedKind::Public).cloned();
    let private = session.feed_endpoint(FeedKind::Private).cloned();
    tokio::spawn(async move {
        // Keeps other authentications queued until both feeds are settled
        let _guard = guard;
        let (public, private) = feed_inner
            .feeds
            .authenticate_feeds(public, private, &session_key)
            .await;
        debug!(
            epoch,
            public_ok = public.is_ok(),
            private_ok = private.is_ok(),
            "feed authentication settled"
        );
    });

    Ok(session)
}

/// Install the one renewal timer for `epoch`; returns false when renewal was
/// cancelled after `generation` was observed
fn schedule_renewal(
    inner: &Arc<SessionInner>,
    credentials: Credentials,
    epoch: u64,
    due: Instant,
    generation: u64,
) -> bool {
    // Checked under the slot lock so a concurrent cancel either sees the new timer or stops it
    let mut slot = inner.renewal.lock().unwrap_or_else(PoisonError::into_inner);
    if inner.renewal_generation.load(Ordering::Acquire) != generation {
        return false;
    }

    let weak: Weak<SessionInner> = Arc::downgrade(inner);
    let handle = tokio::spawn(async move {
        tokio::time::sleep_until(due).await;

        let Some(inner) = weak.upgrade() else {
            return;
        };

        // Still cancellable while queued; out of the slot once claimed
        let guard = inner.auth_lock.clone().lock_owned().await;
        if !inner.claim_renewal(epoch) {
            return;
        }
        if inner.store.epoch() != epoch {
            debug!(epoch, "session replaced before renewal, skipping");
            return;
        }

        info!(epoch, "renewing session");
        if let Err(e) = authenticate_locked(&inner, credentials, guard, generation).await {
            error!(error = %e, "session renewal failed");
        }
    });

    if let Some(previous) = slot.replace(RenewalTimer { epoch, due, handle }) {
        previous.handle.abort();
    }
    true
}

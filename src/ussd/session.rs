//! Session store: per-dialog state keyed by the gateway session id.
//!
//! One `tokio::sync::Mutex` guards the whole map. Request handling holds the
//! guard for the full turn, and the sweeper takes the same guard, so a sweep
//! can never remove a session while a handler is using it and two requests
//! for the same id can never create two sessions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::registration::model::RegistrationType;

use super::catalog::School;

// ── Clock ───────────────────────────────────────────────────────────

/// Source of "now" for session ages and registration timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. Used by tests.
#[derive(Debug)]
pub struct ManualClock {
    now: std::sync::Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: std::sync::Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let delta = chrono::Duration::from_std(by).unwrap_or(chrono::Duration::MAX);
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Session ─────────────────────────────────────────────────────────

/// Fields collected during the dialog. Partial until confirmation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionData {
    pub registration_type: Option<RegistrationType>,
    pub full_name: Option<String>,
    /// Catalog pick. Mutually exclusive with `custom_school`.
    pub school: Option<School>,
    pub custom_school: Option<String>,
}

impl SessionData {
    /// Name of whichever school was chosen.
    pub fn school_name(&self) -> Option<&str> {
        self.school
            .as_ref()
            .map(|s| s.name.as_str())
            .or(self.custom_school.as_deref())
    }
}

/// State for one dialog.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub phone_number: String,
    pub start_time: DateTime<Utc>,
    /// Last step number processed.
    pub step: usize,
    pub data: SessionData,
    /// Invalid inputs so far. Not reset by valid input.
    pub attempts: u32,
}

impl Session {
    pub fn new(id: &str, phone_number: &str, start_time: DateTime<Utc>) -> Self {
        Self {
            id: id.to_string(),
            phone_number: phone_number.to_string(),
            start_time,
            step: 0,
            data: SessionData::default(),
            attempts: 0,
        }
    }
}

// ── Store ───────────────────────────────────────────────────────────

/// In-memory session map with timeout-based expiry.
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Session>>,
    timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl SessionStore {
    pub fn new(timeout: Duration, clock: Arc<dyn Clock>) -> Arc<Self> {
        Arc::new(Self {
            sessions: Mutex::new(HashMap::new()),
            timeout,
            clock,
        })
    }

    /// Take exclusive access to the map for the duration of one turn.
    pub async fn lock(&self) -> SessionMap<'_> {
        SessionMap {
            sessions: self.sessions.lock().await,
            clock: self.clock.as_ref(),
        }
    }

    /// Snapshot of the session for `session_id`, creating it if absent.
    pub async fn get_or_create(&self, session_id: &str, phone_number: &str) -> Session {
        self.lock()
            .await
            .get_or_create(session_id, phone_number)
            .clone()
    }

    pub async fn get(&self, session_id: &str) -> Option<Session> {
        self.sessions.lock().await.get(session_id).cloned()
    }

    pub async fn remove(&self, session_id: &str) -> Option<Session> {
        self.lock().await.remove(session_id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }

    /// Remove every session older than the timeout.
    /// Returns the number of sessions removed.
    pub async fn sweep(&self) -> usize {
        let now = self.clock.now();
        let timeout = chrono::Duration::from_std(self.timeout).unwrap_or(chrono::Duration::MAX);
        let mut sessions = self.sessions.lock().await;

        let before = sessions.len();
        sessions.retain(|id, session| {
            let expired = now.signed_duration_since(session.start_time) > timeout;
            if expired {
                debug!(session_id = %id, "Cleaned up expired session");
            }
            !expired
        });
        let removed = before - sessions.len();

        if removed > 0 {
            info!(count = removed, remaining = sessions.len(), "Expired sessions swept");
        }
        removed
    }
}

/// Exclusive view of the session map, obtained through [`SessionStore::lock`].
pub struct SessionMap<'a> {
    sessions: MutexGuard<'a, HashMap<String, Session>>,
    clock: &'a dyn Clock,
}

impl SessionMap<'_> {
    /// Existing session unchanged, or a fresh one stamped with the current time.
    pub fn get_or_create(&mut self, session_id: &str, phone_number: &str) -> &mut Session {
        let clock = self.clock;
        self.sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                debug!(session_id, "Session created");
                Session::new(session_id, phone_number, clock.now())
            })
    }

    pub fn remove(&mut self, session_id: &str) -> Option<Session> {
        self.sessions.remove(session_id)
    }
}

// ── Sweeper ─────────────────────────────────────────────────────────

/// Period used in place of a zero sweep interval, which `tokio::time::interval`
/// rejects.
pub const FALLBACK_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Handle to the background expiry task.
pub struct SessionSweeper {
    handle: JoinHandle<()>,
    shutdown: Arc<AtomicBool>,
}

impl SessionSweeper {
    /// Stop sweeping. Safe to call while a sweep is in progress; the
    /// in-flight sweep either completes or never starts.
    pub fn stop(self) {
        self.shutdown.store(true, Ordering::Relaxed);
        self.handle.abort();
        info!("Session sweeper stopped");
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Spawn a background task that sweeps expired sessions every `interval`.
pub fn spawn_sweeper(store: Arc<SessionStore>, interval: Duration) -> SessionSweeper {
    let interval = if interval.is_zero() {
        warn!(
            "Sweep interval is zero, using {}s",
            FALLBACK_SWEEP_INTERVAL.as_secs()
        );
        FALLBACK_SWEEP_INTERVAL
    } else {
        interval
    };

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = Arc::clone(&shutdown);

    let handle = tokio::spawn(async move {
        info!(interval_ms = interval.as_millis() as u64, "Session sweeper started");

        let mut ticker = tokio::time::interval(interval);
        // Skip immediate first tick
        ticker.tick().await;

        loop {
            ticker.tick().await;

            if shutdown.load(Ordering::Relaxed) {
                return;
            }

            store.sweep().await;
        }
    });

    SessionSweeper {
        handle,
        shutdown: shutdown_flag,
    }
}

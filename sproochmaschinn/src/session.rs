//! Session lifecycle: creation, keep-alive, live channel and teardown.

use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use parking_lot::{Mutex, RwLock};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval_at},
};
use tracing::{debug, info, warn};

use crate::{
    channel::{ChannelHandle, ReconnectScheduler},
    error::{Error, Result},
    transport::Transport,
    types::{ChannelMessage, SessionStatus},
};

/// Default server-side session inactivity window.
pub const DEFAULT_SESSION_EXPIRY: Duration = Duration::from_secs(10 * 60);

/// Default keep-alive interval (40% of the expiry window).
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(4 * 60);

/// Default live channel ping interval.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(30);

/// Default delay before reconnecting a dropped live channel.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Callback invoked on every session status transition.
pub type StatusCallback = Arc<dyn Fn(SessionStatus) + Send + Sync>;

/// Handler for decoded live channel messages.
pub type MessageHandler = Arc<dyn Fn(ChannelMessage) + Send + Sync>;

/// Session timing configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Server-side inactivity window after which a session expires.
    pub session_expiry: Duration,
    /// Keep-alive period; must be strictly shorter than `session_expiry`.
    pub keepalive_interval: Duration,
    /// Live channel liveness ping period.
    pub ping_interval: Duration,
    /// Delay before reconnecting a dropped live channel.
    pub reconnect_delay: Duration,
    /// Whether to open the live channel at all.
    pub live_channel: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_expiry: DEFAULT_SESSION_EXPIRY,
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            ping_interval: DEFAULT_PING_INTERVAL,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            live_channel: true,
        }
    }
}

impl SessionConfig {
    /// Validates the timing relationships.
    pub fn validate(&self) -> Result<()> {
        if self.keepalive_interval.is_zero() {
            return Err(Error::Config("keep-alive interval must be non-zero".to_string()));
        }
        if self.keepalive_interval >= self.session_expiry {
            return Err(Error::Config(format!(
                "keep-alive interval ({:?}) must be shorter than session expiry ({:?})",
                self.keepalive_interval, self.session_expiry
            )));
        }
        if self.ping_interval.is_zero() {
            return Err(Error::Config("ping interval must be non-zero".to_string()));
        }
        Ok(())
    }
}

#[derive(Default)]
struct SessionState {
    session_id: Option<String>,
    /// Bumped on every session change and on teardown. Background work
    /// carries the epoch it was started for and is void once it differs.
    epoch: u64,
    channel_open: bool,
}

/// Owns the single session of a client instance.
///
/// Shared as `Arc<SessionManager>` between the orchestrator and
/// [`JobClient`](crate::JobClient)s. Session id reads are lock-protected
/// and safe from any task.
pub struct SessionManager {
    transport: Arc<dyn Transport>,
    config: SessionConfig,
    state: RwLock<SessionState>,
    create_lock: tokio::sync::Mutex<()>,
    status_tx: watch::Sender<SessionStatus>,
    on_status: RwLock<Option<StatusCallback>>,
    handler: RwLock<Option<MessageHandler>>,
    keepalive: Mutex<Option<JoinHandle<()>>>,
    channel: Mutex<Option<ChannelHandle>>,
    reconnect: ReconnectScheduler,
}

impl SessionManager {
    /// Creates a manager with no session.
    pub fn new(transport: Arc<dyn Transport>, config: SessionConfig) -> Arc<Self> {
        let (status_tx, _) = watch::channel(SessionStatus::Uninitialized);
        Arc::new(Self {
            transport,
            config,
            state: RwLock::new(SessionState::default()),
            create_lock: tokio::sync::Mutex::new(()),
            status_tx,
            on_status: RwLock::new(None),
            handler: RwLock::new(None),
            keepalive: Mutex::new(None),
            channel: Mutex::new(None),
            reconnect: ReconnectScheduler::default(),
        })
    }

    /// Returns the current session id, if any.
    pub fn session_id(&self) -> Option<String> {
        self.state.read().session_id.clone()
    }

    /// Returns the current status.
    pub fn status(&self) -> SessionStatus {
        *self.status_tx.borrow()
    }

    /// Subscribes to status transitions.
    pub fn subscribe_status(&self) -> watch::Receiver<SessionStatus> {
        self.status_tx.subscribe()
    }

    /// Returns true while a live channel is connected for the current session.
    pub fn is_channel_open(&self) -> bool {
        self.state.read().channel_open
    }

    /// Returns true if a live channel reconnect is waiting to fire.
    pub fn reconnect_pending(&self) -> bool {
        self.reconnect.is_pending()
    }

    /// Returns the timing configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub(crate) fn transport(&self) -> Arc<dyn Transport> {
        self.transport.clone()
    }

    /// Registers the handler for live channel messages.
    pub fn set_message_handler<F>(&self, handler: F)
    where
        F: Fn(ChannelMessage) + Send + Sync + 'static,
    {
        *self.handler.write() = Some(Arc::new(handler));
    }

    /// Removes the live channel message handler.
    pub fn clear_message_handler(&self) {
        *self.handler.write() = None;
    }

    /// Establishes the first session and starts keep-alive.
    ///
    /// `on_status` receives `connecting` and then `connected` or `error`, and
    /// every later transition. A failure leaves the manager in `error` and is
    /// returned; the caller may retry.
    pub async fn initialize<F>(self: &Arc<Self>, on_status: F) -> Result<String>
    where
        F: Fn(SessionStatus) + Send + Sync + 'static,
    {
        *self.on_status.write() = Some(Arc::new(on_status));

        if let Some(id) = self.session_id() {
            debug!("initialize: session {} already active", id);
            return Ok(id);
        }
        self.create_session().await
    }

    /// Returns the current session id, creating a session first if needed.
    ///
    /// Concurrent callers share one creation request.
    pub async fn ensure_session(self: &Arc<Self>) -> Result<String> {
        if let Some(id) = self.session_id() {
            return Ok(id);
        }

        let _guard = self.create_lock.lock().await;
        if let Some(id) = self.session_id() {
            return Ok(id);
        }
        self.create_locked().await
    }

    /// Requests a new session, replacing the current one.
    pub async fn create_session(self: &Arc<Self>) -> Result<String> {
        let _guard = self.create_lock.lock().await;
        self.create_locked().await
    }

    async fn create_locked(self: &Arc<Self>) -> Result<String> {
        let start_epoch = self.state.read().epoch;
        self.set_status(SessionStatus::Connecting);

        let id = match self.transport.create_session().await {
            Ok(id) if !id.is_empty() => id,
            Ok(_) => {
                self.set_status(SessionStatus::Error);
                return Err(Error::SessionCreationFailed {
                    status: None,
                    message: "service returned an empty session id".to_string(),
                });
            }
            Err(e) => {
                warn!("session creation failed: {}", e);
                self.set_status(SessionStatus::Error);
                return Err(into_creation_error(e));
            }
        };

        let epoch = {
            let mut state = self.state.write();
            if state.epoch != start_epoch {
                // Torn down while the request was in flight.
                drop(state);
                debug!("discarding session {} created during teardown", id);
                return Err(Error::Cancelled);
            }
            state.session_id = Some(id.clone());
            state.epoch += 1;
            state.channel_open = false;
            state.epoch
        };

        info!("session created: {}", id);
        self.set_status(SessionStatus::Connected);

        self.reconnect.cancel();
        if self.config.live_channel {
            self.open_channel(id.clone(), epoch);
        } else {
            self.close_channel();
        }
        self.start_keepalive();

        Ok(id)
    }

    /// Pings the current session once; on failure replaces it.
    ///
    /// Failures are handled here and never surface to callers. If the
    /// replacement cannot be created the status becomes `error` but the
    /// previous id is kept, so [`ensure_session`](Self::ensure_session) keeps
    /// returning it; the next keep-alive tick tries again.
    pub async fn keepalive_once(self: &Arc<Self>) {
        let Some(id) = self.session_id() else { return };

        match self.transport.ping_session(&id).await {
            Ok(()) => debug!("keep-alive ok for session {}", id),
            Err(e) => {
                warn!("keep-alive failed for session {}: {}; recreating", id, e);
                if let Err(e) = self.create_session().await {
                    warn!("session recreation failed: {}", e);
                }
            }
        }
    }

    fn start_keepalive(self: &Arc<Self>) {
        let mut slot = self.keepalive.lock();
        if slot.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }

        let manager = Arc::downgrade(self);
        let period = self.config.keepalive_interval;
        *slot = Some(tokio::spawn(keepalive_loop(manager, period)));
    }

    /// Cancels timers, closes the live channel and clears the session.
    ///
    /// Safe to call any number of times.
    pub fn teardown(&self) {
        if let Some(handle) = self.keepalive.lock().take() {
            handle.abort();
        }
        self.reconnect.cancel();
        self.close_channel();

        let had_session = {
            let mut state = self.state.write();
            state.epoch += 1;
            state.channel_open = false;
            state.session_id.take().is_some()
        };

        if had_session {
            info!("session torn down");
        }
        self.set_status(SessionStatus::Uninitialized);
    }

    fn open_channel(self: &Arc<Self>, session_id: String, epoch: u64) {
        let handle = ChannelHandle::spawn(self, session_id, epoch);
        if let Some(prev) = self.channel.lock().replace(handle) {
            prev.close();
        }
    }

    fn close_channel(&self) {
        if let Some(prev) = self.channel.lock().take() {
            prev.close();
        }
    }

    /// Schedules one reconnect for the channel of `session_id`.
    ///
    /// The reconnect only happens if, when the timer fires, the same session
    /// is still current and the manager has not been torn down.
    pub(crate) fn schedule_reconnect(self: &Arc<Self>, session_id: String, epoch: u64) {
        if !self.is_current(epoch) {
            return;
        }

        let manager = Arc::downgrade(self);
        let delay = self.config.reconnect_delay;
        debug!("live channel reconnect in {:?}", delay);

        self.reconnect.schedule(delay, async move {
            let Some(mgr) = manager.upgrade() else { return };
            if !mgr.is_current(epoch) {
                debug!("skipping stale live channel reconnect for {}", session_id);
                return;
            }
            info!("reconnecting live channel for session {}", session_id);
            mgr.open_channel(session_id, epoch);
        });
    }

    pub(crate) fn set_channel_open(&self, epoch: u64, open: bool) {
        let mut state = self.state.write();
        if state.epoch == epoch {
            state.channel_open = open;
        }
    }

    pub(crate) fn dispatch(&self, msg: ChannelMessage) {
        let handler = self.handler.read().clone();
        match handler {
            Some(handler) => handler(msg),
            None => debug!("live channel message without handler: {:?}", msg.kind()),
        }
    }

    fn is_current(&self, epoch: u64) -> bool {
        let state = self.state.read();
        state.epoch == epoch && state.session_id.is_some()
    }

    fn set_status(&self, status: SessionStatus) {
        let previous = self.status_tx.send_replace(status);
        if previous == status && status != SessionStatus::Connecting {
            return;
        }
        let callback = self.on_status.read().clone();
        if let Some(callback) = callback {
            callback(status);
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        if let Some(handle) = self.keepalive.get_mut().take() {
            handle.abort();
        }
        self.reconnect.cancel();
        if let Some(channel) = self.channel.get_mut().take() {
            channel.close();
        }
    }
}

async fn keepalive_loop(manager: Weak<SessionManager>, period: Duration) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let Some(mgr) = manager.upgrade() else { break };
        mgr.keepalive_once().await;
    }
}

fn into_creation_error(e: Error) -> Error {
    match e {
        Error::SessionCreationFailed { .. } => e,
        other => Error::SessionCreationFailed {
            status: other.status(),
            message: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let cfg = SessionConfig::default();
        assert!(cfg.validate().is_ok());
        assert!(cfg.keepalive_interval < cfg.session_expiry);
    }

    #[test]
    fn test_keepalive_must_be_shorter_than_expiry() {
        let cfg = SessionConfig {
            keepalive_interval: Duration::from_secs(600),
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));

        let cfg = SessionConfig {
            keepalive_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_creation_error_carries_status() {
        let err = into_creation_error(Error::transport(503, "session failed: 503"));
        match err {
            Error::SessionCreationFailed { status, message } => {
                assert_eq!(status, Some(503));
                assert!(message.contains("503"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

//! Live notification channel bound to a session.
//!
//! The channel is supplementary to polling: it only forwards server pushes to
//! a handler. Its lifecycle is driven by [`SessionManager`]:
//!
//! - one driver task per open channel, pinging on a fixed interval;
//! - on remote close, one reconnect is scheduled through the
//!   [`ReconnectScheduler`], which holds at most one pending timer;
//! - whether the reconnect is still wanted is decided when the timer fires.

use std::{
    future::Future,
    sync::{Arc, Weak},
    time::Duration,
};

use parking_lot::Mutex;
use serde_json::Value;
use tokio::{
    task::JoinHandle,
    time::{Instant, interval_at},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    error::{Error, Result},
    session::SessionManager,
    transport::{ChannelLink, truncate_for_log},
    types::ChannelMessage,
};

/// Liveness message sent on every ping tick.
pub const PING_MESSAGE: &str = r#"{"type":"ping"}"#;

/// Decodes an inbound frame. Malformed payloads are reported as
/// [`Error::Json`] and dropped by the caller.
pub fn decode_message(text: &str) -> Result<ChannelMessage> {
    let value: Value = serde_json::from_str(text)?;
    Ok(ChannelMessage(value))
}

/// Handle to a running channel driver.
pub(crate) struct ChannelHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ChannelHandle {
    /// Spawns a driver that connects and then pumps the channel for
    /// `session_id` until cancelled or closed by the remote side.
    pub(crate) fn spawn(manager: &Arc<SessionManager>, session_id: String, epoch: u64) -> Self {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(drive(
            Arc::downgrade(manager),
            session_id,
            epoch,
            cancel.clone(),
        ));
        Self { cancel, task }
    }

    /// Closes the channel without scheduling a reconnect.
    pub(crate) fn close(self) {
        self.cancel.cancel();
        drop(self.task);
    }
}

async fn drive(manager: Weak<SessionManager>, session_id: String, epoch: u64, cancel: CancellationToken) {
    let Some(mgr) = manager.upgrade() else { return };
    let transport = mgr.transport();
    let ping_interval = mgr.config().ping_interval;
    drop(mgr);

    let link = tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        result = transport.open_channel(&session_id) => result,
    };

    match link {
        Ok(link) => {
            debug!("live channel open for session {}", session_id);
            if let Some(mgr) = manager.upgrade() {
                mgr.set_channel_open(epoch, true);
            }
            let closed_remotely = pump(&manager, link, ping_interval, &cancel).await;
            if let Some(mgr) = manager.upgrade() {
                mgr.set_channel_open(epoch, false);
                if closed_remotely {
                    debug!("live channel closed for session {}", session_id);
                    mgr.schedule_reconnect(session_id, epoch);
                }
            }
        }
        Err(e) => {
            let e = match e {
                Error::Channel(_) => e,
                other => Error::Channel(other.to_string()),
            };
            warn!("{}", e);
            if let Some(mgr) = manager.upgrade() {
                mgr.schedule_reconnect(session_id, epoch);
            }
        }
    }
}

/// Runs the ping/receive loop. Returns true if the remote side closed the
/// channel, false if it was cancelled locally.
async fn pump(
    manager: &Weak<SessionManager>,
    mut link: ChannelLink,
    ping_interval: Duration,
    cancel: &CancellationToken,
) -> bool {
    let mut ping = interval_at(Instant::now() + ping_interval, ping_interval);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return false,
            _ = ping.tick() => {
                if link.outgoing.send(PING_MESSAGE.to_string()).await.is_err() {
                    return true;
                }
            }
            frame = link.incoming.recv() => {
                let Some(text) = frame else { return true };
                let Some(mgr) = manager.upgrade() else { return false };
                match decode_message(&text) {
                    Ok(msg) => mgr.dispatch(msg),
                    Err(e) => debug!(
                        "dropping malformed live channel payload ({}): {}",
                        e,
                        truncate_for_log(&text, 120)
                    ),
                }
            }
        }
    }
}

/// Holds at most one pending reconnect timer.
#[derive(Default)]
pub(crate) struct ReconnectScheduler {
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl ReconnectScheduler {
    /// Replaces any pending timer with one that runs `task` after `delay`.
    pub(crate) fn schedule<F>(&self, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut pending = self.pending.lock();
        if let Some(prev) = pending.take() {
            prev.abort();
        }
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        }));
    }

    /// Aborts the pending timer, if any.
    pub(crate) fn cancel(&self) {
        if let Some(prev) = self.pending.lock().take() {
            prev.abort();
        }
    }

    /// Returns true if a timer is waiting to fire.
    pub(crate) fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}

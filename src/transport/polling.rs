//! Long-polling transport
//!
//! Fallback for clients that cannot upgrade to a WebSocket. A session is
//! opened with one request, then the client alternates between waiting for
//! frames and posting its own. Sessions that stop polling are reaped after the
//! ping timeout.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tokio::{
    sync::{mpsc, Mutex as AsyncMutex},
    task::JoinHandle,
    time::{interval, timeout, Instant, MissedTickBehavior},
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    error::PollError,
    model::{
        connection::{ConnectionId, Outbound},
        payload::Frame,
    },
    transport::{Liveness, SignalHandler},
};

struct PollSession {
    id: ConnectionId,
    inbox: AsyncMutex<mpsc::Receiver<Frame>>,
    /// Serializes dispatch and close for this session; `true` once closed.
    closed: AsyncMutex<bool>,
    last_seen: Mutex<Instant>,
}

impl PollSession {
    fn new(id: ConnectionId, inbox: mpsc::Receiver<Frame>) -> PollSession {
        PollSession {
            id,
            inbox: AsyncMutex::new(inbox),
            closed: AsyncMutex::new(false),
            last_seen: Mutex::new(Instant::now()),
        }
    }

    fn touch(&self) {
        *self.last_seen.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    fn idle_for(&self, now: Instant) -> std::time::Duration {
        now.saturating_duration_since(*self.last_seen.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Live polling sessions, keyed by a random session id.
///
/// The session id is the only credential a polling peer holds, so it is never
/// derived from the connection id.
pub struct PollSessions {
    handler: Arc<dyn SignalHandler>,
    liveness: Liveness,
    sessions: Mutex<HashMap<Uuid, Arc<PollSession>>>,
}

impl PollSessions {
    pub fn new(handler: Arc<dyn SignalHandler>, liveness: Liveness) -> Self {
        PollSessions {
            handler,
            liveness,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Attach a new polling peer and return its session id.
    pub fn open(&self) -> Result<Uuid, PollError> {
        let (outbound, inbox) = Outbound::channel(self.liveness.outbound_buffer);
        let id = self.handler.on_connect(outbound)?;
        let sid = Uuid::new_v4();
        self.lock().insert(sid, Arc::new(PollSession::new(id, inbox)));
        debug!("Polling session opened for client ({})", id);
        Ok(sid)
    }

    /// Wait up to the poll window for frames, then return everything queued.
    pub async fn poll(&self, sid: Uuid) -> Result<Vec<Frame>, PollError> {
        let session = self.session(sid)?;
        session.touch();

        let mut frames = Vec::new();
        {
            let mut inbox = session.inbox.lock().await;
            match timeout(self.liveness.poll_window(), inbox.recv()).await {
                Ok(Some(frame)) => {
                    frames.push(frame);
                    while let Ok(frame) = inbox.try_recv() {
                        frames.push(frame);
                    }
                }
                // Registry dropped the sender: the session was closed meanwhile.
                Ok(None) => return Err(PollError::UnknownSession),
                Err(_) => {}
            }
        }

        session.touch();
        Ok(frames)
    }

    /// Dispatch frames posted by the peer, in order.
    pub async fn push(&self, sid: Uuid, frames: Vec<Frame>) -> Result<(), PollError> {
        let session = self.session(sid)?;
        session.touch();

        let closed = session.closed.lock().await;
        if *closed {
            return Err(PollError::UnknownSession);
        }
        for frame in frames {
            self.handler.on_message(session.id, frame);
        }
        Ok(())
    }

    /// Parse a posted body (one envelope or an array) and dispatch it.
    ///
    /// A body that does not parse is logged and rejected as a whole; the
    /// session stays open.
    pub async fn push_text(&self, sid: Uuid, text: &str) -> Result<(), PollError> {
        let session = self.session(sid)?;
        let frames = Frame::parse_batch(text).map_err(|e| {
            warn!("Polling client ({}) sent an invalid frame: {}", session.id, e);
            PollError::InvalidFrame(e)
        })?;
        self.push(sid, frames).await
    }

    /// Close a session at the peer's request.
    pub async fn close(&self, sid: Uuid) -> Result<(), PollError> {
        let session = self.lock().remove(&sid).ok_or(PollError::UnknownSession)?;
        self.finish(&session).await;
        Ok(())
    }

    /// Close every session that has not been polled within the ping timeout.
    pub async fn reap_idle(&self) -> usize {
        let now = Instant::now();
        let stale: Vec<Arc<PollSession>> = {
            let mut sessions = self.lock();
            let sids: Vec<Uuid> = sessions
                .iter()
                .filter(|(_, s)| s.idle_for(now) > self.liveness.ping_timeout)
                .map(|(sid, _)| *sid)
                .collect();
            sids.iter().filter_map(|sid| sessions.remove(sid)).collect()
        };

        for session in &stale {
            info!("Polling client ({}) timed out", session.id);
            self.finish(session).await;
        }
        stale.len()
    }

    /// Run [`reap_idle`](Self::reap_idle) every ping interval.
    pub fn spawn_reaper(self: &Arc<Self>) -> JoinHandle<()> {
        let sessions = Arc::clone(self);
        tokio::spawn(async move {
            let mut tick = interval(sessions.liveness.ping_interval);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tick.tick().await;
                sessions.reap_idle().await;
            }
        })
    }

    async fn finish(&self, session: &PollSession) {
        let mut closed = session.closed.lock().await;
        if !*closed {
            *closed = true;
            self.handler.on_disconnect(session.id);
        }
    }

    fn session(&self, sid: Uuid) -> Result<Arc<PollSession>, PollError> {
        self.lock().get(&sid).cloned().ok_or(PollError::UnknownSession)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, Arc<PollSession>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

//! Streaming audio sessions: chunk ingestion, background transcription passes,
//! finalisation and inactivity eviction.
//!
//! Registry mutations happen under the map's write lock and never span a provider call.
//! A session allows at most one transcription pass in flight; triggers that arrive
//! meanwhile are no-ops and their audio waits for the next pass.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::StreamingSettings;
use babelrelay_core::{AudioData, SttProvider};
use babelrelay_utils::{concat_chunks, label_buffer, retain_tail};

/// What the transport layer gets told about a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SessionEvent {
    Partial {
        #[serde(rename = "sessionId")]
        session_id: String,
        text: String,
    },
    Final {
        #[serde(rename = "sessionId")]
        session_id: String,
        text: String,
    },
    Error {
        #[serde(rename = "sessionId")]
        session_id: String,
        message: String,
    },
}

impl SessionEvent {
    pub fn session_id(&self) -> &str {
        match self {
            Self::Partial { session_id, .. } | Self::Final { session_id, .. } | Self::Error { session_id, .. } => {
                session_id
            }
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, Self::Final { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Accumulating,
    Processing,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Accumulating => write!(f, "accumulating"),
            Self::Processing => write!(f, "processing"),
        }
    }
}

/// Read-only view of a session for status pages and tests.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub id: String,
    pub language: String,
    pub status: SessionStatus,
    pub chunk_count: usize,
    pub buffered_bytes: usize,
    pub accumulated_text: String,
    pub created_at: DateTime<Utc>,
    pub idle_for: Duration,
}

struct StreamingSession {
    id: String,
    language: String,
    /// Distinguishes this record from a later one created under the same id.
    instance: Uuid,
    chunks: Vec<Bytes>,
    created_at: DateTime<Utc>,
    last_activity: Instant,
    in_flight: bool,
    /// Leading chunks handed to the pass in flight.
    submitted_chunks: usize,
    accumulated_text: String,
    idle: Arc<Notify>,
}

impl StreamingSession {
    fn new(id: String, language: String, chunk: Bytes) -> Self {
        let mut chunks = Vec::new();
        if !chunk.is_empty() {
            chunks.push(chunk);
        }
        Self {
            id,
            language,
            instance: Uuid::new_v4(),
            chunks,
            created_at: Utc::now(),
            last_activity: Instant::now(),
            in_flight: false,
            submitted_chunks: 0,
            accumulated_text: String::new(),
            idle: Arc::new(Notify::new()),
        }
    }

    fn buffered_bytes(&self) -> usize {
        self.chunks.iter().map(Bytes::len).sum()
    }

    fn append_text(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        if !self.accumulated_text.is_empty() {
            self.accumulated_text.push(' ');
        }
        self.accumulated_text.push_str(text);
    }

    fn info(&self, now: Instant) -> SessionInfo {
        SessionInfo {
            id: self.id.clone(),
            language: self.language.clone(),
            status: if self.in_flight {
                SessionStatus::Processing
            } else {
                SessionStatus::Accumulating
            },
            chunk_count: self.chunks.len(),
            buffered_bytes: self.buffered_bytes(),
            accumulated_text: self.accumulated_text.clone(),
            created_at: self.created_at,
            idle_for: now.saturating_duration_since(self.last_activity),
        }
    }
}

struct PreparedPass {
    session_id: String,
    language: String,
    instance: Uuid,
    audio: Bytes,
    idle: Arc<Notify>,
}

enum PassDecision {
    Started(PreparedPass),
    InFlight(Arc<Notify>),
    Skipped,
    Missing,
}

struct RegistryInner {
    sessions: RwLock<HashMap<String, StreamingSession>>,
    transcriber: Arc<dyn SttProvider>,
    settings: StreamingSettings,
    events: mpsc::UnboundedSender<SessionEvent>,
}

/// Keyed store of in-progress streaming sessions. Cloning yields another handle to the
/// same registry.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
}

impl SessionRegistry {
    /// Returns the registry and its event stream. The channel is unbounded so a pass never
    /// waits on the transport: the receiver must be drained continuously, or dropped, in
    /// which case events are discarded.
    pub fn new(
        transcriber: Arc<dyn SttProvider>,
        settings: StreamingSettings,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let registry = Self {
            inner: Arc::new(RegistryInner {
                sessions: RwLock::new(HashMap::new()),
                transcriber,
                settings,
                events,
            }),
        };
        (registry, receiver)
    }

    pub fn settings(&self) -> &StreamingSettings {
        &self.inner.settings
    }

    /// Inserts a session holding `chunk`. An existing session under `id` is replaced and
    /// its buffered audio is lost; returns `true` when that happened.
    pub async fn create_session(&self, id: impl Into<String>, language: impl Into<String>, chunk: Bytes) -> bool {
        let session = StreamingSession::new(id.into(), language.into(), chunk);
        let id = session.id.clone();
        let instance = session.instance;

        let previous = self.inner.sessions.write().await.insert(id.clone(), session);
        match previous {
            Some(old) => {
                warn!(
                    session_id = %id,
                    dropped_bytes = old.buffered_bytes(),
                    was_in_flight = old.in_flight,
                    "Session recreated, previous buffer discarded"
                );
                true
            }
            None => {
                info!(session_id = %id, instance = %instance, "Session created");
                false
            }
        }
    }

    /// Appends to a known session and refreshes its activity time. Chunks for unknown
    /// sessions are dropped.
    pub async fn append_chunk(&self, id: &str, chunk: Bytes) -> bool {
        let mut sessions = self.inner.sessions.write().await;
        match sessions.get_mut(id) {
            Some(session) => {
                if !chunk.is_empty() {
                    session.chunks.push(chunk);
                }
                session.last_activity = Instant::now();
                true
            }
            None => {
                debug!(session_id = %id, bytes = chunk.len(), "Chunk for unknown session dropped");
                false
            }
        }
    }

    /// Starts a background transcription pass if the session is idle and holds enough
    /// audio. Returns the pass's handle, or `None` if no pass was started.
    pub async fn trigger_processing(&self, id: &str) -> Option<JoinHandle<()>> {
        match self.prepare_pass(id).await {
            PassDecision::Started(pass) => {
                let registry = self.clone();
                Some(tokio::spawn(async move { registry.run_pass(pass).await }))
            }
            PassDecision::InFlight(_) | PassDecision::Skipped | PassDecision::Missing => None,
        }
    }

    /// Waits for any pass in flight, runs one last pass over the remaining audio, then
    /// removes the session and emits its `final` event. Returns the final text, or `None`
    /// if the session was unknown.
    pub async fn finalize_session(&self, id: &str) -> Option<String> {
        loop {
            match self.prepare_pass(id).await {
                PassDecision::Missing => {
                    debug!(session_id = %id, "Finalize for unknown session ignored");
                    return None;
                }
                PassDecision::InFlight(idle) => {
                    let notified = idle.notified();
                    tokio::pin!(notified);
                    notified.as_mut().enable();
                    if self.is_in_flight(id).await {
                        debug!(session_id = %id, "Waiting for in-flight pass before finalizing");
                        notified.await;
                    }
                }
                PassDecision::Started(pass) => {
                    self.run_pass(pass).await;
                    break;
                }
                PassDecision::Skipped => break,
            }
        }

        // Evicted while the last pass ran.
        let session = self.inner.sessions.write().await.remove(id)?;
        let text = session.accumulated_text;
        info!(
            session_id = %id,
            text_len = text.len(),
            unprocessed_bytes = session.chunks.iter().map(Bytes::len).sum::<usize>(),
            "Session finalized"
        );
        self.emit(SessionEvent::Final {
            session_id: id.to_string(),
            text: text.clone(),
        });
        Some(text)
    }

    /// Removes every session idle for longer than `max_age`, including ones with a pass
    /// in flight. Returns the removed ids.
    pub async fn evict_inactive(&self, max_age: Duration) -> Vec<String> {
        let now = Instant::now();
        let mut evicted = Vec::new();

        let mut sessions = self.inner.sessions.write().await;
        sessions.retain(|id, session| {
            let idle_for = now.saturating_duration_since(session.last_activity);
            if idle_for > max_age {
                info!(
                    session_id = %id,
                    idle_ms = idle_for.as_millis() as u64,
                    in_flight = session.in_flight,
                    "Evicting inactive session"
                );
                evicted.push(id.clone());
                false
            } else {
                true
            }
        });

        evicted
    }

    /// Calls [`evict_inactive`](Self::evict_inactive) every `interval` until aborted.
    /// `interval` must be non-zero; [`RelayConfig::validate`](crate::RelayConfig::validate)
    /// rejects a zero `eviction_interval_ms`.
    pub fn spawn_eviction_task(&self, interval: Duration, max_age: Duration) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let evicted = registry.evict_inactive(max_age).await;
                if !evicted.is_empty() {
                    debug!(count = evicted.len(), "Eviction sweep finished");
                }
            }
        })
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.inner.sessions.read().await.contains_key(id)
    }

    pub async fn buffered_bytes(&self, id: &str) -> Option<usize> {
        self.inner.sessions.read().await.get(id).map(StreamingSession::buffered_bytes)
    }

    pub async fn accumulated_text(&self, id: &str) -> Option<String> {
        self.inner
            .sessions
            .read()
            .await
            .get(id)
            .map(|session| session.accumulated_text.clone())
    }

    pub async fn is_in_flight(&self, id: &str) -> bool {
        self.inner
            .sessions
            .read()
            .await
            .get(id)
            .map_or(false, |session| session.in_flight)
    }

    pub async fn session_info(&self, id: &str) -> Option<SessionInfo> {
        let now = Instant::now();
        self.inner.sessions.read().await.get(id).map(|session| session.info(now))
    }

    pub async fn list_sessions(&self) -> Vec<SessionInfo> {
        let now = Instant::now();
        let mut sessions: Vec<SessionInfo> = self
            .inner
            .sessions
            .read()
            .await
            .values()
            .map(|session| session.info(now))
            .collect();
        sessions.sort_by(|a, b| a.id.cmp(&b.id));
        sessions
    }

    pub async fn len(&self) -> usize {
        self.inner.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.sessions.read().await.is_empty()
    }

    async fn prepare_pass(&self, id: &str) -> PassDecision {
        let settings = &self.inner.settings;
        let mut sessions = self.inner.sessions.write().await;
        let Some(session) = sessions.get_mut(id) else {
            return PassDecision::Missing;
        };

        if session.in_flight {
            debug!(session_id = %id, "Pass already in flight, audio stays buffered");
            return PassDecision::InFlight(session.idle.clone());
        }

        let combined = concat_chunks(&session.chunks);
        if combined.is_empty() {
            return PassDecision::Skipped;
        }

        let (combined, dropped) = retain_tail(combined, settings.max_buffer_bytes);
        if dropped > 0 {
            warn!(
                session_id = %id,
                dropped_bytes = dropped,
                kept_bytes = combined.len(),
                "Buffer over ceiling, discarding oldest audio"
            );
            session.chunks = vec![combined.clone()];
        }

        if combined.len() < settings.min_chunk_bytes {
            debug!(
                session_id = %id,
                buffered_bytes = combined.len(),
                min_chunk_bytes = settings.min_chunk_bytes,
                "Not enough audio yet, skipping pass"
            );
            return PassDecision::Skipped;
        }

        session.chunks = vec![combined.clone()];
        session.submitted_chunks = 1;
        session.in_flight = true;

        PassDecision::Started(PreparedPass {
            session_id: session.id.clone(),
            language: session.language.clone(),
            instance: session.instance,
            audio: combined,
            idle: session.idle.clone(),
        })
    }

    async fn run_pass(&self, pass: PreparedPass) {
        let format = label_buffer(&pass.audio, &self.inner.settings.default_format);
        let bytes = pass.audio.len();
        debug!(session_id = %pass.session_id, bytes, format = %format.format, "Transcription pass started");

        let outcome = self
            .inner
            .transcriber
            .transcribe(AudioData::new(pass.audio, format), Some(pass.language.as_str()))
            .await;

        {
            let mut sessions = self.inner.sessions.write().await;
            match sessions
                .get_mut(&pass.session_id)
                .filter(|session| session.instance == pass.instance)
            {
                None => {
                    debug!(session_id = %pass.session_id, "Session gone, discarding late transcription result");
                }
                Some(session) => {
                    session.in_flight = false;
                    match outcome {
                        Ok(result) => {
                            let submitted = session.submitted_chunks.min(session.chunks.len());
                            session.chunks.drain(..submitted);
                            session.submitted_chunks = 0;
                            session.append_text(&result.text);
                            debug!(
                                session_id = %pass.session_id,
                                bytes,
                                text_len = session.accumulated_text.len(),
                                "Transcription pass finished"
                            );
                            self.emit(SessionEvent::Partial {
                                session_id: pass.session_id.clone(),
                                text: session.accumulated_text.clone(),
                            });
                        }
                        Err(e) => {
                            session.submitted_chunks = 0;
                            warn!(session_id = %pass.session_id, error = %e, "Transcription pass failed");
                            self.emit(SessionEvent::Error {
                                session_id: pass.session_id.clone(),
                                message: e.to_string(),
                            });
                        }
                    }
                }
            }
        }

        pass.idle.notify_waiters();
    }

    fn emit(&self, event: SessionEvent) {
        if self.inner.events.send(event).is_err() {
            debug!("Session event receiver dropped");
        }
    }
}

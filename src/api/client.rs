use crate::api::events::TransportEvent;
use crate::error::TransportError;
use async_trait::async_trait;
use log::{debug, info, warn};
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

/// The session layer this crate sits on. Implementations own the wire
/// protocol and credentials and push everything they observe into `events`.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Starts one session. Events for it are delivered on `events`; the session
    /// is over once a `Closed` event is sent or the sender is dropped.
    async fn connect(&self, events: mpsc::UnboundedSender<TransportEvent>)
        -> Result<(), TransportError>;

    /// Sends a text message and returns the provider-assigned message id.
    async fn send_text(&self, to: &str, text: &str) -> Result<String, TransportError>;

    /// Read receipts. Callers treat failures as non-fatal.
    async fn mark_read(&self, chat: &str, ids: &[String]) -> Result<(), TransportError>;
}

/// Replays a recorded event stream: one JSON-encoded [`TransportEvent`] per
/// line. Each `connect` replays the whole recording once. Sends are
/// acknowledged locally with sequential ids.
pub struct ReplayClient {
    events: Vec<TransportEvent>,
    next_id: AtomicU64,
    read_log: Mutex<Vec<(String, Vec<String>)>>,
}

impl ReplayClient {
    pub fn new(events: Vec<TransportEvent>) -> Self {
        Self {
            events,
            next_id: AtomicU64::new(1),
            read_log: Mutex::new(Vec::new()),
        }
    }

    /// Parses a JSON-lines recording. Blank lines and `#` comments are skipped;
    /// lines that fail to decode are logged and skipped.
    pub fn from_json_lines(text: &str) -> Self {
        let mut events = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match serde_json::from_str::<TransportEvent>(line) {
                Ok(ev) => events.push(ev),
                Err(e) => warn!("replay line {}: {}", idx + 1, e),
            }
        }
        Self::new(events)
    }

    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let text = fs::read_to_string(path)?;
        let client = Self::from_json_lines(&text);
        info!("loaded {} replay events from {}", client.events.len(), path.display());
        Ok(client)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Read receipts issued so far, as `(chat, ids)`.
    pub fn read_receipts(&self) -> Vec<(String, Vec<String>)> {
        self.read_log.lock().map(|log| log.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Transport for ReplayClient {
    async fn connect(
        &self,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Result<(), TransportError> {
        for ev in self.events.iter().cloned() {
            debug!("replaying {}", ev.kind());
            if events.send(ev).is_err() {
                return Err(TransportError::Connect("event receiver dropped".into()));
            }
        }
        Ok(())
    }

    async fn send_text(&self, to: &str, text: &str) -> Result<String, TransportError> {
        if to.is_empty() {
            return Err(TransportError::Send("no destination".into()));
        }
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!("replay send to {} ({} bytes)", to, text.len());
        Ok(format!("REPLAY{:08}", n))
    }

    async fn mark_read(&self, chat: &str, ids: &[String]) -> Result<(), TransportError> {
        let mut log = self
            .read_log
            .lock()
            .map_err(|_| TransportError::Send("read log poisoned".into()))?;
        log.push((chat.to_string(), ids.to_vec()));
        Ok(())
    }
}

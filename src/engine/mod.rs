//! The ingestion engine: drives the transport session, reconciles every event
//! into the store and tells observers what changed.
//!
//! Events are processed one at a time, each inside a single store
//! transaction. Outbound sends may run concurrently from another task; they
//! share the store lock but never touch the retry state.

pub mod session;

pub use session::{CloseAction, ConnectionSession, ConnectionState, RetryPolicy};

use crate::api::client::Transport;
use crate::api::events::{
    DisconnectReason, HistorySync, TransportEvent, WireChat, WireCode, WireContact, WireMessage,
    WireStatusUpdate,
};
use crate::api::models::{ChatUpsert, ContentType, Conversation, Message, MessageStatus};
use crate::app::AppConfig;
use crate::error::{SendError, StoreResult};
use crate::extract::extract;
use crate::names;
use crate::notify::ChangeNotifier;
use crate::storage::{Store, Writer};
use crate::utils::now_secs;
use log::{debug, error, info, warn};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{broadcast, mpsc, watch};

/// Sender name recorded on the owner's own messages.
pub const OWNER_NAME: &str = "You";
const OWNER_FALLBACK_ID: &str = "me";
const CONVERSATION_LIST_LIMIT: usize = 500;

/// What observers are told. Delivered on the engine's broadcast channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    ConnectionState(ConnectionState),
    /// Pairing payload, passed through untouched for the UI to render.
    PairingChallenge(String),
    MessageAvailable(Message),
    /// Debounced: at most one per quiet period.
    StoreChanged,
}

struct Inner<T> {
    transport: T,
    store: Arc<Store>,
    config: AppConfig,
    session: Mutex<ConnectionSession>,
    signals: broadcast::Sender<Signal>,
    notifier: ChangeNotifier,
    shutdown: watch::Sender<bool>,
}

pub struct Engine<T: Transport> {
    inner: Arc<Inner<T>>,
}

impl<T: Transport> Clone for Engine<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport> Engine<T> {
    /// Must be called from within a tokio runtime.
    pub fn new(transport: T, store: Arc<Store>, config: AppConfig) -> Self {
        let (signals, _) = broadcast::channel(256);
        let changed = signals.clone();
        let notifier = ChangeNotifier::spawn(config.debounce(), move || {
            let _ = changed.send(Signal::StoreChanged);
        });
        let (shutdown, _) = watch::channel(false);
        let session = ConnectionSession::new(RetryPolicy::from_config(&config));
        Self {
            inner: Arc::new(Inner {
                transport,
                store,
                config,
                session: Mutex::new(session),
                signals,
                notifier,
                shutdown,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Signal> {
        self.inner.signals.subscribe()
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.inner.store
    }

    pub fn transport(&self) -> &T {
        &self.inner.transport
    }

    pub fn state(&self) -> ConnectionState {
        self.session().state()
    }

    pub fn retries(&self) -> u32 {
        self.session().retries()
    }

    fn session(&self) -> MutexGuard<'_, ConnectionSession> {
        self.inner
            .session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, signal: Signal) {
        let _ = self.inner.signals.send(signal);
    }

    fn emit_state(&self, state: ConnectionState) {
        info!("connection {}", state);
        self.emit(Signal::ConnectionState(state));
    }

    fn touch(&self) {
        self.inner.notifier.touch();
    }

    /// Asks a running (or the next) `run` to stop. A pending reconnect is cancelled.
    pub fn shutdown(&self) {
        self.inner.shutdown.send_replace(true);
    }

    /// Runs sessions until the engine settles in `Disconnected`: after a
    /// logout, after the retry budget is spent, or on `shutdown`. Calling it
    /// again restarts with a fresh retry budget.
    pub async fn run(&self) -> ConnectionState {
        let mut stop = self.inner.shutdown.subscribe();
        let state = self.session().start();
        self.emit_state(state);

        loop {
            let reason = tokio::select! {
                reason = self.run_session() => reason,
                _ = stop_requested(&mut stop) => return self.stopped(),
            };

            let action = self.session().on_close(reason);
            match action {
                CloseAction::Stop => {
                    if reason.is_logged_out() {
                        info!("logged out, clearing credentials");
                        if let Err(e) = self.inner.store.clear_auth_keys() {
                            error!("failed to clear auth keys: {}", e);
                        }
                    } else {
                        warn!("giving up after {:?}", reason);
                    }
                    self.emit_state(ConnectionState::Disconnected);
                    return ConnectionState::Disconnected;
                }
                CloseAction::Reconnect { attempt, delay } => {
                    warn!(
                        "connection closed ({:?}), retry {} in {}ms",
                        reason,
                        attempt,
                        delay.as_millis()
                    );
                    self.emit_state(ConnectionState::Connecting);
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = stop_requested(&mut stop) => return self.stopped(),
                    }
                }
            }
        }
    }

    fn stopped(&self) -> ConnectionState {
        self.session().shutdown();
        self.inner.shutdown.send_replace(false);
        self.emit_state(ConnectionState::Disconnected);
        ConnectionState::Disconnected
    }

    /// One transport session, from connect to close.
    async fn run_session(&self) -> DisconnectReason {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut connect = self.inner.transport.connect(tx);
        let mut connecting = true;
        loop {
            tokio::select! {
                res = &mut connect, if connecting => {
                    connecting = false;
                    if let Err(e) = res {
                        warn!("transport connect failed: {}", e);
                        return DisconnectReason::ConnectionLost;
                    }
                }
                ev = rx.recv() => match ev {
                    Some(ev) => {
                        if let Some(reason) = self.process(ev) {
                            return reason;
                        }
                    }
                    None => return DisconnectReason::ConnectionClosed,
                },
            }
        }
    }

    /// Applies one transport event. Returns the close reason when the event
    /// ends the session; deciding what happens next is up to `run`.
    pub fn process(&self, ev: TransportEvent) -> Option<DisconnectReason> {
        debug!("event {}", ev.kind());
        match ev {
            TransportEvent::Connecting => {}
            TransportEvent::PairingChallenge { code } => {
                let moved = self.session().on_pairing();
                if let Some(state) = moved {
                    self.emit_state(state);
                }
                self.emit(Signal::PairingChallenge(code));
            }
            TransportEvent::Open { me } => {
                let moved = self.session().on_open(me);
                if let Some(state) = moved {
                    self.emit_state(state);
                }
            }
            TransportEvent::Closed {
                status_code,
                message,
            } => {
                debug!("close {:?}: {}", status_code, message);
                return Some(DisconnectReason::from_status(status_code));
            }
            TransportEvent::HistorySync(sync) => self.apply_history(&sync),
            TransportEvent::ChatsUpsert(chats) | TransportEvent::ChatsUpdate(chats) => {
                self.apply_chats(&chats)
            }
            TransportEvent::ContactsUpsert(contacts) | TransportEvent::ContactsUpdate(contacts) => {
                self.apply_contacts(&contacts)
            }
            TransportEvent::MessagesUpsert(messages) => self.apply_messages(&messages),
            TransportEvent::MessagesUpdate(updates) => self.apply_status_updates(&updates),
        }
        None
    }

    fn me(&self) -> Option<String> {
        self.session().me().map(str::to_string)
    }

    /// Conversations first so messages have rows to attach to, then contacts,
    /// then messages.
    fn apply_history(&self, sync: &HistorySync) {
        let me = self.me();
        let res = self.inner.store.write(|w| {
            for chat in &sync.chats {
                if !names::is_broadcast(&chat.id) {
                    w.upsert_conversation(&chat_upsert(w, chat)?)?;
                }
            }
            for contact in &sync.contacts {
                merge_contact(w, contact)?;
            }
            let mut kept = 0usize;
            for msg in &sync.messages {
                if reconcile_message(w, msg, me.as_deref())?.is_some() {
                    kept += 1;
                }
            }
            Ok(kept)
        });
        match res {
            Ok(kept) => {
                info!(
                    "history sync: {} chats, {} contacts, {}/{} messages kept{}",
                    sync.chats.len(),
                    sync.contacts.len(),
                    kept,
                    sync.messages.len(),
                    if sync.is_latest { " (latest)" } else { "" }
                );
                self.touch();
            }
            Err(e) => error!("history sync rolled back: {}", e),
        }
    }

    fn apply_chats(&self, chats: &[WireChat]) {
        let res = self.inner.store.write(|w| {
            for chat in chats.iter().filter(|c| !names::is_broadcast(&c.id)) {
                w.upsert_conversation(&chat_upsert(w, chat)?)?;
            }
            Ok(())
        });
        if let Err(e) = res {
            error!("chat update rolled back: {}", e);
        }
        self.touch();
    }

    fn apply_contacts(&self, contacts: &[WireContact]) {
        let res = self.inner.store.write(|w| {
            for contact in contacts {
                merge_contact(w, contact)?;
            }
            Ok(())
        });
        if let Err(e) = res {
            error!("contact update rolled back: {}", e);
        }
        self.touch();
    }

    fn apply_messages(&self, messages: &[WireMessage]) {
        let me = self.me();
        let res = self.inner.store.write(|w| {
            let mut kept = Vec::new();
            for msg in messages {
                if let Some((stored, is_new)) = reconcile_message(w, msg, me.as_deref())? {
                    // redeliveries replace the row but were already counted
                    if is_new && !stored.from_me {
                        w.increment_unread(&stored.conversation_id)?;
                    }
                    kept.push(stored);
                }
            }
            Ok(kept)
        });
        match res {
            Ok(kept) => {
                if kept.is_empty() {
                    return;
                }
                for msg in kept {
                    self.emit(Signal::MessageAvailable(msg));
                }
                self.touch();
            }
            Err(e) => error!("message upsert rolled back: {}", e),
        }
    }

    fn apply_status_updates(&self, updates: &[WireStatusUpdate]) {
        let res = self.inner.store.write(|w| {
            let mut changed = 0usize;
            for up in updates {
                let status = wire_status(&up.status);
                if w.update_message_status(&up.key.remote_jid, &up.key.id, status)? {
                    changed += 1;
                } else {
                    debug!("status for unknown message {}", up.key.id);
                }
            }
            Ok(changed)
        });
        match res {
            Ok(0) => {}
            Ok(_) => self.touch(),
            Err(e) => error!("status update rolled back: {}", e),
        }
    }

    /// Sends `text` and records it locally once the transport accepts it.
    /// A transport failure leaves the store untouched.
    pub async fn send_text(&self, to: &str, text: &str) -> Result<Message, SendError> {
        if text.trim().is_empty() {
            return Err(SendError::EmptyText);
        }
        let id = self.inner.transport.send_text(to, text).await?;
        let msg = Message {
            id,
            conversation_id: to.to_string(),
            sender: self.me().unwrap_or_else(|| OWNER_FALLBACK_ID.to_string()),
            sender_name: OWNER_NAME.to_string(),
            body: text.to_string(),
            timestamp: now_secs(),
            from_me: true,
            status: MessageStatus::Sent,
            content_type: ContentType::Text,
        };
        self.inner.store.write(|w| {
            let name = chat_name(w, to)?;
            w.upsert_conversation(
                &ChatUpsert::new(to)
                    .name(name)
                    .last(msg.body.as_str(), msg.timestamp),
            )?;
            w.upsert_message(&msg)?;
            Ok(())
        })?;
        self.touch();
        Ok(msg)
    }

    /// Zeroes the unread counter and sends a best-effort read receipt for the
    /// messages it covered.
    pub async fn reset_unread(&self, chat_id: &str) -> StoreResult<()> {
        let store = &self.inner.store;
        let unread = store.conversation(chat_id)?.map(|c| c.unread).unwrap_or(0);
        store.reset_unread(chat_id)?;
        self.touch();
        if unread == 0 {
            return Ok(());
        }
        let ids = store.recent_incoming_ids(chat_id, unread as usize)?;
        if !ids.is_empty() {
            if let Err(e) = self.inner.transport.mark_read(chat_id, &ids).await {
                warn!("read receipt for {} failed: {}", chat_id, e);
            }
        }
        Ok(())
    }

    pub fn conversations(&self) -> StoreResult<Vec<Conversation>> {
        self.inner.store.conversations(CONVERSATION_LIST_LIMIT)
    }

    pub fn messages(&self, chat_id: &str) -> StoreResult<Vec<Message>> {
        self.inner
            .store
            .messages(chat_id, self.inner.config.message_window)
    }

    pub fn search(&self, chat_id: &str, query: &str) -> StoreResult<Vec<Message>> {
        self.inner
            .store
            .search_conversation(chat_id, query, self.inner.config.search_limit)
    }

    pub fn search_all(&self, query: &str) -> StoreResult<Vec<Message>> {
        self.inner
            .store
            .search_all(query, self.inner.config.search_limit)
    }

    /// Wipes every table, credentials included.
    pub fn reset_data(&self) -> StoreResult<()> {
        self.inner.store.reset()?;
        self.touch();
        Ok(())
    }
}

async fn stop_requested(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

/// Conversation metadata merge. A chat without a usable name gets one from
/// the resolver chain so the list never shows a blank label.
fn chat_upsert(w: &Writer<'_>, chat: &WireChat) -> StoreResult<ChatUpsert> {
    let name = match non_empty(chat.name.as_deref()) {
        Some(name) => name.to_string(),
        None => chat_name(w, &chat.id)?,
    };
    let mut up = ChatUpsert::new(chat.id.as_str()).name(name);
    if let Some(ts) = chat.conversation_timestamp {
        up = up.last("", ts);
    }
    up.unread = chat.unread_count;
    Ok(up)
}

fn wire_status(code: &WireCode) -> MessageStatus {
    match code {
        WireCode::Code(n) => MessageStatus::from_code(*n),
        WireCode::Name(name) => name.parse().unwrap_or(MessageStatus::Pending),
    }
}

fn chat_name(w: &Writer<'_>, chat_id: &str) -> StoreResult<String> {
    let contact = w.contact(chat_id)?;
    let stored = w.conversation(chat_id)?;
    Ok(names::display_name(
        chat_id,
        contact.as_ref(),
        stored.as_ref().map(|c| c.name.as_str()),
    ))
}

/// Merges a contact and, if its conversation already exists, refreshes the
/// conversation's name. Contacts alone never create conversation rows.
fn merge_contact(w: &Writer<'_>, contact: &WireContact) -> StoreResult<()> {
    w.upsert_contact(&contact.id, contact.name.as_deref(), contact.notify.as_deref())?;
    if w.conversation(&contact.id)?.is_some() {
        let name = chat_name(w, &contact.id)?;
        w.upsert_conversation(&ChatUpsert::new(contact.id.as_str()).name(name))?;
    }
    Ok(())
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

/// Extracts, names and stores one message with its conversation preview.
/// Returns `None` when the message carries nothing worth keeping, otherwise
/// the stored record and whether its id was seen for the first time.
fn reconcile_message(
    w: &Writer<'_>,
    wire: &WireMessage,
    me: Option<&str>,
) -> StoreResult<Option<(Message, bool)>> {
    let chat_id = wire.key.remote_jid.as_str();
    if chat_id.is_empty() || wire.key.id.is_empty() || names::is_broadcast(chat_id) {
        return Ok(None);
    }
    let content = extract(wire.message.as_ref());
    if content.is_empty() {
        debug!("dropping {} in {}: no visible content", wire.key.id, chat_id);
        return Ok(None);
    }

    let from_me = wire.key.from_me;
    let (sender, sender_name) = if from_me {
        (me.unwrap_or(OWNER_FALLBACK_ID).to_string(), OWNER_NAME.to_string())
    } else {
        let sender = non_empty(wire.key.participant.as_deref()).unwrap_or(chat_id);
        let push = non_empty(wire.push_name.as_deref());
        let known = w.contact(sender)?;
        if let Some(push) = push {
            let seen = known.as_ref().and_then(|c| c.notify.as_deref());
            if seen != Some(push) {
                w.upsert_contact(sender, None, Some(push))?;
            }
        }
        let name = match push {
            Some(push) => push.to_string(),
            None => names::display_name(sender, known.as_ref(), None),
        };
        (sender.to_string(), name)
    };

    let status = match &wire.status {
        Some(code) => wire_status(code),
        None if from_me => MessageStatus::Sent,
        None => MessageStatus::Delivered,
    };
    let msg = Message {
        id: wire.key.id.clone(),
        conversation_id: chat_id.to_string(),
        sender,
        sender_name,
        body: content.body.clone(),
        timestamp: wire.message_timestamp,
        from_me,
        status,
        content_type: content.kind,
    };

    let name = chat_name(w, chat_id)?;
    w.upsert_conversation(
        &ChatUpsert::new(chat_id)
            .name(name)
            .last(content.preview(), msg.timestamp),
    )?;
    let is_new = w.upsert_message(&msg)?;
    Ok(Some((msg, is_new)))
}

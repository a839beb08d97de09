use crate::api::models::{ChatUpsert, Contact, ContentType, Conversation, Message, MessageStatus};
use crate::app::AppConfig;
use crate::error::{StoreError, StoreResult};
use log::info;
use rusqlite::functions::FunctionFlags;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const SCHEMA: &str = r#"
    PRAGMA journal_mode = WAL;
    CREATE TABLE IF NOT EXISTS auth_keys (
        key TEXT PRIMARY KEY,
        value BLOB NOT NULL
    );
    CREATE TABLE IF NOT EXISTS contacts (
        id TEXT PRIMARY KEY,
        name TEXT,
        notify TEXT
    );
    CREATE TABLE IF NOT EXISTS chats (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL DEFAULT '',
        last_message TEXT NOT NULL DEFAULT '',
        last_message_ts INTEGER NOT NULL DEFAULT 0,
        unread INTEGER NOT NULL DEFAULT 0,
        is_group INTEGER NOT NULL DEFAULT 0
    );
    CREATE INDEX IF NOT EXISTS idx_chats_id_ts ON chats(id, last_message_ts);
    CREATE INDEX IF NOT EXISTS idx_chats_recent ON chats(last_message_ts DESC, id);
    CREATE TABLE IF NOT EXISTS messages (
        chat_id TEXT NOT NULL,
        id TEXT NOT NULL,
        sender TEXT NOT NULL,
        sender_name TEXT NOT NULL,
        body TEXT NOT NULL,
        ts INTEGER NOT NULL,
        from_me INTEGER NOT NULL,
        status TEXT NOT NULL,
        content_type TEXT NOT NULL,
        PRIMARY KEY (chat_id, id)
    );
    CREATE INDEX IF NOT EXISTS idx_messages_chat_ts ON messages(chat_id, ts);
"#;

const CHAT_COLUMNS: &str = "id, name, last_message, last_message_ts, unread, is_group";
const MESSAGE_COLUMNS: &str =
    "chat_id, id, sender, sender_name, body, ts, from_me, status, content_type";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreCounts {
    pub conversations: u64,
    pub contacts: u64,
    pub messages: u64,
}

/// Durable chat cache. Every write runs inside a transaction, so readers see
/// either all of an event's effects or none of them.
pub struct Store {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

impl Store {
    pub fn open(path: &Path) -> StoreResult<Self> {
        ensure_dir(path)?;
        let conn = Connection::open(path)?;
        let store = Self::init(conn, Some(path.to_path_buf()))?;
        info!("store opened at {}", path.display());
        Ok(store)
    }

    /// Opens the store under the configured (or per-user default) data directory.
    pub fn open_default(cfg: &AppConfig) -> StoreResult<Self> {
        let path = cfg.store_path().ok_or(StoreError::NoDataDir)?;
        Self::open(&path)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA)?;
        register_fold(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Runs `f` in one transaction. An error from `f` rolls everything back.
    pub fn write<R>(&self, f: impl FnOnce(&Writer<'_>) -> StoreResult<R>) -> StoreResult<R> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let out = f(&Writer { conn: &*tx })?;
        tx.commit()?;
        Ok(out)
    }

    pub fn upsert_conversation(&self, chat: &ChatUpsert) -> StoreResult<()> {
        self.write(|w| w.upsert_conversation(chat))
    }

    pub fn upsert_contact(
        &self,
        id: &str,
        name: Option<&str>,
        notify: Option<&str>,
    ) -> StoreResult<()> {
        self.write(|w| w.upsert_contact(id, name, notify))
    }

    pub fn upsert_message(&self, msg: &Message) -> StoreResult<bool> {
        self.write(|w| w.upsert_message(msg))
    }

    pub fn increment_unread(&self, chat_id: &str) -> StoreResult<()> {
        self.write(|w| w.increment_unread(chat_id))
    }

    pub fn reset_unread(&self, chat_id: &str) -> StoreResult<()> {
        self.write(|w| {
            w.conn
                .execute("UPDATE chats SET unread = 0 WHERE id = ?1", params![chat_id])?;
            Ok(())
        })
    }

    pub fn conversations(&self, limit: usize) -> StoreResult<Vec<Conversation>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {CHAT_COLUMNS} FROM chats ORDER BY last_message_ts DESC, id ASC LIMIT ?1"
        ))?;
        let rows = stmt.query_map(params![limit as i64], chat_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn conversation(&self, id: &str) -> StoreResult<Option<Conversation>> {
        let conn = self.lock()?;
        read_conversation(&conn, id)
    }

    pub fn contact(&self, id: &str) -> StoreResult<Option<Contact>> {
        let conn = self.lock()?;
        read_contact(&conn, id)
    }

    /// The most recent `limit` messages of a conversation, oldest first.
    pub fn messages(&self, chat_id: &str, limit: usize) -> StoreResult<Vec<Message>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM (
                SELECT rowid AS seq, * FROM messages WHERE chat_id = ?1
                ORDER BY ts DESC, seq DESC LIMIT ?2
             ) ORDER BY ts ASC, seq ASC"
        ))?;
        let rows = stmt.query_map(params![chat_id, limit as i64], message_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Case-insensitive substring search within one conversation. The newest
    /// `limit` hits are returned oldest first, ready for display.
    pub fn search_conversation(
        &self,
        chat_id: &str,
        query: &str,
        limit: usize,
    ) -> StoreResult<Vec<Message>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM (
                SELECT rowid AS seq, * FROM messages
                WHERE chat_id = ?1 AND instr(fold(body), fold(?2)) > 0
                ORDER BY ts DESC, seq DESC LIMIT ?3
             ) ORDER BY ts ASC, seq ASC"
        ))?;
        let rows = stmt.query_map(params![chat_id, query, limit as i64], message_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Case-insensitive substring search across every conversation, newest first.
    pub fn search_all(&self, query: &str, limit: usize) -> StoreResult<Vec<Message>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE instr(fold(body), fold(?1)) > 0
             ORDER BY ts DESC, rowid DESC LIMIT ?2"
        ))?;
        let rows = stmt.query_map(params![query, limit as i64], message_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// IDs of the newest messages received (not sent) in a conversation.
    pub fn recent_incoming_ids(&self, chat_id: &str, limit: usize) -> StoreResult<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id FROM messages WHERE chat_id = ?1 AND from_me = 0
             ORDER BY ts DESC, rowid DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![chat_id, limit as i64], |row| row.get(0))?;
        Ok(rows.collect::<Result<Vec<String>, _>>()?)
    }

    pub fn counts(&self) -> StoreResult<StoreCounts> {
        let conn = self.lock()?;
        let count = |table: &str| -> rusqlite::Result<u64> {
            let n: i64 =
                conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
            Ok(n as u64)
        };
        Ok(StoreCounts {
            conversations: count("chats")?,
            contacts: count("contacts")?,
            messages: count("messages")?,
        })
    }

    pub fn put_auth_key(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.write(|w| {
            w.conn.execute(
                "INSERT INTO auth_keys (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )?;
            Ok(())
        })
    }

    pub fn auth_key(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let conn = self.lock()?;
        let value = conn
            .query_row(
                "SELECT value FROM auth_keys WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn clear_auth_keys(&self) -> StoreResult<()> {
        self.write(|w| {
            w.conn.execute("DELETE FROM auth_keys", [])?;
            Ok(())
        })
    }

    /// Drops every row in every table.
    pub fn reset(&self) -> StoreResult<()> {
        self.write(|w| {
            w.conn.execute_batch(
                "DELETE FROM messages; DELETE FROM chats; DELETE FROM contacts; DELETE FROM auth_keys;",
            )?;
            Ok(())
        })
    }
}

/// Write handle scoped to one transaction.
pub struct Writer<'a> {
    conn: &'a Connection,
}

impl Writer<'_> {
    /// Name: non-empty incoming wins. Preview and timestamp move together and
    /// only forward; an equal timestamp may fill a still-empty preview.
    /// `unread` overwrites when given.
    pub fn upsert_conversation(&self, chat: &ChatUpsert) -> StoreResult<()> {
        let (preview, ts) = match &chat.last {
            Some((preview, ts)) => (Some(preview.as_str()), Some(*ts)),
            None => (None, None),
        };
        self.conn.execute(
            r#"
            INSERT INTO chats (id, name, last_message, last_message_ts, unread, is_group)
            VALUES (?1, TRIM(?2), COALESCE(?3, ''), COALESCE(?4, 0), COALESCE(?5, 0), ?6)
            ON CONFLICT(id) DO UPDATE SET
                name = CASE WHEN excluded.name <> '' THEN excluded.name ELSE chats.name END,
                last_message = CASE
                    WHEN excluded.last_message_ts > chats.last_message_ts THEN excluded.last_message
                    WHEN excluded.last_message_ts = chats.last_message_ts AND chats.last_message = ''
                        THEN excluded.last_message
                    ELSE chats.last_message
                END,
                last_message_ts = MAX(chats.last_message_ts, excluded.last_message_ts),
                unread = COALESCE(?5, chats.unread),
                is_group = MAX(chats.is_group, excluded.is_group)
            "#,
            params![chat.id, chat.name, preview, ts, chat.unread, chat.is_group],
        )?;
        Ok(())
    }

    /// Each name field is replaced only by a non-empty value.
    pub fn upsert_contact(
        &self,
        id: &str,
        name: Option<&str>,
        notify: Option<&str>,
    ) -> StoreResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO contacts (id, name, notify)
            VALUES (?1, NULLIF(TRIM(?2), ''), NULLIF(TRIM(?3), ''))
            ON CONFLICT(id) DO UPDATE SET
                name = COALESCE(excluded.name, contacts.name),
                notify = COALESCE(excluded.notify, contacts.notify)
            "#,
            params![id, name, notify],
        )?;
        Ok(())
    }

    /// Full replace keyed by (conversation, message id). Returns true when the
    /// message was not stored before.
    pub fn upsert_message(&self, msg: &Message) -> StoreResult<bool> {
        let known = self
            .conn
            .query_row(
                "SELECT 1 FROM messages WHERE chat_id = ?1 AND id = ?2",
                params![msg.conversation_id, msg.id],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        self.conn.execute(
            r#"
            INSERT INTO messages (chat_id, id, sender, sender_name, body, ts, from_me, status, content_type)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(chat_id, id) DO UPDATE SET
                sender = excluded.sender,
                sender_name = excluded.sender_name,
                body = excluded.body,
                ts = excluded.ts,
                from_me = excluded.from_me,
                status = excluded.status,
                content_type = excluded.content_type
            "#,
            params![
                msg.conversation_id,
                msg.id,
                msg.sender,
                msg.sender_name,
                msg.body,
                msg.timestamp,
                msg.from_me,
                msg.status.as_str(),
                msg.content_type.as_str(),
            ],
        )?;
        Ok(!known)
    }

    /// Returns false when the message is unknown; no row is created.
    pub fn update_message_status(
        &self,
        chat_id: &str,
        id: &str,
        status: MessageStatus,
    ) -> StoreResult<bool> {
        let changed = self.conn.execute(
            "UPDATE messages SET status = ?3 WHERE chat_id = ?1 AND id = ?2",
            params![chat_id, id, status.as_str()],
        )?;
        Ok(changed > 0)
    }

    pub fn increment_unread(&self, chat_id: &str) -> StoreResult<()> {
        self.conn.execute(
            "UPDATE chats SET unread = unread + 1 WHERE id = ?1",
            params![chat_id],
        )?;
        Ok(())
    }

    pub fn contact(&self, id: &str) -> StoreResult<Option<Contact>> {
        read_contact(self.conn, id)
    }

    pub fn conversation(&self, id: &str) -> StoreResult<Option<Conversation>> {
        read_conversation(self.conn, id)
    }
}

/// `fold(text)`: Unicode lowercase, used on both sides of search matches.
fn register_fold(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "fold",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text: Option<String> = ctx.get(0)?;
            Ok(text.map(|t| t.to_lowercase()))
        },
    )
}

fn read_contact(conn: &Connection, id: &str) -> StoreResult<Option<Contact>> {
    let contact = conn
        .query_row(
            "SELECT id, name, notify FROM contacts WHERE id = ?1",
            params![id],
            |row| {
                Ok(Contact {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    notify: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(contact)
}

fn read_conversation(conn: &Connection, id: &str) -> StoreResult<Option<Conversation>> {
    let chat = conn
        .query_row(
            &format!("SELECT {CHAT_COLUMNS} FROM chats WHERE id = ?1"),
            params![id],
            chat_from_row,
        )
        .optional()?;
    Ok(chat)
}

fn chat_from_row(row: &Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: row.get(0)?,
        name: row.get(1)?,
        last_message: row.get(2)?,
        last_message_ts: row.get(3)?,
        unread: row.get(4)?,
        is_group: row.get(5)?,
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    let status: String = row.get(7)?;
    let content_type: String = row.get(8)?;
    Ok(Message {
        conversation_id: row.get(0)?,
        id: row.get(1)?,
        sender: row.get(2)?,
        sender_name: row.get(3)?,
        body: row.get(4)?,
        timestamp: row.get(5)?,
        from_me: row.get(6)?,
        status: status.parse().unwrap_or(MessageStatus::Pending),
        content_type: content_type.parse().unwrap_or(ContentType::Unknown),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Store {
        Store::open_in_memory().unwrap()
    }

    fn msg(chat: &str, id: &str, body: &str, ts: i64) -> Message {
        Message {
            id: id.into(),
            conversation_id: chat.into(),
            sender: chat.into(),
            sender_name: "Someone".into(),
            body: body.into(),
            timestamp: ts,
            from_me: false,
            status: MessageStatus::Delivered,
            content_type: ContentType::Text,
        }
    }

    #[test]
    fn timestamp_never_regresses_in_either_order() {
        let early = ChatUpsert::new("A").last("first", 100);
        let late = ChatUpsert::new("A").last("second", 200);
        for order in [[&early, &late], [&late, &early]] {
            let s = store();
            for up in order {
                s.upsert_conversation(up).unwrap();
            }
            let chat = s.conversation("A").unwrap().unwrap();
            assert_eq!(chat.last_message_ts, 200);
            assert_eq!(chat.last_message, "second");
        }
    }

    #[test]
    fn equal_timestamp_fills_empty_preview_only() {
        let s = store();
        s.upsert_conversation(&ChatUpsert::new("A").last("", 100)).unwrap();
        s.upsert_conversation(&ChatUpsert::new("A").last("hi", 100)).unwrap();
        s.upsert_conversation(&ChatUpsert::new("A").last("other", 100)).unwrap();
        assert_eq!(s.conversation("A").unwrap().unwrap().last_message, "hi");
    }

    #[test]
    fn empty_name_keeps_existing() {
        let s = store();
        s.upsert_conversation(&ChatUpsert::new("A").name("Alice")).unwrap();
        s.upsert_conversation(&ChatUpsert::new("A").name("  ").last("x", 5)).unwrap();
        let chat = s.conversation("A").unwrap().unwrap();
        assert_eq!(chat.name, "Alice");
        assert_eq!(chat.last_message, "x");
        s.upsert_conversation(&ChatUpsert::new("A").name("Alice B")).unwrap();
        assert_eq!(s.conversation("A").unwrap().unwrap().name, "Alice B");
    }

    #[test]
    fn unread_is_overwritten_only_when_given() {
        let s = store();
        s.upsert_conversation(&ChatUpsert::new("A").unread(4)).unwrap();
        s.increment_unread("A").unwrap();
        s.upsert_conversation(&ChatUpsert::new("A").last("x", 1)).unwrap();
        assert_eq!(s.conversation("A").unwrap().unwrap().unread, 5);
        s.upsert_conversation(&ChatUpsert::new("A").unread(2)).unwrap();
        assert_eq!(s.conversation("A").unwrap().unwrap().unread, 2);
        s.reset_unread("A").unwrap();
        assert_eq!(s.conversation("A").unwrap().unwrap().unread, 0);
    }

    #[test]
    fn contact_fields_merge_independently() {
        let s = store();
        s.upsert_contact("A", Some("Alice"), None).unwrap();
        s.upsert_contact("A", None, Some("ally")).unwrap();
        s.upsert_contact("A", Some(""), Some("")).unwrap();
        let c = s.contact("A").unwrap().unwrap();
        assert_eq!(c.name.as_deref(), Some("Alice"));
        assert_eq!(c.notify.as_deref(), Some("ally"));
        s.upsert_contact("A", None, Some("Al")).unwrap();
        assert_eq!(s.contact("A").unwrap().unwrap().notify.as_deref(), Some("Al"));
    }

    #[test]
    fn redelivery_replaces_without_duplicating() {
        let s = store();
        let mut m = msg("A", "M1", "hi", 10);
        assert!(s.upsert_message(&m).unwrap());
        m.status = MessageStatus::Read;
        assert!(!s.upsert_message(&m).unwrap());
        let msgs = s.messages("A", 10).unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].status, MessageStatus::Read);
    }

    #[test]
    fn status_update_ignores_unknown_ids() {
        let s = store();
        s.upsert_message(&msg("A", "M1", "hi", 10)).unwrap();
        let hit = s
            .write(|w| w.update_message_status("A", "M1", MessageStatus::Read))
            .unwrap();
        let miss = s
            .write(|w| w.update_message_status("A", "nope", MessageStatus::Read))
            .unwrap();
        assert!(hit);
        assert!(!miss);
        assert_eq!(s.counts().unwrap().messages, 1);
    }

    #[test]
    fn conversation_list_orders_by_recency_then_id() {
        let s = store();
        s.upsert_conversation(&ChatUpsert::new("b").last("x", 5)).unwrap();
        s.upsert_conversation(&ChatUpsert::new("a").last("x", 5)).unwrap();
        s.upsert_conversation(&ChatUpsert::new("c").last("x", 9)).unwrap();
        let ids: Vec<_> = s.conversations(10).unwrap().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, ["c", "a", "b"]);
    }

    #[test]
    fn message_window_is_latest_n_ascending() {
        let s = store();
        for i in 0..10 {
            s.upsert_message(&msg("A", &format!("M{i}"), "x", i)).unwrap();
        }
        s.upsert_message(&msg("B", "other", "x", 100)).unwrap();
        let ts: Vec<_> = s.messages("A", 3).unwrap().iter().map(|m| m.timestamp).collect();
        assert_eq!(ts, [7, 8, 9]);
    }

    #[test]
    fn search_is_case_insensitive_and_windowed() {
        let s = store();
        s.upsert_message(&msg("A", "1", "Hello there", 1)).unwrap();
        s.upsert_message(&msg("A", "2", "nothing", 2)).unwrap();
        s.upsert_message(&msg("A", "3", "say HELLO", 3)).unwrap();
        s.upsert_message(&msg("A", "4", "hello again", 4)).unwrap();
        s.upsert_message(&msg("B", "5", "hello from B", 5)).unwrap();

        let local: Vec<_> = s
            .search_conversation("A", "hello", 2)
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(local, ["3", "4"]);

        let global: Vec<_> = s
            .search_all("HeLLo", 3)
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(global, ["5", "4", "3"]);

        assert!(s.search_all("   ", 10).unwrap().is_empty());
    }

    #[test]
    fn search_folds_non_ascii_case() {
        let s = store();
        s.upsert_message(&msg("A", "1", "Ça va à l'ÉCOLE", 1)).unwrap();
        s.upsert_message(&msg("A", "2", "ecole sans accent", 2)).unwrap();

        for query in ["école", "ÉCOLE", "ça VA"] {
            let hits = s.search_conversation("A", query, 10).unwrap();
            assert_eq!(hits.len(), 1, "{query}");
            assert_eq!(hits[0].id, "1");
        }
        assert_eq!(s.search_all("École", 10).unwrap().len(), 1);
    }

    #[test]
    fn auth_keys_roundtrip_and_clear() {
        let s = store();
        s.put_auth_key("creds", b"one").unwrap();
        s.put_auth_key("creds", b"two").unwrap();
        assert_eq!(s.auth_key("creds").unwrap().as_deref(), Some(&b"two"[..]));
        s.clear_auth_keys().unwrap();
        assert_eq!(s.auth_key("creds").unwrap(), None);
    }

    #[test]
    fn failed_write_rolls_back() {
        let s = store();
        let res: StoreResult<()> = s.write(|w| {
            w.upsert_conversation(&ChatUpsert::new("A").name("Alice"))?;
            Err(StoreError::Poisoned)
        });
        assert!(res.is_err());
        assert!(s.conversation("A").unwrap().is_none());
    }

    #[test]
    fn reset_empties_everything() {
        let s = store();
        s.upsert_conversation(&ChatUpsert::new("A").last("x", 1)).unwrap();
        s.upsert_contact("A", Some("Alice"), None).unwrap();
        s.upsert_message(&msg("A", "1", "x", 1)).unwrap();
        s.put_auth_key("k", b"v").unwrap();
        s.reset().unwrap();
        assert_eq!(s.counts().unwrap(), StoreCounts::default());
        assert_eq!(s.auth_key("k").unwrap(), None);
    }

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.sqlite");
        {
            let s = Store::open(&path).unwrap();
            s.upsert_conversation(&ChatUpsert::new("A").name("Alice").last("hi", 1))
                .unwrap();
        }
        let s = Store::open(&path).unwrap();
        assert_eq!(s.path(), Some(path.as_path()));
        assert_eq!(s.conversation("A").unwrap().unwrap().name, "Alice");
    }
}

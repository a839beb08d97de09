use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub id: String,
    pub name: String,
    pub last_message: String,
    pub last_message_ts: i64,
    pub unread: u32,
    pub is_group: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct Contact {
    pub id: String,
    /// Addressbook name synced from the owner's phone.
    pub name: Option<String>,
    /// Name the contact chose for themselves.
    pub notify: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender: String,
    pub sender_name: String,
    pub body: String,
    pub timestamp: i64,
    pub from_me: bool,
    pub status: MessageStatus,
    pub content_type: ContentType,
}

/// A conversation merge request. `last` carries `(preview, timestamp)`; `unread`
/// overwrites the stored counter when set and leaves it alone otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChatUpsert {
    pub id: String,
    pub name: String,
    pub last: Option<(String, i64)>,
    pub unread: Option<u32>,
    pub is_group: bool,
}

impl ChatUpsert {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        let is_group = crate::names::is_group(&id);
        Self {
            id,
            is_group,
            ..Self::default()
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn last(mut self, preview: impl Into<String>, ts: i64) -> Self {
        self.last = Some((preview.into(), ts));
        self
    }

    pub fn unread(mut self, unread: u32) -> Self {
        self.unread = Some(unread);
        self
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Text,
    Image,
    Video,
    Audio,
    Document,
    Sticker,
    Contact,
    Location,
    Reaction,
    Unknown,
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Text => "text",
            ContentType::Image => "image",
            ContentType::Video => "video",
            ContentType::Audio => "audio",
            ContentType::Document => "document",
            ContentType::Sticker => "sticker",
            ContentType::Contact => "contact",
            ContentType::Location => "location",
            ContentType::Reaction => "reaction",
            ContentType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "text" => ContentType::Text,
            "image" => ContentType::Image,
            "video" => ContentType::Video,
            "audio" => ContentType::Audio,
            "document" => ContentType::Document,
            "sticker" => ContentType::Sticker,
            "contact" => ContentType::Contact,
            "location" => ContentType::Location,
            "reaction" => ContentType::Reaction,
            "unknown" => ContentType::Unknown,
            _ => return Err(()),
        })
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    Sent,
    Delivered,
    Read,
    Error,
}

impl MessageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageStatus::Pending => "pending",
            MessageStatus::Sent => "sent",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Read => "read",
            MessageStatus::Error => "error",
        }
    }

    /// Maps the provider's numeric ack level. 5 (played) counts as read.
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => MessageStatus::Error,
            1 => MessageStatus::Pending,
            2 => MessageStatus::Sent,
            3 => MessageStatus::Delivered,
            4 | 5 => MessageStatus::Read,
            _ => MessageStatus::Pending,
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "pending" => MessageStatus::Pending,
            "sent" | "server_ack" => MessageStatus::Sent,
            "delivered" | "delivery_ack" => MessageStatus::Delivered,
            "read" | "played" => MessageStatus::Read,
            "error" => MessageStatus::Error,
            _ => return Err(()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_to_lifecycle() {
        assert_eq!(MessageStatus::from_code(2), MessageStatus::Sent);
        assert_eq!(MessageStatus::from_code(5), MessageStatus::Read);
        assert_eq!(MessageStatus::from_code(0), MessageStatus::Error);
        assert_eq!("DELIVERY_ACK".parse(), Ok(MessageStatus::Delivered));
    }

    #[test]
    fn chat_upsert_flags_groups() {
        assert!(ChatUpsert::new("123-456@g.us").is_group);
        assert!(!ChatUpsert::new("15551234@s.whatsapp.net").is_group);
    }
}

//! Wire shapes of the event stream produced by the transport collaborator.
//!
//! Every event is a JSON object `{"event": "<kind>", "data": ...}`. Content
//! envelopes keep the provider's camelCase keys so payloads can be fed in
//! without translation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum TransportEvent {
    Connecting,
    PairingChallenge {
        code: String,
    },
    Open {
        #[serde(default)]
        me: Option<String>,
    },
    Closed {
        #[serde(default)]
        status_code: Option<u16>,
        #[serde(default)]
        message: String,
    },
    HistorySync(HistorySync),
    ChatsUpsert(Vec<WireChat>),
    ChatsUpdate(Vec<WireChat>),
    ContactsUpsert(Vec<WireContact>),
    ContactsUpdate(Vec<WireContact>),
    MessagesUpsert(Vec<WireMessage>),
    MessagesUpdate(Vec<WireStatusUpdate>),
}

impl TransportEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            TransportEvent::Connecting => "connecting",
            TransportEvent::PairingChallenge { .. } => "pairing-challenge",
            TransportEvent::Open { .. } => "open",
            TransportEvent::Closed { .. } => "closed",
            TransportEvent::HistorySync(_) => "history-sync",
            TransportEvent::ChatsUpsert(_) => "chats-upsert",
            TransportEvent::ChatsUpdate(_) => "chats-update",
            TransportEvent::ContactsUpsert(_) => "contacts-upsert",
            TransportEvent::ContactsUpdate(_) => "contacts-update",
            TransportEvent::MessagesUpsert(_) => "messages-upsert",
            TransportEvent::MessagesUpdate(_) => "messages-update",
        }
    }
}

/// Why the transport dropped the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    LoggedOut,
    ConnectionLost,
    ConnectionClosed,
    ConnectionReplaced,
    BadSession,
    RestartRequired,
    Other(u16),
}

impl DisconnectReason {
    pub fn from_status(code: Option<u16>) -> Self {
        match code {
            Some(401) => DisconnectReason::LoggedOut,
            Some(408) => DisconnectReason::ConnectionLost,
            Some(428) | None => DisconnectReason::ConnectionClosed,
            Some(440) => DisconnectReason::ConnectionReplaced,
            Some(500) => DisconnectReason::BadSession,
            Some(515) => DisconnectReason::RestartRequired,
            Some(other) => DisconnectReason::Other(other),
        }
    }

    pub fn is_logged_out(self) -> bool {
        self == DisconnectReason::LoggedOut
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistorySync {
    #[serde(default)]
    pub chats: Vec<WireChat>,
    #[serde(default)]
    pub contacts: Vec<WireContact>,
    #[serde(default)]
    pub messages: Vec<WireMessage>,
    #[serde(default)]
    pub is_latest: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WireChat {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub unread_count: Option<u32>,
    #[serde(default)]
    pub conversation_timestamp: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WireContact {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub notify: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessageKey {
    pub remote_jid: String,
    #[serde(default)]
    pub from_me: bool,
    pub id: String,
    #[serde(default)]
    pub participant: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum WireCode {
    Code(i64),
    Name(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WireMessage {
    pub key: MessageKey,
    #[serde(default)]
    pub message_timestamp: i64,
    #[serde(default)]
    pub push_name: Option<String>,
    #[serde(default)]
    pub status: Option<WireCode>,
    #[serde(default)]
    pub message: Option<MessageContent>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WireStatusUpdate {
    pub key: MessageKey,
    pub status: WireCode,
}

/// One content envelope. At most one payload field is normally present; when
/// several are, the extractor's priority order decides.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessageContent {
    pub conversation: Option<String>,
    pub extended_text_message: Option<TextMessage>,
    pub image_message: Option<MediaMessage>,
    pub video_message: Option<MediaMessage>,
    pub audio_message: Option<AudioMessage>,
    pub document_message: Option<DocumentMessage>,
    pub sticker_message: Option<Value>,
    pub contact_message: Option<ContactCard>,
    pub contacts_array_message: Option<ContactsArray>,
    pub location_message: Option<LocationMessage>,
    pub live_location_message: Option<LocationMessage>,
    pub reaction_message: Option<ReactionMessage>,
    pub poll_creation_message: Option<PollMessage>,
    pub poll_creation_message_v2: Option<PollMessage>,
    pub poll_creation_message_v3: Option<PollMessage>,
    pub buttons_response_message: Option<ButtonReply>,
    pub list_response_message: Option<ListReply>,
    pub template_button_reply_message: Option<ButtonReply>,

    pub ephemeral_message: Option<Box<Wrapped>>,
    pub view_once_message: Option<Box<Wrapped>>,
    pub view_once_message_v2: Option<Box<Wrapped>>,
    pub view_once_message_v2_extension: Option<Box<Wrapped>>,
    pub document_with_caption_message: Option<Box<Wrapped>>,
    pub edited_message: Option<Box<Wrapped>>,

    pub protocol_message: Option<Box<ProtocolMessage>>,
    pub sender_key_distribution_message: Option<Value>,
    pub message_context_info: Option<Value>,

    /// Payload kinds this crate does not know about.
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Wrapped {
    #[serde(default)]
    pub message: Option<MessageContent>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TextMessage {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MediaMessage {
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub mimetype: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AudioMessage {
    #[serde(default)]
    pub ptt: bool,
    #[serde(default)]
    pub seconds: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMessage {
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContactCard {
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContactsArray {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub contacts: Vec<ContactCard>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocationMessage {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReactionMessage {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PollMessage {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ButtonReply {
    #[serde(default)]
    pub selected_display_text: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ListReply {
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolMessage {
    #[serde(default, rename = "type")]
    pub kind: Option<WireCode>,
    #[serde(default)]
    pub edited_message: Option<MessageContent>,
}

impl ProtocolMessage {
    /// Provider code 14 (`MESSAGE_EDIT`) carries replacement content.
    pub fn is_edit(&self) -> bool {
        match &self.kind {
            Some(WireCode::Code(code)) => *code == 14,
            Some(WireCode::Name(name)) => name.eq_ignore_ascii_case("MESSAGE_EDIT"),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_tagged_events() {
        let ev: TransportEvent = serde_json::from_value(json!({
            "event": "closed",
            "data": { "status_code": 401 }
        }))
        .unwrap();
        assert_eq!(
            ev,
            TransportEvent::Closed {
                status_code: Some(401),
                message: String::new()
            }
        );

        let ev: TransportEvent = serde_json::from_value(json!({ "event": "connecting" })).unwrap();
        assert_eq!(ev, TransportEvent::Connecting);
    }

    #[test]
    fn decodes_message_upserts_with_nested_content() {
        let ev: TransportEvent = serde_json::from_value(json!({
            "event": "messages-upsert",
            "data": [{
                "key": { "remoteJid": "1555@s.whatsapp.net", "fromMe": false, "id": "M1" },
                "messageTimestamp": 1700000000,
                "pushName": "Bob",
                "status": 3,
                "message": { "ephemeralMessage": { "message": { "conversation": "hey" } } }
            }]
        }))
        .unwrap();
        let TransportEvent::MessagesUpsert(msgs) = ev else {
            panic!("wrong variant");
        };
        let inner = msgs[0]
            .message
            .as_ref()
            .and_then(|m| m.ephemeral_message.as_ref())
            .and_then(|w| w.message.as_ref())
            .and_then(|m| m.conversation.clone());
        assert_eq!(inner.as_deref(), Some("hey"));
        assert_eq!(msgs[0].status, Some(WireCode::Code(3)));
    }

    #[test]
    fn unknown_payload_keys_are_kept() {
        let content: MessageContent =
            serde_json::from_value(json!({ "groupInviteMessage": { "groupName": "x" } })).unwrap();
        assert!(content.other.contains_key("groupInviteMessage"));
    }

    #[test]
    fn protocol_edit_accepts_code_or_name() {
        let by_code: ProtocolMessage = serde_json::from_value(json!({ "type": 14 })).unwrap();
        let by_name: ProtocolMessage =
            serde_json::from_value(json!({ "type": "MESSAGE_EDIT" })).unwrap();
        let revoke: ProtocolMessage = serde_json::from_value(json!({ "type": "REVOKE" })).unwrap();
        assert!(by_code.is_edit());
        assert!(by_name.is_edit());
        assert!(!revoke.is_edit());
    }

    #[test]
    fn logout_is_the_only_terminal_reason() {
        assert!(DisconnectReason::from_status(Some(401)).is_logged_out());
        assert_eq!(
            DisconnectReason::from_status(None),
            DisconnectReason::ConnectionClosed
        );
        assert!(!DisconnectReason::from_status(Some(515)).is_logged_out());
    }
}

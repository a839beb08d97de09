//! Flattens nested content envelopes into a single `(body, ContentType)` pair.
//!
//! An empty body means "nothing a person would see": the caller drops the event
//! instead of persisting it.

use crate::api::events::MessageContent;
use crate::api::models::ContentType;
use log::debug;

/// Wrapper chains deeper than this are treated as having no visible content.
pub const MAX_DEPTH: usize = 16;

pub const UNSUPPORTED: &str = "⚠️ Unsupported message";
pub const PHOTO: &str = "📷 Photo";
pub const VIDEO: &str = "🎥 Video";
pub const VOICE: &str = "🎤 Voice message";
pub const AUDIO: &str = "🎵 Audio";
pub const DOCUMENT: &str = "📄 Document";
pub const STICKER: &str = "🏷️ Sticker";
pub const CONTACT: &str = "👤 Contact";
pub const LOCATION: &str = "📍 Location";
pub const POLL: &str = "📊 Poll";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub body: String,
    pub kind: ContentType,
}

impl Extracted {
    fn new(body: impl Into<String>, kind: ContentType) -> Self {
        Self {
            body: body.into(),
            kind,
        }
    }

    pub fn empty() -> Self {
        Self::new(String::new(), ContentType::Unknown)
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Text for a conversation's last-message column.
    pub fn preview(&self) -> String {
        preview_text(&self.body, self.kind)
    }
}

/// Falls back to a bracketed type tag when there is no body to show.
pub fn preview_text(body: &str, kind: ContentType) -> String {
    if body.is_empty() && kind != ContentType::Unknown {
        format!("[{}]", kind)
    } else {
        body.to_string()
    }
}

/// The recognised shape of one envelope level, in priority order.
#[derive(Debug)]
enum Envelope<'a> {
    Wrapper(Option<&'a MessageContent>),
    Protocol { edit: Option<&'a MessageContent> },
    Text(&'a str),
    Image(Option<&'a str>),
    Video(Option<&'a str>),
    Audio { voice: bool },
    Document(Option<&'a str>),
    Sticker,
    Contact(Option<&'a str>),
    Contacts(usize),
    Location(Option<&'a str>),
    Reaction(Option<&'a str>),
    Poll(Option<&'a str>),
    Reply(Option<&'a str>),
    KeyDistribution,
    Unsupported(&'a str),
    Nothing,
}

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl MessageContent {
    fn envelope(&self) -> Envelope<'_> {
        let wrappers = [
            &self.ephemeral_message,
            &self.view_once_message,
            &self.view_once_message_v2,
            &self.view_once_message_v2_extension,
            &self.document_with_caption_message,
            &self.edited_message,
        ];
        if let Some(w) = wrappers.into_iter().flatten().next() {
            return Envelope::Wrapper(w.message.as_ref());
        }
        if let Some(p) = &self.protocol_message {
            let edit = if p.is_edit() { p.edited_message.as_ref() } else { None };
            return Envelope::Protocol { edit };
        }
        if let Some(text) = &self.conversation {
            return Envelope::Text(text);
        }
        if let Some(t) = &self.extended_text_message {
            return Envelope::Text(&t.text);
        }
        if let Some(m) = &self.image_message {
            return Envelope::Image(non_empty(&m.caption));
        }
        if let Some(m) = &self.video_message {
            return Envelope::Video(non_empty(&m.caption));
        }
        if let Some(a) = &self.audio_message {
            return Envelope::Audio { voice: a.ptt };
        }
        if let Some(d) = &self.document_message {
            let label = non_empty(&d.caption)
                .or_else(|| non_empty(&d.file_name))
                .or_else(|| non_empty(&d.title));
            return Envelope::Document(label);
        }
        if self.sticker_message.is_some() {
            return Envelope::Sticker;
        }
        if let Some(c) = &self.contact_message {
            return Envelope::Contact(non_empty(&c.display_name));
        }
        if let Some(c) = &self.contacts_array_message {
            return Envelope::Contacts(c.contacts.len());
        }
        if let Some(l) = self.location_message.as_ref().or(self.live_location_message.as_ref()) {
            return Envelope::Location(non_empty(&l.name).or_else(|| non_empty(&l.address)));
        }
        if let Some(r) = &self.reaction_message {
            return Envelope::Reaction(non_empty(&r.text));
        }
        let polls = [
            &self.poll_creation_message,
            &self.poll_creation_message_v2,
            &self.poll_creation_message_v3,
        ];
        if let Some(p) = polls.into_iter().flatten().next() {
            return Envelope::Poll(non_empty(&p.name));
        }
        if let Some(b) = &self.buttons_response_message {
            return Envelope::Reply(non_empty(&b.selected_display_text));
        }
        if let Some(l) = &self.list_response_message {
            return Envelope::Reply(non_empty(&l.title));
        }
        if let Some(b) = &self.template_button_reply_message {
            return Envelope::Reply(non_empty(&b.selected_display_text));
        }
        if let Some(key) = self.other.keys().next() {
            return Envelope::Unsupported(key);
        }
        if self.sender_key_distribution_message.is_some() {
            return Envelope::KeyDistribution;
        }
        Envelope::Nothing
    }
}

/// Extracts the visible content of an envelope. Never fails.
pub fn extract(content: Option<&MessageContent>) -> Extracted {
    extract_at(content, 0)
}

fn extract_at(content: Option<&MessageContent>, depth: usize) -> Extracted {
    let Some(content) = content else {
        return Extracted::empty();
    };
    if depth >= MAX_DEPTH {
        debug!("envelope nesting exceeds {} levels, dropping", MAX_DEPTH);
        return Extracted::empty();
    }

    match content.envelope() {
        Envelope::Wrapper(inner) => extract_at(inner, depth + 1),
        Envelope::Protocol { edit: Some(inner) } => extract_at(Some(inner), depth + 1),
        Envelope::Protocol { edit: None } | Envelope::KeyDistribution | Envelope::Nothing => {
            Extracted::empty()
        }
        Envelope::Text(text) => Extracted::new(text, ContentType::Text),
        Envelope::Image(caption) => Extracted::new(caption.unwrap_or(PHOTO), ContentType::Image),
        Envelope::Video(caption) => Extracted::new(caption.unwrap_or(VIDEO), ContentType::Video),
        Envelope::Audio { voice: true } => Extracted::new(VOICE, ContentType::Audio),
        Envelope::Audio { voice: false } => Extracted::new(AUDIO, ContentType::Audio),
        Envelope::Document(label) => {
            Extracted::new(label.unwrap_or(DOCUMENT), ContentType::Document)
        }
        Envelope::Sticker => Extracted::new(STICKER, ContentType::Sticker),
        Envelope::Contact(Some(name)) => {
            Extracted::new(format!("👤 {}", name), ContentType::Contact)
        }
        Envelope::Contact(None) => Extracted::new(CONTACT, ContentType::Contact),
        Envelope::Contacts(n) => Extracted::new(format!("👥 {} contacts", n), ContentType::Contact),
        Envelope::Location(Some(label)) => {
            Extracted::new(format!("📍 {}", label), ContentType::Location)
        }
        Envelope::Location(None) => Extracted::new(LOCATION, ContentType::Location),
        // An empty reaction is a reaction being withdrawn.
        Envelope::Reaction(Some(emoji)) => {
            Extracted::new(format!("Reacted {}", emoji), ContentType::Reaction)
        }
        Envelope::Reaction(None) => Extracted::empty(),
        Envelope::Poll(question) => Extracted::new(question.unwrap_or(POLL), ContentType::Text),
        Envelope::Reply(Some(text)) => Extracted::new(text, ContentType::Text),
        Envelope::Reply(None) => Extracted::new(UNSUPPORTED, ContentType::Unknown),
        Envelope::Unsupported(key) => {
            debug!("unsupported content kind {}", key);
            Extracted::new(UNSUPPORTED, ContentType::Unknown)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn run(v: Value) -> Extracted {
        let content: MessageContent = serde_json::from_value(v).unwrap();
        extract(Some(&content))
    }

    #[test]
    fn null_content_is_empty() {
        assert!(extract(None).is_empty());
        assert!(run(json!({})).is_empty());
    }

    #[test]
    fn plain_and_extended_text() {
        assert_eq!(
            run(json!({ "conversation": "hello" })),
            Extracted::new("hello", ContentType::Text)
        );
        assert_eq!(
            run(json!({ "extendedTextMessage": { "text": "link https://x" } })).body,
            "link https://x"
        );
    }

    #[test]
    fn media_prefers_caption_over_placeholder() {
        assert_eq!(
            run(json!({ "imageMessage": {} })),
            Extracted::new(PHOTO, ContentType::Image)
        );
        assert_eq!(run(json!({ "imageMessage": { "caption": "sunset" } })).body, "sunset");
        assert_eq!(run(json!({ "videoMessage": { "caption": "  " } })).body, VIDEO);
    }

    #[test]
    fn voice_notes_differ_from_audio() {
        assert_eq!(run(json!({ "audioMessage": { "ptt": true } })).body, VOICE);
        assert_eq!(run(json!({ "audioMessage": {} })).body, AUDIO);
    }

    #[test]
    fn documents_use_file_name() {
        let doc = run(json!({ "documentMessage": { "fileName": "report.pdf" } }));
        assert_eq!(doc, Extracted::new("report.pdf", ContentType::Document));
        assert_eq!(run(json!({ "documentMessage": {} })).body, DOCUMENT);
    }

    #[test]
    fn polls_show_their_question() {
        let poll = run(json!({ "pollCreationMessageV3": { "name": "Lunch?" } }));
        assert_eq!(poll, Extracted::new("Lunch?", ContentType::Text));
    }

    #[test]
    fn interactive_kinds() {
        assert_eq!(run(json!({ "stickerMessage": {} })).kind, ContentType::Sticker);
        assert_eq!(
            run(json!({ "contactMessage": { "displayName": "Ann" } })).body,
            "👤 Ann"
        );
        assert_eq!(
            run(json!({ "contactsArrayMessage": { "contacts": [{}, {}] } })).body,
            "👥 2 contacts"
        );
        assert_eq!(
            run(json!({ "liveLocationMessage": {} })),
            Extracted::new(LOCATION, ContentType::Location)
        );
        assert_eq!(
            run(json!({ "reactionMessage": { "text": "👍" } })),
            Extracted::new("Reacted 👍", ContentType::Reaction)
        );
        assert!(run(json!({ "reactionMessage": { "text": "" } })).is_empty());
        assert_eq!(
            run(json!({ "buttonsResponseMessage": { "selectedDisplayText": "Yes" } })).body,
            "Yes"
        );
    }

    #[test]
    fn unknown_kinds_are_unsupported() {
        assert_eq!(
            run(json!({ "groupInviteMessage": { "groupName": "x" } })),
            Extracted::new(UNSUPPORTED, ContentType::Unknown)
        );
    }

    #[test]
    fn protocol_noise_is_empty() {
        assert!(run(json!({ "protocolMessage": { "type": 0 } })).is_empty());
        assert!(run(json!({ "senderKeyDistributionMessage": { "groupId": "g" } })).is_empty());
        assert!(run(json!({ "messageContextInfo": {} })).is_empty());
    }

    #[test]
    fn key_distribution_yields_to_real_content() {
        let got = run(json!({
            "senderKeyDistributionMessage": { "groupId": "g" },
            "conversation": "first message in group"
        }));
        assert_eq!(got.body, "first message in group");
    }

    #[test]
    fn protocol_edit_recurses() {
        let got = run(json!({
            "protocolMessage": {
                "type": "MESSAGE_EDIT",
                "editedMessage": { "conversation": "fixed typo" }
            }
        }));
        assert_eq!(got, Extracted::new("fixed typo", ContentType::Text));
    }

    #[test]
    fn four_level_wrapper_chain() {
        let got = run(json!({
            "ephemeralMessage": { "message": {
                "viewOnceMessageV2": { "message": {
                    "editedMessage": { "message": {
                        "conversation": "deep"
                    }}
                }}
            }}
        }));
        assert_eq!(got, Extracted::new("deep", ContentType::Text));
    }

    #[test]
    fn captioned_document_wrapper() {
        let got = run(json!({
            "documentWithCaptionMessage": { "message": {
                "documentMessage": { "fileName": "a.pdf", "caption": "see attached" }
            }}
        }));
        assert_eq!(got, Extracted::new("see attached", ContentType::Document));
    }

    #[test]
    fn excessive_nesting_is_dropped() {
        let mut v = json!({ "conversation": "too deep" });
        for _ in 0..MAX_DEPTH {
            v = json!({ "ephemeralMessage": { "message": v } });
        }
        assert!(run(v).is_empty());

        let mut v = json!({ "conversation": "just fits" });
        for _ in 0..MAX_DEPTH - 1 {
            v = json!({ "ephemeralMessage": { "message": v } });
        }
        assert_eq!(run(v).body, "just fits");
    }

    #[test]
    fn preview_falls_back_to_type_tag() {
        assert_eq!(preview_text("", ContentType::Image), "[image]");
        assert_eq!(preview_text("hi", ContentType::Text), "hi");
        assert_eq!(preview_text("", ContentType::Unknown), "");
    }
}

use crate::api::models::Contact;

/// Pseudo conversation carrying status posts; never stored.
pub const STATUS_BROADCAST: &str = "status@broadcast";

pub fn is_group(jid: &str) -> bool {
    jid.ends_with("@g.us")
}

pub fn is_broadcast(jid: &str) -> bool {
    jid == STATUS_BROADCAST || jid.ends_with("@broadcast")
}

/// Derives a phone-number-shaped label from an identifier such as
/// `15551234567:3@s.whatsapp.net`. Always produces something printable.
pub fn phone_label(jid: &str) -> String {
    let user = jid.split('@').next().unwrap_or(jid);
    let user = user.split(':').next().unwrap_or(user);
    if user.is_empty() {
        return jid.to_string();
    }
    if !is_group(jid) && user.chars().all(|c| c.is_ascii_digit()) {
        format!("+{}", user)
    } else {
        user.to_string()
    }
}

/// Best available display name for `jid`: addressbook name, then notify name,
/// then the conversation's stored name, then the identifier itself.
pub fn display_name(jid: &str, contact: Option<&Contact>, stored: Option<&str>) -> String {
    fn filled(s: Option<&str>) -> Option<String> {
        s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
    }
    contact
        .and_then(|c| filled(c.name.as_deref()))
        .or_else(|| contact.and_then(|c| filled(c.notify.as_deref())))
        .or_else(|| filled(stored))
        .unwrap_or_else(|| phone_label(jid))
}

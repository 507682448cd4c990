use chrono::{DateTime, TimeZone, Utc};

use crate::session::{RawMessage, SenderInfo};

/// How many Unicode scalars of text the digest keeps per message.
pub const DIGEST_TEXT_LIMIT: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkMode {
    /// Flattened daily digest: truncated text, no numeric metadata,
    /// textual messages only.
    Digest,
    /// Structured archive: full text, all metadata kept as present-or-absent.
    Archive,
}

/// Normalized, sink-agnostic message. String fields are empty when
/// unknown; numeric fields stay `None` rather than being coerced to zero.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageRecord {
    pub conversation_title: String,
    pub message_id: i64,
    pub timestamp: DateTime<Utc>,
    pub sender_name: String,
    pub sender_username: String,
    pub sender_id: Option<i64>,
    pub text: String,
    pub reply_to_msg_id: Option<i64>,
    pub views: Option<i64>,
    pub forwards: Option<i64>,
}

impl MessageRecord {
    /// RFC 3339 UTC with timezone designator, e.g. `2026-08-19T15:04:05+00:00`.
    pub fn date(&self) -> String {
        self.timestamp.to_rfc3339()
    }
}

/// Map one raw message plus its resolved sender into a `MessageRecord`.
/// Pure function of its inputs.
pub fn normalize(
    raw: &RawMessage,
    sender: Option<&SenderInfo>,
    conversation_title: &str,
    mode: SinkMode,
) -> MessageRecord {
    let (sender_name, sender_username, sender_id) = sender_fields(sender);

    let full_text = raw.text.as_deref().unwrap_or("");
    let text = match mode {
        SinkMode::Digest => truncate_scalars(full_text, DIGEST_TEXT_LIMIT),
        SinkMode::Archive => full_text.to_string(),
    };

    MessageRecord {
        conversation_title: conversation_title.to_string(),
        message_id: raw.id,
        timestamp: Utc
            .timestamp_opt(raw.date, 0)
            .single()
            .unwrap_or(DateTime::UNIX_EPOCH),
        sender_name,
        sender_username,
        sender_id,
        text,
        reply_to_msg_id: raw.reply_to_msg_id,
        views: raw.views,
        forwards: raw.forwards,
    }
}

/// Display-name preference: username, else first name, else the numeric
/// ID; chat senders use their title, else the ID. An inaccessible sender
/// becomes the empty sentinel.
fn sender_fields(sender: Option<&SenderInfo>) -> (String, String, Option<i64>) {
    match sender {
        Some(SenderInfo::User {
            id,
            first_name,
            username,
        }) => {
            let name = username
                .clone()
                .filter(|value| !value.is_empty())
                .or_else(|| first_name.clone().filter(|value| !value.is_empty()))
                .unwrap_or_else(|| id.to_string());
            let username = username.clone().unwrap_or_default();
            (name, username, Some(*id))
        }
        Some(SenderInfo::Chat { id, title }) => {
            let name = title
                .clone()
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| id.to_string());
            (name, String::new(), Some(*id))
        }
        None => (String::new(), String::new(), None),
    }
}

fn truncate_scalars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

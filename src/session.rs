use async_trait::async_trait;
use serde::Deserialize;

use crate::api::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialogKind {
    Group,
    Channel,
}

impl DialogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DialogKind::Group => "group",
            DialogKind::Channel => "channel",
        }
    }
}

/// One entry in the authenticated identity's dialog list. The access hash
/// for channel-class conversations is only obtainable here.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dialog {
    pub id: i64,
    pub access_hash: i64,
    pub title: String,
    #[serde(default)]
    pub username: Option<String>,
    pub kind: DialogKind,
}

/// Resolved reference to a conversation: the id plus the access credentials
/// the history API requires. Re-resolved every run, never persisted.
#[derive(Debug, Clone)]
pub struct ConversationHandle {
    pub id: i64,
    pub access_hash: i64,
    pub title: String,
}

impl ConversationHandle {
    pub fn from_dialog(dialog: &Dialog) -> Self {
        Self {
            id: dialog.id,
            access_hash: dialog.access_hash,
            title: dialog.title.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "id")]
pub enum SenderRef {
    User(i64),
    Chat(i64),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMessage {
    pub id: i64,
    /// Unix timestamp, seconds.
    pub date: i64,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub sender: Option<SenderRef>,
    #[serde(default)]
    pub reply_to_msg_id: Option<i64>,
    #[serde(default)]
    pub views: Option<i64>,
    #[serde(default)]
    pub forwards: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum SenderInfo {
    #[serde(rename = "user")]
    User {
        id: i64,
        #[serde(default)]
        first_name: Option<String>,
        #[serde(default)]
        username: Option<String>,
    },
    #[serde(rename = "chat")]
    Chat {
        id: i64,
        #[serde(default)]
        title: Option<String>,
    },
}

/// One protocol-level page of history. `next_cursor` of `None` is the
/// end-of-history sentinel.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    pub messages: Vec<RawMessage>,
    #[serde(default)]
    pub next_cursor: Option<i64>,
}

/// The capabilities the retrieval core needs from the authenticated
/// transport. Implemented by `ApiClient` and by test fakes.
#[async_trait]
pub trait Session {
    /// Enumerate the identity's full dialog list.
    async fn dialogs(&self) -> Result<Vec<Dialog>, ApiError>;

    /// Direct lookup of a username or invite link. `None` when unregistered.
    async fn resolve_name(&self, name: &str) -> Result<Option<Dialog>, ApiError>;

    /// Fetch one page of history at or after `min_date`, ascending.
    async fn history_page(
        &self,
        handle: &ConversationHandle,
        cursor: Option<i64>,
        min_date: i64,
    ) -> Result<HistoryPage, ApiError>;

    /// Resolve a message's sender reference. `None` when the sender is
    /// deleted or inaccessible.
    async fn resolve_sender(&self, sender: SenderRef) -> Result<Option<SenderInfo>, ApiError>;
}

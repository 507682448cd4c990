use std::fmt;

use thiserror::Error;

use crate::api::ApiError;
use crate::session::{ConversationHandle, Session};

/// A configured group identifier, parsed once at ingestion. Decimal
/// integers are conversation IDs; everything else is a username or
/// invite link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationToken {
    Id(i64),
    Name(String),
}

impl ConversationToken {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.parse::<i64>() {
            Ok(id) => ConversationToken::Id(id),
            Err(_) => ConversationToken::Name(trimmed.to_string()),
        }
    }
}

impl fmt::Display for ConversationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversationToken::Id(id) => write!(f, "{id}"),
            ConversationToken::Name(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no conversation found for '{token}'")]
    NotFound { token: String },
    #[error("'{token}' exists but is not reachable: {source}")]
    Unreachable { token: String, source: ApiError },
    #[error(transparent)]
    Transport(#[from] ApiError),
}

/// Resolve a token to a conversation handle.
///
/// Numeric IDs are matched against the session's dialog list. That full
/// traversal is required by the protocol: the access hash for
/// channel-class conversations is only present in dialog entries, so a
/// direct lookup by ID can return a handle that the history API rejects.
/// Username tokens go through the direct lookup path.
pub async fn resolve<S: Session>(
    session: &S,
    token: &ConversationToken,
) -> Result<ConversationHandle, ResolveError> {
    match token {
        ConversationToken::Id(id) => {
            let dialogs = session.dialogs().await?;
            dialogs
                .iter()
                .find(|dialog| dialog.id == *id)
                .map(ConversationHandle::from_dialog)
                .ok_or_else(|| ResolveError::NotFound {
                    token: token.to_string(),
                })
        }
        ConversationToken::Name(name) => match session.resolve_name(name).await {
            Ok(Some(dialog)) => Ok(ConversationHandle::from_dialog(&dialog)),
            Ok(None) => Err(ResolveError::NotFound {
                token: token.to_string(),
            }),
            Err(ApiError::Auth) => Err(ResolveError::Transport(ApiError::Auth)),
            Err(source @ ApiError::Api { .. }) => Err(ResolveError::Unreachable {
                token: token.to_string(),
                source,
            }),
            Err(err) => Err(ResolveError::Transport(err)),
        },
    }
}

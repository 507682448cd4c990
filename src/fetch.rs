use crate::api::ApiError;
use crate::history::{HistoryPaginator, RetrievalWindow};
use crate::record::{MessageRecord, SinkMode, normalize};
use crate::resolve::{self, ConversationToken, ResolveError};
use crate::session::Session;

/// Progress lines are emitted every this many messages in archive mode.
const PROGRESS_EVERY: usize = 500;

#[derive(Debug)]
pub enum Outcome {
    /// The window was walked to the end of history.
    Complete,
    /// The token never resolved; no records.
    Skipped(String),
    /// Pagination failed mid-conversation; the records gathered before
    /// the failure are kept.
    Partial(String),
}

#[derive(Debug)]
pub struct ConversationResult {
    pub token: String,
    pub title: Option<String>,
    pub records: Vec<MessageRecord>,
    pub outcome: Outcome,
}

impl ConversationResult {
    pub fn count(&self) -> usize {
        self.records.len()
    }

    pub fn display_name(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.token)
    }
}

/// The finished result of one orchestration pass: conversation order
/// follows the configured token order, records within a conversation are
/// chronological.
#[derive(Debug)]
pub struct FetchRun {
    pub conversations: Vec<ConversationResult>,
}

impl FetchRun {
    pub fn total(&self) -> usize {
        self.conversations.iter().map(ConversationResult::count).sum()
    }

    pub fn records(&self) -> impl Iterator<Item = &MessageRecord> {
        self.conversations
            .iter()
            .flat_map(|conversation| conversation.records.iter())
    }
}

/// Drive resolution, pagination, and normalization for each token in
/// order. Per-conversation failures are recorded and skipped over;
/// authentication failures abort the run.
pub async fn retrieve<S: Session>(
    session: &S,
    tokens: &[ConversationToken],
    window: RetrievalWindow,
    mode: SinkMode,
) -> Result<FetchRun, ApiError> {
    let mut conversations = Vec::with_capacity(tokens.len());

    for token in tokens {
        let handle = match resolve::resolve(session, token).await {
            Ok(handle) => handle,
            Err(ResolveError::Transport(ApiError::Auth)) => return Err(ApiError::Auth),
            Err(err) => {
                eprintln!("warning: could not find group '{token}': {err}");
                conversations.push(ConversationResult {
                    token: token.to_string(),
                    title: None,
                    records: Vec::new(),
                    outcome: Outcome::Skipped(err.to_string()),
                });
                continue;
            }
        };

        let mut records: Vec<MessageRecord> = Vec::new();
        let mut outcome = Outcome::Complete;
        let mut paginator = HistoryPaginator::new(session, &handle, window);

        while let Some(item) = paginator.next().await {
            let raw = match item {
                Ok(raw) => raw,
                Err(err) if err.is_auth() => return Err(ApiError::Auth),
                Err(err) => {
                    eprintln!(
                        "warning: '{token}' stopped after {} messages: {err}",
                        records.len()
                    );
                    outcome = Outcome::Partial(err.to_string());
                    break;
                }
            };

            // The digest sink wants textual messages only.
            if mode == SinkMode::Digest && raw.text.as_deref().unwrap_or("").is_empty() {
                continue;
            }

            let sender = match raw.sender {
                Some(reference) => match session.resolve_sender(reference).await {
                    Ok(sender) => sender,
                    Err(ApiError::Auth) => return Err(ApiError::Auth),
                    // Deleted or inaccessible sender: empty sentinel.
                    Err(_) => None,
                },
                None => None,
            };

            records.push(normalize(&raw, sender.as_ref(), &handle.title, mode));

            if mode == SinkMode::Archive && records.len() % PROGRESS_EVERY == 0 {
                println!("{}: {} messages so far...", handle.title, records.len());
            }
        }

        conversations.push(ConversationResult {
            token: token.to_string(),
            title: Some(handle.title.clone()),
            records,
            outcome,
        });
    }

    Ok(FetchRun { conversations })
}

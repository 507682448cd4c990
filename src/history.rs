use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::api::ApiError;
use crate::session::{ConversationHandle, RawMessage, Session};

/// The [since, until) range bounding one retrieval pass. `until` is
/// captured when the run starts and stays fixed even as wall-clock time
/// advances.
#[derive(Debug, Clone, Copy)]
pub struct RetrievalWindow {
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
}

impl RetrievalWindow {
    pub fn ending_at(since: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        Self { since, until }
    }

    pub fn contains(&self, epoch_seconds: i64) -> bool {
        epoch_seconds >= self.since.timestamp() && epoch_seconds < self.until.timestamp()
    }
}

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("history fetch failed: {0}")]
    Page(#[from] ApiError),
}

impl RetrievalError {
    /// Authentication failures abort the whole run, not just one
    /// conversation.
    pub fn is_auth(&self) -> bool {
        matches!(self, RetrievalError::Page(ApiError::Auth))
    }
}

/// Walks a conversation's history as one flattened, chronologically
/// ascending stream. Protocol page boundaries stay internal: the paginator
/// buffers one page at a time and follows the transport cursor until the
/// end-of-history sentinel.
///
/// A page fetch failure surfaces as a single terminal `Err`; messages
/// yielded before it stand.
pub struct HistoryPaginator<'a, S: Session> {
    session: &'a S,
    handle: &'a ConversationHandle,
    window: RetrievalWindow,
    buffer: VecDeque<RawMessage>,
    cursor: Option<i64>,
    started: bool,
    done: bool,
    last_date: i64,
}

impl<'a, S: Session> HistoryPaginator<'a, S> {
    pub fn new(session: &'a S, handle: &'a ConversationHandle, window: RetrievalWindow) -> Self {
        Self {
            session,
            handle,
            window,
            buffer: VecDeque::new(),
            cursor: None,
            started: false,
            done: false,
            last_date: i64::MIN,
        }
    }

    pub async fn next(&mut self) -> Option<Result<RawMessage, RetrievalError>> {
        loop {
            if let Some(message) = self.buffer.pop_front() {
                self.last_date = message.date;
                return Some(Ok(message));
            }
            if self.done {
                return None;
            }
            if self.started && self.cursor.is_none() {
                self.done = true;
                return None;
            }

            let page = match self
                .session
                .history_page(self.handle, self.cursor, self.window.since.timestamp())
                .await
            {
                Ok(page) => page,
                Err(err) => {
                    self.done = true;
                    return Some(Err(RetrievalError::Page(err)));
                }
            };

            self.started = true;
            self.cursor = page.next_cursor;
            let last_date = self.last_date;
            let window = self.window;
            self.buffer.extend(
                page.messages
                    .into_iter()
                    .filter(|message| window.contains(message.date) && message.date >= last_date),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::session::testing::{FakeSession, message};

    fn window(since: i64, until: i64) -> RetrievalWindow {
        RetrievalWindow::ending_at(
            Utc.timestamp_opt(since, 0).single().expect("since"),
            Utc.timestamp_opt(until, 0).single().expect("until"),
        )
    }

    fn handle(id: i64) -> ConversationHandle {
        ConversationHandle {
            id,
            access_hash: 1,
            title: "test".to_string(),
        }
    }

    async fn drain<S: Session>(
        paginator: &mut HistoryPaginator<'_, S>,
    ) -> (Vec<RawMessage>, Option<RetrievalError>) {
        let mut messages = Vec::new();
        while let Some(item) = paginator.next().await {
            match item {
                Ok(message) => messages.push(message),
                Err(err) => return (messages, Some(err)),
            }
        }
        (messages, None)
    }

    #[tokio::test]
    async fn pages_flatten_into_one_ascending_stream() {
        let mut session = FakeSession::default();
        session.add_pages(
            1,
            vec![
                vec![message(10, 1000, "a", None), message(11, 1010, "b", None)],
                vec![message(12, 1020, "c", None)],
                vec![message(13, 1030, "", None)],
            ],
        );

        let handle = handle(1);
        let mut paginator = HistoryPaginator::new(&session, &handle, window(900, 2000));
        let (messages, err) = drain(&mut paginator).await;
        assert!(err.is_none());
        let ids: Vec<i64> = messages.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![10, 11, 12, 13]);
        let dates: Vec<i64> = messages.iter().map(|m| m.date).collect();
        assert!(dates.windows(2).all(|pair| pair[0] <= pair[1]));
        // Empty-text messages are still yielded.
        assert!(messages[3].text.is_none());
    }

    #[tokio::test]
    async fn nothing_before_since_or_past_until_is_yielded() {
        let mut session = FakeSession::default();
        session.add_pages(
            1,
            vec![vec![
                message(1, 500, "old", None),
                message(2, 1000, "in", None),
                message(3, 1999, "in", None),
                message(4, 2000, "new", None),
            ]],
        );

        let handle = handle(1);
        let mut paginator = HistoryPaginator::new(&session, &handle, window(1000, 2000));
        let (messages, err) = drain(&mut paginator).await;
        assert!(err.is_none());
        let ids: Vec<i64> = messages.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[tokio::test]
    async fn empty_history_ends_without_error() {
        let session = FakeSession::default();
        let handle = handle(1);
        let mut paginator = HistoryPaginator::new(&session, &handle, window(0, 100));
        assert!(paginator.next().await.is_none());
        // The stream stays finished on repeated polls.
        assert!(paginator.next().await.is_none());
    }

    #[tokio::test]
    async fn page_failure_is_terminal_and_keeps_earlier_messages() {
        let mut session = FakeSession::default();
        session.add_pages(
            1,
            vec![
                vec![message(1, 1000, "a", None), message(2, 1001, "b", None)],
                vec![message(3, 1002, "c", None)],
            ],
        );
        session.fail_at.insert(1, 1);

        let handle = handle(1);
        let mut paginator = HistoryPaginator::new(&session, &handle, window(0, 9999));
        let (messages, err) = drain(&mut paginator).await;
        assert_eq!(messages.len(), 2);
        assert!(err.is_some());
        assert!(paginator.next().await.is_none());
    }
}

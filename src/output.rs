use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::fetch::{FetchRun, Outcome};
use crate::record::MessageRecord;
use crate::session::Dialog;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Consumes the finished record stream of one run and writes it out.
pub trait Sink {
    fn write_run(&self, run: &FetchRun) -> Result<Vec<PathBuf>, OutputError>;
}

/// Flattened daily digest: every record becomes a `---` pseudo-frontmatter
/// block, all conversations in one document.
pub struct DigestSink {
    pub path: PathBuf,
}

impl Sink for DigestSink {
    fn write_run(&self, run: &FetchRun) -> Result<Vec<PathBuf>, OutputError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, render_digest(run))?;
        Ok(vec![self.path.clone()])
    }
}

pub fn render_digest(run: &FetchRun) -> String {
    let blocks: Vec<String> = run.records().map(digest_block).collect();
    blocks.join("\n")
}

fn digest_block(record: &MessageRecord) -> String {
    format!(
        "---\ntitle: {}\ndate: {}\nauthor: {}\ncontent: {}",
        record.conversation_title,
        record.date(),
        record.sender_name,
        record.text,
    )
}

/// Structured archive: one pretty-printed JSON array per conversation,
/// named after the conversation title. Skipped conversations produce no
/// file; partial ones keep what was fetched.
pub struct ArchiveSink {
    pub dir: PathBuf,
}

impl Sink for ArchiveSink {
    fn write_run(&self, run: &FetchRun) -> Result<Vec<PathBuf>, OutputError> {
        fs::create_dir_all(&self.dir)?;
        let mut written = Vec::new();
        for conversation in &run.conversations {
            if matches!(conversation.outcome, Outcome::Skipped(_)) {
                continue;
            }
            let path = self
                .dir
                .join(format!("{}.json", safe_file_name(conversation.display_name())));
            let entries: Vec<ArchiveEntry> =
                conversation.records.iter().map(ArchiveEntry::from).collect();
            fs::write(&path, serde_json::to_string_pretty(&entries)?)?;
            written.push(path);
        }
        Ok(written)
    }
}

/// The archive's on-disk record shape. Absent numeric fields serialize as
/// JSON null; string fields are always present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    pub id: i64,
    pub date: String,
    pub sender_id: Option<i64>,
    pub sender_name: String,
    pub sender_username: String,
    pub text: String,
    pub reply_to_msg_id: Option<i64>,
    pub views: Option<i64>,
    pub forwards: Option<i64>,
}

impl From<&MessageRecord> for ArchiveEntry {
    fn from(record: &MessageRecord) -> Self {
        Self {
            id: record.message_id,
            date: record.date(),
            sender_id: record.sender_id,
            sender_name: record.sender_name.clone(),
            sender_username: record.sender_username.clone(),
            text: record.text.clone(),
            reply_to_msg_id: record.reply_to_msg_id,
            views: record.views,
            forwards: record.forwards,
        }
    }
}

/// Conversation title to file stem: alphanumerics, `-`, `_`, and spaces
/// survive, spaces collapse to underscores, everything lowercased.
pub fn safe_file_name(title: &str) -> String {
    let kept: String = title
        .chars()
        .filter(|ch| ch.is_alphanumeric() || matches!(ch, '-' | '_' | ' '))
        .collect();
    let name = kept.trim().replace(' ', "_").to_lowercase();
    if name.is_empty() {
        "conversation".to_string()
    } else {
        name
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), OutputError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DialogListItem<'a> {
    id: i64,
    kind: &'static str,
    title: &'a str,
    username: Option<&'a str>,
}

pub fn print_dialogs(dialogs: &[Dialog], json: bool) -> Result<(), OutputError> {
    if json {
        let items: Vec<DialogListItem> = dialogs
            .iter()
            .map(|dialog| DialogListItem {
                id: dialog.id,
                kind: dialog.kind.as_str(),
                title: &dialog.title,
                username: dialog.username.as_deref(),
            })
            .collect();
        return print_json(&items);
    }

    let mut title_width = display_width("title");
    let mut username_width = display_width("username");
    for dialog in dialogs {
        title_width = title_width.max(display_width(&dialog.title));
        if let Some(username) = dialog.username.as_deref() {
            username_width = username_width.max(display_width(username) + 1);
        }
    }
    title_width = title_width.min(40);
    username_width = username_width.min(20);

    println!(
        "{}  {}  {}  {}",
        pad_left("id", 12),
        pad_right("kind", 7),
        pad_right("title", title_width),
        pad_right("username", username_width),
    );
    for dialog in dialogs {
        let username = dialog
            .username
            .as_deref()
            .map(|name| format!("@{name}"))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}  {}  {}  {}",
            pad_left(&dialog.id.to_string(), 12),
            pad_right(dialog.kind.as_str(), 7),
            pad_right(&truncate_display(&dialog.title, title_width), title_width),
            pad_right(&truncate_display(&username, username_width), username_width),
        );
    }
    Ok(())
}

fn display_width(value: &str) -> usize {
    UnicodeWidthStr::width(value)
}

fn truncate_display(value: &str, max_width: usize) -> String {
    if display_width(value) <= max_width {
        return value.to_string();
    }
    let ellipsis = "...";
    let mut width = 0usize;
    let mut output = String::new();
    for ch in value.chars() {
        let ch_width = UnicodeWidthChar::width(ch).unwrap_or(0);
        if width + ch_width + ellipsis.len() > max_width {
            break;
        }
        output.push(ch);
        width += ch_width;
    }
    output.push_str(ellipsis);
    output
}

fn pad_right(value: &str, width: usize) -> String {
    let mut output = value.to_string();
    let current = display_width(value);
    if current < width {
        output.push_str(&" ".repeat(width - current));
    }
    output
}

fn pad_left(value: &str, width: usize) -> String {
    let current = display_width(value);
    if current >= width {
        return value.to_string();
    }
    let mut output = " ".repeat(width - current);
    output.push_str(value);
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::ConversationResult;
    use crate::record::{SinkMode, normalize};
    use crate::session::testing::message;

    fn record(id: i64, date: i64, text: &str, title: &str, mode: SinkMode) -> MessageRecord {
        normalize(&message(id, date, text, None), None, title, mode)
    }

    fn run_with(records: Vec<MessageRecord>, title: &str, outcome: Outcome) -> FetchRun {
        FetchRun {
            conversations: vec![ConversationResult {
                token: title.to_lowercase(),
                title: Some(title.to_string()),
                records,
                outcome,
            }],
        }
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("telearc-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).expect("temp dir");
        dir
    }

    #[test]
    fn digest_contains_one_block_per_record_in_order() {
        let records = vec![
            record(1, 1000, "first", "News", SinkMode::Digest),
            record(2, 2000, "second", "News", SinkMode::Digest),
            record(3, 3000, "third", "News", SinkMode::Digest),
        ];
        let digest = render_digest(&run_with(records, "News", Outcome::Complete));

        assert_eq!(digest.matches("---\n").count(), 3);
        let first = digest.find("content: first").expect("first");
        let second = digest.find("content: second").expect("second");
        let third = digest.find("content: third").expect("third");
        assert!(first < second && second < third);
        assert!(digest.contains("title: News"));
        assert!(digest.contains("date: 1970-01-01T00:16:40+00:00"));
        assert!(digest.contains("author: \n"));
    }

    #[test]
    fn archive_round_trips_and_is_idempotent() {
        let dir = temp_dir("archive-roundtrip");
        let mut with_meta = record(5, 1_700_000_000, "привет", "Rust News!", SinkMode::Archive);
        with_meta.views = Some(12);
        with_meta.reply_to_msg_id = Some(4);
        let records = vec![with_meta.clone(), record(6, 1_700_000_100, "", "Rust News!", SinkMode::Archive)];

        let sink = ArchiveSink { dir: dir.clone() };
        let written = sink
            .write_run(&run_with(records.clone(), "Rust News!", Outcome::Complete))
            .expect("write");
        assert_eq!(written, vec![dir.join("rust_news.json")]);

        let first_bytes = fs::read(&written[0]).expect("read");
        // Non-ASCII is preserved literally, not escaped.
        assert!(String::from_utf8(first_bytes.clone()).expect("utf8").contains("привет"));

        let parsed: Vec<ArchiveEntry> =
            serde_json::from_slice(&first_bytes).expect("parse back");
        let expected: Vec<ArchiveEntry> = records.iter().map(ArchiveEntry::from).collect();
        assert_eq!(parsed, expected);
        assert_eq!(parsed[1].views, None);
        assert_eq!(parsed[1].text, "");

        sink.write_run(&run_with(records, "Rust News!", Outcome::Complete))
            .expect("rewrite");
        assert_eq!(fs::read(&written[0]).expect("reread"), first_bytes);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn absent_numerics_serialize_as_null() {
        let entry = ArchiveEntry::from(&record(1, 1000, "hi", "c", SinkMode::Archive));
        let json = serde_json::to_string(&entry).expect("json");
        assert!(json.contains("\"views\":null"));
        assert!(json.contains("\"forwards\":null"));
        assert!(json.contains("\"reply_to_msg_id\":null"));
        assert!(json.contains("\"sender_id\":null"));
    }

    #[test]
    fn skipped_conversations_produce_no_file() {
        let dir = temp_dir("archive-skip");
        let run = FetchRun {
            conversations: vec![
                ConversationResult {
                    token: "gone".to_string(),
                    title: None,
                    records: Vec::new(),
                    outcome: Outcome::Skipped("not found".to_string()),
                },
                ConversationResult {
                    token: "empty".to_string(),
                    title: Some("Empty".to_string()),
                    records: Vec::new(),
                    outcome: Outcome::Complete,
                },
            ],
        };
        let written = ArchiveSink { dir: dir.clone() }.write_run(&run).expect("write");
        assert_eq!(written, vec![dir.join("empty.json")]);
        let parsed: Vec<ArchiveEntry> =
            serde_json::from_slice(&fs::read(&written[0]).expect("read")).expect("parse");
        assert!(parsed.is_empty());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn file_names_are_sanitized() {
        assert_eq!(safe_file_name("Rust News!"), "rust_news");
        assert_eq!(safe_file_name("  a/b\\c  "), "abc");
        assert_eq!(safe_file_name("Канал Новостей"), "канал_новостей");
        assert_eq!(safe_file_name("!!!"), "conversation");
    }

    #[test]
    fn digest_file_is_written_with_parents() {
        let dir = temp_dir("digest-write");
        let path = dir.join("2026-08-19").join("digest.txt");
        let records = vec![record(1, 1000, "only", "News", SinkMode::Digest)];
        DigestSink { path: path.clone() }
            .write_run(&run_with(records, "News", Outcome::Complete))
            .expect("write");
        let contents = fs::read_to_string(&path).expect("read");
        assert!(contents.starts_with("---\n"));

        let _ = fs::remove_dir_all(&dir);
    }
}

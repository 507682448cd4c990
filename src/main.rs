mod api;
mod auth;
mod config;
mod dates;
mod fetch;
mod history;
mod output;
mod record;
mod resolve;
mod session;
mod state;

use chrono::{DateTime, Duration, Utc};
use clap::{Args, Parser, Subcommand};
use dialoguer::{Input, Select};
use serde::Serialize;
use std::path::PathBuf;

use crate::api::{ApiClient, CurrentUser};
use crate::auth::AuthStore;
use crate::config::Config;
use crate::fetch::{FetchRun, Outcome};
use crate::history::RetrievalWindow;
use crate::output::{ArchiveSink, DigestSink, Sink};
use crate::record::SinkMode;
use crate::resolve::ConversationToken;
use crate::session::Session;
use crate::state::LocalDb;

#[derive(Parser)]
#[command(
    name = "telearc",
    version,
    about = "Archive group and channel message history",
    after_help = "Examples:\n  telearc auth login --phone +15550100\n  telearc dialogs list\n  telearc dialogs list --json\n  telearc fetch\n  telearc fetch --hours 48 --groups news_channel,rustlang\n  telearc fetch --since \"2d ago\" --output ./digest.txt\n  telearc backfill --days 180\n  telearc backfill --days 30 --output-dir ./archive"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(long, global = true, help = "Output JSON instead of a table or summary")]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Authenticate this CLI")]
    Auth {
        #[command(subcommand)]
        command: AuthCommand,
    },
    #[command(about = "List groups and channels you are in")]
    Dialogs {
        #[command(subcommand)]
        command: DialogsCommand,
    },
    #[command(about = "Fetch a recent window of messages as a flat digest")]
    Fetch(FetchArgs),
    #[command(about = "Backfill history as per-conversation JSON archives")]
    Backfill(BackfillArgs),
}

#[derive(Subcommand)]
enum AuthCommand {
    #[command(about = "Log in via phone code")]
    Login(AuthLoginArgs),
    #[command(about = "Clear the saved token")]
    Logout,
}

#[derive(Args)]
struct AuthLoginArgs {
    #[arg(long, help = "Phone number to send the login code to")]
    phone: Option<String>,
}

#[derive(Subcommand)]
enum DialogsCommand {
    #[command(about = "List dialogs with kind, title, username, and id")]
    List,
}

#[derive(Args)]
struct FetchArgs {
    #[arg(long, help = "Window size in hours (default 24)", conflicts_with = "since")]
    hours: Option<i64>,

    #[arg(long, help = "Window start, e.g. \"36h\", \"2d ago\", \"yesterday\", \"2026-08-01\"")]
    since: Option<String>,

    #[arg(long, help = "Comma-separated group tokens (overrides TELEARC_GROUPS)")]
    groups: Option<String>,

    #[arg(long, help = "Digest file path (default under the data dir)")]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct BackfillArgs {
    #[arg(long, help = "Number of days to backfill")]
    days: i64,

    #[arg(long, help = "Comma-separated group tokens (overrides TELEARC_GROUPS)")]
    groups: Option<String>,

    #[arg(long, help = "Archive directory (default under the data dir)")]
    output_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("{error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = Config::load();
    let auth_store = AuthStore::new(config.secrets_path.clone(), config.api_base_url.clone());
    let local_db = LocalDb::new(config.state_path.clone(), config.api_base_url.clone());
    let api = ApiClient::new(config.api_base_url.clone());

    match cli.command {
        Command::Auth { command } => match command {
            AuthCommand::Login(args) => {
                handle_login(args, &api, &auth_store, &local_db).await?;
            }
            AuthCommand::Logout => {
                auth_store.clear_token()?;
                local_db.clear_current_user()?;
                println!("Logged out.");
            }
        },
        Command::Dialogs { command } => match command {
            DialogsCommand::List => {
                let session = api.with_token(require_token(&auth_store)?);
                let dialogs = session.dialogs().await?;
                output::print_dialogs(&dialogs, cli.json)?;
            }
        },
        Command::Fetch(args) => {
            let groups = config.resolve_groups(args.groups.as_deref())?;
            let now = Utc::now();
            let since = match args.since.as_deref() {
                Some(expr) => dates::parse_since(expr, now)?,
                None => {
                    let hours = config::positive_window(args.hours.unwrap_or(24))?;
                    now - Duration::hours(hours)
                }
            };
            let window = RetrievalWindow::ending_at(since, now);
            let tokens = parse_tokens(&groups);
            let session = api.with_token(require_token(&auth_store)?);

            let run = fetch::retrieve(&session, &tokens, window, SinkMode::Digest).await?;
            let output_path = args
                .output
                .unwrap_or_else(|| digest_output_path(&config, now));
            let written = DigestSink {
                path: output_path.clone(),
            }
            .write_run(&run)?;

            if cli.json {
                output::print_json(&run_report(&run, &written))?;
            } else {
                for conversation in &run.conversations {
                    println!(
                        "{}: {} messages",
                        conversation.display_name(),
                        conversation.count()
                    );
                }
                println!(
                    "Done. {} messages saved to {}",
                    run.total(),
                    output_path.display()
                );
            }
        }
        Command::Backfill(args) => {
            let groups = config.resolve_groups(args.groups.as_deref())?;
            let days = config::positive_window(args.days)?;
            let now = Utc::now();
            let window = RetrievalWindow::ending_at(now - Duration::days(days), now);
            let tokens = parse_tokens(&groups);
            let session = api.with_token(require_token(&auth_store)?);

            let run = fetch::retrieve(&session, &tokens, window, SinkMode::Archive).await?;
            let dir = args
                .output_dir
                .unwrap_or_else(|| config.data_dir.join("outputs").join("raw").join("backfill"));
            let written = ArchiveSink { dir: dir.clone() }.write_run(&run)?;

            if cli.json {
                output::print_json(&run_report(&run, &written))?;
            } else {
                for conversation in &run.conversations {
                    println!(
                        "{}: {} messages",
                        conversation.display_name(),
                        conversation.count()
                    );
                }
                println!("Saved {} archives to {}", written.len(), dir.display());
            }
        }
    }

    Ok(())
}

async fn handle_login(
    args: AuthLoginArgs,
    api: &ApiClient,
    auth_store: &AuthStore,
    local_db: &LocalDb,
) -> Result<(), Box<dyn std::error::Error>> {
    let client_version = env!("CARGO_PKG_VERSION");
    let mut phone = args.phone.map(|value| value.trim().to_string());

    loop {
        let current = match phone.take() {
            Some(value) => value,
            None => prompt_phone()?,
        };

        let sent = api.send_sms_code(&current).await?;
        if sent.existing_user {
            println!("Code sent to {current}.");
        } else {
            println!("Code sent to {current} (new account).");
        }

        loop {
            let code = prompt_code()?;
            match api.verify_sms_code(&current, &code, client_version).await {
                Ok(result) => {
                    auth_store.store_token(&result.token)?;
                    let session = api.clone().with_token(result.token);
                    match session.get_me().await {
                        Ok(me) => {
                            local_db.set_current_user(me.user.clone())?;
                            println!("Authenticated as {}.", user_display_name(&me.user));
                        }
                        Err(error) => {
                            eprintln!("Logged in, but failed to load profile: {error}");
                            println!("Logged in as user {}.", result.user_id);
                        }
                    }
                    return Ok(());
                }
                Err(error) => {
                    eprintln!("{error}");
                    let retry = Select::new()
                        .items(&["Try code again", "Edit phone number"])
                        .default(0)
                        .interact()?;
                    if retry == 0 {
                        continue;
                    }
                    break;
                }
            }
        }
    }
}

fn prompt_phone() -> Result<String, Box<dyn std::error::Error>> {
    let phone: String = Input::new()
        .with_prompt("Phone (E.164 recommended)")
        .interact_text()?;
    Ok(phone.trim().to_string())
}

fn prompt_code() -> Result<String, Box<dyn std::error::Error>> {
    let code: String = Input::new().with_prompt("Code").interact_text()?;
    Ok(code.trim().to_string())
}

fn require_token(auth_store: &AuthStore) -> Result<String, Box<dyn std::error::Error>> {
    match auth_store.load_token()? {
        Some(token) => Ok(token),
        None => Err("No token found. Run `telearc auth login` first.".into()),
    }
}

fn parse_tokens(groups: &[String]) -> Vec<ConversationToken> {
    groups
        .iter()
        .map(|group| ConversationToken::parse(group))
        .collect()
}

fn digest_output_path(config: &Config, now: DateTime<Utc>) -> PathBuf {
    config
        .data_dir
        .join("outputs")
        .join("raw")
        .join(now.format("%Y-%m-%d").to_string())
        .join("digest.txt")
}

fn user_display_name(user: &CurrentUser) -> String {
    let name = user
        .first_name
        .clone()
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| user.id.to_string());
    match user.username.as_deref() {
        Some(username) if !username.is_empty() => format!("{name} (@{username})"),
        _ => name,
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RunReport {
    total: usize,
    conversations: Vec<ConversationReport>,
    outputs: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConversationReport {
    token: String,
    title: Option<String>,
    count: usize,
    status: String,
    detail: Option<String>,
}

fn run_report(run: &FetchRun, written: &[PathBuf]) -> RunReport {
    let conversations = run
        .conversations
        .iter()
        .map(|conversation| {
            let (status, detail) = match &conversation.outcome {
                Outcome::Complete => ("complete", None),
                Outcome::Skipped(reason) => ("skipped", Some(reason.clone())),
                Outcome::Partial(reason) => ("partial", Some(reason.clone())),
            };
            ConversationReport {
                token: conversation.token.clone(),
                title: conversation.title.clone(),
                count: conversation.count(),
                status: status.to_string(),
                detail,
            }
        })
        .collect();

    RunReport {
        total: run.total(),
        conversations,
        outputs: written
            .iter()
            .map(|path| path.display().to_string())
            .collect(),
    }
}

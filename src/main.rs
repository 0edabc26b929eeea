use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::BroadcastStream;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use elicit::catalog::{Catalog, demo_catalog};
use elicit::cli::{CliCommand, CliParser, HELP};
use elicit::config::AppConfig;
use elicit::dialogue::{
    DialogueResolver, HeuristicConfig, HeuristicResolver, ScriptedResolver, Strategy,
};
use elicit::export::handoff_markdown;
use elicit::registry::{JsonFileRegistry, SummaryRegistry};
use elicit::session::{Role, Session, SessionEvent, TopicStatus};

/// How long to wait for queued assistant lines to print on exit.
const PRINTER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("Invalid configuration")?;
    let _log_guard = init_tracing(config.log_dir.as_deref());

    let catalog = Arc::new(load_catalog(&config).await.context("Failed to load catalog")?);
    let resolver = build_resolver(&config, &catalog)?;

    eprintln!("📝 Elicit v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Participant: {}", config.participant.name);
    eprintln!("   Project: {}", config.participant.project);
    eprintln!("   Strategy: {}", config.strategy);
    eprintln!(
        "   Catalog: {} groups, {} topics",
        catalog.groups().len(),
        catalog.topic_count()
    );
    eprintln!("   Type /help for commands.\n");

    let session = Session::new(Arc::clone(&catalog), resolver, config.session.clone());
    let printer = tokio::spawn(print_assistant_entries(BroadcastStream::new(
        session.subscribe(),
    )));

    session.begin().await;
    if let Some(first) = catalog.topics().first() {
        session.select(&first.id, false).await;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while !session.is_session_complete().await {
        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            break; // EOF
        };
        match CliParser::parse(&line) {
            CliCommand::Session(command) => {
                if !session.dispatch(command).await {
                    if session.is_thinking().await {
                        eprintln!("   (still thinking, one moment)");
                    } else {
                        eprintln!("   (not available right now)");
                    }
                }
            }
            CliCommand::Progress => print_progress(&session).await,
            CliCommand::Topics => print_topics(&session).await,
            CliCommand::Help => eprintln!("{HELP}"),
            CliCommand::Quit => break,
            CliCommand::Empty => {}
            CliCommand::Unknown(input) => eprintln!("   Unknown command: {input}. Try /help."),
        }
    }

    session.settle().await;
    if session.is_session_complete().await {
        finish(&session, &config).await?;
    } else {
        eprintln!("\nSession left incomplete.");
        print_progress(&session).await;
    }

    // Dropping the session closes the event channel; let the printer drain.
    session.dispose().await;
    if tokio::time::timeout(PRINTER_DRAIN_TIMEOUT, printer).await.is_err() {
        tracing::warn!("Event printer did not finish draining");
    }
    Ok(())
}

async fn load_catalog(config: &AppConfig) -> elicit::Result<Catalog> {
    let catalog = match config.catalog_path {
        Some(ref path) => Catalog::load(path).await?,
        None => demo_catalog()?,
    };
    Ok(catalog)
}

fn build_resolver(
    config: &AppConfig,
    catalog: &Catalog,
) -> elicit::Result<Arc<dyn DialogueResolver>> {
    let resolver: Arc<dyn DialogueResolver> = match config.strategy {
        Strategy::Scripted => Arc::new(ScriptedResolver::from_catalog(catalog)),
        Strategy::Heuristic => Arc::new(HeuristicResolver::new(HeuristicConfig {
            follow_up_threshold: config.follow_up_threshold,
            ..HeuristicConfig::default()
        })?),
    };
    Ok(resolver)
}

/// Log to a daily rolling file when a log directory is set, otherwise to
/// stderr at `warn` so the conversation stays readable.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    match log_dir {
        Some(dir) => {
            let filter =
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, "elicit.log"));
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            let filter =
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
            None
        }
    }
}

async fn print_assistant_entries(mut events: BroadcastStream<SessionEvent>) {
    while let Some(event) = events.next().await {
        match event {
            Ok(SessionEvent::EntryAppended { entry }) if entry.role == Role::Assistant => {
                println!("\n{}\n", entry.content);
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Event stream lagged: {}", e),
        }
    }
}

async fn print_progress(session: &Session) {
    let progress = session.progress().await;
    eprintln!(
        "   Overall: {}/{} ({}%)",
        progress.completed_topics, progress.total_topics, progress.percent_complete
    );
    for group in session.catalog().groups() {
        if let Some(g) = progress.group(&group.id) {
            eprintln!(
                "   {}: {}/{} ({}%)",
                group.title, g.completed, g.total, g.percent_complete
            );
        }
    }
}

async fn print_topics(session: &Session) {
    let snapshot = session.snapshot().await;
    let selected = snapshot.selection.as_ref().map(|s| s.topic_id.as_str());
    for group in session.catalog().groups() {
        let lock = if session.is_group_accessible(&group.id).await { " " } else { "🔒" };
        let expanded = session.is_group_expanded(&group.id).await;
        eprintln!("{} {} [{}]", lock, group.title, group.id);
        if !expanded {
            continue;
        }
        for topic in session.catalog().topics_in(&group.id) {
            let status = snapshot
                .topic(&topic.id)
                .map(|t| t.status)
                .unwrap_or_default();
            let mark = match status {
                TopicStatus::Completed => "✓",
                TopicStatus::Active | TopicStatus::InProgress => "…",
                TopicStatus::NotStarted => "·",
            };
            let pointer = if selected == Some(topic.id.as_str()) { ">" } else { " " };
            eprintln!("   {} {} {} [{}]", pointer, mark, topic.title, topic.id);
        }
    }
}

/// Record the session summary and write the handoff document.
async fn finish(session: &Session, config: &AppConfig) -> anyhow::Result<()> {
    if let Some(summary) = session.summary(&config.participant).await {
        let registry = JsonFileRegistry::new(&config.registry_path);
        if registry.record(&summary).await? {
            eprintln!("   Session recorded in {}", registry.path().display());
        }
    }

    let snapshot = session.snapshot().await;
    let document = handoff_markdown(session.catalog(), &snapshot);
    tokio::fs::create_dir_all(&config.export_dir)
        .await
        .with_context(|| format!("Failed to create {}", config.export_dir.display()))?;
    let path: PathBuf = config
        .export_dir
        .join(format!("handoff-{}.md", session.id()));
    tokio::fs::write(&path, document)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    eprintln!("   Handoff written to {}", path.display());
    Ok(())
}

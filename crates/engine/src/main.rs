//! Chat GM Engine - Main entry point.
//!
//! Reads `player|chat|text` lines from stdin and prints the replies. Two
//! operator lines are understood as well: `!pending` lists open
//! interventions and `!resolve <id> <gm> <text>` closes one.

use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chatgm_domain::{ErrorCode, InterventionId};
use chatgm_engine::app::{Collaborators, Repositories};
use chatgm_engine::infrastructure::{
    cache::TtlCache,
    clock::{SystemClock, SystemRandom},
    memory::InMemoryRepositories,
    narrative::TemplateNarrator,
    notify::LogNotifier,
    ports::{ClockPort, NarrativePort, NotifierPort},
    resilient_narrative::{ResilientNarrator, RetryConfig},
    settings::EngineConfig,
};
use chatgm_engine::App;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment from repo root (the engine may be run from `crates/engine`).
    load_dotenv_from_repo_root();

    // Initialize logging; stdout carries the replies.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chatgm_engine=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting Chat GM Engine");

    let config = EngineConfig::from_env().context("invalid CHATGM_* configuration")?;

    let clock: Arc<dyn ClockPort> = Arc::new(SystemClock::new());
    let repos = InMemoryRepositories::new(config.intervention_history_capacity);
    let retry_config = RetryConfig::default();
    tracing::info!(
        max_retries = retry_config.max_retries,
        base_delay_ms = retry_config.base_delay_ms,
        "Narrator configured with retry"
    );
    let narrator: Arc<dyn NarrativePort> = Arc::new(ResilientNarrator::new(
        Arc::new(TemplateNarrator::new()),
        retry_config,
    ));

    let app = Arc::new(App::new(
        Repositories {
            character: repos.character,
            intervention: repos.intervention,
        },
        Collaborators {
            cache: Arc::new(TtlCache::<String, String>::new(clock.clone())),
            narrator,
            notifiers: vec![Arc::new(LogNotifier) as Arc<dyn NotifierPort>],
            clock,
            random: Arc::new(SystemRandom::new()),
        },
        config,
    ));

    // Spawn cache sweeper
    let sweep_app = app.clone();
    let sweep_interval = app.config.cache_sweep_interval;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        loop {
            ticker.tick().await;
            if let Err(e) = sweep_app.sessions.sweep_expired().await {
                tracing::warn!(error = %e, "Failed to sweep expired sessions");
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        println!("{}", handle_line(&app, line).await);
    }

    tracing::info!("Input closed, shutting down");
    Ok(())
}

async fn handle_line(app: &App, line: &str) -> String {
    if line == "!pending" {
        return match app.interventions.pending().await {
            Ok(pending) if pending.is_empty() => "No pending interventions.".to_string(),
            Ok(pending) => pending
                .iter()
                .map(|i| format!("{} [{}] {}: {}", i.id(), i.trigger(), i.chat_id(), i.message()))
                .collect::<Vec<_>>()
                .join("\n"),
            Err(e) => format!("error ({}): {e}", e.code()),
        };
    }

    if let Some(rest) = line.strip_prefix("!resolve ") {
        let mut parts = rest.splitn(3, ' ');
        let (Some(id), Some(gm), Some(text)) = (parts.next(), parts.next(), parts.next()) else {
            return "usage: !resolve <intervention-id> <gm> <text>".to_string();
        };
        let Ok(id) = id.parse::<InterventionId>() else {
            return format!("invalid intervention id: {id}");
        };
        return match app.use_cases.intervention.resolve.execute(id, text, gm).await {
            Ok(resolved) => format!("[{}] {}", resolved.intervention.chat_id(), resolved.announcement),
            Err(e) => format!("error ({}): {e}", e.code()),
        };
    }

    let mut parts = line.splitn(3, '|');
    let (Some(player), Some(chat), Some(text)) = (parts.next(), parts.next(), parts.next()) else {
        return "expected player|chat|text".to_string();
    };
    match app
        .use_cases
        .message
        .handle
        .execute(player.trim(), chat.trim(), text)
        .await
    {
        Ok(reply) => format!("[{}] {}", chat.trim(), reply.text),
        Err(e) => {
            tracing::warn!(error = %e, chat_id = %chat.trim(), "Failed to handle message");
            format!("error ({}): {e}", e.code())
        }
    }
}

fn load_dotenv_from_repo_root() {
    let repo_root = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..");

    // Prefer local overrides.
    for filename in [".env.local", ".env"] {
        let path = repo_root.join(filename);
        if path.exists() {
            let _ = dotenvy::from_path(path);
        }
    }
}

//! `oracle run` — an interactive session over the terminal.

use crate::terminal::TerminalTransport;
use anyhow::Context;
use oracle_agent::{CommitOutcome, SessionManager};
use oracle_config::AppConfig;
use oracle_core::event::{DomainEvent, EventBus};
use oracle_providers::OpenAiCompatModel;
use oracle_tools::{mailer_for, Mailer, UnconfiguredMailer};
use std::sync::Arc;
use tracing::{debug, warn};

pub async fn run(user: Option<String>, no_greeting: bool) -> anyhow::Result<()> {
    let mut config = AppConfig::load().context("Failed to load config")?;
    if let Some(user) = user {
        config.user_id = user;
        config.validate()?;
    }
    if no_greeting {
        config.greet_on_start = false;
    }

    // Check for an API key early and say how to set one
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No model API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables (or put it in .env):");
        eprintln!("    GOOGLE_API_KEY = '...'   (Gemini, the default endpoint)");
        eprintln!("    OPENAI_API_KEY = 'sk-...'");
        eprintln!("    ORACLE_API_KEY = '...'   (generic)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        anyhow::bail!("No API key found. See above for setup instructions.");
    }

    let model = OpenAiCompatModel::from_config(&config.model)?;
    let memory = super::memory::open_store(&config)?;
    let mailer: Arc<dyn Mailer> = mailer_for(&config.email).unwrap_or_else(|| Arc::new(UnconfiguredMailer));
    let registry = oracle_tools::default_registry(&config, memory.clone(), mailer).build();

    let event_bus = Arc::new(EventBus::default());
    spawn_event_logger(&event_bus);

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║          Oracle — Interactive Session        ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Model:     {}", model.model());
    println!("  Memory:    {}", memory.name());
    println!("  Tools:     {}", registry.names().join(", "));
    println!("  User:      {}", config.user_id);
    println!();
    println!("  Type what you would say and press Enter.");
    println!("  Type 'exit' or press Ctrl+C to end the session.");
    println!();

    let transport = TerminalTransport::new(config.persona.name.clone());
    let mut session = SessionManager::new(config.session_config(), Arc::new(model), memory, registry)
        .with_event_bus(event_bus);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Could not listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    let outcome = session.run(&transport, shutdown).await?;

    println!();
    match outcome {
        CommitOutcome::Committed { stored, .. } => println!("  🧠 Remembered {stored} line(s) of this conversation."),
        CommitOutcome::Skipped => println!("  Nothing to remember."),
        CommitOutcome::Failed { error, .. } => println!("  ⚠️  This conversation was not saved: {error}"),
        CommitOutcome::Detached => println!("  ⚠️  Memory is still saving; it may not have finished."),
    }
    println!();

    Ok(())
}

fn spawn_event_logger(event_bus: &EventBus) {
    let mut rx = event_bus.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            match event.as_ref() {
                DomainEvent::ToolInvoked { tool_name, success, duration_ms, .. } => {
                    debug!(tool = %tool_name, success, duration_ms, "event: tool invoked");
                }
                DomainEvent::MemoryCommitted { utterances, attempts, success, .. } => {
                    debug!(utterances, attempts, success, "event: memory committed");
                }
                other => debug!(event = ?other, "event"),
            }
        }
    });
}

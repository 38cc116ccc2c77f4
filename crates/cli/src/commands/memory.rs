//! `oracle recall` / `oracle remember` — long-term memory from the command line.

use anyhow::{anyhow, bail, Context};
use oracle_config::AppConfig;
use oracle_core::memory::{CommitPayload, MemoryQuery, MemoryStore};
use oracle_memory::{FileStore, InMemoryStore, Mem0Store, NoopStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Open the configured memory backend.
pub fn open_store(config: &AppConfig) -> anyhow::Result<Arc<dyn MemoryStore>> {
    let store: Arc<dyn MemoryStore> = match config.memory.backend.as_str() {
        "file" => Arc::new(FileStore::new(config.memory_path())),
        "mem0" => {
            let api_key = config
                .memory
                .api_key
                .clone()
                .ok_or_else(|| anyhow!("memory.backend = \"mem0\" needs MEM0_API_KEY"))?;
            Arc::new(
                Mem0Store::new(config.memory.api_url.clone(), api_key)
                    .with_timeout(Duration::from_secs(config.memory.timeout_seconds)),
            )
        }
        "in_memory" => Arc::new(InMemoryStore::new()),
        "none" => Arc::new(NoopStore),
        other => bail!("Unknown memory backend '{other}' (expected file, mem0, in_memory or none)"),
    };
    info!(backend = store.name(), "Memory store ready");
    Ok(store)
}

pub async fn recall(query: &str, limit: usize) -> anyhow::Result<()> {
    let config = AppConfig::load().context("Failed to load config")?;
    let session = config.session_config();
    let store = open_store(&config)?;

    println!("🔍 Searching memories of {} for: \"{query}\"", session.user_id);
    println!();

    let facts = store
        .recall(&session.user_id, &MemoryQuery::new(query, limit))
        .await
        .context("Memory recall failed")?;

    let owned: Vec<_> = facts.iter().filter(|f| f.user_id == session.user_id).collect();
    if owned.is_empty() {
        println!("   No memories found.");
    } else {
        for (i, fact) in owned.iter().enumerate() {
            println!(
                "  {:>2}. [{}] {}",
                i + 1,
                fact.created_at.format("%Y-%m-%d %H:%M"),
                fact.content
            );
        }
    }

    Ok(())
}

pub async fn remember(fact: &str) -> anyhow::Result<()> {
    let fact = fact.trim();
    if fact.is_empty() {
        bail!("Nothing to remember");
    }

    let config = AppConfig::load().context("Failed to load config")?;
    let session = config.session_config();
    let store = open_store(&config)?;

    let ack = store
        .commit(&session.user_id, CommitPayload::Facts(vec![fact.to_string()]))
        .await
        .context("Memory commit failed")?;

    println!("🧠 Stored {} fact(s) for {} in {}", ack.stored, session.user_id, store.name());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_each_backend() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.memory.path = Some(dir.path().join("facts.jsonl").display().to_string());

        for (backend, name) in [("file", "file"), ("in_memory", "in_memory"), ("none", "none")] {
            config.memory.backend = backend.into();
            assert_eq!(open_store(&config).unwrap().name(), name);
        }
    }

    #[test]
    fn mem0_needs_a_key() {
        let mut config = AppConfig::default();
        config.memory.backend = "mem0".into();
        config.memory.api_key = None;
        assert!(open_store(&config).is_err());

        config.memory.api_key = Some("m0-key".into());
        assert_eq!(open_store(&config).unwrap().name(), "mem0");
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let mut config = AppConfig::default();
        config.memory.backend = "redis".into();
        assert!(open_store(&config).is_err());
    }
}

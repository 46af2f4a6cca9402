//! # CLI Command Implementations

use crate::api;
use crate::config::Config;
use crate::error::AppError;
use crate::index::{AtomIndex, GraphqlAtomIndex};
use crate::search::SearchClient;
use crate::suggest::SuggestionEngine;
use atomlens_core::{
    AtomSummary, HostTab, HostTabRegistry, LabelTransformer, QueueManager, QueueStorage,
    QueueStore, SearchResult, Slot, TabId, TripleSuggestion, WindowId, record_from_bytes,
    storage::{storage_key, tab_from_key},
};
use std::path::Path;
use std::sync::Arc;

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP bridge.
pub async fn cmd_server(config: &Config) -> Result<(), AppError> {
    println!("atomlens bridge starting...");
    println!();
    println!("Configuration:");
    println!("  Address:  {}", config.server.addr());
    println!("  Index:    {}", config.index.endpoint);
    println!("  Database: {:?}", config.queue.database);
    println!("  Queue:    max {} unpinned items per tab", config.queue.max_items);
    println!();
    println!("Endpoints:");
    println!("  POST /host/*        - Tab lifecycle from the extension");
    println!("  GET  /queue         - Current tab queue");
    println!("  POST /queue         - Submit a query");
    println!("  GET  /search        - Cached label search");
    println!("  POST /suggestions   - Relationship suggestions");
    println!("  GET  /events        - Queue events (SSE)");
    println!("  GET  /health        - Health check");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    api::run_server(config).await
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show configuration and the tabs with a persisted queue.
pub fn cmd_status(config: &Config, json_mode: bool) -> Result<(), AppError> {
    let store = QueueStorage::redb(&config.queue.database)?;
    let tabs: Vec<TabId> = store.keys()?.iter().filter_map(|k| tab_from_key(k)).collect();

    if json_mode {
        let output = serde_json::json!({
            "database": config.queue.database.to_string_lossy(),
            "index": config.index.endpoint,
            "server": config.server.addr(),
            "max_items": config.queue.max_items,
            "deduplicate": config.queue.deduplicate,
            "persisted_tabs": tabs,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return Ok(());
    }

    println!("atomlens Status");
    println!("===============");
    println!("Database:    {:?}", config.queue.database);
    println!("Index:       {}", config.index.endpoint);
    println!("Server:      {}", config.server.addr());
    println!(
        "Queue:       max {} unpinned, dedup {}",
        config.queue.max_items,
        if config.queue.deduplicate { "on" } else { "off" }
    );
    println!();
    println!("Persisted tab queues: {}", tabs.len());
    for tab in tabs {
        println!("  tab {}", tab);
    }

    Ok(())
}

// =============================================================================
// INDEX COMMANDS
// =============================================================================

fn build_index(config: &Config) -> Result<Arc<dyn AtomIndex>, AppError> {
    let index = GraphqlAtomIndex::new(
        config.index.endpoint.clone(),
        config.index_timeout(),
        config.index.api_key.clone(),
    )?;
    Ok(Arc::new(index))
}

/// Search the index by exact label, or by substring with `partial`.
pub async fn cmd_search(
    config: &Config,
    json_mode: bool,
    label: &str,
    partial: bool,
) -> Result<(), AppError> {
    let client = SearchClient::new(
        build_index(config)?,
        Arc::new(LabelTransformer::new()),
        config.search_config(),
    );
    let result: SearchResult = if partial {
        client.search_partial(label).await?
    } else {
        client.search(label).await?.as_ref().clone()
    };

    if json_mode {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).unwrap_or_default()
        );
        return Ok(());
    }

    if result.matches.is_empty() {
        println!("No atoms match '{}'", label);
        return Ok(());
    }

    println!(
        "{} match(es), {} total staked, {} position(s)",
        result.summary.total_matches, result.summary.total_staked, result.summary.total_positions
    );
    println!();
    for m in &result.matches {
        let shown = m.display_label.as_deref().unwrap_or(&m.label);
        println!("  [{}] {}", m.term_id, shown);
        println!(
            "      staked {} across {} position(s)",
            m.total_staked, m.total_positions
        );
    }

    Ok(())
}

/// Rank candidates for one slot of a relationship around `anchor`.
pub async fn cmd_suggest(
    config: &Config,
    json_mode: bool,
    anchor: &AtomSummary,
    anchor_slot: Slot,
    target_slot: Slot,
    search: Option<&str>,
) -> Result<(), AppError> {
    let engine = SuggestionEngine::new(build_index(config)?, Arc::new(LabelTransformer::new()));
    let suggestions = engine
        .get_suggested_atoms_for_position(anchor, anchor_slot, target_slot, search)
        .await;
    print_suggestions(json_mode, target_slot, &suggestions);
    Ok(())
}

/// Most frequent atoms for `slot`.
pub async fn cmd_frequent(
    config: &Config,
    json_mode: bool,
    slot: Slot,
    limit: usize,
) -> Result<(), AppError> {
    let engine = SuggestionEngine::new(build_index(config)?, Arc::new(LabelTransformer::new()));
    let suggestions = engine.most_frequent_for_slot(slot, limit).await;
    print_suggestions(json_mode, slot, &suggestions);
    Ok(())
}

fn print_suggestions(json_mode: bool, slot: Slot, suggestions: &[TripleSuggestion]) {
    if json_mode {
        println!(
            "{}",
            serde_json::to_string_pretty(suggestions).unwrap_or_default()
        );
        return;
    }

    if suggestions.is_empty() {
        println!("No {} candidates", slot.as_str());
        return;
    }
    println!("Top {} candidates:", slot.as_str());
    for (rank, s) in suggestions.iter().enumerate() {
        let shown = s.display_label.as_deref().unwrap_or(&s.label);
        println!(
            "  {:>2}. {} [{}] seen {}x, staked {}",
            rank + 1,
            shown,
            s.atom_id,
            s.frequency,
            s.total_stake
        );
    }
}

// =============================================================================
// QUEUE COMMANDS
// =============================================================================

/// Print the persisted queue of one tab.
pub fn cmd_queue(config: &Config, json_mode: bool, tab: u64) -> Result<(), AppError> {
    let store = QueueStorage::redb(&config.queue.database)?;
    let tab = TabId(tab);
    let record = match store.load(&storage_key(tab))? {
        Some(bytes) => Some(record_from_bytes(&bytes)?),
        None => None,
    };

    if json_mode {
        println!(
            "{}",
            serde_json::to_string_pretty(&record).unwrap_or_default()
        );
        return Ok(());
    }

    let Some(record) = record else {
        println!("No persisted queue for tab {}", tab);
        return Ok(());
    };

    println!("Tab {} queue ({} item(s))", tab, record.items.len());
    if let Some(url) = &record.tab_context_url {
        println!("Context: {}", url);
    }
    println!();
    for item in &record.items {
        let pin = if item.is_pinned { "*" } else { " " };
        println!(
            "  {} {} ({}, {})",
            pin,
            item.query.query,
            item.query.source.as_str(),
            item.result.status().as_str()
        );
    }

    Ok(())
}

/// Delete persisted queues for every tab not in `live`.
pub fn cmd_prune(config: &Config, json_mode: bool, live: &[u64]) -> Result<(), AppError> {
    let host = HostTabRegistry::from_tabs(live.iter().map(|&id| HostTab {
        tab_id: TabId(id),
        window_id: WindowId(0),
        active: false,
        url: None,
    }));
    let store = QueueStorage::redb(&config.queue.database)?;
    let mut manager = QueueManager::new(config.queue_config(), store);
    let report = manager.restore(&host);

    if json_mode {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).unwrap_or_default()
        );
    } else {
        println!(
            "Kept {} live tab queue(s), pruned {}",
            report.loaded, report.pruned
        );
    }
    Ok(())
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Write the default configuration to `output`.
pub fn cmd_init(output: &Path, force: bool) -> Result<(), AppError> {
    if output.exists() && !force {
        return Err(AppError::Config(format!(
            "{} already exists. Use --force to overwrite.",
            output.display()
        )));
    }
    std::fs::write(output, Config::default().to_toml()?)?;
    println!("Wrote default configuration to {:?}", output);
    Ok(())
}

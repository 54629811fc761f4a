mod cli;

use mediasync::config::{self, Config, StoreKind};
use mediasync::reconcile::{
    extract_identifiers, ApiStatus, ApprovalWorkflow, BatchProgress, Reconciler, ReviewItem,
};
use mediasync::store::{ContentStore, HttpStore, MediaRecord, MemoryStore};
use mediasync_common::RecordId;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, OptionOverrides};
use dialoguer::MultiSelect;
use std::path::Path;
use std::sync::Arc;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "mediasync=debug,mediasync_common=debug".to_string()
        } else {
            "mediasync=info".to_string()
        }
    });

    // Logs go to stderr so JSON output stays clean on stdout
    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Preview {
            ids,
            json,
            overrides,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(preview(cli.config.as_deref(), &ids, &overrides, json))
        }
        Commands::Reconcile {
            ids,
            yes,
            overrides,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(reconcile(cli.config.as_deref(), &ids, &overrides, yes))
        }
        Commands::Ids { blob } => show_identifiers(&blob),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("mediasync {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn open_store(config: &Config) -> Result<Arc<dyn ContentStore>> {
    match config.store.kind {
        StoreKind::Http => {
            let base_url = config
                .store
                .base_url
                .as_deref()
                .filter(|u| !u.is_empty())
                .context("No store base_url configured")?;
            let store = HttpStore::new(
                base_url,
                config.store.token.clone(),
                config.batch.request_timeout(),
            )?;
            Ok(Arc::new(store))
        }
        StoreKind::File => {
            let path = config
                .store
                .path
                .as_deref()
                .context("No store path configured")?;
            Ok(Arc::new(MemoryStore::open(path)?))
        }
    }
}

async fn load_records(store: &dyn ContentStore, ids: &[String]) -> Result<Vec<MediaRecord>> {
    let mut records = Vec::with_capacity(ids.len());
    for id in ids {
        let record = store
            .read(&RecordId::from(id.as_str()))
            .await
            .with_context(|| format!("Failed to read record {}", id))?;
        records.push(record);
    }
    Ok(records)
}

fn print_progress(progress: &BatchProgress) {
    match progress.api_status {
        None => eprintln!(
            "[{}/{}] {}",
            progress.current, progress.total, progress.current_item_label
        ),
        Some(ApiStatus::Active { ref source }) => eprintln!("      found via {}", source),
        Some(ApiStatus::RateLimited {
            provider,
            retry_after,
        }) => match retry_after {
            Some(wait) => eprintln!("      {} is rate limited (retry in {}s)", provider, wait.as_secs()),
            None => eprintln!("      {} is rate limited", provider),
        },
    }
}

fn print_item(index: usize, item: &ReviewItem) {
    let record = &item.result.record;
    let mark = if item.will_commit() { "x" } else { " " };
    println!("[{}] {}. {} ({})", mark, index + 1, record.display_name, record.media_type);

    if let Some(ref error) = item.result.error {
        println!("      error: {}", error);
        return;
    }

    let Some(ref changes) = item.result.change_set else {
        println!("      no changes");
        return;
    };

    println!("      source: {}", changes.source);
    if let Some(ref title) = changes.title {
        println!("      title: {:?} -> {:?}", record.display_name, title);
    }
    if let Some(ref description) = changes.description {
        println!("      description: {}", truncate(description, 72));
    }
    if let Some(ref cover) = changes.cover_image_url {
        println!("      cover: {}", cover);
    }
    if let Some(score) = item.similarity_score {
        println!("      similarity: {:.0}%", score * 100.0);
    }
    if let Some(ref warning) = item.warning {
        println!("      warning: {}", warning);
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}

async fn preview(
    config_path: Option<&Path>,
    ids: &[String],
    overrides: &OptionOverrides,
    json: bool,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let options = overrides.apply(config.defaults.clone());
    let store = open_store(&config)?;
    let records = load_records(store.as_ref(), ids).await?;

    let reconciler = Arc::new(Reconciler::from_config(&config, store)?);
    let mut workflow = ApprovalWorkflow::new(reconciler, options);
    let items = workflow.start_preview(&records, print_progress).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(items)?);
        return Ok(());
    }

    for (index, item) in items.iter().enumerate() {
        print_item(index, item);
    }
    let changed = items.iter().filter(|i| i.result.has_changes).count();
    println!("\n{} of {} records have changes", changed, items.len());

    Ok(())
}

async fn reconcile(
    config_path: Option<&Path>,
    ids: &[String],
    overrides: &OptionOverrides,
    yes: bool,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let options = overrides.apply(config.defaults.clone());
    let store = open_store(&config)?;
    let records = load_records(store.as_ref(), ids).await?;

    let reconciler = Arc::new(Reconciler::from_config(&config, store)?);
    let mut workflow = ApprovalWorkflow::new(reconciler, options);
    let items = workflow.start_preview(&records, print_progress).await?;

    for (index, item) in items.iter().enumerate() {
        print_item(index, item);
    }

    // Only items with changes can be approved
    let candidates: Vec<usize> = items
        .iter()
        .enumerate()
        .filter(|(_, item)| item.result.has_changes)
        .map(|(index, _)| index)
        .collect();

    if candidates.is_empty() {
        println!("\nNothing to update");
        return Ok(());
    }

    if !yes {
        let labels: Vec<String> = candidates
            .iter()
            .map(|&i| {
                let item = &items[i];
                match item.warning {
                    Some(ref warning) => format!("{} ({})", item.result.record.display_name, warning),
                    None => item.result.record.display_name.clone(),
                }
            })
            .collect();
        let defaults: Vec<bool> = candidates.iter().map(|&i| items[i].approved).collect();

        let chosen = MultiSelect::new()
            .with_prompt("Select records to update")
            .items(labels.as_slice())
            .defaults(&defaults)
            .interact()?;

        for (position, &index) in candidates.iter().enumerate() {
            workflow.set_approved(index, chosen.contains(&position))?;
        }
    }

    let summary = workflow.confirm(print_progress).await?;

    println!("\nUpdated: {}", summary.succeeded);
    println!("Failed:  {}", summary.failed);
    for error in &summary.errors {
        println!("  - {}", error);
    }

    if summary.failed > 0 {
        anyhow::bail!("{} record(s) failed to update", summary.failed);
    }

    Ok(())
}

fn show_identifiers(blob: &str) -> Result<()> {
    let ids = extract_identifiers(blob);
    println!("{}", serde_json::to_string_pretty(&ids)?);
    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    println!("  Store: {:?}", config.store.kind);
    match config.store.kind {
        StoreKind::Http => println!(
            "    Base URL: {}",
            config.store.base_url.as_deref().unwrap_or("(not set)")
        ),
        StoreKind::File => println!("    Path: {:?}", config.store.path),
    }
    println!("  OMDb: {}", config.providers.omdb.base_url);
    println!(
        "  TMDB: {} ({} req/s)",
        config.providers.tmdb.base_url, config.providers.tmdb.requests_per_second
    );
    println!(
        "  Rate limit: {} attempts, max wait {}s",
        config.rate_limit.max_attempts, config.rate_limit.max_wait_secs
    );
    println!("  Item delay: {}ms", config.batch.item_delay_ms);
    println!(
        "  Cover: {}x{} (quality {})",
        config.cover.width, config.cover.height, config.cover.jpeg_quality
    );
    let sources: Vec<String> = config
        .defaults
        .preferred_sources
        .iter()
        .map(ToString::to_string)
        .collect();
    println!("  Sources: {}", sources.join(", "));
    println!(
        "  Policy: {}",
        if config.defaults.only_missing {
            "only missing"
        } else {
            "overwrite"
        }
    );

    Ok(())
}

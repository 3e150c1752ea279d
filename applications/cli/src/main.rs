/// Trove - media library indexer
mod config;

use clap::{Parser, Subcommand};
use crate::config::TroveConfig;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trove_core::{DirectorySource, NullObserver, ScanEvent};
use trove_indexer::{CacheHandle, CacheStore, DirectoryFile, DirectoryList, ScanStart};
use trove_metadata::LoftyTagExtractor;

#[derive(Parser)]
#[command(name = "trove")]
#[command(about = "Index a music library into a persistent cache", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "TROVE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan every configured root and update the cache
    Scan,
    /// List cached entries
    List {
        /// Only show entries whose root is no longer configured
        #[arg(long)]
        offline: bool,
    },
    /// Manage library roots
    Roots {
        #[command(subcommand)]
        action: RootsAction,
    },
    /// Rewrite the snapshot from its current contents
    Save,
}

#[derive(Subcommand)]
enum RootsAction {
    /// Add a root directory
    Add { path: PathBuf },
    /// Remove a root directory
    Remove { path: PathBuf },
    /// Show configured roots
    List,
}

/// Roots from the directories file plus any listed in the config
struct ConfiguredRoots {
    file: DirectoryFile,
    extra: Vec<PathBuf>,
}

impl DirectorySource for ConfiguredRoots {
    fn roots(&self) -> Vec<PathBuf> {
        let mut roots = self.file.roots();
        for root in &self.extra {
            if !roots.contains(root) {
                roots.push(root.clone());
            }
        }
        roots
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trove=info,trove_indexer=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = TroveConfig::load(cli.config.as_deref())?;
    config.validate()?;

    match cli.command {
        Commands::Scan => scan(&config).await?,
        Commands::List { offline } => list(&config, offline).await?,
        Commands::Roots { action } => roots(&config, action)?,
        Commands::Save => save(&config).await?,
    }

    Ok(())
}

fn open_store(
    config: &TroveConfig,
    observer: Arc<dyn trove_core::ScanObserver>,
) -> CacheHandle {
    let directories = ConfiguredRoots {
        file: DirectoryFile::new(&config.cache.directories_file),
        extra: config.scan.roots.clone(),
    };

    CacheStore::new(
        config.store_config(),
        Arc::new(directories),
        Arc::new(LoftyTagExtractor::new()),
        observer,
    )
    .spawn()
}

async fn scan(config: &TroveConfig) -> anyhow::Result<()> {
    let (tx, mut events) = mpsc::unbounded_channel();
    let cache = open_store(config, Arc::new(tx));

    let cached = cache.load_cache().await?;
    tracing::info!("{} entries in cache", cached);

    match cache.start_scan().await? {
        ScanStart::Started { pass_id, roots } => {
            tracing::info!("Scan pass {} started over {} roots", pass_id, roots.len());
            for root in &roots {
                tracing::info!("  {}", root.display());
            }
        }
        ScanStart::AlreadyRunning => {
            anyhow::bail!("a scan is already running");
        }
    }

    let mut stopping = false;
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(ScanEvent::Progress { root, progress }) => {
                    tracing::info!(
                        "{}: {} dirs, {} files, {}s",
                        root.display(),
                        progress.dirs_visited,
                        progress.files_found,
                        progress.elapsed_secs
                    );
                }
                Some(ScanEvent::ItemsChanged { root, items }) => {
                    tracing::debug!("{}: {} items updated", root.display(), items.len());
                }
                Some(ScanEvent::WalkerFinished { root, progress, stats, cancelled }) => {
                    tracing::info!(
                        "{} {}: {} files, {} read, {} unchanged, {} unreadable",
                        if cancelled { "Stopped" } else { "Finished" },
                        root.display(),
                        progress.files_found,
                        stats.extracted,
                        stats.unchanged,
                        stats.extract_failures
                    );
                }
                Some(ScanEvent::PassComplete { progress, total_entries, offline_entries, .. }) => {
                    println!(
                        "Scanned {} files in {} directories ({}s); cache holds {} entries, {} offline",
                        progress.files_found,
                        progress.dirs_visited,
                        progress.elapsed_secs,
                        total_entries,
                        offline_entries
                    );
                    break;
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c(), if !stopping => {
                tracing::warn!("Interrupted, stopping scan");
                cache.stop_scan().await?;
                stopping = true;
            }
        }
    }

    cache.shutdown().await?;
    Ok(())
}

async fn list(config: &TroveConfig, offline_only: bool) -> anyhow::Result<()> {
    let cache = open_store(config, Arc::new(NullObserver));
    cache.load_cache().await?;

    for item in cache.all_entries().await? {
        if offline_only && !item.offline {
            continue;
        }

        let marker = if item.offline { " [offline]" } else { "" };
        if item.artist.is_empty() {
            println!("{}{}", item.path, marker);
        } else {
            println!("{} - {} ({}){}", item.artist, item.title, item.path, marker);
        }
    }

    cache.shutdown().await?;
    Ok(())
}

fn roots(config: &TroveConfig, action: RootsAction) -> anyhow::Result<()> {
    let path = &config.cache.directories_file;
    let mut list = DirectoryList::load(path)?;

    match action {
        RootsAction::Add { path: root } => {
            let root = std::fs::canonicalize(&root).unwrap_or(root);
            if list.add(root.clone()) {
                list.save(path)?;
                println!("Added {}", root.display());
            } else {
                println!("{} is already configured", root.display());
            }
        }
        RootsAction::Remove { path: root } => {
            if list.remove(&root) {
                list.save(path)?;
                println!("Removed {}", root.display());
            } else {
                println!("{} is not configured", root.display());
            }
        }
        RootsAction::List => {
            for root in list.roots() {
                println!("{}", root.display());
            }
            for root in &config.scan.roots {
                println!("{} (from config)", root.display());
            }
        }
    }

    Ok(())
}

async fn save(config: &TroveConfig) -> anyhow::Result<()> {
    let cache = open_store(config, Arc::new(NullObserver));
    let count = cache.load_cache().await?;
    cache.save_cache().await?;
    println!(
        "Wrote {} entries to {}",
        count,
        config.cache.snapshot_path.display()
    );

    cache.shutdown().await?;
    Ok(())
}

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use crossbeam::channel::bounded;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{error, info, warn};

use sonic_cache::ingest::scanner;
use sonic_cache::{
    AlbumListType, AlbumSearchQuery, CacheError, CacheResult, CacheStore, CachedDataKey,
    IngestRequest, SortDirection, StoreConfig, StoreMode,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Content root holding cache.db, music/ and cover_art/. Overrides the env file.
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    #[arg(long, global = true, default_value = ".env")]
    env_file: PathBuf,

    /// cache or ground_truth
    #[arg(long, global = true)]
    mode: Option<StoreMode>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write the resolved configuration to the env file
    Init,
    /// Row counts per table
    Status,
    /// Ingest every *.json payload file under a directory
    Ingest {
        dir: PathBuf,
        #[arg(short, long, default_value_t = 4)]
        workers: usize,
    },
    /// Print one cached item, or the partial data behind a miss
    Show { kind: CachedDataKey, id: String },
    /// Run an album listing
    Albums {
        list_type: AlbumListType,
        #[arg(long, requires = "to")]
        from: Option<i64>,
        #[arg(long, requires = "from")]
        to: Option<i64>,
        #[arg(long)]
        genre: Option<String>,
        #[arg(long)]
        descending: bool,
    },
    Search { query: String },
    Invalidate {
        kind: CachedDataKey,
        parameter: Option<String>,
    },
    Delete {
        kind: CachedDataKey,
        parameter: Option<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let config = resolve_config(&args)?;
    let open = || {
        CacheStore::from_config(&config)
            .with_context(|| format!("Failed to open store at {}", config.data_directory.display()))
    };

    match args.command {
        Command::Init => {
            config.save_to_env(&args.env_file)?;
            info!("Saved configuration to {:?}", args.env_file);
            Ok(())
        }
        Command::Status => status(&open()?),
        Command::Ingest { dir, workers } => ingest_directory(Arc::new(open()?), &dir, workers),
        Command::Show { kind, id } => show(&open()?, kind, &id),
        Command::Albums {
            list_type,
            from,
            to,
            genre,
            descending,
        } => {
            let mut query = AlbumSearchQuery::new(list_type);
            if let (Some(from), Some(to)) = (from, to) {
                query = query.with_year_range(from, to);
            }
            if let Some(genre) = genre {
                query = query.with_genre(genre);
            }
            if descending {
                query = query.with_sort_direction(SortDirection::Descending);
            }
            report(open()?.get_albums(&query))
        }
        Command::Search { query } => report(open()?.search(&query)),
        Command::Invalidate { kind, parameter } => {
            let store = open()?;
            require_cache(&store)?;
            store.invalidate(kind, parameter.as_deref())?;
            info!("Invalidated {} {:?}", kind, parameter);
            Ok(())
        }
        Command::Delete { kind, parameter } => {
            let store = open()?;
            require_cache(&store)?;
            store.delete(kind, parameter.as_deref())?;
            info!("Deleted {} {:?}", kind, parameter);
            Ok(())
        }
    }
}

fn resolve_config(args: &Args) -> Result<StoreConfig> {
    let mut config = match &args.data_dir {
        Some(dir) => StoreConfig {
            data_directory: dir.clone(),
            mode: StoreMode::default(),
        },
        None => StoreConfig::load_from_env(&args.env_file)
            .context("No --data-dir given and no usable env file")?,
    };
    if let Some(mode) = args.mode {
        config.mode = mode;
    }
    Ok(config)
}

fn require_cache(store: &CacheStore) -> Result<()> {
    if !store.is_cache() {
        bail!("the store is in {} mode and cannot be modified", store.mode());
    }
    Ok(())
}

fn status(store: &CacheStore) -> Result<()> {
    println!("root: {}", store.roots().root().display());
    println!("mode: {}", store.mode());
    for (table, count) in store.table_counts()? {
        println!("{:<22} {}", table, count);
    }
    Ok(())
}

fn show(store: &CacheStore, kind: CachedDataKey, id: &str) -> Result<()> {
    match kind {
        CachedDataKey::Song => report(store.get_song(id)),
        CachedDataKey::Album => report(store.get_album(id)),
        CachedDataKey::Artist => report(store.get_artist(id)),
        CachedDataKey::Playlist => report(store.get_playlist(id)),
        CachedDataKey::Directory => report(store.get_directory(id)),
        CachedDataKey::SongFile | CachedDataKey::SongFilePermanent => report(store.get_song_uri(id)),
        CachedDataKey::CoverArtFile => report(store.get_cover_art_uri(id)),
        other => {
            let info = store.cache_info(other, Some(id))?;
            println!("{}", serde_json::to_string_pretty(&info)?);
            Ok(())
        }
    }
}

/// Prints fresh data, or partial data with a warning on a miss.
fn report<T: Serialize>(result: CacheResult<T>) -> Result<()> {
    match result {
        Ok(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        Err(CacheError::Miss { partial }) => {
            warn!("Cache miss; showing partial data");
            println!("{}", serde_json::to_string_pretty(&partial)?);
        }
        Err(CacheError::NotFound { key, id }) => bail!("{} with id={} does not exist", key, id),
        Err(CacheError::Storage(fault)) => {
            return Err(anyhow::Error::new(fault).context("Store read failed"))
        }
    }
    Ok(())
}

fn ingest_file(store: &CacheStore, path: &Path) -> Result<()> {
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    let request: IngestRequest =
        serde_json::from_str(&text).with_context(|| format!("Malformed payload in {:?}", path))?;
    store
        .ingest(request.parameter.as_deref(), request.payload)
        .with_context(|| format!("Failed to ingest {:?}", path))?;
    Ok(())
}

fn progress_spinner(msg: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{msg} {spinner} {pos} [{elapsed_precise}]")?);
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb.set_message(msg.to_string());
    Ok(pb)
}

fn ingest_directory(store: Arc<CacheStore>, dir: &Path, workers: usize) -> Result<()> {
    require_cache(&store)?;
    info!("Ingesting payloads from {:?} with {} workers", dir, workers);

    let (scan_tx, scan_rx) = bounded::<PathBuf>(1024);
    let progress = progress_spinner("ingesting")?;

    // 1. Scanner thread
    let input_dir = dir.to_path_buf();
    let scanner_handle = thread::spawn(move || scanner::scan_payloads(&input_dir, scan_tx));

    // 2. Ingest workers. Each call takes the store's write lock for its own transaction.
    let mut worker_handles = Vec::with_capacity(workers);
    for i in 0..workers.max(1) {
        let rx = scan_rx.clone();
        let store = Arc::clone(&store);
        let progress = progress.clone();
        worker_handles.push(thread::spawn(move || {
            let mut failed = 0usize;
            for path in rx {
                if let Err(e) = ingest_file(&store, &path) {
                    error!("Worker {}: {:#}", i, e);
                    failed += 1;
                }
                progress.inc(1);
            }
            failed
        }));
    }
    drop(scan_rx);

    let scanned = scanner_handle
        .join()
        .map_err(|_| anyhow!("scanner thread panicked"))?
        .context("Scanning payload directory failed")?;
    let mut failed = 0;
    for handle in worker_handles {
        failed += handle.join().map_err(|_| anyhow!("ingest worker panicked"))?;
    }
    progress.finish_and_clear();

    info!("Ingested {} of {} payload files", scanned - failed, scanned);
    if failed > 0 {
        bail!("{} payload files failed to ingest", failed);
    }
    Ok(())
}

use clap::Parser;
use log::{debug, info};
use ssb_feed::{
    api::{DefaultSync, EnglishIntl},
    memory::{MemoryStore, PlainRender},
    Api, Rollup, RollupConfig, RollupOptions, ScrollMetrics,
};
use ssb_ref::{FeedRef, RefError};
use std::{
    io,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use thiserror::Error as ThisError;

/// Gives up on more items once the feed stops rendering for this long.
const IDLE: Duration = Duration::from_millis(500);

/// Scroll position that always reads as "at the bottom".
const BOTTOM: ScrollMetrics = ScrollMetrics {
    scroll_top: 0.0,
    client_height: 0.0,
    scroll_height: 0.0,
};

/// Render a feed from a message log.
#[derive(Parser, Debug)]
struct Args {
    /// Message log, a JSON array or one message per line. Defaults to ~/.ssb/feed.json
    log: Option<PathBuf>,
    /// Local identity, whose own messages are not counted as updates
    #[arg(long)]
    id: Option<String>,
    /// JSON file overriding feed settings
    #[arg(long)]
    config: Option<PathBuf>,
    /// Treat every message in the log as a root
    #[arg(long)]
    prefiltered: bool,
    /// Stop once this many items are rendered
    #[arg(short = 'n', long, default_value_t = 10)]
    items: usize,
}

#[derive(Debug, ThisError)]
enum Error {
    #[error("Failed to find home directory")]
    NoHome,
    #[error("Failed to read {path}, cause: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Invalid config, cause: {0}")]
    Config(#[source] serde_json::Error),
    #[error("Invalid identity, cause: {0}")]
    Id(#[from] RefError),
    #[error("Failed to load feed, cause: {0}")]
    Feed(#[from] ssb_feed::Error),
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::init();

    if let Err(err) = run(Args::parse()).await {
        eprintln!("{}", err);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Error> {
    let path = match args.log {
        Some(path) => path,
        None => simple_home_dir::home_dir()
            .ok_or(Error::NoHome)?
            .join(".ssb/feed.json"),
    };
    let store = Arc::new(MemoryStore::from_log(&read(&path).await?)?);
    info!("Loaded {} messages from {}", store.len(), path.display());

    let config: RollupConfig = match &args.config {
        Some(path) => serde_json::from_slice(&read(path).await?).map_err(Error::Config)?,
        None => RollupConfig::default(),
    };
    debug!("Config: {:?}", config);

    let local_id = match args.id {
        Some(id) => FeedRef::from_string(id)?,
        None => FeedRef::from_bytes([0; 32]),
    };

    let api = Api {
        render: Arc::new(PlainRender::new(Some(store.clone()))),
        sync: Arc::new(DefaultSync),
        store: store.clone(),
        intl: Arc::new(EnglishIntl),
        local_id,
    };
    let options = RollupOptions::default().prefiltered(args.prefiltered);
    let rollup = Rollup::new(api, store, options, config);

    let mut content = rollup.watch_content();
    while content.borrow_and_update().len() < args.items {
        rollup.scrolled(BOTTOM);
        match tokio::time::timeout(IDLE, content.changed()).await {
            Ok(Ok(())) => {}
            _ => break,
        }
    }
    info!(
        "Rendered {} items, scan done: {}",
        content.borrow().len(),
        rollup.done()
    );

    println!("{}", rollup.view());
    rollup.teardown();
    Ok(())
}

async fn read(path: &Path) -> Result<Vec<u8>, Error> {
    tokio::fs::read(path).await.map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })
}

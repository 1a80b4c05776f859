use std::env;
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::api::{DiaryApi, HttpDiaryApi};
use crate::cache::LocalCacheStore;
use crate::config::{ConfigLoader, ConfigPaths, CONFIG_ENV, DATA_ENV};
use crate::storage::{self, KeyValueStore, MemoryStore};

pub mod commands;

use self::commands::{CacheArgs, EditArgs, WriteArgs};

pub type SharedStore = Arc<dyn KeyValueStore + Send + Sync>;

#[derive(Parser, Debug)]
#[command(
    name = "journey",
    version,
    about = "Terminal diary client with crash-safe local autosave"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Override the config file location (takes precedence over JOURNEY_CONFIG)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the data directory (takes precedence over JOURNEY_DATA)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Override api.base_url from the config file
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Keep snapshots in memory only; nothing survives the process
    #[arg(long, global = true)]
    pub ephemeral: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a new diary entry (default)
    Write(WriteArgs),
    /// Edit an existing diary entry
    Edit(EditArgs),
    /// List notebooks on the server
    Notebooks,
    /// Inspect or clear locally cached snapshots
    Cache(CacheArgs),
}

impl Commands {
    fn is_interactive(&self) -> bool {
        matches!(self, Commands::Write(_) | Commands::Edit(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogTarget {
    Stderr,
    File,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var(CONFIG_ENV, path);
    }
    if let Some(path) = &cli.data_dir {
        env::set_var(DATA_ENV, path);
    }

    let loader = ConfigLoader::discover()?;
    loader.paths().ensure_directories()?;
    let paths = loader.paths().clone();

    let command = cli
        .command
        .unwrap_or_else(|| Commands::Write(WriteArgs::default()));
    let target = if command.is_interactive() {
        LogTarget::File
    } else {
        LogTarget::Stderr
    };
    init_tracing(&cli.log_level, target, &paths)
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;

    let mut config = loader.load_or_init()?;
    if let Some(url) = cli.api_url {
        config.api.base_url = url;
    }
    let config = Arc::new(config);
    let store = open_store(&paths, &config, cli.ephemeral)?;
    let cache = LocalCacheStore::new(store);

    match command {
        Commands::Write(args) => commands::write_entry(config.clone(), connect(&config)?, cache, args),
        Commands::Edit(args) => commands::edit_entry(config.clone(), connect(&config)?, cache, args),
        Commands::Notebooks => commands::list_notebooks(connect(&config)?.as_ref()),
        Commands::Cache(args) => commands::handle_cache_command(&cache, args),
    }
}

fn open_store(
    paths: &ConfigPaths,
    config: &crate::config::AppConfig,
    ephemeral: bool,
) -> Result<SharedStore> {
    if ephemeral {
        tracing::info!("using in-memory cache");
        let store = match config.cache.quota_bytes {
            0 => MemoryStore::new(),
            quota => MemoryStore::with_quota(quota),
        };
        return Ok(Arc::new(store));
    }
    let store = storage::init(paths, &config.cache)?;
    Ok(Arc::new(store))
}

fn connect(config: &crate::config::AppConfig) -> Result<Arc<dyn DiaryApi>> {
    let api = HttpDiaryApi::new(&config.api).context("configuring API client")?;
    tracing::debug!(base_url = api.base_url(), "API client ready");
    Ok(Arc::new(api))
}

fn init_tracing(level: &str, target: LogTarget, paths: &ConfigPaths) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
        match target {
            LogTarget::Stderr => {
                fmt()
                    .with_env_filter(env_filter)
                    .with_writer(std::io::stderr)
                    .init();
            }
            LogTarget::File => {
                fs::create_dir_all(&paths.log_dir).with_context(|| {
                    format!("creating log directory {}", paths.log_dir.display())
                })?;
                let log_file = paths.log_file();
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&log_file)
                    .with_context(|| format!("opening log file {}", log_file.display()))?;
                fmt()
                    .with_env_filter(env_filter)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .init();
            }
        }
        Ok::<(), anyhow::Error>(())
    })
    .map(|_| ())
}

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use vigil_dispatch::export::ProblemExporter;
use vigil_dispatch::LoggingDispatcher;
use vigil_events::{ConfigSnapshot, EventProcessor, StoreTriggerLocker, TriggerLocker};
use vigil_storage::Store;

use vigil_server::config::ServerConfig;
use vigil_server::logging;
use vigil_server::taskmanager::TaskManager;

#[allow(clippy::print_stderr)]
fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  vigil-server [config.toml]                                             Run the task manager");
    eprintln!("  vigil-server init-db <config.toml>                                     Create the database schema");
    eprintln!("  vigil-server close-problem <config.toml> <triggerid> <eventid> <userid> Close one problem");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("init-db") => {
            let config_path = args.get(2).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("init-db requires <config.toml> argument")
            })?;
            run_init_db(config_path)
        }
        Some("close-problem") => {
            if args.len() < 6 {
                print_usage();
                anyhow::bail!("close-problem requires <config.toml> <triggerid> <eventid> <userid> arguments");
            }
            let triggerid = parse_id(&args[3], "triggerid")?;
            let eventid = parse_id(&args[4], "eventid")?;
            let userid = parse_id(&args[5], "userid")?;
            run_close_problem(&args[2], triggerid, eventid, userid)
        }
        Some("--help" | "-h") => {
            print_usage();
            Ok(())
        }
        _ => {
            let config_path = args
                .get(1)
                .map(|s| s.as_str())
                .unwrap_or("config/server.toml");
            run_server(config_path).await
        }
    }
}

fn parse_id(value: &str, name: &str) -> Result<u64> {
    value
        .parse()
        .with_context(|| format!("Invalid {name} '{value}'"))
}

fn open_store(config: &ServerConfig) -> Result<Store> {
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("Failed to create data directory '{}'", config.data_dir))?;
    let path = config.db_path();
    let store = Store::open(&path).with_context(|| format!("Failed to open database '{}'", path.display()))?;
    Ok(store)
}

fn build_processor(
    config: &ServerConfig,
    store: Arc<Store>,
    snapshot: Arc<ConfigSnapshot>,
    locker: Arc<StoreTriggerLocker>,
    process: &str,
) -> Result<EventProcessor> {
    let mut processor = EventProcessor::new(store, snapshot, locker, Arc::new(LoggingDispatcher));
    if config.export.enabled {
        std::fs::create_dir_all(&config.export.dir)
            .with_context(|| format!("Failed to create export directory '{}'", config.export.dir))?;
        processor = processor.with_exporter(ProblemExporter::new(
            Path::new(&config.export.dir),
            process,
            1,
            config.export.file_size,
            Duration::from_secs(config.export.retry_delay_secs),
        ));
    }
    Ok(processor)
}

fn run_init_db(config_path: &str) -> Result<()> {
    let config = ServerConfig::load(config_path)?;
    logging::init(&config.log_level)?;

    open_store(&config)?;
    tracing::info!(db = %config.db_path().display(), "Database schema ready");
    Ok(())
}

fn run_close_problem(config_path: &str, triggerid: u64, eventid: u64, userid: u64) -> Result<()> {
    let config = ServerConfig::load(config_path)?;
    logging::init(&config.log_level)?;

    let store = Arc::new(open_store(&config)?);
    let snapshot = Arc::new(ConfigSnapshot::load(&store)?);
    let owner = format!("close-problem-{}", std::process::id());
    let locker = Arc::new(StoreTriggerLocker::new(store.clone(), owner));
    let mut processor = build_processor(&config, store, snapshot, locker.clone(), "close-problem")?;

    let locked = locker.lock(&[triggerid]);
    if locked.is_empty() {
        anyhow::bail!("Trigger {triggerid} is locked by another process");
    }
    let result = processor.close_problem(triggerid, eventid, userid);
    locker.unlock(&locked);

    if result? {
        tracing::info!(triggerid, eventid, userid, "Problem closed");
    } else {
        tracing::warn!(triggerid, eventid, "Problem was not closed");
    }
    Ok(())
}

async fn run_server(config_path: &str) -> Result<()> {
    let config = ServerConfig::load(config_path)?;
    logging::init(&config.log_level)?;

    tracing::info!(
        data_dir = %config.data_dir,
        export = config.export.enabled,
        "vigil-server starting"
    );

    let store = Arc::new(open_store(&config)?);
    let snapshot = Arc::new(ConfigSnapshot::load(&store)?);
    let locker = Arc::new(StoreTriggerLocker::new(store.clone(), "task-manager"));
    locker.release_stale()?;
    let processor = build_processor(&config, store.clone(), snapshot.clone(), locker.clone(), "task-manager")?;

    let manager = TaskManager::new(
        store,
        locker,
        snapshot,
        Arc::new(LoggingDispatcher),
        processor,
        config.task_manager.clone(),
    );
    let handle = tokio::spawn(manager.run());

    signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    handle.abort();
    Ok(())
}

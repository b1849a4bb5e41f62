use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use cronlet_core::CronletConfig;
use cronlet_scheduler::{CronTimerEngine, Scheduler, SqliteExecutionRecorder, SqliteTaskStore};
use cronlet_terminal::{ExecOptions, ShellExecutor};
use tracing::{info, warn};

mod app;
mod http;

/// Cron-style command scheduler with an HTTP API.
#[derive(Parser)]
#[command(name = "cronlet-gateway", version)]
struct Cli {
    /// Config file (default: $CRONLET_CONFIG, then ~/.cronlet/cronlet.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Do not start enabled tasks on boot
    #[arg(long)]
    no_autostart: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // load config: --config > CRONLET_CONFIG env > ~/.cronlet/cronlet.toml
    let config_path = cli.config.or_else(|| std::env::var("CRONLET_CONFIG").ok());
    let (config, load_err) = match CronletConfig::load(config_path.as_deref()) {
        Ok(c) => (c, None),
        Err(e) => (CronletConfig::default(), Some(e)),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log.filter.as_str().into()),
        )
        .init();

    if let Some(e) = load_err {
        warn!("Config load failed ({}), using defaults", e);
    }

    let db_path = config.database.path.clone();
    ensure_parent_dir(&db_path);
    info!(path = %db_path, "opening SQLite database");

    let db = open_db(&db_path)?;
    cronlet_scheduler::db::init_db(&db)?;
    drop(db);
    info!("database migrations complete");

    // each store gets its own connection; WAL lets them share the file
    let tasks = Arc::new(SqliteTaskStore::new(open_db(&db_path)?));
    let executions = Arc::new(SqliteExecutionRecorder::new(open_db(&db_path)?));
    let executor = Arc::new(ShellExecutor::new(ExecOptions::from(&config.executor)));
    let timer = Arc::new(CronTimerEngine::new()?);
    let scheduler = Scheduler::new(tasks.clone(), executions.clone(), executor, timer)?;

    if cli.no_autostart {
        info!("autostart disabled; tasks stay stopped until started over HTTP");
    } else {
        let report = scheduler.load_and_start_tasks()?;
        info!(
            started = report.started,
            failed = report.failed,
            "scheduler ready"
        );
    }

    let addr: SocketAddr = config.listen_addr().parse()?;
    let state = Arc::new(app::AppState::new(tasks, executions, scheduler));
    let router = app::build_router(state.clone());

    info!("Cronlet gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // running commands finish on their own; no new ticks after this
    state.scheduler.stop();
    info!("shutdown complete");
    Ok(())
}

/// Open a connection with the pragmas every subsystem relies on.
fn open_db(path: &str) -> anyhow::Result<rusqlite::Connection> {
    let conn = rusqlite::Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

/// Ensure the parent directory for a file path exists.
fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

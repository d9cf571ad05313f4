//! mypsl - MySQL process list watcher and query killer
//!
//! Samples the server process list on an interval, summarizes what the
//! sessions are doing and, when asked, kills matching queries.

mod config;
mod output;

use anyhow::{Context, Result};
use clap::Parser;
use dialoguer::Confirm;
use output::{print_info, OutputFormat, TerminalRenderer};
use psl_lib::config::{KillSettings, WatchMode};
use psl_lib::kill::DEFAULT_KILL_LOG;
use psl_lib::poll::{PollExit, PollLoop};
use psl_lib::source::{resolve_host_identity, resolve_local_socket, MysqlSource};
use psl_lib::{CycleMode, StructuredLogger, Watcher};
use std::path::PathBuf;
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const MYPSL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// MySQL process list watcher & query killer
#[derive(Parser)]
#[command(name = "mypsl")]
#[command(author, version, about = "MySQL process list watcher & query killer", long_about = None)]
pub struct Cli {
    /// Server host
    #[arg(short = 'H', long, env = "MYPSL_HOST", default_value = "localhost")]
    pub host: String,

    /// Server port
    #[arg(short, long, env = "MYPSL_PORT", default_value_t = 3306)]
    pub port: u16,

    /// User to connect as
    #[arg(short, long, env = "MYPSL_USER", default_value = "root")]
    pub user: String,

    /// Password
    #[arg(short = 'P', long, env = "MYPSL_PASS", hide_env_values = true)]
    pub pass: Option<String>,

    /// Connection charset
    #[arg(long, env = "MYPSL_CHARSET", default_value = "utf8")]
    pub charset: String,

    /// Named credential file in ~/.mypsl; its values win over flags
    #[arg(long, env = "MYPSL_CONFIG")]
    pub config: Option<String>,

    /// Seconds between cycles; 0 or unset runs once
    #[arg(short = 'l', long = "loop", value_name = "SECONDS")]
    pub interval: Option<u64>,

    /// Watch active queries with sensible defaults (3s loop, no system user)
    #[arg(long)]
    pub default: bool,

    /// Only sessions running this command
    #[arg(short, long)]
    pub command: Option<String>,

    /// Only sessions in this state
    #[arg(short, long)]
    pub state: Option<String>,

    /// Only sessions running at least this many seconds
    #[arg(short, long, value_name = "SECONDS")]
    pub time: Option<u64>,

    /// Only sessions using this database
    #[arg(short, long)]
    pub database: Option<String>,

    /// Only sessions whose statement starts with this text
    #[arg(short, long)]
    pub query: Option<String>,

    /// Print session ids only
    #[arg(short, long)]
    pub id: bool,

    /// Hide replication and event scheduler threads
    #[arg(long)]
    pub ignore_system_user: bool,

    /// Print the generated query before running
    #[arg(long)]
    pub debug: bool,

    /// Order by allow-listed columns, e.g. "time DESC, id"
    #[arg(short, long)]
    pub order_by: Option<String>,

    /// Kill matching queries instead of displaying them
    #[arg(long)]
    pub kill: bool,

    /// Only kill when connected threads reach this count; "off" disables the check
    #[arg(long, default_value = "100")]
    pub kill_threshold: String,

    /// Kill every matching statement, not only SELECTs
    #[arg(long)]
    pub kill_all: bool,

    /// Skip the confirmation prompt
    #[arg(long)]
    pub kill_yes: bool,

    /// Where killed queries are recorded
    #[arg(long, default_value = DEFAULT_KILL_LOG)]
    pub kill_log: PathBuf,

    /// Output format
    #[arg(long, short = 'f', default_value = "table")]
    pub format: OutputFormat,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,

    /// Write Prometheus metrics to this file after every cycle
    #[arg(long, env = "MYPSL_METRICS_FILE")]
    pub metrics_file: Option<PathBuf>,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

fn confirm_kill(settings: &KillSettings, criteria: &str) -> Result<bool> {
    let scope = if settings.kill_all {
        "all matching statements"
    } else {
        "matching SELECT statements"
    };
    Confirm::new()
        .with_prompt(format!(
            "Are you sure you want to kill {} (WHERE {}, threshold {})?",
            scope, criteria, settings.threshold
        ))
        .default(false)
        .interact()
        .context("Failed to read confirmation")
}

/// First Ctrl-C stops the loop between cycles; a second one exits at once
async fn forward_interrupts(shutdown: broadcast::Sender<()>) {
    if tokio::signal::ctrl_c().await.is_err() {
        return;
    }
    info!("Interrupt received, stopping after the current cycle");
    let _ = shutdown.send(());

    if tokio::signal::ctrl_c().await.is_ok() {
        std::process::exit(0);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let mut config = cli.watch_config()?;
    let query = config.build_query()?;
    if cli.debug {
        print_info(&format!("Query: {}", query.sql()));
        print_info(&format!("Binds: {:?}", query.binds()));
    }

    let mode = config.mode();
    if let WatchMode::Kill(settings) = &mode {
        if !cli.kill_yes && !confirm_kill(settings, &query.describe_criteria())? {
            print_info("Ok, then only use --kill when you are sure you want to kill stuff.");
            return Ok(());
        }
    }

    if config.connection.is_localhost() {
        config.connection.socket = resolve_local_socket().await;
    }

    let mut source = MysqlSource::connect(&config.connection)
        .await
        .with_context(|| {
            format!(
                "Failed to connect to {}:{} as {}",
                config.connection.host, config.connection.port, config.connection.user
            )
        })?;
    let host = resolve_host_identity(&config.connection, &mut source).await;

    let interval = config.effective_interval();
    let logger = StructuredLogger::new(&host);
    logger.log_startup(MYPSL_VERSION, mode.name(), interval.map_or(0, |d| d.as_secs()));

    let cycle_mode = CycleMode::from_watch_mode(&mode, &host);
    let mut watcher = Watcher::new(
        source,
        TerminalRenderer::new(cli.format),
        query,
        cycle_mode,
        host,
    )
    .with_metrics_file(cli.metrics_file.clone());

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(forward_interrupts(shutdown_tx.clone()));

    let result = PollLoop::new(interval).run(&mut watcher, shutdown_rx).await;
    let reason = match &result {
        Ok(PollExit::Completed) => "completed",
        Ok(PollExit::Interrupted) => "interrupted",
        Err(_) => "connection lost",
    };
    watcher.shutdown(reason).await;
    drop(shutdown_tx);

    result.context("Lost connection to the server")?;
    Ok(())
}

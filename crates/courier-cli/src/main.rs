use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use courier_core::SchedulerBuilder;
use courier_core::domain::{MessageTemplate, Recipient, SchedulerState};
use courier_core::impls::{ChannelEventSink, JsonFileCounterStore};
use courier_core::ports::{Clock, SystemClock};
use courier_core::queue::DailyCounter;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

mod config;
mod simulator;

use config::{CourierConfig, LogFormat};
use simulator::SimulatedSender;

#[derive(Debug, Parser)]
#[command(name = "courier", about = "Rate-limited mass-send scheduler", version)]
struct Cli {
    /// Path to the TOML configuration file (default: ./courier.toml if present).
    #[arg(long, global = true, env = "COURIER_CONFIG")]
    config: Option<PathBuf>,

    /// Log output format; overrides `[log] format`.
    #[arg(long, value_enum, global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Dispatch a template to every recipient in a JSON file.
    Send {
        /// JSON array of `{"name": ..., "phone": ...}` objects.
        #[arg(long)]
        recipients: PathBuf,

        /// Message text; `{{name}}` and `{{phone}}` are substituted.
        #[arg(long)]
        template: String,
    },

    /// Show today's send count against the daily limit.
    Quota,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    check_config_path(cli.config.as_deref())?;
    let config = config::load(cli.config.as_deref())
        .context("failed to load configuration")?;
    let log_format = cli.log_format.unwrap_or(config.log.format);
    init_tracing(&config.log.filter, log_format)?;

    match cli.command {
        Command::Send {
            recipients,
            template,
        } => send(&config, &recipients, template).await,
        Command::Quota => quota(&config),
    }
}

/// An explicit `--config` must exist; the default file is optional.
fn check_config_path(path: Option<&Path>) -> Result<()> {
    if let Some(path) = path
        && !path.exists()
    {
        bail!("config file not found: {}", path.display());
    }
    Ok(())
}

fn init_tracing(filter: &str, format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));
    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| anyhow::anyhow!("failed to init tracing: {err}"))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| anyhow::anyhow!("failed to init tracing: {err}"))?,
    }
    Ok(())
}

fn read_recipients(path: &Path) -> Result<Vec<Recipient>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("invalid recipient list in {}", path.display()))
}

async fn send(config: &CourierConfig, recipients: &Path, template: String) -> Result<()> {
    let recipients = read_recipients(recipients)?;
    let store = Arc::new(JsonFileCounterStore::new(&config.store.counter_path));
    info!(path = %store.path().display(), "using counter store");
    let (sink, mut events) = ChannelEventSink::new();

    let scheduler = SchedulerBuilder::new(Arc::new(SimulatedSender::new(&config.simulator)))
        .policy(config.dispatch.clone())
        .counter_store(store)
        .events(Arc::new(sink))
        .build(recipients, MessageTemplate::new(template))?;

    // events go to stdout as JSON lines, logs to stderr
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(err) => warn!(%err, "failed to encode event"),
            }
        }
    });

    let policy = scheduler.policy();
    info!(
        run_id = %scheduler.run_id(),
        per_minute = policy.messages_per_minute,
        daily_limit = policy.daily_limit,
        "starting dispatch"
    );
    scheduler.start();
    let state = tokio::select! {
        state = scheduler.wait() => state,
        _ = shutdown_signal() => {
            info!("shutdown signal received");
            scheduler.stop().await;
            SchedulerState::Stopped
        }
    };

    let stats = scheduler.stats().await;
    drop(scheduler);
    // the sink closes once the last delivery timer lets go of the run
    printer.await.context("event printer panicked")?;

    info!(?state, succeeded = stats.succeeded(), ?stats, "run finished");
    eprintln!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

fn quota(config: &CourierConfig) -> Result<()> {
    let store = Arc::new(JsonFileCounterStore::new(&config.store.counter_path));
    let mut counter = DailyCounter::new(store, config.dispatch.counter_key_prefix.clone());
    let today = SystemClock.today();
    let sent = counter.current(today);
    let limit = config.dispatch.daily_limit;
    let remaining = limit.saturating_sub(sent);

    println!("{today}: {sent}/{limit} sent, {remaining} remaining");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

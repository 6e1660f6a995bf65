use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tegra_otg::config::{self, OtgPlatformConfig};
use tegra_otg::events::EventBus;
use tegra_otg::otg::{HostBus, OtgDevice, OtgRegistry};
use tegra_otg::sim::{self, ScriptStep, SimBoard};

/// Log level for the application
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Verbose,
    Debug,
    Trace,
}

/// tegra-otg command line arguments
#[derive(Parser, Debug)]
#[command(name = "tegra-otg")]
#[command(version, about = "Replay USB OTG cable sessions against a simulated board", long_about = None)]
struct CliArgs {
    /// Platform config file (JSON)
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Script of cable events to replay (JSON list of steps)
    #[arg(short = 's', long, value_name = "FILE", conflicts_with = "demo")]
    script: Option<PathBuf>,

    /// Replay the built-in demo session
    #[arg(long)]
    demo: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    /// Log level (error, warn, info, verbose, debug, trace)
    #[arg(short = 'l', long, value_name = "LEVEL", default_value = "info")]
    log_level: LogLevel,

    /// Increase verbosity (-v for verbose, -vv for debug, -vvv for trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    init_logging(args.log_level, args.verbose, args.log_json);

    tracing::info!("Starting tegra-otg v{}", env!("CARGO_PKG_VERSION"));

    let mut platform = match &args.config {
        Some(path) => {
            tracing::info!("Loading platform config from {}", path.display());
            config::load_config(path)?
        }
        None => OtgPlatformConfig::default(),
    };

    let steps: Vec<ScriptStep> = match &args.script {
        Some(path) => sim::load_script(path)?,
        None if args.demo => sim::demo_script(),
        None => {
            tracing::warn!("No script given, probing only (use --script or --demo)");
            Vec::new()
        }
    };

    let board = SimBoard::new(platform.initial_wakeup);
    if platform.irq.is_none() {
        platform.irq = Some(board.irq);
    }

    let events = Arc::new(EventBus::new());
    let registry = Arc::new(OtgRegistry::new());
    let event_logger = spawn_event_logger(events.subscribe());

    let mut resources = board.resources();
    resources.events = Some(events.clone());
    resources.registry = Some(registry.clone());

    let device = OtgDevice::probe(Some(platform), resources)?;
    device.set_host(Some(HostBus {
        name: "sim-ehci".to_string(),
        bus_num: 1,
    }))?;
    device.set_peripheral(Some(board.gadget.clone()))?;
    device.flush_work().await;

    sim::run_script(&device, &board, &steps).await?;

    let status = device.status();
    device.remove().await;
    tracing::info!("Devices still registered: {:?}", registry.names());

    // Last sender goes away with the device, the logger drains and exits
    drop(device);
    drop(events);
    if let Err(e) = event_logger.await {
        tracing::warn!("Event logger ended abnormally: {}", e);
    }

    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

/// Log every bus event as one JSON object
fn spawn_event_logger(
    mut rx: broadcast::Receiver<tegra_otg::events::OtgEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => tracing::info!("event: {}", json),
                    Err(e) => tracing::warn!("Failed to serialize event: {}", e),
                },
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Event logger lagged, {} events dropped", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

/// Initialize logging with tracing
fn init_logging(level: LogLevel, verbose_count: u8, json: bool) {
    // Verbose count overrides log level
    let effective_level = match verbose_count {
        0 => level,
        1 => LogLevel::Verbose,
        2 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };

    let filter = match effective_level {
        LogLevel::Error => "tegra_otg=error,tegra_otg::sim=error",
        LogLevel::Warn => "tegra_otg=warn,tegra_otg::sim=warn",
        LogLevel::Info => "tegra_otg=info,tegra_otg::sim=warn",
        LogLevel::Verbose => "tegra_otg=debug,tegra_otg::sim=info",
        LogLevel::Debug => "tegra_otg=debug,tegra_otg::sim=debug",
        LogLevel::Trace => "tegra_otg=trace",
    };

    // Environment variable takes highest priority
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };
    if let Err(err) = result {
        eprintln!("failed to initialize tracing: {}", err);
    }
}

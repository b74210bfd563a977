use std::{path::PathBuf, process::ExitCode};

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{error, info, LevelFilter};
use tokio_util::sync::CancellationToken;

use tipwatch::{
    config::TrackerConfig,
    db::Database,
    monitor::{
        automation::Platform,
        bridge::HelperAutomation,
        StreamMonitor,
    },
    persistence::{EventSink, JsonlSink},
};

#[derive(Parser, Debug)]
#[command(name = "tipwatch", about = "Broadcast overlay tip tracker", version)]
struct Cli {
    /// Broadcast platform to monitor (youtube, twitch)
    #[arg(long, default_value = "youtube")]
    mode: String,

    /// Log level filter (error, warn, info, debug, trace)
    #[arg(long, default_value = "warn")]
    log: String,

    /// Persistence backend (sqlite, jsonl)
    #[arg(long, default_value = "sqlite")]
    sink: String,

    /// Channel name, overriding the config file
    #[arg(long)]
    channel: Option<String>,

    /// Path to a JSON config file
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.log.parse::<LevelFilter>() {
        Ok(level) => level,
        Err(_) => {
            eprintln!("invalid log level '{}'", cli.log);
            return ExitCode::FAILURE;
        }
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    match run(cli).await {
        Ok(()) => {
            info!("Tracker stopped cleanly");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("Tracker aborted: {err:#}");
            eprintln!("tipwatch: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let platform: Platform = cli
        .mode
        .parse()
        .map_err(|message: String| anyhow::anyhow!(message))?;

    let mut config = TrackerConfig::load(cli.config.as_deref())?;
    if let Some(channel) = cli.channel {
        config.channel = channel;
    }
    if config.channel.is_empty() {
        bail!("no channel configured; pass --channel or set it in the config file");
    }

    let sink = build_sink(&cli.sink, &config)?;
    let automation = HelperAutomation::new(
        config.helper_command.clone(),
        platform,
        platform.channel_url(&config.channel),
    );

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received; shutting down");
            signal_token.cancel();
        }
    });

    info!(
        "Monitoring {} on {platform} ({} sink)",
        config.channel, cli.sink
    );
    let monitor = StreamMonitor::new(automation, sink, config, shutdown)?;
    monitor.run().await
}

fn build_sink(kind: &str, config: &TrackerConfig) -> Result<EventSink> {
    match kind {
        "sqlite" => {
            let db = Database::new(config.db_path.clone())
                .context("could not open the tip database")?;
            Ok(EventSink::Sqlite(db))
        }
        "jsonl" => {
            let sink = JsonlSink::open(config.output_path.clone())
                .context("could not open the event log")?;
            Ok(EventSink::Jsonl(sink))
        }
        other => bail!("invalid sink '{other}' (accepted values: sqlite, jsonl)"),
    }
}

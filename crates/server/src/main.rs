//! Arena server entry point.
//!
//! `colosseum serve` accepts newline-delimited JSON sessions over TCP,
//! `colosseum run` plays one match locally and prints its events, and
//! `colosseum games` lists the available variants.
mod logging;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use arena_core::{GameKind, MatchRequest};
use arena_runtime::transport::tcp;
use arena_runtime::{Event, EventSink, Runtime, RuntimeConfig, TransportError};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncWriteExt, Stdout};
use tokio::net::TcpListener;

#[derive(Debug, Parser)]
#[command(name = "colosseum", about = "Two-sided strategy game arena")]
struct Cli {
    /// Directory for a persistent log file, in addition to stderr.
    #[arg(long, env = "ARENA_LOG_DIR", global = true)]
    log_dir: Option<PathBuf>,

    /// Directory of the JSON-lines match archive.
    #[arg(long, global = true)]
    archive_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Accept client sessions over TCP.
    Serve {
        #[arg(long)]
        bind: Option<String>,
        /// Log a metrics snapshot at this interval.
        #[arg(long)]
        metrics_interval_secs: Option<u64>,
    },
    /// Play a single match and print its events as JSON lines.
    Run {
        #[arg(long, default_value = "resource_capture")]
        game: String,
        #[arg(long, default_value = "aggressive")]
        side_a: String,
        #[arg(long, default_value = "defensive")]
        side_b: String,
        #[arg(long)]
        rounds: Option<u32>,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long, default_value_t = 0)]
        delay_ms: u64,
    },
    /// Print the game catalogue.
    Games,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _guard = logging::init(cli.log_dir.as_deref())?;

    let mut config = RuntimeConfig::from_env();
    if let Some(dir) = cli.archive_dir {
        config.archive_dir = Some(dir);
    }

    match cli.command {
        Command::Serve {
            bind,
            metrics_interval_secs,
        } => {
            if let Some(bind) = bind {
                config.bind_addr = bind;
            }
            if metrics_interval_secs.is_some() {
                config.metrics_enabled = true;
            }
            serve(config, metrics_interval_secs.map(Duration::from_secs)).await
        }
        Command::Run {
            game,
            side_a,
            side_b,
            rounds,
            seed,
            delay_ms,
        } => {
            config.round_delay = Duration::from_millis(delay_ms);
            let rounds = match rounds {
                Some(rounds) => rounds,
                None => game
                    .parse::<GameKind>()
                    .map(|kind| kind.descriptor().default_rounds)
                    .unwrap_or(MatchRequest::default().rounds),
            };
            let request = MatchRequest {
                game_type: game,
                side_a_personality: side_a,
                side_b_personality: side_b,
                rounds,
            };
            run_once(config, request, seed).await
        }
        Command::Games => {
            let catalogue = serde_json::to_string_pretty(&GameKind::catalogue())?;
            println!("{catalogue}");
            Ok(())
        }
    }
}

async fn serve(config: RuntimeConfig, metrics_interval: Option<Duration>) -> Result<()> {
    let bind_addr = config.bind_addr.clone();
    let runtime = Runtime::builder().config(config).build()?;
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    if let Some(interval) = metrics_interval {
        let runtime = runtime.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Some(metrics) = runtime.metrics() {
                    let snapshot = metrics.snapshot();
                    tracing::info!(
                        matches = snapshot.matches,
                        rounds = snapshot.rounds,
                        "metrics: {}",
                        serde_json::to_string(&snapshot).unwrap_or_default()
                    );
                }
            }
        });
    }

    tokio::select! {
        result = tcp::serve(listener, runtime) => result.context("listener failed"),
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
            Ok(())
        }
    }
}

async fn run_once(config: RuntimeConfig, request: MatchRequest, seed: Option<u64>) -> Result<()> {
    let runtime = Runtime::builder().config(config).build()?;
    let match_config = runtime.create_match(request, seed)?;
    tracing::info!(
        match_id = %match_config.match_id,
        game = %match_config.game,
        seed = match_config.seed,
        "Running match"
    );

    let report = runtime.run_match(match_config, StdoutSink::new()).await;
    tracing::info!(
        match_id = %report.match_id,
        status = %report.status,
        rounds = report.rounds_played,
        "Match finished"
    );
    Ok(())
}

/// Prints each event as one JSON line on stdout.
struct StdoutSink {
    out: Stdout,
}

impl StdoutSink {
    fn new() -> Self {
        Self {
            out: tokio::io::stdout(),
        }
    }
}

#[async_trait]
impl EventSink for StdoutSink {
    async fn emit(&mut self, event: Event) -> Result<(), TransportError> {
        let mut line = serde_json::to_vec(&event)?;
        line.push(b'\n');
        self.out.write_all(&line).await?;
        self.out.flush().await?;
        Ok(())
    }
}

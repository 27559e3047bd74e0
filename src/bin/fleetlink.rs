// ABOUTME: CLI entry point: `tcp` runs the telematics server, `replay` plays captured files back at a live server
// ABOUTME: Exit codes: 0 normal, 1 config invalid, 2 bind failure, 3 unrecoverable serve error

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use fleetlink::bus::EventBus;
use fleetlink::config::Config;
use fleetlink::logging;
use fleetlink::replay::{self, PipelineConfig, ReplayConfig, Replayer};
use fleetlink::server::{Server, ServerConfig};

#[derive(Parser)]
#[command(name = "fleetlink", version, about = "Telematics ingest server and replayer")]
struct Cli {
    /// Path to a TOML config file; built-in defaults and environment
    /// variables apply regardless.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the TCP telematics server.
    Tcp,
    /// Replay previously captured frames against a live server.
    Replay {
        /// Directory of captured files to replay.
        #[arg(short = 'i', long)]
        in_path: Option<PathBuf>,
        /// Glob mask selecting which files to replay.
        #[arg(short, long)]
        mask: Option<String>,
        /// Number of concurrent replay workers.
        #[arg(short, long)]
        nums: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("config error: {err}");
            return ExitCode::from(1);
        }
    };

    logging::init(config.logging.level, config.logging.console);

    match cli.command {
        Command::Tcp => run_tcp(config).await,
        Command::Replay { in_path, mask, nums } => run_replay(config, in_path, mask, nums).await,
    }
}

async fn run_tcp(config: Config) -> ExitCode {
    let protocol = match config.tcp.protocol() {
        Ok(protocol) => protocol,
        Err(err) => {
            tracing::error!(%err, "invalid tcp.proto");
            return ExitCode::from(1);
        }
    };
    let address = match config.tcp.socket_addr() {
        Ok(address) => address,
        Err(err) => {
            tracing::error!(%err, "invalid tcp.address");
            return ExitCode::from(1);
        }
    };

    let mut bus = EventBus::new();
    #[cfg(feature = "postgres-sink")]
    if let Some(sample_db) = &config.consumers.sample_db {
        match fleetlink::sink::PostgresSink::connect("sample-db", &sample_db.uri).await {
            Ok(sink) => bus.register(Arc::new(sink)),
            Err(err) => {
                tracing::error!(%err, "failed to connect sample-db consumer");
                return ExitCode::from(1);
            }
        }
    }

    let server_config = ServerConfig {
        address,
        idle_timeout: config.tcp.idle_timeout(),
        socket_reuse_port: config.tcp.socket_reuse_port,
        socket_fast_open: config.tcp.socket_fast_open,
        socket_defer_accept: config.tcp.socket_defer_accept,
        accept_loops: config.tcp.loops,
        workerpool_shards: config.tcp.workerpool_shards,
    };

    let server = Server::new(server_config, protocol, Arc::new(bus));
    match server.listen_and_serve().await {
        Ok(()) => ExitCode::from(0),
        Err(err) => {
            tracing::error!(%err, "server exited with error");
            ExitCode::from(if err.to_string().contains("bind") { 2 } else { 3 })
        }
    }
}

async fn run_replay(config: Config, in_path: Option<PathBuf>, mask: Option<String>, nums: Option<usize>) -> ExitCode {
    let protocol = match config.player.protocol() {
        Ok(protocol) => protocol,
        Err(err) => {
            tracing::error!(%err, "invalid player.proto");
            return ExitCode::from(1);
        }
    };

    let replay_config = ReplayConfig {
        address: config.player.address.clone(),
        dial_timeout: config.player.network_timeout(),
        network_timeout: config.player.network_timeout(),
        packet_delay: config.player.packet_delay(),
    };
    let replayer = Arc::new(Replayer::new(replay_config, protocol));

    let pipeline_config = PipelineConfig {
        root: in_path.unwrap_or_else(|| PathBuf::from(&config.player.in_path)),
        mask: mask.unwrap_or(config.player.mask.clone()),
        workers: nums.unwrap_or(config.player.nums),
    };

    replay::run(pipeline_config, replayer).await;
    ExitCode::from(0)
}

//! `msgbridge`: replay a recorded message stream through the pipeline.
//!
//! Inbound messages are read from a JSON-lines file and fed to a session
//! backed by an in-process protocol client; every UI delivery is printed
//! to stdout. Optionally composes and sends one outgoing message at the
//! end. Configuration via CLI flags, environment variables, or config file
//! (`~/.config/msgbridge/config.toml`).
//!
//! ```bash
//! # Replay a stream as account user:100
//! cargo run --bin msgbridge -- --own-id user:100 --replay stream.jsonl
//!
//! # Replay, then send a message to a chat
//! cargo run --bin msgbridge -- --replay stream.jsonl --send "hello" --to chat:7
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use msgbridge::config::{BridgeConfig, CliArgs};
use msgbridge::host::console::ConsoleHost;
use msgbridge::pipeline::{ComposeError, Session};
use msgbridge::protocol::loopback::LoopbackProtocol;
use msgbridge::replay::{self, ReplayError, ReplayRecord};
use msgbridge_proto::peer::{PeerId, PeerIdParseError};

/// Served for every photo fetched during replay.
const PLACEHOLDER_PHOTO: &[u8] = b"\xff\xd8\xff\xe0\x00\x10JFIF\x00\xff\xd9";

/// Capacity of the inbound message channel.
const INBOUND_BUFFER: usize = 64;

#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error(transparent)]
    Replay(#[from] ReplayError),

    #[error("working directory {path}: {source}")]
    WorkDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid destination {value:?}: {source}")]
    Destination {
        value: String,
        source: PeerIdParseError,
    },

    #[error("--send needs a destination (--to)")]
    MissingDestination,

    #[error(transparent)]
    Compose(#[from] ComposeError),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = CliArgs::parse();

    let _log_guard = init_logging(&cli);

    let config = match BridgeConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(own_id = %config.own_id, "msgbridge starting");
    let result = run(&cli, &config).await;
    tracing::info!("msgbridge exiting");

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "replay failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Send tracing output to `--log-file` (default `$TMPDIR/msgbridge.log`)
/// so stdout carries only the replayed deliveries.
///
/// `RUST_LOG` takes precedence over `--log-level`. The returned guard
/// flushes the writer when dropped.
fn init_logging(cli: &CliArgs) -> Option<WorkerGuard> {
    let log_path = cli
        .log_file
        .clone()
        .unwrap_or_else(|| std::env::temp_dir().join("msgbridge.log"));
    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(
        log_path.parent()?,
        log_path.file_name()?,
    ));

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(false)
        .init();

    Some(guard)
}

/// Create a fresh per-process directory under the system temp dir.
fn work_dir(name: &str) -> Result<PathBuf, AppError> {
    let path = std::env::temp_dir()
        .join(format!("msgbridge-{}", std::process::id()))
        .join(name);
    std::fs::create_dir_all(&path).map_err(|source| AppError::WorkDir {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

async fn run(cli: &CliArgs, config: &BridgeConfig) -> Result<(), AppError> {
    let records = match &cli.replay {
        Some(path) => replay::load(path)?,
        None => Vec::new(),
    };

    let downloads = work_dir("downloads")?;
    let staging = work_dir("outgoing")?;

    let protocol = Arc::new(LoopbackProtocol::new(&downloads).with_latency(config.photo_latency));
    protocol.serve_any_photo(PLACEHOLDER_PHOTO);

    let mut messages = Vec::new();
    for record in records {
        match record {
            ReplayRecord::Peer(peer) => protocol.add_peer(peer.id, peer.name),
            ReplayRecord::Message(message) => messages.push(*message),
        }
    }
    tracing::info!(messages = messages.len(), "replaying");

    let host = ConsoleHost::new(
        &staging,
        config.timestamp_format.clone(),
        config.history_threshold_days,
    );
    let mut session = Session::new(Arc::clone(&protocol), host, config.to_session_config());

    let (tx, rx) = mpsc::channel(INBOUND_BUFFER);
    let feeder = tokio::spawn(async move {
        for message in messages {
            if tx.send(message).await.is_err() {
                break;
            }
        }
    });
    session.run(rx).await;
    if let Err(e) = feeder.await {
        tracing::warn!(error = %e, "replay feeder task failed");
    }

    if let Some(text) = &cli.send {
        let to = parse_destination(cli.to.as_deref())?;
        let submitted = session.send_plain_text(to, text)?;
        session.settle().await;
        println!(
            "sent {} chunk(s){} to {to}",
            submitted.chunks,
            if submitted.document {
                " and an attachment"
            } else {
                ""
            }
        );
    }

    session.close();
    if let Some(root) = downloads.parent() {
        if let Err(e) = std::fs::remove_dir_all(root) {
            tracing::debug!(path = %root.display(), error = %e, "removing working directory failed");
        }
    }
    Ok(())
}

fn parse_destination(value: Option<&str>) -> Result<PeerId, AppError> {
    let value = value.ok_or(AppError::MissingDestination)?;
    value.parse().map_err(|source| AppError::Destination {
        value: value.to_string(),
        source,
    })
}

use anyhow::{Context, Result};
use chunk_sync::capture::{AudioFile, ChunkConfig, ChunkSequencer, ChunkedRecorder};
use chunk_sync::client::{ChunkTransport, TransferClient};
use chunk_sync::durability::{
    boot_check, spawn_health_probe, BootOutcome, DurabilityGuard, FilePreferences,
    ManualConnectivity,
};
use chunk_sync::ledger::{BlobStore, FileLedger, InMemoryLedger, SessionStore};
use chunk_sync::{create_router, AppState, Config, RecordingService, UploadCoordinator, UserCommand};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chunk-sync")]
#[command(about = "Resumable chunked upload of long audio recordings")]
struct Args {
    /// Config file (extension optional)
    #[arg(short, long, default_value = "config/chunk-sync")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the session ledger HTTP server
    Serve,

    /// Chunk a WAV recording and upload it like a live capture would
    Sync {
        /// Input WAV file standing in for the capture stream
        input: PathBuf,

        /// Chunk length in seconds
        #[arg(short = 'd', long, default_value = "30")]
        chunk_duration: u64,

        /// Where chunk files are written before upload
        #[arg(short, long, default_value = "recordings")]
        output_dir: PathBuf,
    },

    /// Check for a recording interrupted by a restart
    BootCheck,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));

    match args.command {
        Command::Serve => serve(cfg).await,
        Command::Sync {
            input,
            chunk_duration,
            output_dir,
        } => sync(cfg, input, chunk_duration, output_dir).await,
        Command::BootCheck => {
            let prefs = FilePreferences::open(&cfg.client.preferences_path)?;
            match boot_check(&prefs)? {
                BootOutcome::Idle => info!("No interrupted recording"),
                BootOutcome::Interrupted { session_id } => warn!(
                    "Recording {} was interrupted; it cannot be resumed",
                    session_id.as_deref().unwrap_or("<unknown>")
                ),
            }
            Ok(())
        }
    }
}

async fn serve(cfg: Config) -> Result<()> {
    let store: Arc<dyn SessionStore> = match &cfg.storage.ledger_path {
        Some(path) => Arc::new(FileLedger::open(path).await?),
        None => Arc::new(InMemoryLedger::new()),
    };

    let state = AppState::new(
        store,
        BlobStore::new(&cfg.storage.uploads_dir),
        cfg.service.http.public_url(),
    )
    .with_presign_expiry(cfg.service.http.presign_expires_secs);

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Ledger listening on {}", addr);
    info!("Chunk storage: {}", cfg.storage.uploads_dir);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;

    Ok(())
}

async fn sync(cfg: Config, input: PathBuf, chunk_duration: u64, output_dir: PathBuf) -> Result<()> {
    let prefs = Arc::new(FilePreferences::open(&cfg.client.preferences_path)?);
    if let BootOutcome::Interrupted { session_id } = boot_check(prefs.as_ref())? {
        warn!(
            "Previous recording {} was interrupted",
            session_id.as_deref().unwrap_or("<unknown>")
        );
    }

    let transport: Arc<dyn ChunkTransport> = Arc::new(TransferClient::new(
        &cfg.client.server_url,
        Duration::from_secs(cfg.client.request_timeout_secs),
    )?);
    let connectivity = Arc::new(ManualConnectivity::new());
    let probe = spawn_health_probe(
        Arc::clone(&transport),
        Arc::clone(&connectivity),
        Duration::from_secs(cfg.client.probe_interval_secs),
    );

    let (signal_tx, signal_rx) = mpsc::unbounded_channel();
    let coordinator = Arc::new(UploadCoordinator::new(
        Arc::clone(&transport),
        cfg.retry.policy(),
    ));
    let guard = Arc::new(
        DurabilityGuard::new(prefs, connectivity, signal_tx)
            .with_keepalive_interval(Duration::from_secs(cfg.client.keepalive_interval_secs)),
    );
    let service = RecordingService::new(Arc::clone(&coordinator), Arc::clone(&guard));

    let session_id = service.start().await?;
    let (mut sequencer, chunk_rx) = ChunkSequencer::channel(session_id.clone(), 64);
    let upload_task = tokio::spawn(Arc::clone(&coordinator).run(chunk_rx, signal_rx));

    // Replay the file as a capture stream
    let audio = AudioFile::open(&input)?;
    let (frame_tx, frame_rx) = mpsc::channel(100);
    let frames = audio.frames(100);
    tokio::spawn(async move {
        for frame in frames {
            if frame_tx.send(frame).await.is_err() {
                break;
            }
        }
    });

    let mut recorder = ChunkedRecorder::new(
        ChunkConfig {
            chunk_duration_secs: chunk_duration,
            output_dir,
        },
        &session_id,
    )?;

    match recorder.record(frame_rx, &mut sequencer).await {
        Ok(chunks) => info!("Captured {} chunk(s)", chunks.len()),
        Err(e) => {
            error!("Capture failed: {:#}", e);
            service.capture_failed().await;
        }
    }
    drop(sequencer);

    tokio::select! {
        result = upload_task => result.context("Upload task panicked")?,
        _ = tokio::signal::ctrl_c() => {
            guard.on_process_reclaimed()?;
            probe.abort();
            return Ok(());
        }
    }

    if let Err(e) = service.handle(UserCommand::Stop).await {
        // After a capture failure the recorder is already in error; only the
        // suspended guard is left to release
        warn!("Stop rejected: {}", e);
        guard.deactivate()?;
    }
    probe.abort();

    let session = transport
        .list_sessions()
        .await?
        .into_iter()
        .find(|s| s.id == session_id);
    if let Some(session) = session {
        info!(
            "Session {}: {} chunk(s), {} confirmed",
            session.id,
            session.total_chunks,
            session.confirmed_chunks()
        );
    }

    Ok(())
}

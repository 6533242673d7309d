use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::frame::AudioFrame;
use super::sequencer::ChunkSequencer;
use crate::ledger::chunk_filename;

/// Chunk configuration
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// Duration of each chunk in seconds (default: 30)
    pub chunk_duration_secs: u64,
    /// Root directory for chunk files; each session gets a subdirectory
    pub output_dir: PathBuf,
}

impl ChunkConfig {
    pub fn new(output_dir: PathBuf) -> Self {
        Self {
            chunk_duration_secs: 30,
            output_dir,
        }
    }
}

/// Metadata for a single finished chunk
#[derive(Debug, Clone)]
pub struct ChunkMetadata {
    /// Number assigned by the sequencer
    pub chunk_number: u32,
    pub file_path: PathBuf,
    /// Start time in milliseconds since recording started
    pub start_ms: u64,
    /// Timestamp of the last frame written
    pub end_ms: u64,
    pub sample_rate: u32,
    pub channels: u16,
    pub sample_count: usize,
}

/// Chunked audio recorder
///
/// Receives audio frames and saves them to disk in fixed-duration WAV chunks.
/// Every finished chunk is handed to the sequencer, which numbers it and
/// queues it for upload.
pub struct ChunkedRecorder {
    config: ChunkConfig,
    session_dir: PathBuf,
    current_chunk: Option<ChunkWriter>,
}

impl ChunkedRecorder {
    pub fn new(config: ChunkConfig, session_id: &str) -> Result<Self> {
        let session_dir = config.output_dir.join(session_id);
        fs::create_dir_all(&session_dir).context("Failed to create output directory")?;

        info!(
            "Chunked recorder initialized: {} (chunks: {}s each)",
            session_id, config.chunk_duration_secs
        );

        Ok(Self {
            config,
            session_dir,
            current_chunk: None,
        })
    }

    /// Process incoming audio frames until the channel closes
    pub async fn record(
        &mut self,
        mut audio_rx: mpsc::Receiver<AudioFrame>,
        sequencer: &mut ChunkSequencer,
    ) -> Result<Vec<ChunkMetadata>> {
        let mut metadata = Vec::new();

        info!("Starting chunked recording");

        while let Some(frame) = audio_rx.recv().await {
            if self.should_start_new_chunk(&frame) {
                if let Some(chunk) = self.current_chunk.take() {
                    metadata.push(Self::hand_off(chunk, sequencer).await?);
                }

                self.current_chunk = Some(self.start_new_chunk(&frame, sequencer)?);
            }

            if let Some(chunk) = &mut self.current_chunk {
                chunk.write_frame(&frame)?;
            }
        }

        // Finish final chunk
        if let Some(chunk) = self.current_chunk.take() {
            metadata.push(Self::hand_off(chunk, sequencer).await?);
        }

        info!("Chunked recording complete: {} chunks saved", metadata.len());

        Ok(metadata)
    }

    async fn hand_off(chunk: ChunkWriter, sequencer: &mut ChunkSequencer) -> Result<ChunkMetadata> {
        let mut meta = chunk.finish()?;
        let ready = sequencer.submit(meta.file_path.clone()).await?;
        meta.chunk_number = ready.chunk_number;

        info!(
            "Chunk {} complete: {:.1}s - {:.1}s ({} samples)",
            meta.chunk_number,
            meta.start_ms as f64 / 1000.0,
            meta.end_ms as f64 / 1000.0,
            meta.sample_count
        );

        Ok(meta)
    }

    fn should_start_new_chunk(&self, frame: &AudioFrame) -> bool {
        match &self.current_chunk {
            None => true,
            Some(chunk) => {
                let chunk_duration_ms = self.config.chunk_duration_secs * 1000;
                let elapsed_ms = frame.timestamp_ms.saturating_sub(chunk.metadata.start_ms);
                elapsed_ms >= chunk_duration_ms
            }
        }
    }

    fn start_new_chunk(&self, frame: &AudioFrame, sequencer: &ChunkSequencer) -> Result<ChunkWriter> {
        let chunk_number = sequencer.next_chunk_number();
        let chunk_path = self.session_dir.join(chunk_filename(chunk_number));

        ChunkWriter::new(
            chunk_path,
            chunk_number,
            frame.timestamp_ms,
            frame.sample_rate,
            frame.channels,
        )
    }
}

/// Writes a single chunk to disk as WAV file
struct ChunkWriter {
    writer: Option<hound::WavWriter<BufWriter<File>>>,
    metadata: ChunkMetadata,
}

impl ChunkWriter {
    fn new(
        file_path: PathBuf,
        chunk_number: u32,
        start_ms: u64,
        sample_rate: u32,
        channels: u16,
    ) -> Result<Self> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let writer = hound::WavWriter::create(&file_path, spec)
            .with_context(|| format!("Failed to create WAV file: {:?}", file_path))?;

        Ok(Self {
            writer: Some(writer),
            metadata: ChunkMetadata {
                chunk_number,
                file_path,
                start_ms,
                end_ms: start_ms,
                sample_rate,
                channels,
                sample_count: 0,
            },
        })
    }

    fn write_frame(&mut self, frame: &AudioFrame) -> Result<()> {
        if let Some(writer) = &mut self.writer {
            for &sample in &frame.samples {
                writer
                    .write_sample(sample)
                    .context("Failed to write sample to WAV")?;
            }

            self.metadata.end_ms = frame.timestamp_ms;
            self.metadata.sample_count += frame.samples.len();
        }

        Ok(())
    }

    fn finish(mut self) -> Result<ChunkMetadata> {
        if let Some(writer) = self.writer.take() {
            writer.finalize().context("Failed to finalize WAV file")?;
        }

        Ok(self.metadata.clone())
    }
}

impl Drop for ChunkWriter {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            if let Err(e) = writer.finalize() {
                warn!("Failed to finalize WAV writer on drop: {}", e);
            }
        }
    }
}

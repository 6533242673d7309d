// Integration tests for chunked audio recording
//
// These tests verify that audio frames are split into time-based WAV chunks
// and that every finished chunk is numbered and queued for upload.

use anyhow::Result;
use chunk_sync::capture::{AudioFrame, ChunkConfig, ChunkSequencer, ChunkedRecorder, ReadyChunk};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;
use tokio::sync::mpsc;

/// 16kHz mono frames of 100ms each
fn frames(count: u64) -> Vec<AudioFrame> {
    (0..count)
        .map(|i| AudioFrame {
            samples: vec![(i % 100) as i16; 1600],
            sample_rate: 16000,
            channels: 1,
            timestamp_ms: i * 100,
        })
        .collect()
}

async fn record(
    config: ChunkConfig,
    session_id: &str,
    input: Vec<AudioFrame>,
) -> Result<(Vec<chunk_sync::ChunkMetadata>, Vec<ReadyChunk>)> {
    let mut recorder = ChunkedRecorder::new(config, session_id)?;
    let (mut sequencer, mut chunk_rx) = ChunkSequencer::channel(session_id, 64);

    let (tx, rx) = mpsc::channel(100);
    let recording_handle =
        tokio::spawn(async move { recorder.record(rx, &mut sequencer).await });

    for frame in input {
        tx.send(frame).await?;
    }
    drop(tx);

    let metadata = recording_handle.await??;

    let mut queued = Vec::new();
    while let Some(chunk) = chunk_rx.recv().await {
        queued.push(chunk);
    }

    Ok((metadata, queued))
}

#[tokio::test]
async fn test_chunked_recording_creates_single_chunk() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config = ChunkConfig {
        chunk_duration_secs: 10,
        output_dir: temp_dir.path().to_path_buf(),
    };

    // 5 seconds of audio, shorter than one chunk
    let (metadata, queued) = record(config, "test_001", frames(50)).await?;

    assert_eq!(metadata.len(), 1, "Should create exactly 1 chunk");

    let chunk = &metadata[0];
    assert_eq!(chunk.chunk_number, 0);
    assert_eq!(chunk.sample_rate, 16000);
    assert_eq!(chunk.channels, 1);
    assert_eq!(chunk.start_ms, 0);
    assert_eq!(chunk.end_ms, 4900);
    assert_eq!(chunk.sample_count, 1600 * 50);

    assert!(chunk.file_path.exists(), "Chunk file should exist");
    assert!(chunk.file_path.ends_with("test_001/chunk_0.wav"));
    assert!(fs::metadata(&chunk.file_path)?.len() > 0);

    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].session_id, "test_001");
    assert_eq!(queued[0].chunk_number, 0);
    assert_eq!(queued[0].path, chunk.file_path);
    assert_eq!(queued[0].size, fs::metadata(&chunk.file_path)?.len());

    Ok(())
}

#[tokio::test]
async fn test_chunked_recording_splits_into_multiple_chunks() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config = ChunkConfig {
        chunk_duration_secs: 2,
        output_dir: temp_dir.path().to_path_buf(),
    };

    // [0-2s], [2-4s], [4-5s]
    let (metadata, queued) = record(config, "test_002", frames(50)).await?;

    assert_eq!(metadata.len(), 3);

    assert_eq!(metadata[0].start_ms, 0);
    assert_eq!(metadata[0].end_ms, 1900);
    assert_eq!(metadata[1].start_ms, 2000);
    assert_eq!(metadata[1].end_ms, 3900);
    assert_eq!(metadata[2].start_ms, 4000);
    assert_eq!(metadata[2].end_ms, 4900);

    for (expected, (meta, ready)) in metadata.iter().zip(&queued).enumerate() {
        assert_eq!(meta.chunk_number, expected as u32);
        assert_eq!(ready.chunk_number, expected as u32);
        assert!(meta
            .file_path
            .ends_with(format!("chunk_{}.wav", expected)));
        assert!(meta.file_path.exists());
    }

    Ok(())
}

#[tokio::test]
async fn test_chunked_recording_handles_empty_input() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config = ChunkConfig {
        chunk_duration_secs: 5,
        output_dir: temp_dir.path().to_path_buf(),
    };

    let (metadata, queued) = record(config, "test_003", Vec::new()).await?;

    assert!(metadata.is_empty(), "Should create 0 chunks for empty input");
    assert!(queued.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_chunk_files_are_valid_wav() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config = ChunkConfig {
        chunk_duration_secs: 10,
        output_dir: temp_dir.path().to_path_buf(),
    };

    let (metadata, _) = record(config, "test_004", frames(10)).await?;

    let reader = hound::WavReader::open(&metadata[0].file_path)?;
    let spec = reader.spec();
    assert_eq!(spec.sample_rate, 16000);
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(reader.len() as usize, metadata[0].sample_count);

    Ok(())
}

#[test]
fn test_chunk_config_creation() {
    let config = ChunkConfig::new(PathBuf::from("/tmp/test"));

    assert_eq!(config.output_dir, PathBuf::from("/tmp/test"));
    assert_eq!(config.chunk_duration_secs, 30, "Default chunk duration should be 30s");
}

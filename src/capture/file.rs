use super::frame::AudioFrame;
use anyhow::{Context, Result};
use hound::WavReader;
use std::path::Path;
use tracing::info;

/// A fully decoded WAV recording, replayed as capture frames
pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path).context("Failed to open WAV file")?;

        let spec = reader.spec();
        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?;

        let duration_seconds =
            samples.len() as f64 / (spec.sample_rate as f64 * spec.channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }

    /// Split the recording into frames of `frame_ms` milliseconds
    pub fn frames(&self, frame_ms: u64) -> Vec<AudioFrame> {
        let frame_ms = frame_ms.max(1);
        let per_frame = ((self.sample_rate as u64 * frame_ms / 1000) as usize).max(1)
            * self.channels.max(1) as usize;

        self.samples
            .chunks(per_frame)
            .enumerate()
            .map(|(i, samples)| AudioFrame {
                samples: samples.to_vec(),
                sample_rate: self.sample_rate,
                channels: self.channels,
                timestamp_ms: i as u64 * frame_ms,
            })
            .collect()
    }
}

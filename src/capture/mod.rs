//! Capture-side chunking
//!
//! Audio capture itself lives outside this crate; it delivers PCM frames. This
//! module cuts them into WAV chunk files and numbers each finished file for
//! upload.

pub mod file;
pub mod frame;
pub mod recorder;
pub mod sequencer;

pub use file::AudioFile;
pub use frame::AudioFrame;
pub use recorder::{ChunkConfig, ChunkMetadata, ChunkedRecorder};
pub use sequencer::{ChunkSequencer, ReadyChunk};

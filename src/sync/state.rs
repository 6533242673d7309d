use serde::{Deserialize, Serialize};
use std::fmt;

/// Client recording state; one per device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingState {
    Stopped,
    Recording,
    Paused,
    Error,
}

/// Events that drive the recording state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordingEvent {
    Start,
    Pause,
    Resume,
    Stop,
    /// Unrecoverable capture fault
    CaptureFailure,
}

impl fmt::Display for RecordingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stopped => "stopped",
            Self::Recording => "recording",
            Self::Paused => "paused",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

impl fmt::Display for RecordingEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Stop => "stop",
            Self::CaptureFailure => "captureFailure",
        };
        f.write_str(name)
    }
}

/// A rejected event; the state is left unchanged
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot {event} while {from}")]
pub struct InvalidTransition {
    pub from: RecordingState,
    pub event: RecordingEvent,
}

/// Pure transition function of the recording state machine
pub fn transition(
    current: RecordingState,
    event: RecordingEvent,
) -> Result<RecordingState, InvalidTransition> {
    use RecordingEvent as E;
    use RecordingState as S;

    match (current, event) {
        (_, E::CaptureFailure) => Ok(S::Error),
        (S::Stopped | S::Error, E::Start) => Ok(S::Recording),
        (S::Recording, E::Pause) => Ok(S::Paused),
        (S::Paused, E::Resume) => Ok(S::Recording),
        (S::Recording | S::Paused, E::Stop) => Ok(S::Stopped),
        (from, event) => Err(InvalidTransition { from, event }),
    }
}

impl RecordingState {
    /// Whether capture is considered in progress (durability guard armed)
    pub fn is_active(self) -> bool {
        matches!(self, Self::Recording | Self::Paused)
    }
}

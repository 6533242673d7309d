use crate::durability::DurabilityGuard;
use crate::sync::{CoordinatorError, RecordingState, UploadCoordinator};
use std::sync::Arc;
use tracing::error;

/// Requests coming from the notification actions / UI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserCommand {
    Pause,
    Resume,
    Stop,
}

/// Recording controls with the durability guard kept in step.
///
/// The guard is armed when a session starts and released when recording
/// stops. A capture failure only suspends it, so pending chunks are still
/// swept on reconnect. Guard persistence failures are logged and do not
/// block recording.
pub struct RecordingService {
    coordinator: Arc<UploadCoordinator>,
    guard: Arc<DurabilityGuard>,
}

impl RecordingService {
    pub fn new(coordinator: Arc<UploadCoordinator>, guard: Arc<DurabilityGuard>) -> Self {
        Self { coordinator, guard }
    }

    pub fn coordinator(&self) -> &Arc<UploadCoordinator> {
        &self.coordinator
    }

    pub fn guard(&self) -> &Arc<DurabilityGuard> {
        &self.guard
    }

    /// Start recording into a new session and arm the guard
    pub async fn start(&self) -> Result<String, CoordinatorError> {
        let session_id = self.coordinator.start().await?;
        if let Err(e) = self.guard.activate(&session_id) {
            error!("Failed to persist resume intent: {}", e);
        }
        Ok(session_id)
    }

    pub async fn handle(&self, command: UserCommand) -> Result<RecordingState, CoordinatorError> {
        match command {
            UserCommand::Pause => Ok(self.coordinator.pause().await?),
            UserCommand::Resume => Ok(self.coordinator.resume().await?),
            UserCommand::Stop => {
                self.coordinator.stop().await?;
                self.release_guard();
                Ok(RecordingState::Stopped)
            }
        }
    }

    /// Capture reported an unrecoverable fault
    pub async fn capture_failed(&self) -> RecordingState {
        let state = self.coordinator.capture_failed().await;
        if let Err(e) = self.guard.suspend() {
            error!("Failed to clear resume intent: {}", e);
        }
        state
    }

    fn release_guard(&self) {
        if let Err(e) = self.guard.deactivate() {
            error!("Failed to clear resume intent: {}", e);
        }
    }
}

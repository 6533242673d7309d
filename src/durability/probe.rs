use super::connectivity::ManualConnectivity;
use crate::client::ChunkTransport;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Poll the server's health endpoint and raise "available" on every
/// offline-to-online edge.
///
/// The first successful poll does not fire; only a recovery does.
pub fn spawn_health_probe(
    transport: Arc<dyn ChunkTransport>,
    connectivity: Arc<ManualConnectivity>,
    interval: Duration,
) -> JoinHandle<()> {
    let interval = interval.max(Duration::from_millis(1));

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        let mut online = true;

        loop {
            ticker.tick().await;

            match transport.health().await {
                Ok(_) if !online => {
                    info!("Server reachable again");
                    online = true;
                    connectivity.notify_available();
                }
                Ok(_) => {}
                Err(e) if online => {
                    warn!("Server unreachable: {}", e);
                    online = false;
                }
                Err(_) => {}
            }
        }
    })
}

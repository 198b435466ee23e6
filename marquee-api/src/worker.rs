use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use marquee_shared::HoldEvent;
use marquee_store::EventProducer;

/// Forwards every lifecycle event to Kafka. Delivery failures are logged
/// and skipped; the in-process feed is unaffected.
pub fn spawn_event_forwarder(
    mut events: broadcast::Receiver<HoldEvent>,
    producer: Arc<EventProducer>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Lifecycle forwarder started");

        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Err(e) = producer.publish_hold_event(&event).await {
                        error!("Failed to forward {:?} for hold {}: {}", event.kind, event.hold_id, e);
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!("Lifecycle forwarder lagged, {} events dropped", missed);
                }
                Err(RecvError::Closed) => {
                    info!("Lifecycle feed closed, forwarder stopping");
                    break;
                }
            }
        }
    })
}

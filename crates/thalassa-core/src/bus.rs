use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

use crate::events::EngineEvent;

/// Event bus between the engine and its consumers.
///
/// The step loop publishes `FrameReady` events, the pre-render path
/// publishes `Progress`/`Complete`; the CLI and any UI collaborator
/// subscribe independently.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    /// Create a bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish to all current subscribers.
    ///
    /// A run with no subscribers is normal in batch mode, so publishing
    /// never fails; returns the number of receivers reached.
    pub fn publish(&self, event: EngineEvent) -> usize {
        match self.tx.send(event) {
            Ok(count) => count,
            Err(_) => {
                debug!("engine event dropped: no subscribers");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Shared bus handle for dependency injection.
pub type SharedEventBus = Arc<EventBus>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_without_subscribers_is_silent() {
        let bus = EventBus::new(8);
        let reached = bus.publish(EngineEvent::Progress {
            percent: 10,
            message: "warmup".into(),
        });
        assert_eq!(reached, 0);
    }

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        bus.publish(EngineEvent::Progress {
            percent: 50,
            message: "halfway".into(),
        });
        match rx.recv().await {
            Ok(EngineEvent::Progress { percent, .. }) => assert_eq!(percent, 50),
            other => panic!("unexpected event: {:?}", other),
        }
    }
}

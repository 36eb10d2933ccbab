pub use crate::model::Event;
use tokio::sync::broadcast;

const EVENT_CHANNEL_CAPACITY: usize = 512;

/// Thin wrapper around a broadcast channel (§4.10). Terminal-category events
/// (`Completed`/`Error`) are never meant to be missed by a slow subscriber;
/// callers that care should drain with `try_recv` in a loop rather than
/// relying on capacity alone, since `broadcast` itself has no priority lanes.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn emit(&self, event: Event) {
        // No active subscribers is not an error; the queue state itself is the source of truth.
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

// ── Backbone session events ──
//
// Both backbones report through the same broadcast channel so the
// session controller in `deebot-core` does not care which one it runs.

use std::sync::Arc;

use tokio::sync::broadcast;

/// Capacity of a transport event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Something that happened on a backbone connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Subscription acknowledged (MQTT) or session bound (XMPP).
    Ready,
    /// One inbound payload. MQTT deliveries carry their topic; XMPP
    /// stanzas do not have one.
    Message {
        topic: Option<String>,
        payload: String,
    },
    /// Connection or subscription failure. Never fatal to the process;
    /// reconnecting is left to the caller.
    Error(String),
    /// The connection is gone and its task has exited.
    Closed,
}

pub type EventSender = broadcast::Sender<Arc<TransportEvent>>;

/// Create a transport event channel. Subscribe before connecting so the
/// `Ready` signal cannot be missed.
pub fn event_channel() -> (EventSender, broadcast::Receiver<Arc<TransportEvent>>) {
    broadcast::channel(EVENT_CHANNEL_CAPACITY)
}

pub(crate) fn emit(tx: &EventSender, event: TransportEvent) {
    // No receivers just means nobody is listening yet.
    let _ = tx.send(Arc::new(event));
}

use log::debug;
use tokio::sync::broadcast;

/// Signals shared between the session list and the chat view.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    ChatSelected(String),
    NewChatRequested,
}

/// Shared selection store injected into both the session list and the chat
/// view, so neither holds a reference to the other.
#[derive(Clone)]
pub struct SelectionBus {
    tx: broadcast::Sender<SessionEvent>,
}

impl SelectionBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Returns the number of views that received the event.
    pub fn select_chat(&self, session_id: &str) -> usize {
        self.publish(SessionEvent::ChatSelected(session_id.to_string()))
    }

    pub fn request_new_chat(&self) -> usize {
        self.publish(SessionEvent::NewChatRequested)
    }

    fn publish(&self, event: SessionEvent) -> usize {
        match self.tx.send(event) {
            Ok(n) => n,
            Err(broadcast::error::SendError(event)) => {
                debug!("No chat view listening for {:?}", event);
                0
            }
        }
    }
}

impl Default for SelectionBus {
    fn default() -> Self {
        Self::new(16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_events_in_order() {
        let bus = SelectionBus::default();
        let mut rx = bus.subscribe();
        assert_eq!(bus.select_chat("abc"), 1);
        assert_eq!(bus.request_new_chat(), 1);
        assert_eq!(rx.recv().await.unwrap(), SessionEvent::ChatSelected("abc".to_string()));
        assert_eq!(rx.recv().await.unwrap(), SessionEvent::NewChatRequested);
    }

    #[test]
    fn publishing_without_listeners_is_harmless() {
        let bus = SelectionBus::new(4);
        assert_eq!(bus.request_new_chat(), 0);
    }
}

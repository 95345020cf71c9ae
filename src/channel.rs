//! Reply channels: a fresh two-endpoint message channel per outbound posting.
//!
//! One endpoint stays with the sender to receive the correlated reply, the
//! other is transferred to the target inside the posted message. The protocol
//! expects at most one reply per channel but does not enforce it; a channel
//! that never sees a reply is simply dropped with its transaction.

use tokio::sync::mpsc;

/// Transferable endpoint handed to the receiving context.
#[derive(Debug, Clone)]
pub struct MessagePort {
    tx: mpsc::UnboundedSender<String>,
}

impl MessagePort {
    /// Post a text payload back to the retained endpoint. Never blocks; if
    /// the other end is gone the payload is discarded.
    pub fn post(&self, data: impl Into<String>) {
        let _ = self.tx.send(data.into());
    }
}

/// Endpoint retained by the sender.
#[derive(Debug)]
pub struct ReplyReceiver {
    rx: mpsc::UnboundedReceiver<String>,
}

impl ReplyReceiver {
    /// Wait for the next payload on this channel. Returns `None` once every
    /// transferred port has been dropped.
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}

/// Create a dedicated reply channel for one outbound message.
pub fn reply_channel() -> (ReplyReceiver, MessagePort) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ReplyReceiver { rx }, MessagePort { tx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_in_send_order() {
        let (mut rx, port) = reply_channel();
        port.post("first");
        port.post("second");
        assert_eq!(rx.recv().await.as_deref(), Some("first"));
        assert_eq!(rx.recv().await.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn closes_when_all_ports_dropped() {
        let (mut rx, port) = reply_channel();
        let clone = port.clone();
        drop(port);
        clone.post("last");
        drop(clone);
        assert_eq!(rx.recv().await.as_deref(), Some("last"));
        assert_eq!(rx.recv().await, None);
    }

    #[test]
    fn post_after_receiver_dropped_is_harmless() {
        let (rx, port) = reply_channel();
        drop(rx);
        port.post("into the void");
    }
}

//! Upward notifications from the reconciliation engine.

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{debug, info};

use crate::engine::ResolvedBatch;

/// Receiver of reconciliation outcomes.
pub trait StoreDelegate: Send + Sync {
    /// A batch was reconciled, before acknowledgement and verification.
    fn on_batch_resolved(&self, batch: &ResolvedBatch);

    /// Human-readable status or error.
    fn on_message(&self, text: &str);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    BatchResolved(ResolvedBatch),
    Message(String),
}

/// Forwards notifications to whichever task owns the user-facing surface.
#[derive(Debug, Clone)]
pub struct ChannelDelegate {
    sender: UnboundedSender<Notification>,
}

impl ChannelDelegate {
    pub fn new() -> (Self, UnboundedReceiver<Notification>) {
        let (sender, receiver) = unbounded_channel();
        (Self { sender }, receiver)
    }

    fn forward(&self, notification: Notification) {
        // receiver gone means nobody is listening anymore
        if self.sender.send(notification).is_err() {
            debug!("notification dropped, receiver closed");
        }
    }
}

impl StoreDelegate for ChannelDelegate {
    fn on_batch_resolved(&self, batch: &ResolvedBatch) {
        self.forward(Notification::BatchResolved(batch.clone()));
    }

    fn on_message(&self, text: &str) {
        self.forward(Notification::Message(text.to_owned()));
    }
}

/// Writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogDelegate;

impl StoreDelegate for LogDelegate {
    fn on_batch_resolved(&self, batch: &ResolvedBatch) {
        info!(
            purchased = batch.purchased().count(),
            restored = batch.restored().count(),
            failed = batch.failed().count(),
            "batch resolved"
        );
    }

    fn on_message(&self, text: &str) {
        info!(message = %text.replace('\n', " "), "store message");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_delegate_forwards_in_order() {
        let (delegate, mut receiver) = ChannelDelegate::new();
        delegate.on_batch_resolved(&ResolvedBatch::default());
        delegate.on_message("hello");

        assert_eq!(
            receiver.try_recv().unwrap(),
            Notification::BatchResolved(ResolvedBatch::default())
        );
        assert_eq!(
            receiver.try_recv().unwrap(),
            Notification::Message("hello".to_string())
        );
    }

    #[test]
    fn channel_delegate_tolerates_closed_receiver() {
        let (delegate, receiver) = ChannelDelegate::new();
        drop(receiver);
        delegate.on_message("nobody home");
    }
}

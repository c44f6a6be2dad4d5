//! EventSink implementations.

use tokio::sync::mpsc;

use crate::domain::DispatchEvent;
use crate::ports::EventSink;

/// Drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _event: DispatchEvent) {}
}

/// Forwards events to an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    tx: mpsc::UnboundedSender<DispatchEvent>,
}

impl ChannelEventSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DispatchEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: DispatchEvent) {
        // ignore send error: the host may have stopped listening
        let _ = self.tx.send(event);
    }
}

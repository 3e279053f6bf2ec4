use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

use crate::context::messages::{ContextEvent, ContextReply, ContextRequest, FrameId, TabId};
use crate::dom::document::Document;
use crate::error::ChannelError;

/// Sending side of one document context's event queue, as held by the
/// coordinating process.
#[derive(Debug, Clone)]
pub struct ContextHandle {
    pub tab: TabId,
    pub frame: FrameId,
    pub host: String,
    sender: mpsc::UnboundedSender<ContextEvent>,
}

impl ContextHandle {
    pub fn new(tab: TabId, frame: FrameId, host: &str, sender: mpsc::UnboundedSender<ContextEvent>) -> Self {
        ContextHandle {
            tab,
            frame,
            host: host.to_string(),
            sender,
        }
    }

    /// Queue an event without waiting for anything.
    pub fn send(&self, event: ContextEvent) -> Result<(), ChannelError> {
        self.sender.send(event).map_err(|_| self.closed())
    }

    /// Round trip: queue a request and wait for its reply, giving up after
    /// `timeout`.
    pub async fn request(&self, request: ContextRequest, timeout: Duration) -> Result<ContextReply, ChannelError> {
        let name = request.name();
        let (tx, rx) = oneshot::channel();
        trace!(tab = self.tab, frame = self.frame, request = name, "context request");
        self.send(ContextEvent::Request { request, reply: tx })?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(self.closed()),
            Err(_) => {
                debug!(tab = self.tab, frame = self.frame, request = name, "context request timed out");
                Err(ChannelError::Timeout {
                    tab: self.tab,
                    frame: self.frame,
                    request: name.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Apply a host-page change on the context's own turn.
    pub fn mutate<F>(&self, change: F) -> Result<(), ChannelError>
    where
        F: FnOnce(&mut Document) + Send + 'static,
    {
        self.send(ContextEvent::Host(Box::new(change)))
    }

    pub fn shutdown(&self) -> Result<(), ChannelError> {
        self.send(ContextEvent::Shutdown)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    fn closed(&self) -> ChannelError {
        ChannelError::Closed {
            tab: self.tab,
            frame: self.frame,
        }
    }
}

//! Context update and delete notifications.
//!
//! Hosts publish [`ContextEvent`]s through a [`ContextNotifier`]. The
//! registry listens through a [`Subscription`], an owned handle that holds
//! the receiving end until it is disposed or dropped.

use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;

use crate::logs::log_warning;

/// Something happened to a context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContextEvent {
    Updated { context: String },
    Deleted { context: String },
}

impl ContextEvent {
    pub fn context(&self) -> &str {
        match self {
            Self::Updated { context } | Self::Deleted { context } => context,
        }
    }
}

/// Publishing side of the notification hooks.
#[derive(Debug, Clone)]
pub struct ContextNotifier {
    sender: broadcast::Sender<ContextEvent>,
}

impl ContextNotifier {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1024);
        Self { sender }
    }

    pub fn notify_updated(&self, context: impl Into<String>) {
        let _ = self.sender.send(ContextEvent::Updated { context: context.into() });
    }

    pub fn notify_deleted(&self, context: impl Into<String>) {
        let _ = self.sender.send(ContextEvent::Deleted { context: context.into() });
    }

    /// Acquire a new subscription. Only events sent after this call are seen.
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: Some(self.sender.subscribe()),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ContextNotifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Owned subscription to context events.
#[derive(Debug)]
pub struct Subscription {
    receiver: Option<broadcast::Receiver<ContextEvent>>,
}

impl Subscription {
    /// Wait for the next event. `None` once disposed or when the notifier is gone.
    pub async fn next(&mut self) -> Option<ContextEvent> {
        let receiver = self.receiver.as_mut()?;
        loop {
            match receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    log_warning(format!("Missed {} context notifications", skipped));
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next event if one is already queued.
    pub fn try_next(&mut self) -> Option<ContextEvent> {
        let receiver = self.receiver.as_mut()?;
        loop {
            match receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(skipped)) => {
                    log_warning(format!("Missed {} context notifications", skipped));
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    /// Consume the subscription as a stream of events.
    pub fn into_stream(mut self) -> impl Stream<Item = ContextEvent> {
        // A disposed subscription yields a stream that is already closed.
        let receiver = self.receiver.take().unwrap_or_else(|| broadcast::channel(1).1);
        BroadcastStream::new(receiver).filter_map(|result| result.ok())
    }

    /// Release the hook. Further reads return `None`.
    pub fn dispose(&mut self) {
        self.receiver = None;
    }

    pub fn is_active(&self) -> bool {
        self.receiver.is_some()
    }
}

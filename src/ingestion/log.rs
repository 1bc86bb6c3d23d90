//! Observable import log.
//!
//! [`Logger`] is an append-ordered list of [`LogMessage`]s that a progress view can follow.
//! A logger is created by the caller and passed explicitly to the pipeline; subscribers see a
//! full snapshot after every change.
//!
//! Appending coalesces: when the newest entry has the same text as the incoming one, the
//! incoming message replaces it. Repeated progress ticks therefore update a single line.

use std::error::Error as StdError;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::watch;

use crate::error::ImportError;
use crate::types::{LogMessage, LogOptions};

use super::observability::LogSubscriber;

type SubscriberList = Mutex<Vec<(u64, Arc<dyn LogSubscriber>)>>;

/// Observable, append-ordered list of import log messages.
pub struct Logger {
    messages: watch::Sender<Vec<LogMessage>>,
    subscribers: Arc<SubscriberList>,
    next_id: AtomicU64,
}

impl Logger {
    /// Create a new, empty log.
    pub fn new() -> Self {
        let (messages, _) = watch::channel(Vec::new());
        Self {
            messages,
            subscribers: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicU64::new(0),
        }
    }

    /// Append an informational message.
    pub fn info(&self, text: impl Into<String>, options: LogOptions) {
        self.append(LogMessage::new(text, options));
    }

    /// Append an error message; `error` is always set.
    pub fn error(&self, text: impl Into<String>, options: LogOptions) {
        self.append(LogMessage::new(
            text,
            LogOptions {
                error: Some(true),
                ..options
            },
        ));
    }

    /// Append an error entry describing `err`.
    ///
    /// [`ImportError`]s that carry log options (see [`ImportError::log_options`]) are rendered
    /// with those options; every other error is rendered from its `Display` text.
    pub fn exception(&self, err: &(dyn StdError + 'static)) {
        let options = err
            .downcast_ref::<ImportError>()
            .and_then(ImportError::log_options)
            .unwrap_or_default();
        self.error(err.to_string(), options);
    }

    /// Current snapshot of all messages.
    pub fn messages(&self) -> Vec<LogMessage> {
        self.messages.borrow().clone()
    }

    /// Remove every message.
    pub fn clear(&self) {
        self.messages.send_modify(|messages| messages.clear());
        self.notify();
    }

    /// A receiver that always observes the latest snapshot.
    pub fn watch(&self) -> watch::Receiver<Vec<LogMessage>> {
        self.messages.subscribe()
    }

    /// Register a subscriber.
    ///
    /// The subscriber is called immediately with the current snapshot and again after every
    /// change, until the returned [`Subscription`] is dropped or unsubscribed.
    pub fn subscribe(&self, subscriber: impl LogSubscriber + 'static) -> Subscription {
        self.subscribe_arc(Arc::new(subscriber))
    }

    /// Like [`Self::subscribe`], for an already shared subscriber.
    pub fn subscribe_arc(&self, subscriber: Arc<dyn LogSubscriber>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push((id, Arc::clone(&subscriber)));
        }
        subscriber.on_messages(&self.messages());
        Subscription {
            id,
            subscribers: Arc::downgrade(&self.subscribers),
        }
    }

    fn append(&self, message: LogMessage) {
        self.messages.send_modify(|messages| match messages.last_mut() {
            Some(last) if last.text == message.text => *last = message,
            _ => messages.push(message),
        });
        self.notify();
    }

    fn notify(&self) {
        // Snapshot both lists so subscribers may call back into the logger.
        let subscribers: Vec<Arc<dyn LogSubscriber>> = match self.subscribers.lock() {
            Ok(subs) => subs.iter().map(|(_, s)| Arc::clone(s)).collect(),
            Err(_) => return,
        };
        if subscribers.is_empty() {
            return;
        }
        let snapshot = self.messages();
        for s in subscribers {
            s.on_messages(&snapshot);
        }
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("messages_len", &self.messages.borrow().len())
            .field(
                "subscribers_len",
                &self.subscribers.lock().map(|s| s.len()).unwrap_or_default(),
            )
            .finish()
    }
}

/// Handle returned by [`Logger::subscribe`]; unsubscribes when dropped.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    subscribers: Weak<SubscriberList>,
}

impl Subscription {
    /// Stop receiving updates.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(list) = self.subscribers.upgrade() {
            if let Ok(mut subs) = list.lock() {
                subs.retain(|(id, _)| *id != self.id);
            }
        }
    }
}

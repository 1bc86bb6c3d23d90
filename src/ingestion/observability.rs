use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::types::LogMessage;

/// Receives snapshots of a [`super::Logger`].
///
/// Implementors can render a progress view, mirror entries to `tracing`, or persist them.
/// Closures `Fn(&[LogMessage])` implement this trait.
pub trait LogSubscriber: Send + Sync {
    /// Called with the full, ordered list of messages after every change.
    fn on_messages(&self, messages: &[LogMessage]);
}

impl<F> LogSubscriber for F
where
    F: Fn(&[LogMessage]) + Send + Sync,
{
    fn on_messages(&self, messages: &[LogMessage]) {
        self(messages)
    }
}

/// A subscriber that fans out snapshots to a list of subscribers.
#[derive(Default)]
pub struct CompositeSubscriber {
    subscribers: Vec<Arc<dyn LogSubscriber>>,
}

impl CompositeSubscriber {
    /// Create a new composite subscriber from a list of subscribers.
    pub fn new(subscribers: Vec<Arc<dyn LogSubscriber>>) -> Self {
        Self { subscribers }
    }
}

impl fmt::Debug for CompositeSubscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeSubscriber")
            .field("subscribers_len", &self.subscribers.len())
            .finish()
    }
}

impl LogSubscriber for CompositeSubscriber {
    fn on_messages(&self, messages: &[LogMessage]) {
        for s in &self.subscribers {
            s.on_messages(messages);
        }
    }
}

/// Forwards the newest log entry to `tracing`.
///
/// Error entries are emitted at `WARN`, everything else at `INFO`. Coalesced progress ticks
/// are forwarded each time, so expect one event per received chunk while downloading.
#[derive(Debug, Default)]
pub struct TracingSubscriber;

impl LogSubscriber for TracingSubscriber {
    fn on_messages(&self, messages: &[LogMessage]) {
        let Some(last) = messages.last() else {
            return;
        };
        let progress = last.options.progress_text.as_deref().unwrap_or("");
        if last.is_error() {
            tracing::warn!(target: "import_log", progress, "{}", last.text);
        } else {
            tracing::info!(target: "import_log", progress, "{}", last.text);
        }
    }
}

/// Appends the newest log entry to a local file as one JSON object per line.
#[derive(Debug)]
pub struct FileSubscriber {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileSubscriber {
    /// Create a file subscriber that appends entries to `path`.
    ///
    /// Writes are best-effort; failures to open/write the log file are ignored.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn append_line(&self, line: &str) {
        let _guard = self.lock.lock().ok();
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = writeln!(f, "{line}");
        }
    }
}

impl LogSubscriber for FileSubscriber {
    fn on_messages(&self, messages: &[LogMessage]) {
        let Some(last) = messages.last() else {
            return;
        };
        let entry = serde_json::json!({
            "ts": unix_ts(),
            "index": messages.len() - 1,
            "message": last,
        });
        self.append_line(&entry.to_string());
    }
}

fn unix_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

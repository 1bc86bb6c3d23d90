//! Import pipeline and its collaborators.
//!
//! Most callers should use [`ingest`] (from [`orchestrator`]) which:
//!
//! - reads local files or downloads URLs with progress reporting ([`fetch`])
//! - registers each input's bytes with a [`DatabaseHandle`] and loads them into one table
//!   through a [`QueryEngine`]
//! - reports progress and failures to a [`Logger`] that a UI can subscribe to
//!
//! [`MemoryDatabase`] is an in-process implementation of both collaborators backed by an
//! in-memory DuckDB connection.

pub mod engine;
pub mod extension;
pub mod fetch;
pub mod log;
pub mod memory;
pub mod observability;
pub mod orchestrator;

pub use engine::{quote_literal, DatabaseHandle, QueryEngine};
pub use extension::resolve_extension;
pub use fetch::{
    decode_data_url, fetch_with_progress, format_file_size, http_error_status_text, FetchOptions,
};
pub use log::{Logger, Subscription};
pub use memory::MemoryDatabase;
pub use observability::{CompositeSubscriber, FileSubscriber, LogSubscriber, TracingSubscriber};
pub use orchestrator::{ingest, ingest_with_options, ImportOptions, ImportRequest};

//! `rust-data-import` loads user-supplied datasets, local files or remote URLs, into a single
//! queryable table, one input at a time, while reporting progress and failures to an
//! observable log.
//!
//! The primary entrypoint is [`ingestion::ingest`]. For each input it obtains the bytes,
//! registers them with a database under a temporary name, runs one `CREATE TABLE .. AS SELECT`
//! or `INSERT INTO .. SELECT` statement, and releases the temporary name again.
//!
//! ## What you can import
//!
//! **Inputs** ([`types::Input`]):
//!
//! - [`types::LocalFile`]: in-memory bytes or a filesystem path, plus a display name
//! - `RemoteSource`: an `http(s)` URL, downloaded with byte-count progress, or a `data:` URL,
//!   decoded in place
//!
//! **Formats** read by [`ingestion::MemoryDatabase`] (DuckDB, picked by extension):
//!
//! - **CSV**: `.csv`
//! - **JSON**: `.json` (array-of-objects), `.jsonl` / `.ndjson` (newline-delimited objects)
//! - **Parquet**: `.parquet`
//!
//! When more than one input is imported, every row gets a `filename` column holding the name
//! or URL of the input it came from.
//!
//! ## Quick example
//!
//! ```no_run
//! use rust_data_import::ingestion::{ingest, Logger, MemoryDatabase};
//! use rust_data_import::types::{Input, LocalFile};
//!
//! # async fn run() -> Result<(), rust_data_import::ImportError> {
//! let db = MemoryDatabase::new()?;
//! let log = Logger::new();
//! let _sub = log.subscribe(|messages: &[rust_data_import::types::LogMessage]| {
//!     if let Some(last) = messages.last() {
//!         println!("{} {}", last.text, last.options.progress_text.as_deref().unwrap_or(""));
//!     }
//! });
//!
//! let inputs = vec![
//!     Input::from(LocalFile::from_path("points.csv")),
//!     Input::url("https://example.com/more_points.parquet"),
//! ];
//! if let Err(e) = ingest(&inputs, &db, &db, "points", Some(&log)).await {
//!     log.exception(&e);
//!     return Err(e);
//! }
//! println!("rows={}", db.table("points")?.row_count());
//! # Ok(())
//! # }
//! ```
//!
//! ## Failures
//!
//! Every error is an [`ImportError`]. Downloads fail with one of `Network`, `HttpStatus`,
//! `EmptyBody`, `StreamRead` or `DataUrl`, each carrying a user-facing message. Nothing is retried and
//! nothing is rolled back: rows loaded from earlier inputs stay in the table.
//!
//! ## Modules
//!
//! - [`ingestion`]: the pipeline, the observable log, the fetcher and the in-memory database
//! - [`types`]: inputs, log messages and table snapshots
//! - [`error`]: error types used across the crate

pub mod error;
pub mod ingestion;
pub mod types;

pub use error::{ErrorKind, ImportError, ImportResult};

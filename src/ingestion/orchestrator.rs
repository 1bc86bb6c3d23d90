//! Sequential import of a list of inputs into one table.
//!
//! Most callers should use [`ingest`]. For every input, in order:
//!
//! 1. obtain its bytes (local read, or [`fetch_with_progress`] for URLs)
//! 2. register them with the [`DatabaseHandle`] as `data-{index}{extension}`
//! 3. run one statement on the [`QueryEngine`]: `CREATE TABLE` for the first input,
//!    `INSERT INTO` for the rest
//! 4. drop the registered buffer
//!
//! With more than one input every row gets a `filename` column holding its source name.
//! The first failing step aborts the run and its error is returned unchanged; rows committed
//! by earlier inputs stay in the table.

use std::fmt;

use reqwest::Client;

use crate::error::{ImportError, ImportResult};
use crate::types::{Input, LogOptions, TempObject};

use super::engine::{DatabaseHandle, QueryEngine};
use super::extension::resolve_extension;
use super::fetch::{default_client, fetch_with_progress, FetchOptions, LOADING_FROM_URL};
use super::log::Logger;

/// Log text emitted before reading a local file.
pub const LOADING_FROM_FILE: &str = "Loading data from file...";

/// Name of the provenance column added when importing more than one input.
pub const FILENAME_COLUMN: &str = "filename";

/// Options controlling an import run.
///
/// Use [`Default`] for common cases.
#[derive(Clone, Default)]
pub struct ImportOptions {
    /// Options applied to every remote fetch.
    pub fetch: FetchOptions,
    /// HTTP client to use. If `None`, [`default_client`] is built on the first remote input.
    pub client: Option<Client>,
}

impl fmt::Debug for ImportOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportOptions")
            .field("fetch", &self.fetch)
            .field("client_set", &self.client.is_some())
            .finish()
    }
}

/// Import `inputs` into `table` with default options.
///
/// See [`ingest_with_options`].
pub async fn ingest(
    inputs: &[Input],
    db: &dyn DatabaseHandle,
    engine: &dyn QueryEngine,
    table: &str,
    logger: Option<&Logger>,
) -> ImportResult<()> {
    ingest_with_options(inputs, db, engine, table, logger, &ImportOptions::default()).await
}

/// Import `inputs` into `table`, strictly one input at a time.
///
/// Input `i + 1` is not read before input `i`'s statement has run and its buffer has been
/// dropped. `table` is interpolated as-is and must be a valid identifier; source names and
/// temp file names are quoted with [`QueryEngine::literal`].
///
/// # Examples
///
/// ```no_run
/// use rust_data_import::ingestion::{ingest, Logger, MemoryDatabase};
/// use rust_data_import::types::{Input, LocalFile};
///
/// # async fn run() -> Result<(), rust_data_import::ImportError> {
/// let db = MemoryDatabase::new()?;
/// let log = Logger::new();
/// let inputs = vec![
///     Input::from(LocalFile::from_bytes("a.csv", "id\n1\n")),
///     Input::url("https://example.com/b.csv"),
/// ];
/// ingest(&inputs, &db, &db, "points", Some(&log)).await?;
/// # Ok(())
/// # }
/// ```
#[tracing::instrument(skip_all, fields(table = %table, inputs = inputs.len()))]
pub async fn ingest_with_options(
    inputs: &[Input],
    db: &dyn DatabaseHandle,
    engine: &dyn QueryEngine,
    table: &str,
    logger: Option<&Logger>,
    options: &ImportOptions,
) -> ImportResult<()> {
    let mut client: Option<Client> = options.client.clone();

    for (index, input) in inputs.iter().enumerate() {
        let (bytes, source_name) = match input {
            Input::LocalFile(file) => {
                if let Some(log) = logger {
                    log.info(LOADING_FROM_FILE, LogOptions::default());
                }
                (file.read().await?, file.name.as_str())
            }
            Input::RemoteSource { url } => {
                if let Some(log) = logger {
                    log.info(LOADING_FROM_URL, LogOptions::default());
                }
                let client = match &client {
                    Some(c) => c.clone(),
                    None => {
                        let built = default_client()?;
                        client = Some(built.clone());
                        built
                    }
                };
                let bytes = fetch_with_progress(&client, url, &options.fetch, logger).await?;
                (bytes, url.as_str())
            }
        };

        let extension = resolve_extension(source_name);
        let temp = TempObject::new(index, extension.as_deref(), bytes);
        tracing::debug!(
            index,
            source = source_name,
            temp = %temp.name,
            bytes = temp.bytes.len(),
            "registering buffer"
        );
        db.register_file_buffer(&temp.name, temp.bytes).await?;

        let sql = table_statement(engine, table, index, inputs.len(), source_name, &temp.name);
        tracing::debug!(index, %sql, "executing");
        engine.query(&sql).await?;

        db.drop_file(&temp.name).await?;
    }

    tracing::info!("import finished");
    Ok(())
}

/// Build the statement that loads the temp file of input `index` out of `count` into `table`.
pub fn table_statement(
    engine: &dyn QueryEngine,
    table: &str,
    index: usize,
    count: usize,
    source_name: &str,
    temp_name: &str,
) -> String {
    let from = engine.literal(temp_name);
    if count == 1 {
        return format!("CREATE TABLE {table} AS SELECT * FROM {from}");
    }

    let name = engine.literal(source_name);
    if index == 0 {
        format!("CREATE TABLE {table} AS SELECT *, {name} AS {FILENAME_COLUMN} FROM {from}")
    } else {
        format!("INSERT INTO {table} SELECT *, {name} AS {FILENAME_COLUMN} FROM {from}")
    }
}

/// An owned import job, e.g. for a job queue.
#[derive(Debug, Clone)]
pub struct ImportRequest {
    /// Inputs, imported in order.
    pub inputs: Vec<Input>,
    /// Target table name.
    pub table: String,
    /// Options controlling the run.
    pub options: ImportOptions,
}

impl ImportRequest {
    /// Create a new request with default options.
    pub fn new(table: impl Into<String>, inputs: Vec<Input>) -> Self {
        Self {
            inputs,
            table: table.into(),
            options: ImportOptions::default(),
        }
    }

    /// Parse a request of the form `{"table": "t", "inputs": [{"url": ...}, {"path": ...}]}`.
    ///
    /// Every input is validated before anything runs, so a malformed input never leaves a
    /// partially created table behind.
    pub fn from_json(value: &serde_json::Value) -> ImportResult<Self> {
        let table = value
            .get("table")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| ImportError::SchemaMismatch {
                message: "import request needs a string \"table\"".to_string(),
            })?;
        let inputs = value
            .get("inputs")
            .and_then(serde_json::Value::as_array)
            .ok_or_else(|| ImportError::SchemaMismatch {
                message: "import request needs an \"inputs\" array".to_string(),
            })?
            .iter()
            .map(Input::from_json)
            .collect::<ImportResult<Vec<_>>>()?;
        Ok(Self::new(table, inputs))
    }

    /// Execute the request by calling [`ingest_with_options`].
    pub async fn run(
        &self,
        db: &dyn DatabaseHandle,
        engine: &dyn QueryEngine,
        logger: Option<&Logger>,
    ) -> ImportResult<()> {
        ingest_with_options(&self.inputs, db, engine, &self.table, logger, &self.options).await
    }
}
